//! INI file configuration adapter.

use crate::domain::error::RuletraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::{Path, PathBuf};

pub struct FileConfigAdapter {
    config: Ini,
    /// Directory of the loaded file; relative paths resolve against it.
    base_dir: Option<PathBuf>,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RuletraderError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut adapter = Self::parse(&content, &path.display().to_string())?;
        adapter.base_dir = path.parent().map(Path::to_path_buf);
        Ok(adapter)
    }

    pub fn from_string(content: &str) -> Result<Self, RuletraderError> {
        Self::parse(content, "<string>")
    }

    fn parse(content: &str, file: &str) -> Result<Self, RuletraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| RuletraderError::ConfigParse {
                file: file.to_string(),
                reason,
            })?;
        Ok(Self {
            config,
            base_dir: None,
        })
    }

    /// A path-valued key, resolved against the config file's directory when
    /// relative.
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        let raw = self.get_string(section, key)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let path = PathBuf::from(raw);
        match &self.base_dir {
            Some(dir) if path.is_relative() => Some(dir.join(path)),
            _ => Some(path),
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, RuletraderError> {
        let raw = match self.config.get(section, key) {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(None),
        };
        self.config
            .getfloat(section, key)
            .map_err(|_| RuletraderError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("{} must be a number, got '{}'", key, raw.trim()),
            })
    }
}
