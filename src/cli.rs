//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::backtest::run_backtest;
use crate::domain::conditions::ConditionSet;
use crate::domain::config_validation::{load_backtest_config, validate_strategy_config};
use crate::domain::error::RuletraderError;
use crate::domain::rule_eval::{IndicatorCache, evaluate_signals};
use crate::domain::strategy::Strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceSource;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "ruletrader", about = "Rule-based long-only strategy backtester")]
pub struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Price CSV, overriding [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Rule text file, overriding [strategy] rules_file
        #[arg(short, long, conflicts_with = "conditions")]
        rules: Option<PathBuf>,
        /// Condition list JSON, overriding [strategy] conditions_file
        #[arg(long)]
        conditions: Option<PathBuf>,
    },
    /// Parse rule text or a condition list and print the result
    Validate {
        #[arg(
            short,
            long,
            conflicts_with = "conditions",
            required_unless_present = "conditions"
        )]
        rules: Option<PathBuf>,
        #[arg(long)]
        conditions: Option<PathBuf>,
    },
    /// Print the rule text generated from a condition list
    Generate {
        #[arg(long)]
        conditions: PathBuf,
    },
    /// Print per-bar entry/exit signals as CSV
    Signals {
        #[arg(short, long)]
        rules: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Install the stderr log subscriber. Safe to call more than once.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            rules,
            conditions,
        } => run_backtest_command(
            &config,
            data.as_deref(),
            rules.as_deref(),
            conditions.as_deref(),
        ),
        Command::Validate { rules, conditions } => {
            run_validate(rules.as_deref(), conditions.as_deref())
        }
        Command::Generate { conditions } => run_generate(&conditions),
        Command::Signals { rules, data } => run_signals(&rules, &data),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

fn report_error(err: &RuletraderError) -> ExitCode {
    match err {
        RuletraderError::Syntax(e) => eprintln!("error: {}", e.display_with_context()),
        _ => eprintln!("error: {err}"),
    }
    err.into()
}

/// Where a strategy's rules come from, after CLI overrides.
enum RuleSource {
    Rules(PathBuf),
    Conditions(PathBuf),
}

fn resolve_rule_source(
    config: &FileConfigAdapter,
    rules: Option<&Path>,
    conditions: Option<&Path>,
) -> Result<RuleSource, RuletraderError> {
    if let Some(path) = rules {
        return Ok(RuleSource::Rules(path.to_path_buf()));
    }
    if let Some(path) = conditions {
        return Ok(RuleSource::Conditions(path.to_path_buf()));
    }
    validate_strategy_config(config)?;
    if let Some(path) = config.get_path("strategy", "rules_file") {
        return Ok(RuleSource::Rules(path));
    }
    if let Some(path) = config.get_path("strategy", "conditions_file") {
        return Ok(RuleSource::Conditions(path));
    }
    Err(RuletraderError::ConfigMissing {
        section: "strategy".into(),
        key: "rules_file".into(),
    })
}

fn load_conditions(path: &Path) -> Result<ConditionSet, RuletraderError> {
    let text = fs::read_to_string(path)?;
    Ok(ConditionSet::from_json(&text)?)
}

fn load_strategy(
    name: &str,
    description: &str,
    source: &RuleSource,
) -> Result<Strategy, RuletraderError> {
    match source {
        RuleSource::Rules(path) => {
            eprintln!("Loading rules from {}", path.display());
            let text = fs::read_to_string(path)?;
            Ok(Strategy::from_rules(name, description, &text)?)
        }
        RuleSource::Conditions(path) => {
            eprintln!("Generating rules from {}", path.display());
            let conditions = load_conditions(path)?;
            Strategy::from_conditions(name, description, &conditions)
        }
    }
}

fn run_backtest_command(
    config_path: &Path,
    data_override: Option<&Path>,
    rules_override: Option<&Path>,
    conditions_override: Option<&Path>,
) -> Result<(), RuletraderError> {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let config = FileConfigAdapter::from_file(config_path)?;
    let bt_config = load_backtest_config(&config)?;

    // Stage 2: Resolve and parse the strategy
    let source = resolve_rule_source(&config, rules_override, conditions_override)?;
    let name = config
        .get_string("strategy", "name")
        .unwrap_or_else(|| "Unnamed".to_string());
    let description = config
        .get_string("strategy", "description")
        .unwrap_or_default();
    let strategy = load_strategy(&name, &description, &source)?;
    eprintln!("Loaded strategy: {}", strategy.name);

    // Stage 3: Load prices
    let data_path = match data_override {
        Some(path) => path.to_path_buf(),
        None => config
            .get_path("data", "path")
            .ok_or_else(|| RuletraderError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?,
    };
    eprintln!("Loading prices from {}", data_path.display());
    let series = CsvAdapter::new(data_path).load()?;
    eprintln!("Loaded {} bars", series.len());

    // Stage 4: Evaluate signals and simulate
    let mut cache = IndicatorCache::new();
    let signals = evaluate_signals(&strategy.ast, &series, &mut cache)?;
    eprintln!("Computed {} indicator(s)", cache.computations());
    let result = run_backtest(&series, &signals, &bt_config)?;

    // Stage 5: Report
    TextReportAdapter.write(&result, &strategy, &mut io::stderr())?;
    Ok(())
}

fn run_validate(rules: Option<&Path>, conditions: Option<&Path>) -> Result<(), RuletraderError> {
    let source = match (rules, conditions) {
        (Some(path), _) => RuleSource::Rules(path.to_path_buf()),
        (None, Some(path)) => RuleSource::Conditions(path.to_path_buf()),
        (None, None) => {
            return Err(RuletraderError::ConfigMissing {
                section: "strategy".into(),
                key: "rules_file".into(),
            });
        }
    };
    let strategy = load_strategy("", "", &source)?;

    eprintln!("\nParsed rules:");
    eprint!("{}", strategy.ast);

    let indicators = strategy.ast.indicators();
    if indicators.is_empty() {
        eprintln!("\nIndicators: none");
    } else {
        eprintln!("\nIndicators:");
        for key in &indicators {
            eprintln!("  {key}");
        }
    }

    eprintln!("\nRules are valid.");
    Ok(())
}

fn run_generate(conditions_path: &Path) -> Result<(), RuletraderError> {
    let conditions = load_conditions(conditions_path)?;
    let strategy = Strategy::from_conditions("", "", &conditions)?;
    print!("{}", strategy.rules);
    Ok(())
}

fn run_signals(rules_path: &Path, data_path: &Path) -> Result<(), RuletraderError> {
    let strategy = load_strategy("", "", &RuleSource::Rules(rules_path.to_path_buf()))?;
    let series = CsvAdapter::new(data_path).load()?;
    let signals = evaluate_signals(&strategy.ast, &series, &mut IndicatorCache::new())?;

    println!("stamp,entry,exit");
    for ((bar, entry), exit) in series.bars.iter().zip(&signals.entry).zip(&signals.exit) {
        println!("{},{},{}", bar.stamp, entry, exit);
    }
    Ok(())
}
