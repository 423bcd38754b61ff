//! End-to-end tests of the library pipeline.
//!
//! Tests cover:
//! - Rule text through parse, evaluate and backtest with a mock price source
//! - Condition lists producing the same signals as hand-written rules
//! - CSV and INI fixtures on disk
//! - Error propagation and exit-code mapping across stages

mod common;

use approx::assert_relative_eq;
use common::*;
use ruletrader::adapters::csv_adapter::CsvAdapter;
use ruletrader::adapters::file_config_adapter::FileConfigAdapter;
use ruletrader::adapters::text_report_adapter::TextReportAdapter;
use ruletrader::domain::backtest::{BacktestConfig, TradeStatus, run_backtest};
use ruletrader::domain::conditions::ConditionSet;
use ruletrader::domain::config_validation::load_backtest_config;
use ruletrader::domain::error::{BacktestError, EvaluationError, RuletraderError};
use ruletrader::domain::rule_eval::{IndicatorCache, Signals, evaluate_signals};
use ruletrader::domain::strategy::Strategy;
use ruletrader::ports::data_port::PriceSource;
use ruletrader::ports::report_port::ReportPort;

const THRESHOLD_RULES: &str = "ENTRY: close > 100\nEXIT: close < 100\n";

mod full_pipeline {
    use super::*;

    #[test]
    fn threshold_strategy_with_mock_source() {
        let source =
            MockPriceSource::new(bars_from_closes("2024-01-01", &[90.0, 110.0, 105.0, 95.0, 90.0]));
        let series = source.load().unwrap();
        assert_eq!(source.loads.get(), 1);

        let strategy = Strategy::from_rules("Threshold", "", THRESHOLD_RULES).unwrap();
        let signals =
            evaluate_signals(&strategy.ast, &series, &mut IndicatorCache::new()).unwrap();
        assert_eq!(signals.entry, vec![false, true, true, false, false]);
        assert_eq!(signals.exit, vec![true, false, false, true, true]);

        let result = run_backtest(&series, &signals, &no_commission()).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_date, BarStamp::Date(date(2024, 1, 2)));
        assert_eq!(trade.exit_date, BarStamp::Date(date(2024, 1, 4)));
        assert_eq!(trade.status, TradeStatus::Closed);

        let size = 100_000.0 / 110.0;
        assert_relative_eq!(trade.position_size, size, epsilon = 1e-9);
        assert_relative_eq!(result.metrics.final_cash, size * 95.0, epsilon = 1e-6);
        assert_relative_eq!(
            result.metrics.total_return,
            (95.0 / 110.0 - 1.0) * 100.0,
            epsilon = 1e-9
        );
        assert_eq!(result.equity_curve.len(), 5);
    }

    #[test]
    fn trailing_position_is_force_closed() {
        let series = PriceSeries::new(bars_from_closes("2024-03-01", &[90.0, 101.0, 120.0]));
        let strategy = Strategy::from_rules("Threshold", "", THRESHOLD_RULES).unwrap();
        let signals =
            evaluate_signals(&strategy.ast, &series, &mut IndicatorCache::new()).unwrap();

        let result = run_backtest(&series, &signals, &no_commission()).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].status, TradeStatus::OpenAtEnd);
        assert_eq!(result.trades[0].exit_date, BarStamp::Date(date(2024, 3, 3)));
        assert_relative_eq!(
            *result.equity_curve.last().unwrap(),
            result.metrics.final_cash,
            epsilon = 1e-9
        );
    }

    #[test]
    fn shared_indicator_is_computed_once() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + 10.0 * ((i as f64) / 4.0).sin())
            .collect();
        let series = PriceSeries::new(bars_from_closes("2024-01-01", &closes));
        let strategy = Strategy::from_rules(
            "SMA Crossover",
            "",
            "ENTRY: close CROSS_ABOVE sma(close,5)\nEXIT: close CROSS_BELOW SMA(close,5)\n",
        )
        .unwrap();

        let mut cache = IndicatorCache::new();
        let signals = evaluate_signals(&strategy.ast, &series, &mut cache).unwrap();
        assert_eq!(cache.computations(), 1);

        for (entry, exit) in signals.entry.iter().zip(&signals.exit) {
            assert!(!(*entry && *exit));
        }
        let result = run_backtest(&series, &signals, &BacktestConfig::default()).unwrap();
        assert!(result.metrics.num_trades > 0);
        assert_eq!(result.metrics.num_trades, result.trades.len());
    }

    #[test]
    fn entry_without_exit_rules_holds_to_end() {
        let series = PriceSeries::new(bars_from_closes("2024-01-01", &[100.0, 101.0, 102.0]));
        let strategy = Strategy::from_rules("Hold", "", "ENTRY: close > 0 EXIT: FALSE").unwrap();
        let signals =
            evaluate_signals(&strategy.ast, &series, &mut IndicatorCache::new()).unwrap();
        assert_eq!(signals.exit, vec![false; 3]);

        let result = run_backtest(&series, &signals, &no_commission()).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].entry_price, 100.0);
        assert_eq!(result.trades[0].exit_price, 102.0);
    }

    #[test]
    fn report_renders_pipeline_result() {
        let series = PriceSeries::new(bars_from_closes("2024-01-01", &[90.0, 110.0, 95.0]));
        let strategy = Strategy::from_rules("Threshold", "Above and below 100", THRESHOLD_RULES)
            .unwrap();
        let signals =
            evaluate_signals(&strategy.ast, &series, &mut IndicatorCache::new()).unwrap();
        let result = run_backtest(&series, &signals, &no_commission()).unwrap();

        let mut out = Vec::new();
        TextReportAdapter.write(&result, &strategy, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Entry Date:       2024-01-02"));
        assert!(text.contains("Exit Date:        2024-01-03"));
        assert!(text.contains("Strategy: Threshold"));
        assert!(text.contains("Number of Trades:       1"));
    }
}

mod condition_lists {
    use super::*;

    const CONDITIONS_JSON: &str = r#"{
        "entry": {
            "conditions": [
                {"left": "close", "operator": "cross_above", "right": "sma(close,3)"},
                {"left": "volume", "operator": ">", "right": 500}
            ],
            "operators": ["and"]
        },
        "exit": {
            "conditions": [
                {"left": "close", "operator": "<", "right": "close.shift(1)"}
            ]
        }
    }"#;

    #[test]
    fn conditions_match_hand_written_rules() {
        let closes = [10.0, 9.0, 8.0, 9.5, 11.0, 12.0, 11.5, 10.0, 12.5, 13.0];
        let series = PriceSeries::new(bars_from_closes("2024-01-01", &closes));

        let conditions = ConditionSet::from_json(CONDITIONS_JSON).unwrap();
        let generated = Strategy::from_conditions("Generated", "", &conditions).unwrap();
        let written = Strategy::from_rules(
            "Written",
            "",
            "ENTRY: (close CROSS_ABOVE sma(close,3)) AND (volume > 500)\n\
             EXIT: close < close.shift(1)",
        )
        .unwrap();
        assert_eq!(generated.ast, written.ast);
        assert_eq!(generated.ast, conditions.to_ast().unwrap());

        let a = evaluate_signals(&generated.ast, &series, &mut IndicatorCache::new()).unwrap();
        let b = evaluate_signals(&written.ast, &series, &mut IndicatorCache::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn generated_text_is_stable() {
        let conditions = ConditionSet::from_json(CONDITIONS_JSON).unwrap();
        let strategy = Strategy::from_conditions("Generated", "", &conditions).unwrap();
        assert_eq!(
            strategy.rules,
            "ENTRY:\n    (close CROSS_ABOVE sma(close,3) AND volume > 500)\n\n\
             EXIT:\n    (close < close.shift(1))\n"
        );
    }

    #[test]
    fn invalid_conditions_map_to_exit_code_four() {
        let conditions = ConditionSet::from_json(
            r#"{"entry": {"conditions": [{"left": "price", "operator": ">", "right": 1}]}}"#,
        )
        .unwrap();
        let err = Strategy::from_conditions("Bad", "", &conditions).unwrap_err();
        assert!(matches!(err, RuletraderError::Validation(_)));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn malformed_json_maps_to_exit_code_three() {
        let err: RuletraderError = ConditionSet::from_json("{not json").unwrap_err().into();
        assert_eq!(err.exit_code(), 3);
    }
}

mod fixtures_on_disk {
    use super::*;

    #[test]
    fn csv_fixture_matches_mock_source() {
        let bars = bars_from_closes("2024-01-01", &[90.0, 110.0, 105.0, 95.0, 90.0]);
        let fixture = Fixture::new();
        let csv_path = fixture.write("prices.csv", &bars_to_csv(&bars));

        let from_disk = CsvAdapter::new(&csv_path).load().unwrap();
        let from_mock = MockPriceSource::new(bars).load().unwrap();
        assert_eq!(from_disk, from_mock);
    }

    #[test]
    fn config_fixture_drives_backtest() {
        let fixture = Fixture::new();
        fixture.write(
            "prices.csv",
            &bars_to_csv(&bars_from_closes("2024-01-01", &[90.0, 110.0, 95.0])),
        );
        let config_path = fixture.write(
            "run.ini",
            "[backtest]\ninitial_cash = 5000\ncommission = 0\n\n[data]\npath = prices.csv\n",
        );

        let config = FileConfigAdapter::from_file(&config_path).unwrap();
        let bt_config = load_backtest_config(&config).unwrap();
        assert_eq!(bt_config.initial_cash, 5000.0);

        let data_path = config.get_path("data", "path").unwrap();
        assert_eq!(data_path, fixture.path().join("prices.csv"));
        let series = CsvAdapter::new(data_path).load().unwrap();

        let strategy = Strategy::from_rules("Threshold", "", THRESHOLD_RULES).unwrap();
        let signals =
            evaluate_signals(&strategy.ast, &series, &mut IndicatorCache::new()).unwrap();
        let result = run_backtest(&series, &signals, &bt_config).unwrap();
        assert_relative_eq!(result.metrics.initial_cash, 5000.0);
        assert_relative_eq!(result.metrics.final_cash, 5000.0 / 110.0 * 95.0, epsilon = 1e-9);
    }
}

mod error_propagation {
    use super::*;

    #[test]
    fn unsupported_indicator_fails_at_evaluation() {
        let strategy =
            Strategy::from_rules("Macd", "", "ENTRY: macd(close,12) > 0 EXIT: FALSE").unwrap();
        let series = PriceSeries::new(bars_from_closes("2024-01-01", &[1.0, 2.0]));
        let err = evaluate_signals(&strategy.ast, &series, &mut IndicatorCache::new()).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::UnsupportedIndicator {
                name: "macd".into()
            }
        );
        assert_eq!(RuletraderError::from(err).exit_code(), 5);
    }

    #[test]
    fn signal_length_mismatch() {
        let series = PriceSeries::new(bars_from_closes("2024-01-01", &[1.0, 2.0, 3.0]));
        let err = run_backtest(&series, &Signals::none(2), &BacktestConfig::default()).unwrap_err();
        assert_eq!(err, BacktestError::LengthMismatch { bars: 3, signals: 2 });
        assert_eq!(RuletraderError::from(err).exit_code(), 6);
    }

    #[test]
    fn empty_series_is_rejected() {
        let series = MockPriceSource::new(Vec::new()).load().unwrap();
        let err = run_backtest(&series, &Signals::none(0), &BacktestConfig::default()).unwrap_err();
        assert_eq!(err, BacktestError::EmptySeries);
    }

    #[test]
    fn data_source_failure_maps_to_exit_code_three() {
        let source = MockPriceSource::failing("close");
        let err: RuletraderError = source.load().unwrap_err().into();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(source.loads.get(), 1);
    }

    #[test]
    fn syntax_error_maps_to_exit_code_four() {
        let err: RuletraderError = Strategy::from_rules("Bad", "", "ENTRY: close >> 5")
            .unwrap_err()
            .into();
        assert_eq!(err.exit_code(), 4);
    }
}
