//! Plain-text report adapter implementing ReportPort.
//!
//! Renders the trade ledger first, then the summary metrics.

use crate::domain::backtest::{BacktestResult, Trade, TradeStatus};
use crate::domain::error::RuletraderError;
use crate::domain::metrics::Metrics;
use crate::domain::strategy::Strategy;
use crate::ports::report_port::ReportPort;
use std::io::Write;

const RULE_WIDTH: usize = 80;

pub struct TextReportAdapter;

impl ReportPort for TextReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &Strategy,
        out: &mut dyn Write,
    ) -> Result<(), RuletraderError> {
        out.write_all(render_report(result, strategy).as_bytes())?;
        Ok(())
    }
}

pub fn render_report(result: &BacktestResult, strategy: &Strategy) -> String {
    let mut output = String::new();
    if !result.trades.is_empty() {
        output.push_str(&render_trades(&result.trades));
    }
    output.push_str(&render_summary(&result.metrics, strategy));
    output
}

pub fn render_trades(trades: &[Trade]) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);

    let mut output = format!(
        "\n{rule}\n TRADE HISTORY\n{rule}\n\nTotal Trades: {}\n\n{thin}\n",
        trades.len()
    );

    for (i, trade) in trades.iter().enumerate() {
        let outcome = if trade.profit > 0.0 { "WIN" } else { "LOSS" };
        output.push_str(&format!("\nTrade #{} [{}]:\n", i + 1, outcome));
        output.push_str(&format!("  Entry Date:       {}\n", trade.entry_date));
        output.push_str(&format!("  Exit Date:        {}\n", trade.exit_date));
        output.push_str(&format!("  Entry Price:      ${:.2}\n", trade.entry_price));
        output.push_str(&format!("  Exit Price:       ${:.2}\n", trade.exit_price));
        output.push_str(&format!(
            "  Profit/Loss:      ${} ({:+.2}%)\n",
            format_money(trade.profit),
            trade.return_pct
        ));
        if trade.status != TradeStatus::Closed {
            output.push_str(&format!(
                "  Status:           {}\n",
                trade.status.to_string().to_uppercase()
            ));
        }
        output.push_str(&thin);
        output.push('\n');
    }

    output
}

pub fn render_summary(metrics: &Metrics, strategy: &Strategy) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut output = format!("\n{rule}\n BACKTEST RESULTS SUMMARY\n{rule}\n\n");

    if !strategy.name.is_empty() {
        output.push_str(&format!(" Strategy: {}\n", strategy.name));
        if !strategy.description.is_empty() {
            output.push_str(&format!(" {}\n", strategy.description));
        }
        output.push('\n');
    }

    output.push_str(" Portfolio Performance:\n");
    output.push_str(&format!(
        "  Initial Capital:        ${}\n",
        format_money(metrics.initial_cash)
    ));
    output.push_str(&format!("  Final Capital:          ${}\n", format_money(metrics.final_cash)));
    output.push_str(&format!("  Total Return:           {:.2}%\n", metrics.total_return));
    output.push_str(&format!("  Max Drawdown:           {:.2}%\n", metrics.max_drawdown));
    output.push_str(&format!("  Sharpe Ratio:           {:.2}\n", metrics.sharpe_ratio));

    output.push_str("\n Trade Statistics:\n");
    output.push_str(&format!("  Number of Trades:       {}\n", metrics.num_trades));
    output.push_str(&format!("  Win Rate:               {:.2}%\n", metrics.win_rate));
    output.push_str(&format!(
        "  Profit Factor:          {}\n",
        format_ratio(metrics.profit_factor)
    ));
    output.push_str(&format!(
        "  Gross Profit:           ${}\n",
        format_money(metrics.gross_profit)
    ));
    output.push_str(&format!("  Gross Loss:             ${}\n", format_money(metrics.gross_loss)));
    output.push_str(&format!("  Avg Trade Return:       {:.2}%\n", metrics.avg_trade_return));
    output.push_str(&format!(
        "  Avg Winning Trade:      ${}\n",
        format_money(metrics.avg_winning_trade)
    ));
    output.push_str(&format!(
        "  Avg Losing Trade:       ${}\n",
        format_money(metrics.avg_losing_trade)
    ));

    output.push_str(&format!("\n{rule}\n"));
    output
}

fn format_ratio(value: f64) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.2}", value)
    }
}

/// Two decimals with thousands separators: `-1,234.50`.
pub fn format_money(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}
