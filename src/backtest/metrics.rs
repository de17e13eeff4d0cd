use crate::models::{ExecutionRecord, TradeSide};
use serde::Serialize;

/// Performance summary of one replayed run
#[derive(Debug, Clone, Serialize)]
pub struct BacktestMetrics {
    // P&L
    pub initial_balance: f64,
    pub final_equity: f64,
    pub total_pnl: f64,
    pub total_return_pct: f64,

    // Trade statistics
    pub total_trades: usize,
    pub buys: usize,
    pub sells: usize,
    pub winning_sells: usize,
    pub losing_sells: usize,
    pub win_rate: f64,
    pub avg_sell_profit_pct: f64,

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    pub passes: usize,
    pub resets: usize,

    #[serde(skip)]
    pub records: Vec<ExecutionRecord>,
}

impl BacktestMetrics {
    /// Summarize trades plus the per-pass equity curve
    pub fn from_run(
        records: Vec<ExecutionRecord>,
        equity_curve: &[f64],
        initial_balance: f64,
        resets: usize,
    ) -> Self {
        let final_equity = equity_curve.last().copied().unwrap_or(initial_balance);
        let total_pnl = final_equity - initial_balance;
        let total_return_pct = if initial_balance > 0.0 {
            total_pnl / initial_balance * 100.0
        } else {
            0.0
        };

        let buys = records.iter().filter(|r| r.side == TradeSide::Buy).count();
        let sell_profits: Vec<f64> = records
            .iter()
            .filter(|r| r.side == TradeSide::Sell)
            .map(|r| r.profit_pct.unwrap_or(0.0))
            .collect();

        let sells = sell_profits.len();
        let winning_sells = sell_profits.iter().filter(|p| **p > 0.0).count();
        let losing_sells = sells - winning_sells;
        let win_rate = if sells > 0 {
            winning_sells as f64 / sells as f64 * 100.0
        } else {
            0.0
        };
        let avg_sell_profit_pct = if sells > 0 {
            sell_profits.iter().sum::<f64>() / sells as f64
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) =
            Self::calculate_drawdown(equity_curve, initial_balance);

        Self {
            initial_balance,
            final_equity,
            total_pnl,
            total_return_pct,
            total_trades: records.len(),
            buys,
            sells,
            winning_sells,
            losing_sells,
            win_rate,
            avg_sell_profit_pct,
            max_drawdown,
            max_drawdown_pct,
            passes: equity_curve.len(),
            resets,
            records,
        }
    }

    /// Largest peak-to-trough fall of the equity curve, absolute and in percent of the peak
    fn calculate_drawdown(equity_curve: &[f64], initial_value: f64) -> (f64, f64) {
        let mut peak = initial_value;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;

        for &value in equity_curve {
            if value > peak {
                peak = value;
            }

            let drawdown = peak - value;
            if drawdown > max_dd {
                max_dd = drawdown;
                max_dd_pct = if peak > 0.0 { drawdown / peak * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n═══════════════════════════════════════════════════════");
        println!("              BACKTEST PERFORMANCE REPORT              ");
        println!("═══════════════════════════════════════════════════════\n");

        println!("📊 P&L SUMMARY");
        println!("  Initial Balance:       ${:.2}", self.initial_balance);
        println!("  Final Equity:          ${:.2}", self.final_equity);
        println!(
            "  P&L:                   ${:.2} ({:+.2}%)",
            self.total_pnl, self.total_return_pct
        );

        println!("\n📈 TRADE STATISTICS");
        println!("  Passes:                {}", self.passes);
        println!("  Total Trades:          {}", self.total_trades);
        println!("  Buys / Sells:          {} / {}", self.buys, self.sells);
        println!(
            "  Winning Sells:         {} ({:.1}%)",
            self.winning_sells, self.win_rate
        );
        println!("  Losing Sells:          {}", self.losing_sells);
        if self.sells > 0 {
            println!("  Avg Sell Profit:       {:+.2}%", self.avg_sell_profit_pct);
        }

        println!("\n⚠️  RISK");
        println!(
            "  Max Drawdown:          ${:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );
        println!("  Auto-resets:           {}", self.resets);

        println!("\n═══════════════════════════════════════════════════════\n");
    }
}
