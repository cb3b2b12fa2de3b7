//! Standalone paper-trading loop driver (`testkit` feature only).
//!
//! Generates a deterministic synthetic bar series and replays it through
//! `mqk_testkit::Orchestrator`, the same scenario-test harness used under
//! `mqk-testkit/tests/` and `mqk-daemon/tests/`, but outside of `cargo test`
//! so it can be run as a long-lived local smoke check.

use anyhow::{Context, Result};
use clap::Parser;
use mqk_testkit::{Orchestrator, OrchestratorBar, OrchestratorConfig, OrchestratorRunMeta};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mqk_paper_loop")]
#[command(about = "Replay a synthetic bar series through the execution orchestrator")]
struct Args {
    #[arg(long, default_value = "AAPL")]
    symbol: String,

    #[arg(long, default_value_t = 50)]
    bars: usize,

    #[arg(long, default_value_t = 60)]
    timeframe_secs: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut cfg = OrchestratorConfig::test_defaults();
    cfg.timeframe_secs = args.timeframe_secs as i64;
    cfg.max_bars = args.bars;

    let meta = OrchestratorRunMeta {
        run_id: Uuid::new_v5(
            &Uuid::NAMESPACE_DNS,
            format!("mqk-paper-loop.v1|{}|{}", args.symbol, args.bars).as_bytes(),
        ),
        engine_id: "PAPER_LOOP".to_string(),
        mode: "PAPER".to_string(),
    };

    let mut orch = Orchestrator::new_with_meta(cfg, meta);

    let mut generated: Vec<OrchestratorBar> = Vec::with_capacity(args.bars);
    for i in 0..args.bars {
        let ts: u64 = 1_700_000_000u64 + (i as u64) * args.timeframe_secs;
        let price: i64 = 100_000_000i64 + (i as i64) * 100_000;

        generated.push(OrchestratorBar {
            symbol: args.symbol.clone(),
            end_ts: ts,
            open_micros: price,
            high_micros: price + 50_000,
            low_micros: price - 50_000,
            close_micros: price,
            volume: 1_000i64,
            day_id: (ts / 86_400) as u32,
        });
    }

    let report = orch.run(&generated).context("orchestrator run")?;

    tracing::info!(
        symbol = %report.symbol,
        bars_seen = report.bars_seen,
        last_end_ts = ?report.last_end_ts,
        last_close_micros = ?report.last_close_micros,
        "paper loop finished"
    );

    Ok(())
}
