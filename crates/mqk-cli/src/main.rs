//! mqk-cli entry point.
//!
//! Thin `clap` dispatcher; all non-trivial handlers live in `commands::*`.
//! Mirrors `main.py::TradingSystem`'s command surface (status,
//! test-connections, dry-run, start) alongside the DB-backed run-lifecycle
//! commands (`mqk run start|arm|begin|stop|halt|heartbeat|status|...`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;
use uuid::Uuid;

use commands::parse_config_mode;

#[derive(Parser)]
#[command(name = "mqk")]
#[command(about = "MiniQuantDesk V4 CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> engine -> risk -> stress...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run lifecycle commands
    Run {
        #[command(subcommand)]
        cmd: RunCmd,
    },

    /// Print DB + broker-credential status, mirroring `TradingSystem.status()`
    Status,

    /// Probe every configured broker connection without placing orders
    TestConnections,

    /// Load + validate a layered config without connecting to any broker or DB
    DryRun {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long, default_value = "PAPER")]
        mode: String,
    },

    /// Create a run row and (optionally) replay a synthetic session through
    /// the execution orchestrator. Mirrors `TradingSystem.start()`'s
    /// composition-root role.
    Start {
        #[arg(long)]
        engine: String,

        #[arg(long)]
        mode: String,

        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// After creating the run, immediately replay a synthetic paper
        /// session through the orchestrator (requires the `testkit` feature).
        #[arg(long, default_value_t = false)]
        replay: bool,

        #[arg(long, default_value = "AAPL")]
        symbol: String,

        #[arg(long, default_value_t = 50)]
        bars: usize,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[derive(Subcommand)]
enum RunCmd {
    /// Create a new run row in DB and print run_id + hashes.
    Start {
        #[arg(long)]
        engine: String,
        #[arg(long)]
        mode: String,
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Run arming preflight. LIVE mode requires `--confirm "<phrase>"`.
    Arm {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Transition an armed run to RUNNING.
    Begin {
        #[arg(long)]
        run_id: String,
    },

    /// Transition a run to STOPPED.
    Stop {
        #[arg(long)]
        run_id: String,
    },

    /// Transition a run to HALTED with an operator-supplied reason.
    Halt {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        reason: String,
    },

    /// Record a heartbeat for the deadman-switch clock.
    Heartbeat {
        #[arg(long)]
        run_id: String,
    },

    /// Print the current DB row for a run.
    Status {
        #[arg(long)]
        run_id: String,
    },

    /// Check (without acting on) whether the deadman TTL has expired.
    DeadmanCheck {
        #[arg(long)]
        run_id: String,
        #[arg(long, default_value_t = 60)]
        ttl_seconds: i64,
    },

    /// Check and, if expired, halt the run for deadman-switch violation.
    DeadmanEnforce {
        #[arg(long)]
        run_id: String,
        #[arg(long, default_value_t = 60)]
        ttl_seconds: i64,
    },

    /// Replay a synthetic bar series through the execution orchestrator
    /// (requires the `testkit` feature).
    Loop {
        #[arg(long)]
        run_id: String,
        #[arg(long, default_value = "AAPL")]
        symbol: String,
        #[arg(long, default_value_t = 50)]
        bars: usize,
        #[arg(long, default_value_t = 60)]
        timeframe_secs: u64,
        #[arg(long, default_value = "../exports")]
        exports_root: String,
        #[arg(long, default_value = "cli")]
        label: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev-time .env.local bootstrap; silent if absent (production injects env vars directly).
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = mqk_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = mqk_db::status(&pool).await?;
                    println!("db_ok={} has_runs_table={}", s.ok, s.has_runs_table);
                }
                DbCmd::Migrate => {
                    mqk_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = mqk_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Run { cmd } => dispatch_run(cmd).await?,

        Commands::Status => cmd_status().await?,

        Commands::TestConnections => cmd_test_connections().await?,

        Commands::DryRun { config_paths, mode } => cmd_dry_run(config_paths, mode)?,

        Commands::Start {
            engine,
            mode,
            config_paths,
            replay,
            symbol,
            bars,
        } => cmd_start(engine, mode, config_paths, replay, symbol, bars).await?,
    }

    Ok(())
}

async fn dispatch_run(cmd: RunCmd) -> Result<()> {
    match cmd {
        RunCmd::Start {
            engine,
            mode,
            config_paths,
        } => commands::run::run_start(engine, mode, config_paths).await,
        RunCmd::Arm { run_id, confirm } => commands::run::run_arm(run_id, confirm).await,
        RunCmd::Begin { run_id } => commands::run::run_begin(run_id).await,
        RunCmd::Stop { run_id } => commands::run::run_stop(run_id).await,
        RunCmd::Halt { run_id, reason } => commands::run::run_halt(run_id, reason).await,
        RunCmd::Heartbeat { run_id } => commands::run::run_heartbeat(run_id).await,
        RunCmd::Status { run_id } => commands::run::run_status(run_id).await,
        RunCmd::DeadmanCheck {
            run_id,
            ttl_seconds,
        } => commands::run::run_deadman_check(run_id, ttl_seconds).await,
        RunCmd::DeadmanEnforce {
            run_id,
            ttl_seconds,
        } => commands::run::run_deadman_enforce(run_id, ttl_seconds).await,
        #[cfg(feature = "testkit")]
        RunCmd::Loop {
            run_id,
            symbol,
            bars,
            timeframe_secs,
            exports_root,
            label,
        } => commands::run::run_loop(
            run_id,
            symbol,
            bars,
            timeframe_secs,
            std::path::PathBuf::from(exports_root),
            label,
        ),
        #[cfg(not(feature = "testkit"))]
        RunCmd::Loop { .. } => {
            anyhow::bail!("`mqk run loop` requires the `testkit` build feature")
        }
    }
}

/// `mqk status` — mirrors `TradingSystem.status()`: DB reachability plus
/// which broker credentials are present in the environment. Makes no
/// network calls to the brokers themselves (see `test-connections`).
async fn cmd_status() -> Result<()> {
    match mqk_db::connect_from_env().await {
        Ok(pool) => match mqk_db::status(&pool).await {
            Ok(s) => println!("db_ok={} has_runs_table={}", s.ok, s.has_runs_table),
            Err(e) => println!("db_ok=false error={e}"),
        },
        Err(e) => println!("db_ok=false error={e}"),
    }

    let alpaca_configured = !std::env::var("ALPACA_PAPER_KEY_ID")
        .unwrap_or_default()
        .is_empty()
        || !std::env::var("ALPACA_LIVE_KEY_ID")
            .unwrap_or_default()
            .is_empty();
    let kalshi_configured = !std::env::var("KALSHI_DEMO_EMAIL")
        .unwrap_or_default()
        .is_empty()
        || !std::env::var("KALSHI_PROD_EMAIL")
            .unwrap_or_default()
            .is_empty()
        || !std::env::var("KALSHI_API_KEY").unwrap_or_default().is_empty();

    println!("alpaca_configured={alpaca_configured}");
    println!("kalshi_configured={kalshi_configured}");

    Ok(())
}

/// `mqk test-connections` — mirrors `TradingSystem.test_connections()`:
/// one read-only call per configured broker, reported pass/fail. Blocking
/// HTTP clients run on `spawn_blocking` so the async runtime stays
/// responsive.
async fn cmd_test_connections() -> Result<()> {
    let alpaca_paper = mqk_broker_alpaca::AlpacaConfig::from_env(true);
    let alpaca_result = tokio::task::spawn_blocking(move || {
        let client = mqk_broker_alpaca::AlpacaClient::new(alpaca_paper)?;
        client.get_account()
    })
    .await;

    match alpaca_result {
        Ok(Ok(_)) => println!("alpaca=OK"),
        Ok(Err(e)) => println!("alpaca=FAIL error={e}"),
        Err(e) => println!("alpaca=FAIL error={e}"),
    }

    let kalshi_demo = mqk_broker_kalshi::KalshiConfig::from_env(true);
    let kalshi_result = tokio::task::spawn_blocking(move || {
        let client = mqk_broker_kalshi::KalshiClient::new(kalshi_demo)?;
        client.authenticate()?;
        client.get_balance()
    })
    .await;

    match kalshi_result {
        Ok(Ok(_)) => println!("kalshi=OK"),
        Ok(Err(e)) => println!("kalshi=FAIL error={e}"),
        Err(e) => println!("kalshi=FAIL error={e}"),
    }

    Ok(())
}

/// `mqk dry-run` — mirrors `TradingSystem`'s config-validation-only start
/// path: load the layered config, compute its hash, and report unused keys
/// (failing closed in LIVE mode) without touching the DB or any broker.
fn cmd_dry_run(config_paths: Vec<String>, mode: String) -> Result<()> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = mqk_config::load_layered_yaml(&path_refs)?;

    let cfg_mode = parse_config_mode(&mode)?;
    let policy = match cfg_mode {
        mqk_config::ConfigMode::Live => mqk_config::UnusedKeyPolicy::Fail,
        mqk_config::ConfigMode::Paper | mqk_config::ConfigMode::Backtest => {
            mqk_config::UnusedKeyPolicy::Warn
        }
    };

    let report = mqk_config::report_unused_keys(cfg_mode, &loaded.config_json, policy)?;

    println!("config_hash={}", loaded.config_hash);
    println!("mode={}", mode.to_uppercase());
    println!("clean={}", report.is_clean());
    for p in report.unused_leaf_pointers.iter().take(50) {
        println!("unused={p}");
    }

    Ok(())
}

/// `mqk start` — create a run row, then (with `--replay`) drive it through
/// the orchestrator the same way the `mqk_paper_loop` binary does, under
/// one deterministic `run_id`.
async fn cmd_start(
    engine: String,
    mode: String,
    config_paths: Vec<String>,
    replay: bool,
    symbol: String,
    bars: usize,
) -> Result<()> {
    commands::run::run_start(engine.clone(), mode.clone(), config_paths).await?;

    if !replay {
        return Ok(());
    }

    #[cfg(feature = "testkit")]
    {
        let git_hash = get_git_hash().unwrap_or_else(|| "UNKNOWN".to_string());
        let run_id = Uuid::new_v5(
            &Uuid::NAMESPACE_DNS,
            format!("mqk-cli.start.v1|{engine}|{mode}|{git_hash}").as_bytes(),
        )
        .to_string();
        commands::run::run_loop(
            run_id,
            symbol,
            bars,
            60,
            std::path::PathBuf::from("../exports"),
            "start".to_string(),
        )?;
    }

    #[cfg(not(feature = "testkit"))]
    {
        let _ = (symbol, bars);
        anyhow::bail!("--replay requires the `testkit` build feature")
    }

    #[allow(unreachable_code)]
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Best-effort git hash (short).
fn get_git_hash() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8(out.stdout).ok()?;
    Some(s.trim().to_string())
}
