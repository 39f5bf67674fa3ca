//! Replay command implementation

use anyhow::{Context, Result};
use grid_engine::{data, indicators, replay, Config, GridEngine};
use tracing::{debug, info};

pub fn run(config_path: String, data_override: Option<String>) -> Result<()> {
    info!("Starting replay");

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let data_file = data_override
        .or_else(|| config.replay.data_file.clone())
        .context("No bar data given: pass --data or set replay.data_file")?;

    let bars = data::load_bars_csv(&data_file)?;
    let snapshots = indicators::snapshots(&bars, &config.indicators);
    debug!(
        bars = bars.len(),
        warmup = config.indicators.warmup_bars(),
        "Indicator series ready"
    );

    let mut engine = GridEngine::new(config.symbol.clone(), config.engine.clone())?;
    let report = replay::run(&mut engine, &bars, &snapshots)?;

    let metrics = &report.metrics;
    println!("\n{}", "=".repeat(60));
    println!("GRID REPLAY: {}", config.symbol);
    println!("{}", "=".repeat(60));
    println!("  Bars processed:   {}", report.bars_processed);
    println!("  Positions opened: {}", report.opens);
    println!("  Positions closed: {}", report.closes);
    println!("  Fill rate:        {:.2}%", metrics.fill_rate * 100.0);
    println!("  Avg trade pnl:    {:.6}", metrics.avg_trade_profit_f64());
    match metrics.win_rate {
        Some(rate) => println!("  Win rate:         {:.2}%", rate * 100.0),
        None => println!("  Win rate:         n/a"),
    }
    println!("  Rebalances:       {}", metrics.rebalance_count);
    println!("  Trails:           {}", metrics.trail_count);
    println!("{}\n", "=".repeat(60));

    println!("{}", serde_json::to_string_pretty(metrics)?);
    Ok(())
}
