//! Validate command implementation

use anyhow::Result;
use grid_engine::{Config, GridEngine};
use tracing::info;

pub fn run(config_path: String) -> Result<()> {
    let config = Config::from_file(&config_path)?;

    // same check the engine runs at construction
    GridEngine::new(config.symbol.clone(), config.engine.clone())?;

    info!(path = %config_path, symbol = %config.symbol, "Configuration is valid");
    println!("{}: OK", config_path);
    println!("  symbol:            {}", config.symbol);
    println!("  grid_levels:       {}", config.engine.grid_levels);
    println!("  spacing_pct:       {}", config.engine.spacing_pct);
    println!("  bias_mode:         {:?}", config.engine.bias_mode);
    println!("  warm-up bars:      {}", config.indicators.warmup_bars());
    Ok(())
}
