use bybit_intraday::cli::{Cli, Commands};
use bybit_intraday::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        toml::from_str(include_str!("../config.toml.example")).expect("Invalid default config")
    });

    bybit_intraday::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting trading loop");
            args.execute(&config).await?;
        }
        Commands::Status => {
            println!("bybit-intraday status");
            println!("  Mode: {:?}", config.execution.mode);
            println!("  Status: Not running");
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Execution: {:?}", config.execution.mode);
            println!(
                "  Risk: equity={}, per-trade={}%, daily-loss={}%",
                config.risk.equity,
                config.risk.per_trade_risk_pct * rust_decimal_macros::dec!(100),
                config.risk.max_daily_loss_pct * rust_decimal_macros::dec!(100)
            );
            println!(
                "  Limits: max-positions={}, leverage={}x",
                config.risk.max_concurrent_positions, config.risk.max_leverage
            );
            let mut strategies: Vec<_> = config.strategies.iter().collect();
            strategies.sort_by_key(|(_, s)| s.priority);
            for (id, settings) in strategies {
                println!(
                    "  Strategy {}: priority={}, enabled={}",
                    id, settings.priority, settings.enabled
                );
            }
        }
    }

    Ok(())
}
