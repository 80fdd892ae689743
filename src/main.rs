// Entry point: loads config, runs one closed-loop simulation and prints the summary.
use std::fs;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pacesim::cli::Args;
use pacesim::config::AppConfig;
use pacesim::sim::ClosedLoopSimulator;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let loaded = AppConfig::load(&args.config);
    let mut cfg = loaded.config.clone();
    args.apply(&mut cfg);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    // Config fallbacks happen before the subscriber exists; report them now.
    loaded.log_warnings();

    let simulator = ClosedLoopSimulator::new(cfg.sim_config()).context("invalid configuration")?;
    let report = simulator.run();
    println!("{}", report.summary());

    if let Some(path) = &args.json {
        let json = serde_json::to_string(&report).context("serialize report")?;
        fs::write(path, json).with_context(|| format!("write report to {path}"))?;
        info!("wrote report to {path}");
    }
    Ok(())
}
