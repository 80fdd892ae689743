use clap::Parser;

use crate::config::AppConfig;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML (written with commented defaults if missing)
    #[arg(long, default_value = "pacesim.toml")]
    pub config: String,

    /// RNG seed (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Simulated duration in seconds (overrides config)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Intrinsic heart rate in bpm; 0 for asystole (overrides config)
    #[arg(long)]
    pub rate: Option<f64>,

    /// Pacer lower rate limit in bpm (overrides config)
    #[arg(long)]
    pub lower_rate: Option<f64>,

    /// Disable the band-pass prefilter
    #[arg(long, default_value_t = false)]
    pub no_filter: bool,

    /// Write the full simulation report as JSON
    #[arg(long, value_name = "PATH")]
    pub json: Option<String>,
}

impl Args {
    /// Applies command-line overrides on top of a loaded config.
    pub fn apply(&self, cfg: &mut AppConfig) {
        if let Some(seed) = self.seed {
            cfg.simulation.seed = seed;
        }
        if let Some(duration) = self.duration {
            cfg.simulation.duration_s = duration;
        }
        if let Some(rate) = self.rate {
            cfg.signal.heart_rate_bpm = rate;
        }
        if let Some(lower_rate) = self.lower_rate {
            cfg.pacer.lower_rate_bpm = lower_rate;
        }
        if self.no_filter {
            cfg.filter.enabled = false;
        }
    }
}
