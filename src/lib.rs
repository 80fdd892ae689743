pub mod cli;
pub mod config;
pub mod core;
pub mod detector;
pub mod error;
pub mod pacer;
pub mod signal;
pub mod sim;

pub use detector::{AdaptiveThresholdDetector, DetectorConfig, DetectorTrace};
pub use error::{ConfigError, ConfigResult};
pub use pacer::{PacerConfig, PacingController};
pub use sim::{ClosedLoopSimulator, SimConfig, SimulationReport, run};
