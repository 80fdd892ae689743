pub mod biquad;
pub mod stats;
pub mod timebase;
