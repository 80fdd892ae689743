pub type Tick = u64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timebase {
    pub fs: f64,
}

impl Timebase {
    pub fn new(fs: f64) -> Self {
        Self { fs }
    }

    /// Integration step for one sample.
    pub fn dt(&self) -> f64 {
        1.0 / self.fs
    }

    pub fn tick_to_sec(&self, t: Tick) -> f64 {
        t as f64 / self.fs
    }

    pub fn sec_to_tick(&self, s: f64) -> Tick {
        if !s.is_finite() || s <= 0.0 {
            return 0;
        }
        (s * self.fs).round() as Tick
    }

    /// Whole samples that fit in `s` seconds (truncating, at least zero).
    pub fn sec_to_samples_floor(&self, s: f64) -> usize {
        if !s.is_finite() || s <= 0.0 {
            return 0;
        }
        (s * self.fs).floor() as usize
    }

    /// Number of samples covering `[0, duration_s)` on this grid.
    pub fn n_samples(&self, duration_s: f64) -> usize {
        self.sec_to_tick(duration_s) as usize
    }

    pub fn time_axis(&self, n: usize) -> Vec<f64> {
        (0..n as Tick).map(|t| self.tick_to_sec(t)).collect()
    }
}
