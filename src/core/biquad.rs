// Butterworth cascades built from biquad sections, plus forward-backward filtering.

use std::f64::consts::PI;

#[derive(Clone, Copy, Debug)]
pub struct Biquad {
    // Transposed Direct Form II (a0 = 1)
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
    // state
    z1: f64,
    z2: f64,
}

impl Biquad {
    #[inline]
    pub fn new(b0: f64, b1: f64, b2: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0,
            b1,
            b2,
            a1,
            a2,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    /// Bilinear first-order low-pass (b2 = a2 = 0).
    pub fn first_order_lowpass(fc: f64, fs: f64) -> Self {
        let k = (PI * fc / fs).tan();
        let norm = 1.0 / (1.0 + k);
        Self::new(k * norm, k * norm, 0.0, (k - 1.0) * norm, 0.0)
    }

    /// Bilinear first-order high-pass (b2 = a2 = 0).
    pub fn first_order_highpass(fc: f64, fs: f64) -> Self {
        let k = (PI * fc / fs).tan();
        let norm = 1.0 / (1.0 + k);
        Self::new(norm, -norm, 0.0, (k - 1.0) * norm, 0.0)
    }

    /// RBJ cookbook second-order low-pass.
    pub fn lowpass(fc: f64, fs: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * fc / fs;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;
        let b1 = (1.0 - cos_w0) / a0;
        Self::new(
            0.5 * b1,
            b1,
            0.5 * b1,
            -2.0 * cos_w0 / a0,
            (1.0 - alpha) / a0,
        )
    }

    /// RBJ cookbook second-order high-pass.
    pub fn highpass(fc: f64, fs: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * fc / fs;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;
        let b0 = (1.0 + cos_w0) / (2.0 * a0);
        Self::new(
            b0,
            -2.0 * b0,
            b0,
            -2.0 * cos_w0 / a0,
            (1.0 - alpha) / a0,
        )
    }
}

/// Pole-pair quality factors of an order-`order` Butterworth prototype.
/// Odd orders additionally need one first-order section.
pub fn butterworth_qs(order: usize) -> Vec<f64> {
    let n = order as f64;
    (0..order / 2)
        .map(|k| 1.0 / (2.0 * ((2 * k + 1) as f64 * PI / (2.0 * n)).sin()))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response {
    Lowpass,
    Highpass,
}

/// Series of biquad sections realizing a Butterworth low- or high-pass.
#[derive(Clone, Debug)]
pub struct Cascade {
    sections: Vec<Biquad>,
}

impl Cascade {
    pub fn butterworth(response: Response, order: usize, fc: f64, fs: f64) -> Self {
        let mut sections = Vec::with_capacity(order / 2 + 1);
        if order % 2 == 1 {
            sections.push(match response {
                Response::Lowpass => Biquad::first_order_lowpass(fc, fs),
                Response::Highpass => Biquad::first_order_highpass(fc, fs),
            });
        }
        for q in butterworth_qs(order) {
            sections.push(match response {
                Response::Lowpass => Biquad::lowpass(fc, fs, q),
                Response::Highpass => Biquad::highpass(fc, fs, q),
            });
        }
        Self { sections }
    }

    pub fn chain(mut self, other: Cascade) -> Self {
        self.sections.extend(other.sections);
        self
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn reset(&mut self) {
        for s in &mut self.sections {
            s.reset();
        }
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(x, |acc, s| s.process_sample(acc))
    }

    /// Causal pass from a cleared state.
    pub fn process_block(&mut self, x: &[f64]) -> Vec<f64> {
        self.reset();
        x.iter().map(|&xi| self.process_sample(xi)).collect()
    }

    /// Zero-phase filtering: odd-reflection padding, forward pass, backward pass.
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = (3 * (2 * self.sections.len() + 1)).min(n - 1);
        let mut ext = Vec::with_capacity(n + 2 * pad);
        let first = x[0];
        let last = x[n - 1];
        for i in (1..=pad).rev() {
            ext.push(2.0 * first - x[i]);
        }
        ext.extend_from_slice(x);
        for i in 1..=pad {
            ext.push(2.0 * last - x[n - 1 - i]);
        }

        let mut work = self.clone();
        let mut y = work.process_block(&ext);
        y.reverse();
        let mut y = work.process_block(&y);
        y.reverse();
        y[pad..pad + n].to_vec()
    }
}
