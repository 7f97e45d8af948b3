//! Exponential output smoothing.

/// First-order low-pass on the arbitrated output:
/// `out = α·last + (1 − α)·raw`, then clamped to the active limits.
#[derive(Debug, Clone)]
pub struct OutputShaper {
    alpha: f32,
    last_output: f32,
}

impl OutputShaper {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 0.99),
            last_output: 0.0,
        }
    }

    pub fn shape(&mut self, raw: f32, min: f32, max: f32) -> f32 {
        let out = (self.alpha * self.last_output + (1.0 - self.alpha) * raw).clamp(min, max);
        self.last_output = out;
        out
    }

    pub fn reset(&mut self) {
        self.last_output = 0.0;
    }
}
