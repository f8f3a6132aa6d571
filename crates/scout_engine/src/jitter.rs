use rand::Rng;

/// Source of unit random values used to humanize scroll steps and waits.
pub trait Jitter: Send + Sync {
    /// A value in `[0, 1)`.
    fn unit(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadJitter;

impl Jitter for ThreadJitter {
    fn unit(&self) -> f64 {
        rand::rng().random_range(0.0..1.0)
    }
}

/// Always returns the same value; for deterministic tests and dry runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn unit(&self) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}
