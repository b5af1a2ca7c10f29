//! # Embargo Policies
//!
//! A stem transaction that isn't seen fluffed by the time its embargo timer fires is fluffed by us, this stops
//! a malicious node from black-holing transactions. How long that timer is is decided by an [`EmbargoPolicy`].
use std::time::Duration;

use rand::prelude::*;
use rand_distr::Exp;

use crate::DandelionConfig;

/// Decides the embargo timeout of a new stem transaction.
pub trait EmbargoPolicy: Send + Sync {
    /// Returns the embargo timeout for a transaction entering the stem pool now.
    fn embargo_timeout(&self) -> Duration;
}

/// Embargo timers sampled from the exponential distribution, as done in the dandelion++ paper.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialEmbargo {
    /// The distribution to sample to get embargo timers.
    embargo_dist: Exp<f64>,
}

impl ExponentialEmbargo {
    /// Creates a new [`ExponentialEmbargo`] with the average timeout from [`DandelionConfig::average_embargo_timeout`].
    ///
    /// # Panics
    /// This function panics if [`DandelionConfig::fluff_probability`] is not in `0.0 < p <= 1.0`.
    pub fn new(config: &DandelionConfig) -> Self {
        let average = config.average_embargo_timeout().as_secs_f64();

        Self {
            embargo_dist: Exp::new(average.recip()).expect("Average embargo timeout was not positive"),
        }
    }
}

impl EmbargoPolicy for ExponentialEmbargo {
    fn embargo_timeout(&self) -> Duration {
        let embargo_timer = self.embargo_dist.sample(&mut thread_rng());
        tracing::trace!("Sampled embargo timer: {embargo_timer} seconds.");

        Duration::from_secs_f64(embargo_timer)
    }
}

/// The same embargo timeout for every transaction.
#[derive(Debug, Clone, Copy)]
pub struct FixedEmbargo(pub Duration);

impl EmbargoPolicy for FixedEmbargo {
    fn embargo_timeout(&self) -> Duration {
        self.0
    }
}
