use std::{
    ops::{Mul, Neg},
    time::Duration,
};

/// When calculating the embargo timeout using the formula: `(-k*(k-1)*hop)/(2*log(1-ep))`
///
/// (1 - ep) is the probability that a transaction travels for `k` hops before a nodes embargo timeout fires, this constant is (1 - ep).
const EMBARGO_FULL_TRAVEL_PROBABILITY: f64 = 0.90;

/// The config used to initialize dandelion.
///
/// `Tbase`, the average embargo timeout, is not set directly. It is calculated using the formula provided
/// in the D++ paper:
///
///  `(-k*(k-1)*hop)/(2*log(1-ep))`
///
/// Where `k` is calculated from the fluff probability, `hop` is `time_between_hop` and `ep` is fixed at `0.1`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DandelionConfig {
    /// The time it takes for a stem transaction to pass through a node, including network latency.
    ///
    /// It's better to be safe and put a slightly higher value than lower.
    pub time_between_hop: Duration,
    /// How often every stem route is recomputed, used by [`spawn_shuffler`](crate::spawn_shuffler).
    pub shuffle_interval: Duration,
    /// q in the dandelion paper, the probability that a stem transaction is fluffed at each hop.
    ///
    /// Only used to size the embargo timeout here, this value *MUST* be between 0 and 1 (not 0).
    pub fluff_probability: f64,
}

impl Default for DandelionConfig {
    fn default() -> Self {
        Self {
            time_between_hop: Duration::from_millis(175),
            shuffle_interval: Duration::from_secs(600),
            fluff_probability: 0.1,
        }
    }
}

impl DandelionConfig {
    /// Returns the average embargo timeout, `Tbase` in the dandelion++ paper.
    ///
    /// This is the average embargo timeout _only including this node_ with k nodes also putting an embargo timeout
    /// using the exponential distribution, the average until one of them fluffs is `Tbase / k`.
    pub fn average_embargo_timeout(&self) -> Duration {
        // we set k equal to the expected stem length with this fluff probability.
        let k = self.expected_stem_length();
        let time_between_hop = self.time_between_hop.as_secs_f64();

        Duration::from_secs_f64(
            // (-k*(k-1)*hop)/(2*ln(1-ep))
            ((k.neg() * (k - 1.0) * time_between_hop)
                / EMBARGO_FULL_TRAVEL_PROBABILITY.ln().mul(2.0))
            .ceil(),
        )
    }

    /// Returns the expected length of a stem.
    pub fn expected_stem_length(&self) -> f64 {
        self.fluff_probability.recip()
    }
}
