//! RFC 6298 retransmission-timeout estimation (SRTT/RTTVAR), with the clock
//! granularity and RTO bounds this repository uses (§3.2): `MIN_RTO` is also
//! the RTO a brand-new connection starts with, before any RTT sample exists.

use std::time::Duration;

pub const MIN_RTO: Duration = Duration::from_millis(200);
pub const MAX_RTO: Duration = Duration::from_secs(60);
pub const CLOCK_GRANULARITY: Duration = Duration::from_millis(50);

const K: u32 = 4;
const ALPHA: f64 = 1.0 / 8.0;
const BETA: f64 = 1.0 / 4.0;

#[derive(Debug, Clone)]
pub struct RtoEstimator {
    srtt: Option<Duration>,
    rttvar: Duration,
    rto: Duration,
}

impl RtoEstimator {
    pub fn new() -> Self {
        RtoEstimator {
            srtt: None,
            rttvar: Duration::ZERO,
            rto: MIN_RTO,
        }
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    pub fn has_measurement(&self) -> bool {
        self.srtt.is_some()
    }

    /// Feed a fresh RTT sample `r`. Per Karn's rule the caller must never
    /// pass a sample taken from a retransmitted segment.
    pub fn sample(&mut self, r: Duration) {
        match self.srtt {
            None => {
                self.srtt = Some(r);
                self.rttvar = r / 2;
            }
            Some(srtt) => {
                let diff = srtt.abs_diff(r);
                self.rttvar = self.rttvar.mul_f64(1.0 - BETA) + diff.mul_f64(BETA);
                self.srtt = Some(srtt.mul_f64(1.0 - ALPHA) + r.mul_f64(ALPHA));
            }
        }

        let variable = (self.rttvar * K).max(CLOCK_GRANULARITY);
        self.rto = self.srtt.unwrap() + variable;
        self.clamp();
    }

    /// Exponential back-off on a retransmission timeout, capped at `MAX_RTO`.
    pub fn backoff(&mut self) {
        self.rto = (self.rto * 2).min(MAX_RTO);
    }

    fn clamp(&mut self) {
        self.rto = self.rto.clamp(MIN_RTO, MAX_RTO);
    }
}

impl Default for RtoEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_min_rto() {
        let est = RtoEstimator::new();
        assert_eq!(est.rto(), MIN_RTO);
        assert!(!est.has_measurement());
    }

    #[test]
    fn first_sample_sets_srtt_and_half_rttvar() {
        let mut est = RtoEstimator::new();
        est.sample(Duration::from_millis(100));
        // rto = srtt + max(G, K*rttvar) = 100 + max(50, 4*50) = 300ms
        assert_eq!(est.rto(), Duration::from_millis(300));
    }

    #[test]
    fn backoff_doubles_and_caps_at_max() {
        let mut est = RtoEstimator::new();
        est.backoff();
        assert_eq!(est.rto(), Duration::from_millis(400));

        for _ in 0..20 {
            est.backoff();
        }
        assert_eq!(est.rto(), MAX_RTO);
    }

    #[test]
    fn clamps_to_min_rto() {
        let mut est = RtoEstimator::new();
        est.sample(Duration::from_millis(1));
        assert!(est.rto() >= MIN_RTO);
    }
}
