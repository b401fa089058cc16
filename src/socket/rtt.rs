// Copyright (c) 2023 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cmp;
use std::time::Duration;

use crate::TIMER_GRANULARITY;

/// RTT estimation for a TCP connection.
/// See RFC 6298 Section 2
#[derive(Clone, Debug)]
pub struct RttEstimator {
    /// The most recent RTT sample.
    latest_rtt: Duration,

    /// Exponentially weighted moving average of the RTT samples, SRTT.
    smoothed_rtt: Option<Duration>,

    /// Mean deviation of the RTT samples, RTTVAR.
    rttvar: Duration,

    /// The minimum RTT observed on the connection.
    min_rtt: Duration,

    /// The maximum RTT observed on the connection.
    max_rtt: Duration,
}

impl RttEstimator {
    /// Create an estimator seeded with `initial_rtt`. The seed is never
    /// smaller than the timer granularity, so the estimate is always
    /// positive.
    pub fn new(initial_rtt: Duration) -> Self {
        let initial_rtt = cmp::max(initial_rtt, TIMER_GRANULARITY);
        Self {
            latest_rtt: initial_rtt,
            smoothed_rtt: None,
            rttvar: initial_rtt / 2,
            min_rtt: initial_rtt,
            max_rtt: initial_rtt,
        }
    }

    /// Return the current best RTT estimation.
    pub fn smoothed_rtt(&self) -> Duration {
        self.smoothed_rtt.unwrap_or(self.latest_rtt)
    }

    /// Return the latest rtt sample
    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    /// Return the Minimum RTT observed so far for this estimator.
    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    /// Return the variation in the RTT samples using a mean variation.
    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    /// Return the Maximum RTT observed so far for this estimator.
    pub fn max_rtt(&self) -> Duration {
        self.max_rtt
    }

    /// Update estimator with the given RTT sample. Zero samples are ignored.
    pub fn update(&mut self, rtt: Duration) {
        if rtt.is_zero() {
            return;
        }

        self.latest_rtt = rtt;

        if let Some(smoothed_rtt) = self.smoothed_rtt {
            self.min_rtt = cmp::min(self.min_rtt, rtt);
            self.max_rtt = cmp::max(self.max_rtt, rtt);

            let var_sample = if smoothed_rtt > rtt {
                smoothed_rtt - rtt
            } else {
                rtt - smoothed_rtt
            };

            // RTTVAR <- (1 - beta) * RTTVAR + beta * |SRTT - R'|
            // SRTT <- (1 - alpha) * SRTT + alpha * R'
            self.rttvar = (3 * self.rttvar + var_sample) / 4;
            self.smoothed_rtt = Some((7 * smoothed_rtt + rtt) / 8);
        } else {
            self.smoothed_rtt = Some(rtt);
            self.rttvar = rtt / 2;
            self.min_rtt = rtt;
            self.max_rtt = rtt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time;

    #[test]
    fn initial() {
        let initial_rtt = time::Duration::from_millis(200);
        let r = RttEstimator::new(initial_rtt);
        assert_eq!(r.latest_rtt(), initial_rtt);
        assert_eq!(r.min_rtt(), initial_rtt);
        assert_eq!(r.max_rtt(), initial_rtt);
        assert_eq!(r.rttvar(), initial_rtt / 2);
        assert_eq!(r.smoothed_rtt(), initial_rtt);

        let r = RttEstimator::new(Duration::ZERO);
        assert_eq!(r.smoothed_rtt(), TIMER_GRANULARITY);
    }

    #[test]
    fn update() {
        let mut r = RttEstimator::new(time::Duration::from_millis(200));

        // First rtt sample replaces the seed.
        let rtt_sample = time::Duration::from_millis(400);
        r.update(rtt_sample);
        assert_eq!(r.latest_rtt(), rtt_sample);
        assert_eq!(r.min_rtt(), rtt_sample);
        assert_eq!(r.max_rtt(), rtt_sample);
        assert_eq!(r.rttvar(), rtt_sample / 2);
        assert_eq!(r.smoothed_rtt(), rtt_sample);

        // Second rtt sample
        let rtt_sample = time::Duration::from_millis(800);
        r.update(rtt_sample);
        assert_eq!(r.latest_rtt(), rtt_sample);
        assert_eq!(r.min_rtt(), time::Duration::from_millis(400));
        assert_eq!(r.max_rtt(), time::Duration::from_millis(800));
        assert_eq!(r.rttvar(), time::Duration::from_millis(250));
        assert_eq!(r.smoothed_rtt(), time::Duration::from_millis(450));

        // Zero samples are dropped.
        r.update(Duration::ZERO);
        assert_eq!(r.latest_rtt(), rtt_sample);
        assert_eq!(r.smoothed_rtt(), time::Duration::from_millis(450));
    }
}
