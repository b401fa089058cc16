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

//! D2TCP is a deadline-aware variant of [DCTCP](https://www.rfc-editor.org/rfc/rfc8257.html)
//! for TCP transports in data centers.
//!
//! The controller estimates the fraction of ECN marked traffic once per
//! window of acknowledged data, reshapes the estimate with the time left
//! until the flow deadline, and scales the congestion window down by the
//! result on congestion. It also keeps the ECN echo of a receiver that
//! delays acknowledgements aligned with the marked data.
//!
//! ## Get started
//!
//! The transport owns a [`TcpSocketState`] per connection and delivers events
//! to a [`CongestionController`]:
//!
//! ```
//! use std::time::{Duration, Instant};
//! use d2tcp::{CaEvent, CongestionConfig, TcpSocketState};
//!
//! let conf = CongestionConfig::default();
//! let mut tcb = TcpSocketState::from(&conf);
//! let mut cc = d2tcp::build_congestion_controller(&conf)?;
//! cc.init(&mut tcb)?;
//!
//! cc.on_state_event(&mut tcb, CaEvent::DelayedAck);
//! cc.on_packets_acked(&mut tcb, 2, Duration::from_millis(1), Instant::now());
//! let cwnd = cc.on_congestion_event(&mut tcb);
//! assert!(cwnd >= tcb.segment_size);
//! # Ok::<(), d2tcp::error::Error>(())
//! ```

use std::cmp;
use std::time::Duration;

/// Default sender maximum segment size, an Ethernet MTU minus IPv4, TCP and
/// timestamp option headers.
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 1448;

/// Default initial congestion window in segments.
/// See RFC 6928
const DEFAULT_INITIAL_CONGESTION_WINDOW: u64 = 10;

/// The RTT assumed before the first sample.
const INITIAL_RTT: Duration = Duration::from_millis(333);

/// The granularity of RTT samples.
pub const TIMER_GRANULARITY: Duration = Duration::from_millis(1);

/// Result type for congestion control operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configurations about congestion control.
///
/// The configuration is fixed once a controller is built from it.
#[derive(Debug, Clone)]
pub struct CongestionConfig {
    /// The congestion control algorithm used for a connection.
    pub congestion_control_algorithm: CongestionControlAlgorithm,

    /// The sender maximum segment size in bytes.
    pub max_segment_size: u64,

    /// The initial congestion window in segments.
    pub initial_congestion_window: u64,

    /// The initial rtt, used before real rtt is estimated.
    pub initial_rtt: Duration,

    /// Weight of a new observation window in alpha estimation.
    pub dctcp_shift_g: f64,

    /// Alpha when a connection starts.
    pub dctcp_alpha_on_init: f64,

    /// Mark outgoing packets with ECT(0), otherwise ECT(1).
    pub use_ect0: bool,
}

impl CongestionConfig {
    /// Create default configuration.
    ///
    /// The configuration may be customized by calling related set methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the congestion control algorithm.
    /// The default value is `D2tcp`.
    pub fn set_congestion_control_algorithm(&mut self, cca: CongestionControlAlgorithm) {
        self.congestion_control_algorithm = cca;
    }

    /// Set the sender maximum segment size in bytes. Zero is rejected.
    /// The default value is 1448.
    pub fn set_max_segment_size(&mut self, v: u64) -> Result<()> {
        if v == 0 {
            return Err(Error::InvalidConfig("max segment size".into()));
        }
        self.max_segment_size = v;
        Ok(())
    }

    /// Set the initial congestion window in segments. Lower values than one
    /// segment are raised to one.
    /// The default value is 10.
    pub fn set_initial_congestion_window(&mut self, segments: u64) {
        self.initial_congestion_window = cmp::max(segments, 1);
    }

    /// Set the initial RTT in milliseconds.
    /// The default value is 333ms.
    ///
    /// Until the first sample, deadline reshaping measures the time left in
    /// units of this RTT.
    pub fn set_initial_rtt(&mut self, millis: u64) {
        self.initial_rtt = cmp::max(Duration::from_millis(millis), TIMER_GRANULARITY);
    }

    /// Set the weight g of alpha estimation, in `[0, 1]`.
    /// The default value is 0.0625.
    pub fn set_dctcp_shift_g(&mut self, g: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&g) {
            return Err(Error::InvalidConfig("g".into()));
        }
        self.dctcp_shift_g = g;
        Ok(())
    }

    /// Set the initial alpha, in `[0, 1]`.
    /// The default value is 1.0.
    pub fn set_dctcp_alpha_on_init(&mut self, alpha: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidConfig("initial alpha".into()));
        }
        self.dctcp_alpha_on_init = alpha;
        Ok(())
    }

    /// Use ECT(0) for outgoing packets, otherwise ECT(1).
    /// The default value is true.
    pub fn set_use_ect0(&mut self, v: bool) {
        self.use_ect0 = v;
    }
}

impl Default for CongestionConfig {
    fn default() -> CongestionConfig {
        CongestionConfig {
            congestion_control_algorithm: CongestionControlAlgorithm::D2tcp,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            initial_congestion_window: DEFAULT_INITIAL_CONGESTION_WINDOW,
            initial_rtt: INITIAL_RTT,
            dctcp_shift_g: 0.0625,
            dctcp_alpha_on_init: 1.0,
            use_ect0: true,
        }
    }
}


pub use crate::congestion_control::build_congestion_controller;
pub use crate::congestion_control::CaEvent;
pub use crate::congestion_control::CongestionControlAlgorithm;
pub use crate::congestion_control::CongestionController;
pub use crate::congestion_control::CongestionStats;
pub use crate::congestion_control::D2tcp;
pub use crate::congestion_control::D2tcpConfig;
pub use crate::error::Error;
pub use crate::seq_num::SeqNum;
pub use crate::socket::AckRequest;
pub use crate::socket::EcnCodePoint;
pub use crate::socket::EcnMode;
pub use crate::socket::EcnState;
pub use crate::socket::TcpSocketState;

#[path = "congestion_control/congestion_control.rs"]
pub mod congestion_control;

#[path = "socket/socket.rs"]
pub mod socket;

pub mod error;
pub mod seq_num;
