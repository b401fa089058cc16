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

#![allow(unused_variables)]

use core::str::FromStr;
use std::fmt;
use std::time::Duration;
use std::time::Instant;

use strum_macros::Display;
use strum_macros::EnumIter;

use crate::socket::TcpSocketState;
use crate::CongestionConfig;
use crate::Error;
use crate::Result;
pub use d2tcp::reduce_cwnd;
pub use d2tcp::reshape_alpha;
pub use d2tcp::D2tcp;
pub use d2tcp::D2tcpConfig;

/// Available congestion control algorithm
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum CongestionControlAlgorithm {
    /// D2TCP adds deadline awareness to DCTCP. The ECN based congestion
    /// estimate is reshaped with a per-window exponent derived from the time
    /// left until the flow deadline and the bytes still to send, so flows
    /// near their deadline back off less than flows with slack.
    #[default]
    D2tcp,

    /// DCTCP scales the window reduction by an exponentially weighted
    /// estimate of the fraction of ECN marked bytes.
    /// See <https://www.rfc-editor.org/rfc/rfc8257.html>.
    Dctcp,
}

impl FromStr for CongestionControlAlgorithm {
    type Err = Error;

    fn from_str(algor: &str) -> Result<CongestionControlAlgorithm> {
        if algor.eq_ignore_ascii_case("d2tcp") {
            Ok(CongestionControlAlgorithm::D2tcp)
        } else if algor.eq_ignore_ascii_case("dctcp") {
            Ok(CongestionControlAlgorithm::Dctcp)
        } else {
            Err(Error::InvalidConfig("unknown".into()))
        }
    }
}

/// Congestion avoidance events delivered by the transport.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Display, EnumIter)]
pub enum CaEvent {
    /// First transmission when no packet is in flight.
    TxStart,

    /// Congestion window restart after idle.
    CwndRestart,

    /// End of congestion window recovery.
    CompleteCwr,

    /// Loss timeout.
    Loss,

    /// A received packet carried the CE codepoint.
    EcnIsCe,

    /// A received packet did not carry the CE codepoint.
    EcnNoCe,

    /// The receiver started delaying acknowledgements.
    DelayedAck,

    /// The receiver stopped delaying acknowledgements.
    NonDelayedAck,
}

/// Congestion control statistics.
#[derive(Debug, Default, Clone)]
pub struct CongestionStats {
    /// Total bytes acked.
    pub bytes_acked_in_total: u64,

    /// Total bytes acked while the peer echoed congestion.
    pub bytes_acked_with_ece: u64,

    /// Number of closed observation windows.
    pub windows_observed: u64,

    /// Number of congestion window reductions.
    pub congestion_events: u64,

    /// Number of acknowledgements emitted to keep ECN echo aligned.
    pub flush_acks_sent: u64,
}

/// Congestion control interfaces shared by different algorithms.
///
/// The transport calls each method synchronously for one event of one
/// connection, in the order the events occur on that connection.
pub trait CongestionController {
    /// Name of congestion control algorithm.
    fn name(&self) -> &str;

    /// Prepare the socket state when the connection is set up.
    fn init(&mut self, tcb: &mut TcpSocketState) -> Result<()> {
        Ok(())
    }

    /// Callback after `segments_acked` segments were newly acknowledged.
    fn on_packets_acked(
        &mut self,
        tcb: &mut TcpSocketState,
        segments_acked: u32,
        rtt: Duration,
        now: Instant,
    ) {
    }

    /// Congestion event. Update and return the congestion window.
    fn on_congestion_event(&mut self, tcb: &mut TcpSocketState) -> u64;

    /// Callback for congestion avoidance events.
    fn on_state_event(&mut self, tcb: &mut TcpSocketState, event: CaEvent) {}

    /// Duplicate the controller for a connection derived from this one.
    fn fork(&self) -> Box<dyn CongestionController>;

    /// Current congestion estimate, if the algorithm keeps one.
    fn alpha(&self) -> Option<f64> {
        None
    }

    /// Congestion stats.
    fn stats(&self) -> &CongestionStats;
}

impl fmt::Debug for dyn CongestionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "congestion controller {}.", self.name())
    }
}

/// Build a congestion controller.
pub fn build_congestion_controller(
    conf: &CongestionConfig,
) -> Result<Box<dyn CongestionController>> {
    let mut d2tcp_conf = D2tcpConfig::from(conf)?;

    match conf.congestion_control_algorithm {
        CongestionControlAlgorithm::D2tcp => {
            d2tcp_conf.enable_deadline_awareness(true);
        }
        CongestionControlAlgorithm::Dctcp => {
            d2tcp_conf.enable_deadline_awareness(false);
        }
    }

    Ok(Box::new(D2tcp::new(d2tcp_conf)))
}


mod d2tcp;
