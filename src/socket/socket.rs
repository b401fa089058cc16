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

//! Per-connection transport state shared with congestion controllers.
//!
//! The transport owns a [`TcpSocketState`] for each connection. Congestion
//! controllers read the fields they need and write back the congestion window
//! and the ECN echo state. Acknowledgements requested by a controller are
//! queued and drained by the transport.

use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use strum_macros::Display;

use crate::seq_num::SeqNum;
use crate::CongestionConfig;

pub use rtt::RttEstimator;

/// ECN negotiation and echo state of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum EcnState {
    /// ECN is not negotiated on the connection.
    #[default]
    Disabled,

    /// ECN is negotiated and nothing has been marked.
    Idle,

    /// The receiver got a CE marked packet.
    CeRcvd,

    /// The receiver is setting ECE on its acknowledgements.
    SendingEce,

    /// The sender got an acknowledgement carrying ECE.
    EceRcvd,

    /// The sender has reduced its window and set CWR.
    CwrSent,
}

/// How ECN feedback is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum EcnMode {
    /// RFC 3168 behavior, one reduction per window.
    #[default]
    ClassicEcn,

    /// Data center TCP behavior, ECE mirrors CE on every acknowledgement.
    DctcpEcn,
}

/// The ECN codepoint carried in the IP header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum EcnCodePoint {
    #[default]
    NotEct,
    Ect1,
    Ect0,
    Ce,
}

/// An empty acknowledgement the transport must put on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AckRequest {
    /// Cumulative acknowledgement number of the segment.
    pub ack_seq: SeqNum,

    /// Whether the ECE flag is set.
    pub ece: bool,
}

/// Transport state of one TCP connection.
#[derive(Clone, Debug)]
pub struct TcpSocketState {
    /// Congestion window in bytes.
    pub cwnd: u64,

    /// Sender maximum segment size in bytes.
    pub segment_size: u64,

    /// Highest cumulatively acknowledged sequence number.
    pub last_acked_seq: SeqNum,

    /// Next sequence number to be transmitted.
    pub next_tx_seq: SeqNum,

    /// Next sequence number expected from the peer.
    pub rcv_nxt: SeqNum,

    /// RTT estimation of the connection.
    pub rtt: RttEstimator,

    /// The time by which the flow should complete, if any.
    pub deadline: Option<Instant>,

    /// Total bytes the flow intends to transmit. Zero if unknown.
    pub tx_total: u64,

    /// ECN echo state.
    pub ecn_state: EcnState,

    /// Whether ECN is used on the connection.
    pub use_ecn: bool,

    /// ECN feedback semantics.
    pub ecn_mode: EcnMode,

    /// Codepoint used to mark outgoing packets.
    pub ect_codepoint: EcnCodePoint,

    /// Acknowledgements requested but not yet sent.
    ack_requests: VecDeque<AckRequest>,
}

impl TcpSocketState {
    pub fn new(segment_size: u64, initial_cwnd: u64, initial_rtt: Duration) -> Self {
        Self {
            cwnd: initial_cwnd,
            segment_size,
            last_acked_seq: SeqNum::default(),
            next_tx_seq: SeqNum::default(),
            rcv_nxt: SeqNum::default(),
            rtt: RttEstimator::new(initial_rtt),
            deadline: None,
            tx_total: 0,
            ecn_state: EcnState::Disabled,
            use_ecn: false,
            ecn_mode: EcnMode::ClassicEcn,
            ect_codepoint: EcnCodePoint::NotEct,
            ack_requests: VecDeque::new(),
        }
    }

    /// Create the state of a new connection from the congestion
    /// configuration.
    pub fn from(conf: &CongestionConfig) -> Self {
        let segment_size = conf.max_segment_size;
        Self::new(
            segment_size,
            conf.initial_congestion_window.saturating_mul(segment_size),
            conf.initial_rtt,
        )
    }

    /// Request an empty acknowledgement for everything below `rcv_nxt`.
    pub fn send_empty_ack(&mut self, ece: bool) {
        self.ack_requests.push_back(AckRequest {
            ack_seq: self.rcv_nxt,
            ece,
        });
    }

    /// Return the number of acknowledgements waiting to be sent.
    pub fn pending_acks(&self) -> usize {
        self.ack_requests.len()
    }

    /// Drain the acknowledgements waiting to be sent, oldest first.
    pub fn take_ack_requests(&mut self) -> Vec<AckRequest> {
        self.ack_requests.drain(..).collect()
    }

    /// Time left until the deadline, if there is a deadline that has not
    /// passed yet.
    pub fn time_to_deadline(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .and_then(|d| d.checked_duration_since(now))
            .filter(|remain| !remain.is_zero())
    }
}

pub mod rtt;
