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
use std::time::Instant;

use log::*;

use super::CaEvent;
use super::CongestionController;
use super::CongestionStats;
use crate::seq_num::SeqNum;
use crate::socket::EcnCodePoint;
use crate::socket::EcnMode;
use crate::socket::EcnState;
use crate::socket::TcpSocketState;
use crate::CongestionConfig;
use crate::Error;
use crate::Result;

/// Default weight of a new sample in the alpha estimation, 1/16.
///
/// See <https://www.rfc-editor.org/rfc/rfc8257.html#section-3.3>.
const DEFAULT_G: f64 = 0.0625;

/// Default alpha when the connection starts.
///
/// See <https://www.rfc-editor.org/rfc/rfc8257.html#section-3.3>.
const DEFAULT_INITIAL_ALPHA: f64 = 1.0;

/// D2TCP Configuration.
#[derive(Debug, Clone)]
pub struct D2tcpConfig {
    /// Weight given to the ECN marked fraction of a new observation window.
    g: f64,

    /// Alpha when the connection starts.
    initial_alpha: f64,

    /// Mark outgoing packets with ECT(0), otherwise ECT(1).
    use_ect0: bool,

    /// Reshape alpha with the flow deadline, default to true. Without it the
    /// controller behaves like DCTCP.
    deadline_aware: bool,
}

impl D2tcpConfig {
    pub fn new(g: f64, initial_alpha: f64, use_ect0: bool) -> Result<Self> {
        let mut conf = Self::default();
        conf.set_g(g)?
            .set_initial_alpha(initial_alpha)?
            .set_use_ect0(use_ect0);
        Ok(conf)
    }

    pub fn from(conf: &CongestionConfig) -> Result<Self> {
        Self::new(conf.dctcp_shift_g, conf.dctcp_alpha_on_init, conf.use_ect0)
    }

    /// Update g. It must be in `[0, 1]`.
    pub fn set_g(&mut self, g: f64) -> Result<&mut Self> {
        if !(0.0..=1.0).contains(&g) {
            return Err(Error::InvalidConfig("g".into()));
        }
        self.g = g;
        Ok(self)
    }

    /// Update initial alpha. It must be in `[0, 1]`.
    pub fn set_initial_alpha(&mut self, alpha: f64) -> Result<&mut Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidConfig("initial alpha".into()));
        }
        self.initial_alpha = alpha;
        Ok(self)
    }

    /// Select the ECN codepoint of outgoing packets.
    pub fn set_use_ect0(&mut self, use_ect0: bool) -> &mut Self {
        self.use_ect0 = use_ect0;
        self
    }

    /// Enable deadline awareness.
    pub fn enable_deadline_awareness(&mut self, enable: bool) -> &mut Self {
        self.deadline_aware = enable;
        self
    }
}

impl Default for D2tcpConfig {
    fn default() -> Self {
        Self {
            g: DEFAULT_G,
            initial_alpha: DEFAULT_INITIAL_ALPHA,
            use_ect0: true,
            deadline_aware: true,
        }
    }
}

/// Deadline-aware data center TCP.
///
/// Alpha is estimated like DCTCP, then raised to the power
/// `p = tc / d` once per observation window, where `d` is the time left
/// until the deadline in RTTs and `tc` the bytes still to send in windows,
/// scaled by 4/3.
///
/// See <https://dl.acm.org/doi/10.1145/2377677.2377709> and
/// <https://www.rfc-editor.org/rfc/rfc8257.html>.
#[derive(Debug, Clone)]
pub struct D2tcp {
    /// Configuration.
    config: D2tcpConfig,

    /// Estimated fraction of marked bytes, in `[0, 1]`.
    alpha: f64,

    /// Bytes acked with ECE in the current observation window.
    acked_bytes_ecn: u64,

    /// Bytes acked in the current observation window.
    acked_bytes_total: u64,

    /// End of the current observation window.
    next_seq: Option<SeqNum>,

    /// `rcv_nxt` at the last CE transition.
    prior_rcv_nxt: Option<SeqNum>,

    /// Whether the last received packet was CE marked.
    ce_state: bool,

    /// Whether the receiver is delaying acknowledgements.
    delayed_ack_reserved: bool,

    /// Congestion statistics.
    stats: CongestionStats,
}

impl D2tcp {
    pub fn new(config: D2tcpConfig) -> Self {
        let alpha = config.initial_alpha;
        Self {
            config,
            alpha,
            acked_bytes_ecn: 0,
            acked_bytes_total: 0,
            next_seq: None,
            prior_rcv_nxt: None,
            ce_state: false,
            delayed_ack_reserved: false,
            stats: Default::default(),
        }
    }

    /// Account acked bytes and update alpha when the observation window
    /// closes.
    fn update_alpha(&mut self, tcb: &TcpSocketState, segments_acked: u32, now: Instant) {
        let acked_bytes = (segments_acked as u64).saturating_mul(tcb.segment_size);

        self.acked_bytes_total = self.acked_bytes_total.saturating_add(acked_bytes);
        self.stats.bytes_acked_in_total =
            self.stats.bytes_acked_in_total.saturating_add(acked_bytes);
        if tcb.ecn_state == EcnState::EceRcvd {
            self.acked_bytes_ecn = self.acked_bytes_ecn.saturating_add(acked_bytes);
            self.stats.bytes_acked_with_ece =
                self.stats.bytes_acked_with_ece.saturating_add(acked_bytes);
        }

        let next_seq = *self.next_seq.get_or_insert(tcb.next_tx_seq);
        if tcb.last_acked_seq < next_seq {
            return;
        }

        let bytes_ecn = if self.acked_bytes_total > 0 {
            self.acked_bytes_ecn as f64 / self.acked_bytes_total as f64
        } else {
            0.0
        };

        // alpha = (1 - g) * alpha + g * F
        let g = self.config.g;
        let smoothed = (1.0 - g) * self.alpha + g * bytes_ecn;

        self.alpha = if self.config.deadline_aware {
            reshape_alpha(
                smoothed,
                tcb.deadline,
                now,
                tcb.rtt.smoothed_rtt(),
                tcb.tx_total,
                self.acked_bytes_total,
                tcb.cwnd,
            )
        } else {
            smoothed
        };

        debug!(
            "{} window closed at {}: bytes_ecn {} smoothed alpha {} alpha {} remain {:?} tx_total {}",
            self.name(),
            tcb.last_acked_seq,
            bytes_ecn,
            smoothed,
            self.alpha,
            tcb.time_to_deadline(now),
            tcb.tx_total
        );

        self.stats.windows_observed = self.stats.windows_observed.saturating_add(1);
        self.reset(tcb);
    }

    /// Start a new observation window.
    fn reset(&mut self, tcb: &TcpSocketState) {
        self.next_seq = Some(tcb.next_tx_seq);
        self.acked_bytes_ecn = 0;
        self.acked_bytes_total = 0;
    }

    /// Send an acknowledgement for `ack_seq` without moving `rcv_nxt`.
    fn flush_ack(&mut self, tcb: &mut TcpSocketState, ack_seq: SeqNum, ece: bool) {
        let rcv_nxt = tcb.rcv_nxt;

        tcb.rcv_nxt = ack_seq;
        tcb.send_empty_ack(ece);
        tcb.rcv_nxt = rcv_nxt;

        self.stats.flush_acks_sent = self.stats.flush_acks_sent.saturating_add(1);
        debug!(
            "{} flushed delayed ack {} ece {}, rcv_nxt {}",
            self.name(),
            ack_seq,
            ece,
            rcv_nxt
        );
    }

    /// A CE marked packet arrived.
    ///
    /// With delayed acks, data received before the mark is acknowledged
    /// right away without ECE so the echo only covers marked data.
    fn ce_state_0_to_1(&mut self, tcb: &mut TcpSocketState) {
        if !self.ce_state && self.delayed_ack_reserved {
            if let Some(prior_rcv_nxt) = self.prior_rcv_nxt {
                self.flush_ack(tcb, prior_rcv_nxt, false);
            }
        }

        self.prior_rcv_nxt = Some(tcb.rcv_nxt);
        self.ce_state = true;
        tcb.ecn_state = EcnState::CeRcvd;
    }

    /// A packet without CE arrived.
    ///
    /// With delayed acks, marked data received so far is acknowledged right
    /// away with ECE.
    fn ce_state_1_to_0(&mut self, tcb: &mut TcpSocketState) {
        if self.ce_state && self.delayed_ack_reserved {
            if let Some(prior_rcv_nxt) = self.prior_rcv_nxt {
                self.flush_ack(tcb, prior_rcv_nxt, true);
            }
        }

        self.prior_rcv_nxt = Some(tcb.rcv_nxt);
        self.ce_state = false;

        if matches!(tcb.ecn_state, EcnState::CeRcvd | EcnState::SendingEce) {
            tcb.ecn_state = EcnState::Idle;
        }
    }

    fn update_ack_reserved(&mut self, event: CaEvent) {
        match event {
            CaEvent::DelayedAck => self.delayed_ack_reserved = true,
            CaEvent::NonDelayedAck => self.delayed_ack_reserved = false,
            _ => (),
        }
    }
}

impl CongestionController for D2tcp {
    fn name(&self) -> &str {
        if self.config.deadline_aware {
            "D2TCP"
        } else {
            "DCTCP"
        }
    }

    fn init(&mut self, tcb: &mut TcpSocketState) -> Result<()> {
        if tcb.segment_size == 0 {
            return Err(Error::InvalidState("zero segment size".into()));
        }

        tcb.use_ecn = true;
        tcb.ecn_mode = EcnMode::DctcpEcn;
        tcb.ect_codepoint = if self.config.use_ect0 {
            EcnCodePoint::Ect0
        } else {
            EcnCodePoint::Ect1
        };

        info!(
            "{} enabled {} with codepoint {}",
            self.name(),
            tcb.ecn_mode,
            tcb.ect_codepoint
        );
        Ok(())
    }

    fn on_packets_acked(
        &mut self,
        tcb: &mut TcpSocketState,
        segments_acked: u32,
        rtt: Duration,
        now: Instant,
    ) {
        trace!(
            "{} acked {} segments, rtt {:?}, last acked {}, ecn state {}",
            self.name(),
            segments_acked,
            rtt,
            tcb.last_acked_seq,
            tcb.ecn_state
        );

        self.update_alpha(tcb, segments_acked, now);
    }

    fn on_congestion_event(&mut self, tcb: &mut TcpSocketState) -> u64 {
        let cwnd = tcb.cwnd;
        tcb.cwnd = reduce_cwnd(cwnd, self.alpha, tcb.segment_size);
        self.stats.congestion_events = self.stats.congestion_events.saturating_add(1);

        debug!(
            "{} reduced cwnd from {} to {}, alpha {}",
            self.name(),
            cwnd,
            tcb.cwnd,
            self.alpha
        );
        tcb.cwnd
    }

    fn on_state_event(&mut self, tcb: &mut TcpSocketState, event: CaEvent) {
        trace!("{} event {}, ce state {}", self.name(), event, self.ce_state);

        match event {
            CaEvent::EcnIsCe => self.ce_state_0_to_1(tcb),
            CaEvent::EcnNoCe => self.ce_state_1_to_0(tcb),
            CaEvent::DelayedAck | CaEvent::NonDelayedAck => self.update_ack_reserved(event),
            _ => (),
        }
    }

    fn fork(&self) -> Box<dyn CongestionController> {
        Box::new(self.clone())
    }

    fn alpha(&self) -> Option<f64> {
        Some(self.alpha)
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}

/// Reshape alpha with the deadline of the flow.
///
/// Returns `alpha ^ p` with `p = tc / d`, `d = remain / rtt` and
/// `tc = 4 * (tx_total - acked_bytes) / (3 * cwnd)`. Alpha is returned
/// unchanged when the flow has no deadline, the deadline has passed or the
/// flow size is unknown. The result is kept in `[0, 1]`.
///
/// Panics if a deadline is pending and `rtt` or `cwnd` is zero.
pub fn reshape_alpha(
    alpha: f64,
    deadline: Option<Instant>,
    now: Instant,
    rtt: Duration,
    tx_total: u64,
    acked_bytes: u64,
    cwnd: u64,
) -> f64 {
    let remain = match deadline.and_then(|d| d.checked_duration_since(now)) {
        Some(remain) if !remain.is_zero() && tx_total > 0 => remain,
        _ => return alpha,
    };

    assert!(!rtt.is_zero(), "rtt must be positive");
    assert!(cwnd > 0, "cwnd must be positive");

    let d = remain.as_secs_f64() / rtt.as_secs_f64();
    let tc = 4.0 * tx_total.saturating_sub(acked_bytes) as f64 / (3.0 * cwnd as f64);
    let p = tc / d;

    alpha.powf(p).clamp(0.0, 1.0)
}

/// Scale the congestion window down by `alpha / 2`, keeping at least one
/// segment.
pub fn reduce_cwnd(cwnd: u64, alpha: f64, segment_size: u64) -> u64 {
    let val = ((1.0 - alpha / 2.0) * cwnd as f64) as u64;
    cmp::max(val, segment_size)
}
