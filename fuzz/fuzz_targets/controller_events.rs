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

#![no_main]

use std::time::Duration;
use std::time::Instant;

use libfuzzer_sys::fuzz_target;

use d2tcp::build_congestion_controller;
use d2tcp::CaEvent;
use d2tcp::CongestionConfig;
use d2tcp::EcnState;
use d2tcp::SeqNum;
use d2tcp::TcpSocketState;

// Each input byte pair is one event on a single connection.
fuzz_target!(|data: &[u8]| {
    let conf = CongestionConfig::new();
    let mut tcb = TcpSocketState::from(&conf);
    let mut cc = build_congestion_controller(&conf).unwrap();
    cc.init(&mut tcb).unwrap();

    let start = Instant::now();
    tcb.deadline = Some(start + Duration::from_millis(50));
    tcb.tx_total = 1 << 20;

    let mut now = start;
    // rcv_nxt at the last CE transition, the only point a flush may ack.
    let mut prior_rcv_nxt: Option<SeqNum> = None;
    for ev in data.chunks(2) {
        let arg = *ev.get(1).unwrap_or(&0) as u32;
        let kind = ev[0] % 8;
        let rcv_nxt = tcb.rcv_nxt;
        match kind {
            0 => {
                tcb.ecn_state = if arg & 1 == 1 {
                    EcnState::EceRcvd
                } else {
                    EcnState::Idle
                };
                tcb.last_acked_seq = tcb.last_acked_seq + arg * 100;
                if tcb.next_tx_seq < tcb.last_acked_seq {
                    tcb.next_tx_seq = tcb.last_acked_seq;
                }
                cc.on_packets_acked(&mut tcb, arg % 16, Duration::from_micros(arg as u64), now);
            }
            1 => tcb.next_tx_seq = tcb.next_tx_seq + arg * 1448,
            2 => {
                cc.on_congestion_event(&mut tcb);
                assert!(tcb.cwnd >= tcb.segment_size);
            }
            3 => cc.on_state_event(&mut tcb, CaEvent::EcnIsCe),
            4 => cc.on_state_event(&mut tcb, CaEvent::EcnNoCe),
            5 => cc.on_state_event(&mut tcb, CaEvent::DelayedAck),
            6 => cc.on_state_event(&mut tcb, CaEvent::NonDelayedAck),
            _ => {
                tcb.rcv_nxt = tcb.rcv_nxt + arg;
                now += Duration::from_micros(arg as u64 * 10);
            }
        }

        if kind != 7 {
            assert_eq!(tcb.rcv_nxt, rcv_nxt);
        }

        let acks = tcb.take_ack_requests();
        assert!(acks.len() <= 1);
        for ack in acks {
            assert!(kind == 3 || kind == 4);
            assert_eq!(Some(ack.ack_seq), prior_rcv_nxt);
            assert_eq!(ack.ece, kind == 4);
        }
        if kind == 3 || kind == 4 {
            prior_rcv_nxt = Some(rcv_nxt);
        }

        let alpha = cc.alpha().unwrap();
        assert!((0.0..=1.0).contains(&alpha));
    }
});
