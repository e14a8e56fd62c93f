//! Property-based tests for the Go-Back-N link: random interleavings of
//! enqueues, line polls, lossy deliveries and timer expiries between two
//! ends, checking the window state after every step.

use std::collections::VecDeque;
use std::rc::Rc;

use bytes::Bytes;
use proptest::prelude::*;

use netbench_stack::bits::BitSequence;
use netbench_stack::link::{LinkArq, LinkConfig, SendState};
use netbench_stack::time::ManualClock;

#[derive(Debug, Clone)]
enum Step {
    Enqueue { side: usize },
    Poll { side: usize },
    Deliver { side: usize, drop: bool },
    Advance { ticks: u64 },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => (0..2usize).prop_map(|side| Step::Enqueue { side }),
        3 => (0..2usize).prop_map(|side| Step::Poll { side }),
        3 => (0..2usize, prop::bool::weighted(0.2))
            .prop_map(|(side, drop)| Step::Deliver { side, drop }),
        1 => (1..20u64).prop_map(|ticks| Step::Advance { ticks }),
    ]
}

fn config() -> impl Strategy<Value = LinkConfig> {
    (2u16..=16)
        .prop_flat_map(|m| (Just(m), 1..m, 0..8u64))
        .prop_map(|(modulus, window, retransmit_timeout)| LinkConfig {
            modulus,
            window,
            retransmit_timeout,
        })
}

fn check_window(link: &LinkArq) -> Result<(), TestCaseError> {
    let space = link.space();
    let state = link.window_state();
    let outstanding = space.distance(state.sn_min, state.sn_max);
    prop_assert!(outstanding <= space.window(), "{outstanding} outstanding");
    if state.active {
        prop_assert_eq!(
            state.send_state == SendState::Waiting,
            outstanding == space.window(),
            "state {:?} with {} of {} outstanding",
            state.send_state,
            outstanding,
            space.window()
        );
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn window_state_holds_under_any_interleaving(
        config in config(),
        steps in prop::collection::vec(step(), 1..300),
    ) {
        let clock = Rc::new(ManualClock::new());
        let mut ends = [
            LinkArq::new(1, config, clock.clone()).unwrap(),
            LinkArq::new(2, config, clock.clone()).unwrap(),
        ];
        ends.iter_mut().for_each(LinkArq::initialize);

        // Frames on the line towards side 0 and side 1, in FIFO order.
        let mut lines: [VecDeque<BitSequence>; 2] = [VecDeque::new(), VecDeque::new()];
        let mut written: [Vec<Bytes>; 2] = [Vec::new(), Vec::new()];
        let mut read: [Vec<Bytes>; 2] = [Vec::new(), Vec::new()];

        for step in steps {
            match step {
                Step::Enqueue { side } => {
                    let payload = Bytes::from((written[side].len() as u32).to_be_bytes().to_vec());
                    written[side].push(payload.clone());
                    ends[side].enqueue(payload);
                }
                Step::Poll { side } => {
                    if let Some(out) = ends[side].poll_send() {
                        lines[1 - side].push_back(out.wire);
                    }
                }
                Step::Deliver { side, drop } => {
                    if let Some(wire) = lines[side].pop_front() {
                        if !drop {
                            if let Ok(outcome) = ends[side].on_receive(&wire) {
                                read[side].extend(outcome.delivered);
                            }
                        }
                    }
                }
                Step::Advance { ticks } => {
                    clock.advance(ticks);
                    clock.take_scheduled();
                    for end in &mut ends {
                        end.on_timeout();
                    }
                }
            }
            for end in &ends {
                check_window(end)?;
            }
        }

        // Whatever arrived is an in-order prefix of what the peer wrote.
        for side in 0..2 {
            let peer = &written[1 - side];
            prop_assert!(read[side].len() <= peer.len());
            prop_assert_eq!(&read[side][..], &peer[..read[side].len()]);
        }
    }
}
