//! Property-based tests for sequence-space predicates and the slow-start
//! window.

use proptest::prelude::*;

use netbench_stack::congestion::SlowStart;
use netbench_stack::seq::SeqSpace;

/// Valid (modulus, window) pairs.
fn space() -> impl Strategy<Value = SeqSpace> {
    (2u16..=128)
        .prop_flat_map(|m| (Just(m), 1..m))
        .prop_map(|(m, w)| SeqSpace::new(m, w).unwrap())
}

proptest! {
    #[test]
    fn full_is_not_strict_range(space in space(), a in any::<u16>(), b in any::<u16>()) {
        let (min, max) = (space.seq(a), space.seq(b));
        prop_assert_eq!(space.is_full(min, max), !space.within_strict_range(min, max));
    }

    #[test]
    fn strict_implies_inclusive(space in space(), a in any::<u16>(), b in any::<u16>()) {
        let (min, max) = (space.seq(a), space.seq(b));
        if space.within_strict_range(min, max) {
            prop_assert!(space.within_inclusive_range(min, max));
        }
    }

    #[test]
    fn receiver_accepts_exactly_window_numbers(space in space(), rn in any::<u16>()) {
        let rn = space.seq(rn);
        let accepted = (0..space.modulus())
            .filter(|&sn| space.accept_frame(space.seq(sn), rn))
            .count();
        prop_assert_eq!(accepted, usize::from(space.window()));
    }

    #[test]
    fn distance_inverts_add(space in space(), n in any::<u16>(), delta in any::<u16>()) {
        let start = space.seq(n);
        let end = space.add(start, delta);
        prop_assert_eq!(space.distance(start, end), delta % space.modulus());
    }

    #[test]
    fn acknowledgment_retires_between_one_and_outstanding(
        space in space(),
        min in any::<u16>(),
        outstanding in any::<u16>(),
        ack in any::<u16>(),
    ) {
        let sn_min = space.seq(min);
        let sn_max = space.add(sn_min, outstanding % (space.window() + 1));
        let ack = space.seq(ack);
        if space.acknowledges(sn_min, ack, sn_max) {
            let retired = space.distance(sn_min, ack);
            prop_assert!(retired >= 1);
            prop_assert!(retired <= space.distance(sn_min, sn_max));
        }
    }

    #[test]
    fn congestion_window_stays_within_bounds(
        events in prop::collection::vec((1u64..20_000, any::<bool>()), 1..64),
    ) {
        let mut ss = SlowStart::new(100, 100, 800, 6400);
        for (receiver_window, timeout) in events {
            ss.on_ack(receiver_window, timeout);
            prop_assert!(ss.cwnd() >= 100);
            prop_assert!(ss.cwnd() <= ss.receiver_window());
            prop_assert_eq!(ss.cwnd() % 100, 0);
        }
    }
}
