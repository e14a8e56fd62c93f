//! # Slow Start
//!
//! Congestion window policy for the transport sender, in bytes, always a
//! whole number of segments.
//!
//! - Start at one segment.
//! - Below the threshold, double on every acknowledgment.
//! - At or above the threshold, grow by one segment per acknowledgment.
//! - On a timeout, halve the threshold and fall back to one segment.
//!
//! The window never exceeds what the receiver advertises.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowStart {
    cwnd: u64,
    ssthresh: u64,
    segment_size: u64,
    receiver_window: u64,
}

impl SlowStart {
    pub fn new(segment_size: u64, initial_window: u64, ssthresh: u64, receiver_window: u64) -> Self {
        let segment_size = segment_size.max(1);
        let receiver_window = align_down(receiver_window, segment_size);
        SlowStart {
            cwnd: align_down(initial_window, segment_size).min(receiver_window),
            ssthresh: align_down(ssthresh, segment_size),
            segment_size,
            receiver_window,
        }
    }

    /// Adjust the window after an acknowledgment that advanced the send
    /// window.
    pub fn on_ack(&mut self, receiver_window: u64, timeout_occurred: bool) {
        self.receiver_window = align_down(receiver_window, self.segment_size);

        if timeout_occurred {
            self.ssthresh = align_down(self.cwnd / 2, self.segment_size);
            self.cwnd = self.segment_size;
            tracing::debug!(ssthresh = self.ssthresh, "timeout, restarting slow start");
        } else if self.cwnd < self.ssthresh {
            self.cwnd = self.cwnd.saturating_mul(2);
        } else {
            self.cwnd = self.cwnd.saturating_add(self.segment_size);
        }

        self.cwnd = self.cwnd.min(self.receiver_window);
        tracing::trace!(cwnd = self.cwnd, ssthresh = self.ssthresh, "congestion window updated");
    }

    /// Track a new advertisement without counting it as an acknowledgment.
    pub fn set_receiver_window(&mut self, receiver_window: u64) {
        self.receiver_window = align_down(receiver_window, self.segment_size);
        self.cwnd = self.cwnd.min(self.receiver_window);
    }

    pub fn cwnd(&self) -> u64 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u64 {
        self.ssthresh
    }

    pub fn receiver_window(&self) -> u64 {
        self.receiver_window
    }

    pub fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }
}

/// Round down to a whole number of segments, never below one.
fn align_down(bytes: u64, segment_size: u64) -> u64 {
    (bytes / segment_size * segment_size).max(segment_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEG: u64 = 100;

    #[test]
    fn doubles_to_threshold_then_grows_linearly() {
        let mut ss = SlowStart::new(SEG, SEG, 4 * SEG, 64 * SEG);
        assert_eq!(ss.cwnd(), SEG);

        ss.on_ack(64 * SEG, false);
        assert_eq!(ss.cwnd(), 2 * SEG);
        ss.on_ack(64 * SEG, false);
        assert_eq!(ss.cwnd(), 4 * SEG);
        assert!(!ss.in_slow_start());

        ss.on_ack(64 * SEG, false);
        assert_eq!(ss.cwnd(), 5 * SEG);
        ss.on_ack(64 * SEG, false);
        assert_eq!(ss.cwnd(), 6 * SEG);

        ss.on_ack(64 * SEG, true);
        assert_eq!(ss.ssthresh(), 3 * SEG);
        assert_eq!(ss.cwnd(), SEG);
    }

    #[test]
    fn first_ack_doubles_initial_window() {
        let mut ss = SlowStart::new(SEG, SEG, 8 * SEG, 64 * SEG);
        ss.on_ack(64 * SEG, false);
        assert_eq!(ss.cwnd(), 200);
    }

    #[test]
    fn capped_by_receiver_window() {
        let mut ss = SlowStart::new(SEG, SEG, 100 * SEG, 3 * SEG);
        ss.on_ack(3 * SEG, false);
        ss.on_ack(3 * SEG, false);
        assert_eq!(ss.cwnd(), 3 * SEG);

        // Advertisement shrinks, window follows.
        ss.on_ack(250, false);
        assert_eq!(ss.cwnd(), 2 * SEG);
    }

    #[test]
    fn never_drops_below_one_segment() {
        let mut ss = SlowStart::new(SEG, SEG, 4 * SEG, 64 * SEG);
        ss.on_ack(64 * SEG, true);
        assert_eq!(ss.cwnd(), SEG);
        assert_eq!(ss.ssthresh(), SEG);
        ss.on_ack(0, false);
        assert_eq!(ss.cwnd(), SEG);
    }
}
