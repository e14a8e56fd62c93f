//! # Protocol Statistics
//!
//! Counters kept by each link and connection. Serialized as part of the
//! harness's scenario report.

use serde::Serialize;

// ─── Link Stats ─────────────────────────────────────────────────────────────

/// Per-interface Go-Back-N counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Data frames put on the wire (first transmissions only).
    pub frames_sent: u64,
    /// Data frames resent from the window.
    pub retransmissions: u64,
    /// Pure acknowledgment frames sent.
    pub supervisory_sent: u64,
    /// Frames that decoded cleanly.
    pub frames_received: u64,
    /// Payloads handed to the layer above.
    pub frames_delivered: u64,
    /// Frames discarded because the integrity check failed.
    pub integrity_failures: u64,
    /// Data frames outside the receive window.
    pub out_of_window: u64,
    /// In-window data frames dropped because they were not the next expected.
    pub out_of_order: u64,
    /// Outstanding frames released by acknowledgments.
    pub frames_acked: u64,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retransmission overhead ratio.
    pub fn retransmit_ratio(&self) -> f64 {
        if self.frames_sent == 0 {
            0.0
        } else {
            self.retransmissions as f64 / self.frames_sent as f64
        }
    }
}

// ─── Transport Stats ────────────────────────────────────────────────────────

/// Sending side of one transport connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    pub segments_sent: u64,
    pub bytes_sent: u64,
    /// Segments resent because the oldest slot outlived twice the RTT.
    pub fast_retransmits: u64,
    /// Segments resent because they outlived the RTT estimate.
    pub timeout_retransmits: u64,
    pub acks_received: u64,
    pub bytes_acked: u64,
    pub syn_sent: u64,
    pub fin_sent: u64,
    /// Last RTT sample in ticks.
    pub last_rtt: u64,
    /// Largest congestion window reached, in bytes.
    pub peak_cwnd: u64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }
}

// ─── Receiver Stats ─────────────────────────────────────────────────────────

/// Receiving side of one transport connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    pub segments_received: u64,
    /// Stream bytes delivered in order.
    pub bytes_delivered: u64,
    /// Segments entirely below the next expected offset.
    pub duplicates: u64,
    /// Segments held back waiting for a gap to fill.
    pub out_of_order: u64,
    /// Segments beyond the advertised window.
    pub beyond_window: u64,
    pub acks_sent: u64,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retransmit_ratio_handles_zero() {
        let mut stats = LinkStats::new();
        assert_eq!(stats.retransmit_ratio(), 0.0);
        stats.frames_sent = 4;
        stats.retransmissions = 1;
        assert!((stats.retransmit_ratio() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn stats_serialize_as_flat_objects() {
        let json = serde_json::to_string(&TransportStats::new()).unwrap();
        assert!(json.contains("\"fast_retransmits\":0"));
    }
}
