//! Error taxonomy for the protocol core.
//!
//! Only [`StackError::Collision`] and [`StackError::BufferExhausted`] are
//! meant for the application's attention. Integrity and window errors are
//! returned so the harness can count them; the protocol itself recovers
//! through retransmission.

use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("contention failed after {attempts} backoff attempts")]
    Collision { attempts: u32 },
    #[error("frame failed integrity check")]
    IntegrityFailure,
    #[error("sequence number {sequence} outside receive window starting at {expected}")]
    OutOfWindowFrame { sequence: u16, expected: u16 },
    #[error("no free ring slot for segment at offset {offset} (slot {slot} still unacknowledged)")]
    BufferExhausted { offset: u64, slot: usize },
    #[error("invalid sequence space: window {window} must be in 1..{modulus}")]
    InvalidWindow { window: u16, modulus: u16 },
    #[error("invalid bit character {0:?}")]
    InvalidBit(char),
    #[error("stream already closing; no more data accepted")]
    StreamClosed,
}

pub type Result<T> = std::result::Result<T, StackError>;
