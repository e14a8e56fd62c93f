//! # netbench-stack
//!
//! Protocol core of the netbench workbench: a layered reliable-communication
//! stack driven by an external discrete-event clock.
//!
//! Every component here is pure logic. Time is read through an injected
//! [`time::Scheduler`], frames and segments are handed back to the caller for
//! transmission, and nothing performs I/O.
//!
//! ## Crate structure
//!
//! - [`backoff`] — Binary exponential backoff for contention interfaces
//! - [`bits`] — Owned bit sequences
//! - [`framer`] — Bit stuffing and flag delimiting
//! - [`seq`] — Modular sequence-number arithmetic and window predicates
//! - [`frame`] — Data-link frame codec with CRC-16 integrity code
//! - [`link`] — Go-Back-N ARQ state machine
//! - [`segment`] — Transport segment format
//! - [`ring`] — Ring buffer of unacknowledged segments
//! - [`congestion`] — Slow-start congestion window
//! - [`sender`] — Transport send window (segmentation, RTT, retransmission)
//! - [`receiver`] — Transport receive side (reassembly, cumulative ACKs)
//! - [`time`] — Simulated time, clock/scheduler capabilities
//! - [`stats`] — Per-link and per-connection counters
//! - [`error`] — Error taxonomy

pub mod backoff;
pub mod bits;
pub mod congestion;
pub mod error;
pub mod frame;
pub mod framer;
pub mod link;
pub mod receiver;
pub mod ring;
pub mod segment;
pub mod sender;
pub mod seq;
pub mod stats;
pub mod time;

pub use error::{Result, StackError};
