//! Feed ingest service internals.
//!
//! The binary in `main.rs` owns the sockets and the process lifecycle; the
//! `run` module owns the per-datagram state machine so scenario tests can
//! drive it with synthetic datagrams and a stub recovery peer.

pub mod run;
pub mod signal;

pub use run::{ExpectedState, Ingest, IngestOptions, Recovery};
