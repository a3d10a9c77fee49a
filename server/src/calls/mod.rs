//! Call signaling between two users, plus the separate call-history record.
//!
//! The relay only forwards events to a live connection and never persists
//! anything; history is written by clients through REST once a call is over.

pub mod history;
pub mod relay;
