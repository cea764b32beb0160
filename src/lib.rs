//! Fishing encounter engine: weighted candidate selection, legendary hunts,
//! timed key-sequence challenges and reward payout, driven by injected
//! randomness and clock instants so every rule stays testable.

pub mod config;
pub mod content;
pub mod engine;
