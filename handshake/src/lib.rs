//! Void handshake: loads the mission secret once at startup, checks candidates
//! against it, and can keep a tamper-evident record of every outcome.

pub mod audit;
pub mod config;
pub mod handshake;
pub mod verifier;
