//! Audit trail for handshake outcomes: a hash-chained JSON Lines ledger and
//! the digest helpers that seal its entries.

pub mod integrity;
pub mod ledger;
