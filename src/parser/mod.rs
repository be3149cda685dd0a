//! Email parsing: MBOX splitting and RFC 5322 message decoding.

pub mod mbox;
pub mod message;
