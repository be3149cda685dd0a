//! Core data model: historical corpus items, inbound messages, and drafts.

pub mod draft;
pub mod item;
