//! `replydraft`: drafts replies to unread mail, grounded in previously
//! sent messages.
//!
//! This crate provides the core library: embedding and indexing a corpus of
//! sent mail, retrieving context for new messages, generating replies, and
//! the poll loop that turns unread mail into saved drafts.

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod poll;
pub mod retrieval;
pub mod store;
