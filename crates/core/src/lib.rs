//! # DataBot Core
//!
//! Domain types, traits, and error definitions for the DataBot chat gateway.
//! This crate has **no framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! Every external collaborator (search index, chat model, reply channel,
//! tokenizer) is a trait here. Implementations live in their respective
//! crates, and tests swap in doubles.

pub mod error;
pub mod message;
pub mod provider;
pub mod search;
pub mod tokenizer;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use search::{Candidate, FallbackPolicy, SearchBackend, SearchRequest, SearchResults};
pub use tokenizer::{HeuristicTokenizer, TiktokenTokenizer, Tokenizer};
pub use turn::{ReplyBuffer, TurnContext};
