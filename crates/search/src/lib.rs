//! Document retrieval for DataBot.
//!
//! - [`AzureSearchClient`]: `SearchBackend` over the Azure AI Search REST API
//! - [`RetrievalAssembler`]: queries a backend and packs results into a
//!   token-bounded context blob for the planner prompt

pub mod assembler;
pub mod azure;

pub use assembler::{ContextRecord, RenderResult, RetrievalAssembler, RetrievalOptions};
pub use azure::AzureSearchClient;
