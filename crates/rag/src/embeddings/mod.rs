//! Query embedding providers.
//!
//! The provider must match the one the corpus was embedded with, otherwise
//! similarity scores are meaningless.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
