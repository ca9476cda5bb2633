//! Domain layer: content entities, invariants and the pure relevance engine.

pub mod entities;
pub mod error;
pub mod posts;
pub mod relevance;
pub mod slug;
pub mod types;
