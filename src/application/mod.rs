//! Application services: the content source contract and the cached façade.

pub mod blog;
pub mod error;
pub mod pagination;
pub mod repos;
