//! Concurrent assembly of several independent cached queries.

use std::future::Future;

use futures::future::{BoxFuture, FutureExt, try_join_all};

use crate::application::repos::SourceError;

use super::config::CacheOptions;
use super::keys::QueryDescriptor;
use super::store::{CacheError, QueryCache};

type BoxedCompute<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, SourceError>> + Send>;

/// One query of a batch, bound to its own computation and storage options.
pub struct BatchQuery<T> {
    descriptor: QueryDescriptor,
    options: CacheOptions,
    compute: BoxedCompute<T>,
}

impl<T: 'static> BatchQuery<T> {
    pub fn new<F, Fut>(descriptor: QueryDescriptor, options: CacheOptions, compute: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
    {
        Self {
            descriptor,
            options,
            compute: Box::new(move || compute().boxed()),
        }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }
}

impl QueryCache {
    /// Run every query concurrently through the cache.
    ///
    /// Results are positional: the output order matches `queries` regardless
    /// of completion order. The first failure fails the whole batch.
    pub async fn batch_fetch<T>(&self, queries: Vec<BatchQuery<T>>) -> Result<Vec<T>, CacheError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let lookups = queries.into_iter().map(|query| {
            self.get_or_compute(query.descriptor, query.options, query.compute)
        });
        try_join_all(lookups).await
    }
}
