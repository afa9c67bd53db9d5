use crate::{DatabaseEndpoint, Result};
use pgcompare_schema::SchemaSnapshot;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed `Send` future, the return type of [`SchemaLoader::load`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can capture a [`SchemaSnapshot`] from an endpoint.
///
/// Every call must produce a fresh, independently owned snapshot and must
/// release whatever connection it opened before returning, on success and on
/// failure alike. Implementations are shared across worker tasks.
///
/// [`crate::PostgresLoader`] is the production implementation.
pub trait SchemaLoader: Send + Sync {
    /// Load the snapshot of `endpoint`'s schema.
    fn load<'a>(&'a self, endpoint: &'a DatabaseEndpoint) -> BoxFuture<'a, Result<SchemaSnapshot>>;
}

impl<L: SchemaLoader + ?Sized> SchemaLoader for Arc<L> {
    fn load<'a>(&'a self, endpoint: &'a DatabaseEndpoint) -> BoxFuture<'a, Result<SchemaSnapshot>> {
        (**self).load(endpoint)
    }
}
