//! Local collaborators of the gateway: the object store and the object cache.
use crate::protocol::Response;
use crate::request::Request;
use crate::util::BoxFuture;

/// The on-disk object store of the local node.
pub trait LocalStore: Send + Sync + 'static {
    /// Reads the object targeted by `request` from local storage.
    ///
    /// A missing or unreadable object fails with `ErrorKind::Remote` carrying
    /// the store's result code.
    fn read_local(&self, request: &Request) -> BoxFuture<Response>;
}

/// The object cache layer of the local node.
pub trait ObjectCache: Send + Sync + 'static {
    /// Serves `request` entirely from the cache layer.
    fn handle_request(&self, request: Request) -> BoxFuture<Response>;
}
