//! Connection pool and transport primitives used to talk to peers.
use futures::{self, Future};
use std::sync::Arc;
use trackable::error::ErrorKindExt;

use crate::epoch::RetryPolicy;
use crate::protocol::{RequestHeader, Response};
use crate::ring::NodeId;
use crate::util::BoxFuture;
use crate::{Error, ErrorKind};

/// Payload shared by every replica exchange of a request.
pub type Payload = Arc<Vec<u8>>;

/// A pool of reusable connections keyed by node identity.
///
/// The pool is the only resource shared by concurrent gateway invocations,
/// so implementations must be thread-safe.
pub trait ConnectionPool: Send + Sync + 'static {
    /// A handle of a live connection.
    type Connection: Clone + Send + 'static;

    /// Hands out a connection to `node`, reusing an idle one if possible.
    fn acquire(&self, node: &NodeId) -> Result<Self::Connection, Error>;

    /// Returns a healthy connection to the pool.
    fn release(&self, node: &NodeId, connection: Self::Connection);

    /// Destroys a connection suspected to be faulty; it is never reused.
    fn evict(&self, node: &NodeId, connection: Self::Connection);

    /// Destroys every pooled connection to `node`.
    fn evict_node(&self, node: &NodeId);
}

/// Retry-aware transport primitives.
///
/// Both primitives retry transient timeouts internally, at most
/// `retry.max_retries()` times and only while `retry.needs_retry()` holds.
pub trait Transport: ConnectionPool {
    /// Writes a request header followed by `payload` to `connection`.
    fn send(
        &self,
        connection: &Self::Connection,
        header: &RequestHeader,
        payload: Payload,
        retry: &RetryPolicy,
    ) -> BoxFuture<()>;

    /// Reads a response header (and the data it announces) from `connection`.
    ///
    /// The returned future becoming ready is the readiness notification of
    /// the connection; a hangup or a read failure makes it fail.
    fn recv(&self, connection: &Self::Connection, retry: &RetryPolicy) -> BoxFuture<Response>;
}

/// Normalizes a collaborator error into `ErrorKind::Network`.
pub(crate) fn network_error(e: Error) -> Error {
    if *e.kind() == ErrorKind::Network {
        e
    } else {
        ErrorKind::Network.takes_over(e).into()
    }
}

/// Executes a single-shot request against `node`.
///
/// The connection goes back to the pool once a response header has been
/// read; it is evicted on any network failure. A response carrying a
/// non-success result code fails with `ErrorKind::Remote`.
pub fn exec_req<N: Transport>(
    network: &Arc<N>,
    node: NodeId,
    header: RequestHeader,
    payload: Payload,
    retry: RetryPolicy,
) -> BoxFuture<Response> {
    let connection = match network.acquire(&node) {
        Err(e) => return Box::new(futures::failed(track!(network_error(e)))),
        Ok(c) => c,
    };

    let exchange = {
        let network = Arc::clone(network);
        let connection = connection.clone();
        network
            .send(&connection, &header, payload, &retry)
            .and_then(move |()| network.recv(&connection, &retry))
    };
    let network = Arc::clone(network);
    let future = exchange.then(move |result| match result {
        Err(e) => {
            network.evict(&node, connection);
            Err(track!(network_error(e), "node={}", node))
        }
        Ok(response) => {
            network.release(&node, connection);
            let result = response.header.result;
            if result.is_success() {
                Ok(response)
            } else {
                Err(track!(Error::from(result), "node={}", node))
            }
        }
    });
    Box::new(future)
}
