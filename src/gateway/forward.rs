use futures::{Async, Future, Poll};
use slog::Logger;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::wait::WaitForward;
use crate::config::GatewayConfig;
use crate::epoch::RetryPolicy;
use crate::metrics::GatewayMetrics;
use crate::net::{self, ConnectionPool, Payload, Transport};
use crate::oid::ObjectId;
use crate::protocol::Response;
use crate::request::Request;
use crate::ring::NodeId;
use crate::util::{BoxFuture, Phase};
use crate::{Error, ErrorKind, Result};

/// The in-flight replica exchanges of a single forwarded request.
///
/// Each entry owns a connection on which a request has been sent and whose
/// response has not been consumed yet. An entry leaves the session exactly
/// once: its connection is released when the exchange completed, evicted
/// otherwise. Dropping the session evicts whatever is left.
pub(super) struct ForwardSession<N: ConnectionPool> {
    network: Arc<N>,
    metrics: GatewayMetrics,
    entries: Vec<ForwardEntry<N::Connection>>,
    capacity: usize,
}
impl<N: ConnectionPool> ForwardSession<N> {
    pub fn new(network: Arc<N>, metrics: GatewayMetrics, capacity: usize) -> Self {
        ForwardSession {
            network,
            metrics,
            entries: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers an exchange whose request has been fully sent.
    pub fn advance(
        &mut self,
        node: NodeId,
        connection: N::Connection,
        response: BoxFuture<Response>,
    ) -> Result<()> {
        if self.entries.len() >= self.capacity {
            self.network.evict(&node, connection);
            self.metrics.evicted_connections_total.increment();
            track_panic!(
                ErrorKind::Other,
                "Too many forward entries: capacity={}",
                self.capacity
            );
        }
        self.entries.push(ForwardEntry {
            node,
            connection,
            response,
        });
        Ok(())
    }

    /// Polls the pending exchanges and returns the first one that completed.
    pub fn poll_completion(&mut self) -> Option<(NodeId, Result<Response>)> {
        let mut i = 0;
        while i < self.entries.len() {
            match self.entries[i].response.poll() {
                Ok(Async::NotReady) => {
                    i += 1;
                }
                Ok(Async::Ready(response)) => {
                    let entry = self.entries.swap_remove(i);
                    let node = entry.node;
                    self.network.release(&entry.node, entry.connection);
                    return Some((node, Ok(response)));
                }
                Err(e) => {
                    let entry = self.entries.swap_remove(i);
                    let node = entry.node;
                    self.evict(entry);
                    return Some((node, Err(e)));
                }
            }
        }
        None
    }

    /// Evicts every pending entry and returns how many there were.
    pub fn evict_all(&mut self) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..).collect::<Vec<_>>() {
            self.evict(entry);
        }
        count
    }

    fn evict(&self, entry: ForwardEntry<N::Connection>) {
        self.network.evict(&entry.node, entry.connection);
        self.metrics.evicted_connections_total.increment();
    }
}
impl<N: ConnectionPool> Drop for ForwardSession<N> {
    fn drop(&mut self) {
        self.evict_all();
    }
}

struct ForwardEntry<C> {
    node: NodeId,
    connection: C,
    response: BoxFuture<Response>,
}

/// Sends the request to every acquired connection, concurrently.
///
/// Resolves to the session of the successfully sent exchanges and the first
/// error observed while acquiring or sending, if any.
struct SendAll<N: Transport> {
    logger: Logger,
    oid: ObjectId,
    network: Arc<N>,
    metrics: GatewayMetrics,
    retry: RetryPolicy,
    sending: Vec<(NodeId, N::Connection, BoxFuture<()>)>,
    session: Option<ForwardSession<N>>,
    error: Option<Error>,
}
impl<N: Transport> Future for SendAll<N> {
    type Item = (ForwardSession<N>, Option<Error>);
    type Error = Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        let mut i = 0;
        while i < self.sending.len() {
            match self.sending[i].2.poll() {
                Ok(Async::NotReady) => {
                    i += 1;
                }
                Ok(Async::Ready(())) => {
                    let (node, connection, _) = self.sending.swap_remove(i);
                    let response = self.network.recv(&connection, &self.retry);
                    let session = track_assert_some!(self.session.as_mut(), ErrorKind::Other);
                    if let Err(e) = track!(session.advance(node, connection, response)) {
                        self.error.get_or_insert(e);
                    }
                }
                Err(e) => {
                    let (node, connection, _) = self.sending.swap_remove(i);
                    warn!(
                        self.logger,
                        "Cannot send the request: oid={}, node={}, error={}", self.oid, node, e
                    );
                    self.network.evict(&node, connection);
                    self.network.evict_node(&node);
                    self.metrics.evicted_connections_total.increment();
                    self.error.get_or_insert(track!(net::network_error(e)));
                }
            }
        }
        if !self.sending.is_empty() {
            return Ok(Async::NotReady);
        }

        let session = track_assert_some!(self.session.take(), ErrorKind::Other);
        Ok(Async::Ready((session, self.error.take())))
    }
}
impl<N: Transport> Drop for SendAll<N> {
    fn drop(&mut self) {
        for (node, connection, _) in self.sending.drain(..) {
            self.network.evict(&node, connection);
            self.metrics.evicted_connections_total.increment();
        }
    }
}

/// Forwards a write-class request to every replica and waits for all of them.
///
/// Acquisition stops at the first node whose connection cannot be obtained.
/// A send failure only drops that node. Whatever was sent successfully is
/// always awaited before the request completes. The first error observed
/// during the wait wins; otherwise the first send-phase error is reported.
pub(super) struct ForwardRequest<N: Transport> {
    logger: Logger,
    oid: ObjectId,
    metrics: GatewayMetrics,
    retry: RetryPolicy,
    poll_timeout: Duration,
    phase: Phase<SendAll<N>, WaitForward<N>>,
    send_error: Option<Error>,
}
impl<N: Transport> ForwardRequest<N> {
    pub fn new(
        logger: Logger,
        metrics: GatewayMetrics,
        network: Arc<N>,
        config: &GatewayConfig,
        req: Request,
        copies: usize,
        retry: RetryPolicy,
    ) -> Self {
        let oid = req.oid();
        let header = req.header.to_forward();
        let mut seen = HashSet::new();
        let nodes = req
            .vnodes
            .physical_nodes_for(oid, copies)
            .into_iter()
            .filter(|n| seen.insert(*n))
            .collect::<Vec<_>>();
        debug!(
            logger,
            "Forwarding {:?}: oid={}, nodes={:?}", header.opcode, oid, nodes
        );

        let payload: Payload = Arc::new(req.data);
        let mut sending = Vec::with_capacity(nodes.len());
        let mut error = None;
        for node in nodes {
            match network.acquire(&node) {
                Err(e) => {
                    warn!(
                        logger,
                        "Cannot acquire a connection: oid={}, node={}, error={}", oid, node, e
                    );
                    error = Some(track!(net::network_error(e)));
                    break;
                }
                Ok(connection) => {
                    let future = network.send(&connection, &header, Arc::clone(&payload), &retry);
                    sending.push((node, connection, future));
                }
            }
        }

        let session = ForwardSession::new(Arc::clone(&network), metrics.clone(), config.max_nodes);
        let send_all = SendAll {
            logger: logger.clone(),
            oid,
            network,
            metrics: metrics.clone(),
            retry: retry.clone(),
            sending,
            session: Some(session),
            error,
        };
        ForwardRequest {
            logger,
            oid,
            metrics,
            retry,
            poll_timeout: config.poll_timeout,
            phase: Phase::A(send_all),
            send_error: None,
        }
    }

    fn finish(&mut self, wait_error: Option<Error>) -> Poll<(), Error> {
        match wait_error.or_else(|| self.send_error.take()) {
            None => Ok(Async::Ready(())),
            Some(e) => {
                self.metrics.forward_failures_total.increment();
                Err(track!(e, "oid={}", self.oid))
            }
        }
    }
}
impl<N: Transport> Future for ForwardRequest<N> {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        loop {
            let next = match self.phase.poll() {
                Err(e) => return self.finish(Some(e)),
                Ok(Async::NotReady) => return Ok(Async::NotReady),
                Ok(Async::Ready(Phase::A((session, send_error)))) => {
                    self.send_error = send_error;
                    if session.is_empty() {
                        return self.finish(None);
                    }
                    WaitForward::new(
                        self.logger.clone(),
                        self.metrics.clone(),
                        self.oid,
                        session,
                        self.retry.clone(),
                        self.poll_timeout,
                    )
                }
                Ok(Async::Ready(Phase::B(()))) => return self.finish(None),
            };
            self.phase = Phase::B(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use futures;
    use trackable::result::TestResult;

    use super::*;
    use crate::test_util::tests::{node, Event, MemoryNetwork};

    #[test]
    fn dropped_session_evicts_pending_entries() -> TestResult {
        let network = Arc::new(MemoryNetwork::new(&[node(1), node(2)]));
        let metrics = track!(GatewayMetrics::new())?;
        let mut session = ForwardSession::new(Arc::clone(&network), metrics.clone(), 2);
        for i in 1..3 {
            let connection = track!(network.acquire(&node(i)))?;
            track!(session.advance(node(i), connection, Box::new(futures::empty())))?;
        }
        assert!(session.poll_completion().is_none());
        assert_eq!(session.len(), 2);

        drop(session);
        assert_eq!(network.count(|e| matches!(e, Event::Evict(_))), 2);
        assert_eq!(network.outstanding(), 0);
        assert_eq!(metrics.evicted_connections_total.value(), 2.0);
        Ok(())
    }

    #[test]
    fn session_is_bounded() -> TestResult {
        let network = Arc::new(MemoryNetwork::new(&[node(1), node(2)]));
        let metrics = track!(GatewayMetrics::new())?;
        let mut session = ForwardSession::new(Arc::clone(&network), metrics, 1);

        let connection = track!(network.acquire(&node(1)))?;
        track!(session.advance(node(1), connection, Box::new(futures::empty())))?;
        let connection = track!(network.acquire(&node(2)))?;
        assert!(session
            .advance(node(2), connection, Box::new(futures::empty()))
            .is_err());
        assert_eq!(network.count(|e| *e == Event::Evict(node(2))), 1);
        assert_eq!(session.evict_all(), 1);
        assert_eq!(network.outstanding(), 0);
        Ok(())
    }
}
