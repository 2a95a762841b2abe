use futures::{Async, Future, Poll};
use slog::Logger;
use std::collections::VecDeque;
use std::sync::Arc;
use trackable::error::ErrorKindExt;

use crate::epoch::RetryPolicy;
use crate::metrics::GatewayMetrics;
use crate::net::{self, Transport};
use crate::oid::ObjectId;
use crate::protocol::{RequestHeader, Response};
use crate::request::Request;
use crate::ring::{NodeId, Vnode};
use crate::store::LocalStore;
use crate::util::BoxFuture;
use crate::{Error, ErrorKind};

/// Reads one copy of an object.
///
/// The local copy is tried first (once, if any). After that, the remote
/// replicas are tried one by one, starting from `offset` and wrapping around,
/// until one of them answers with success.
pub(super) struct ReadObject<N: Transport> {
    logger: Logger,
    metrics: GatewayMetrics,
    network: Arc<N>,
    oid: ObjectId,
    header: RequestHeader,
    retry: RetryPolicy,
    local: Option<BoxFuture<Response>>,
    remote: Option<(NodeId, BoxFuture<Response>)>,
    candidates: VecDeque<NodeId>,
    last_error: Option<Error>,
}
impl<N: Transport> ReadObject<N> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        logger: Logger,
        metrics: GatewayMetrics,
        network: Arc<N>,
        store: &dyn LocalStore,
        req: &Request,
        vnodes: &[Vnode],
        offset: usize,
        retry: RetryPolicy,
    ) -> Self {
        let local = vnodes
            .iter()
            .find(|v| req.vnodes.is_local(v))
            .map(|_| store.read_local(req));

        let mut candidates = VecDeque::with_capacity(vnodes.len());
        if !vnodes.is_empty() {
            let start = offset % vnodes.len();
            for i in 0..vnodes.len() {
                let v = &vnodes[(start + i) % vnodes.len()];
                if !req.vnodes.is_local(v) {
                    candidates.push_back(v.node);
                }
            }
        }

        ReadObject {
            logger,
            metrics,
            network,
            oid: req.oid(),
            header: req.header.to_forward(),
            retry,
            local,
            remote: None,
            candidates,
            last_error: None,
        }
    }
}
impl<N: Transport> Future for ReadObject<N> {
    type Item = Response;
    type Error = Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        if let Some(future) = self.local.as_mut() {
            match future.poll() {
                Ok(Async::NotReady) => return Ok(Async::NotReady),
                Ok(Async::Ready(response)) => return Ok(Async::Ready(response)),
                Err(e) => {
                    error!(self.logger, "Local read failed: oid={}, error={}", self.oid, e);
                    self.metrics.local_read_failures_total.increment();
                    self.last_error = Some(e);
                }
            }
            self.local = None;
        }

        loop {
            if let Some((node, future)) = self.remote.as_mut() {
                match future.poll() {
                    Ok(Async::NotReady) => return Ok(Async::NotReady),
                    Ok(Async::Ready(response)) => return Ok(Async::Ready(response)),
                    Err(e) => {
                        debug!(
                            self.logger,
                            "Remote read failed: oid={}, node={}, error={}", self.oid, node, e
                        );
                        self.last_error = Some(e);
                    }
                }
                self.remote = None;
            }

            let node = match self.candidates.pop_front() {
                Some(node) => node,
                None => {
                    let e = self.last_error.take().unwrap_or_else(|| {
                        ErrorKind::Other
                            .cause(format!("No replica to read from: oid={}", self.oid))
                            .into()
                    });
                    return Err(track!(e));
                }
            };
            self.metrics.remote_reads_total.increment();
            let future = net::exec_req(
                &self.network,
                node,
                self.header,
                Arc::new(Vec::new()),
                self.retry.clone(),
            );
            self.remote = Some((node, future));
        }
    }
}
