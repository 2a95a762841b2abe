use fibers::time::timer::{self, Timeout};
use futures::{Async, Future, Poll};
use slog::Logger;
use std::time::Duration;

use super::forward::ForwardSession;
use crate::epoch::RetryPolicy;
use crate::metrics::GatewayMetrics;
use crate::net::{self, ConnectionPool};
use crate::oid::ObjectId;
use crate::{Error, ErrorKind};

/// Waits until every exchange of a `ForwardSession` has completed.
///
/// One completed exchange is handled per pass and the poll timeout is
/// re-armed afterwards. When the timeout expires, the wait goes on while the
/// retry budget lasts and the request's epoch still warrants it; otherwise
/// the pending exchanges are evicted and the wait fails.
pub(super) struct WaitForward<N: ConnectionPool> {
    logger: Logger,
    metrics: GatewayMetrics,
    oid: ObjectId,
    session: ForwardSession<N>,
    retry: RetryPolicy,
    retries_left: usize,
    poll_timeout: Duration,
    timeout: Option<Timeout>,
    error: Option<Error>,
}
impl<N: ConnectionPool> WaitForward<N> {
    pub fn new(
        logger: Logger,
        metrics: GatewayMetrics,
        oid: ObjectId,
        session: ForwardSession<N>,
        retry: RetryPolicy,
        poll_timeout: Duration,
    ) -> Self {
        WaitForward {
            logger,
            metrics,
            oid,
            session,
            retries_left: retry.max_retries(),
            retry,
            poll_timeout,
            timeout: None,
            error: None,
        }
    }
}
impl<N: ConnectionPool> Future for WaitForward<N> {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        loop {
            if let Some((node, result)) = self.session.poll_completion() {
                match result {
                    Err(e) => {
                        error!(
                            self.logger,
                            "Remote node might have gone away: oid={}, node={}, error={}",
                            self.oid,
                            node,
                            e
                        );
                        self.error.get_or_insert(track!(net::network_error(e)));
                    }
                    Ok(response) => {
                        let result = response.header.result;
                        if !result.is_success() {
                            error!(
                                self.logger,
                                "Forwarded request failed: oid={}, node={}, result={:?}",
                                self.oid,
                                node,
                                result
                            );
                            self.error
                                .get_or_insert(track!(Error::from(result), "node={}", node));
                        }
                    }
                }
                if self.session.is_empty() {
                    return match self.error.take() {
                        None => Ok(Async::Ready(())),
                        Some(e) => Err(track!(e)),
                    };
                }
                self.timeout = None;
                continue;
            }

            if self.timeout.is_none() {
                self.timeout = Some(timer::timeout(self.poll_timeout));
            }
            match self.timeout.poll() {
                Err(e) => panic!("Poll-wait failed: oid={}, error={}", self.oid, e),
                Ok(Async::NotReady) => return Ok(Async::NotReady),
                Ok(Async::Ready(_)) => {}
            }
            self.timeout = None;
            self.metrics.poll_timeouts_total.increment();

            if self.retry.needs_retry() && self.retries_left > 0 {
                self.retries_left -= 1;
                warn!(
                    self.logger,
                    "Poll timeout: oid={}, pending={}; disks of some nodes or the network \
                     are busy, going to poll-wait again",
                    self.oid,
                    self.session.len()
                );
                continue;
            }

            let pending = self.session.evict_all();
            error!(
                self.logger,
                "Gave up waiting for replicas: oid={}, pending={}", self.oid, pending
            );
            track_panic!(
                ErrorKind::Network,
                "Timed out waiting for {} replica(s): oid={}",
                pending,
                self.oid
            );
        }
    }
}
