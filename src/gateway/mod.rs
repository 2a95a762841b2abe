use futures::{self, Future};
use rand;
use slog::Logger;
use std::cmp;
use std::fmt;
use std::sync::Arc;
use trackable::error::ErrorKindExt;

use self::forward::ForwardRequest;
use self::read::ReadObject;
use crate::config::GatewayConfig;
use crate::epoch::{EpochOracle, RetryPolicy};
use crate::metrics::GatewayMetrics;
use crate::net::Transport;
use crate::oid::ReadOnlyRanges;
use crate::protocol::{Opcode, Response};
use crate::request::Request;
use crate::store::{LocalStore, ObjectCache};
use crate::util::BoxFuture;
use crate::{Error, ErrorKind, Result};

mod forward;
mod read;
mod wait;

macro_rules! future_try {
    ($e:expr) => {
        match $e {
            Err(e) => return Box::new(futures::failed(track!(e))),
            Ok(v) => v,
        }
    };
}

/// The replication gateway.
///
/// Decides, for every object request, which replicas are involved and drives
/// the request to them. Every entry point returns a future that runs the
/// whole exchange to completion; no replica exchange outlives it.
pub struct Gateway<N> {
    logger: Logger,
    config: Arc<GatewayConfig>,
    readonly: Arc<ReadOnlyRanges>,
    metrics: GatewayMetrics,
    network: Arc<N>,
    store: Arc<dyn LocalStore>,
    cache: Option<Arc<dyn ObjectCache>>,
    epoch: Arc<dyn EpochOracle>,
}
impl<N: Transport> Gateway<N> {
    /// 新しい`Gateway`インスタンスを生成する。
    pub fn new(
        logger: Logger,
        config: GatewayConfig,
        network: N,
        store: Arc<dyn LocalStore>,
        epoch: Arc<dyn EpochOracle>,
    ) -> Result<Self> {
        track!(config.validate())?;
        let metrics = track!(GatewayMetrics::new())?;
        Ok(Gateway {
            logger,
            readonly: Arc::new(config.readonly_ranges()),
            config: Arc::new(config),
            metrics,
            network: Arc::new(network),
            store,
            cache: None,
            epoch,
        })
    }

    /// Installs the object cache layer.
    ///
    /// The cache is only consulted when `enable_object_cache` is set.
    pub fn with_object_cache(mut self, cache: Arc<dyn ObjectCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Returns the network collaborator.
    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    /// Routes `req` to the entry point that matches its opcode.
    pub fn handle(&self, req: Request) -> BoxFuture<Response> {
        let header = req.header;
        let future = match header.opcode {
            Opcode::ReadObj => return self.read_obj(req),
            Opcode::WriteObj => self.write_obj(req),
            Opcode::CreateAndWriteObj => self.create_and_write_obj(req),
            Opcode::RemoveObj => self.remove_obj(req),
            op => {
                let e = ErrorKind::InvalidInput.cause(format!("Unsupported opcode: {:?}", op));
                return Box::new(futures::failed(track!(Error::from(e))));
            }
        };
        Box::new(future.and_then(move |()| track!(Response::ok(&header, Vec::new()))))
    }

    /// Reads one copy of the object, trying the local copy first.
    ///
    /// If the local copy is missing or fails, the remote copies are tried one
    /// by one from a random starting point, each with a single attempt.
    pub fn read_obj(&self, req: Request) -> BoxFuture<Response> {
        self.read_obj_from(req, rand::random())
    }

    /// Writes the object to every replica.
    pub fn write_obj(&self, req: Request) -> BoxFuture<()> {
        self.write_class_obj(req)
    }

    /// Creates the object and writes it to every replica.
    pub fn create_and_write_obj(&self, req: Request) -> BoxFuture<()> {
        self.write_class_obj(req)
    }

    /// Removes the object from every replica.
    ///
    /// Removals never go through the object cache.
    pub fn remove_obj(&self, req: Request) -> BoxFuture<()> {
        self.forward_request(req)
    }

    /// `read_obj` with an explicit starting offset for the remote pass.
    fn read_obj_from(&self, req: Request, offset: usize) -> BoxFuture<Response> {
        if !req.local {
            if let Some(cache) = self.object_cache_for(&req) {
                return self.delegate_to_cache(&*cache, req);
            }
        }

        let copies = future_try!(self.copy_number(&req));
        let vnodes = req.vnodes.virtual_nodes_for(req.oid(), copies);
        let future = ReadObject::new(
            self.logger.clone(),
            self.metrics.clone(),
            Arc::clone(&self.network),
            &*self.store,
            &req,
            &vnodes,
            offset,
            self.retry_policy(&req),
        );
        Box::new(future)
    }

    fn write_class_obj(&self, req: Request) -> BoxFuture<()> {
        let oid = req.oid();
        if self.readonly.is_readonly(oid) {
            let e = ErrorKind::ReadOnly.cause(format!("oid={}", oid));
            return Box::new(futures::failed(track!(Error::from(e))));
        }
        if let Some(cache) = self.object_cache_for(&req) {
            return Box::new(self.delegate_to_cache(&*cache, req).map(|_| ()));
        }
        self.forward_request(req)
    }

    fn forward_request(&self, req: Request) -> BoxFuture<()> {
        let copies = future_try!(self.copy_number(&req));
        let retry = self.retry_policy(&req);
        self.metrics.forward_requests_total.increment();
        let future = ForwardRequest::new(
            self.logger.clone(),
            self.metrics.clone(),
            Arc::clone(&self.network),
            &self.config,
            req,
            copies,
            retry,
        );
        Box::new(future)
    }

    /// Serves `req` from the object cache.
    ///
    /// A response carrying a non-success result code fails with the
    /// corresponding error.
    fn delegate_to_cache(&self, cache: &dyn ObjectCache, req: Request) -> BoxFuture<Response> {
        let oid = req.oid();
        self.metrics.cache_requests_total.increment();
        let future = cache.handle_request(req).and_then(move |response| {
            let result = response.header.result;
            if result.is_success() {
                Ok(response)
            } else {
                Err(track!(Error::from(result), "oid={}", oid))
            }
        });
        Box::new(future)
    }

    /// Returns the object cache that serves `req`, unless the request bypasses it.
    fn object_cache_for(&self, req: &Request) -> Option<Arc<dyn ObjectCache>> {
        if !self.config.enable_object_cache
            || req.header.is_direct()
            || !req.oid().is_cacheable()
        {
            return None;
        }
        self.cache.clone()
    }

    /// Returns the replication factor of `req`.
    fn copy_number(&self, req: &Request) -> Result<usize> {
        let requested = match req.header.copies {
            0 => self.config.default_copies,
            n => n,
        };
        let requested = usize::from(requested);
        track_assert!(
            requested <= self.config.max_copies,
            ErrorKind::InvalidInput,
            "Too many copies: requested={}, max={}",
            requested,
            self.config.max_copies
        );

        let nodes = req.vnodes.node_count();
        track_assert_ne!(nodes, 0, ErrorKind::Other, "No nodes in the cluster");
        Ok(cmp::min(requested, nodes))
    }

    fn retry_policy(&self, req: &Request) -> RetryPolicy {
        self.config
            .retry_policy(req.header.epoch, Arc::clone(&self.epoch))
    }
}
impl<N> Clone for Gateway<N> {
    fn clone(&self) -> Self {
        Gateway {
            logger: self.logger.clone(),
            config: Arc::clone(&self.config),
            readonly: Arc::clone(&self.readonly),
            metrics: self.metrics.clone(),
            network: Arc::clone(&self.network),
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            epoch: Arc::clone(&self.epoch),
        }
    }
}
impl<N> fmt::Debug for Gateway<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Gateway {{ config: {:?}, .. }}", self.config)
    }
}
