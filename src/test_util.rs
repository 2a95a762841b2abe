#[cfg(test)]
pub mod tests {
    use futures::{self, Future};
    use slog::{Discard, Logger};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard};
    use trackable::error::ErrorKindExt;
    use trackable::result::TestResult;

    use crate::epoch::{ClusterEpoch, Epoch, RetryPolicy};
    use crate::net::{ConnectionPool, Payload, Transport};
    use crate::oid::ObjectId;
    use crate::protocol::{
        data_length, Opcode, RequestHeader, Response, ResponseHeader, ResultCode,
    };
    use crate::request::Request;
    use crate::ring::{NodeId, ReplicaResolver, Vnode};
    use crate::store::{LocalStore, ObjectCache};
    use crate::util::BoxFuture;
    use crate::{Error, ErrorKind, Result};

    pub fn node(i: u16) -> NodeId {
        NodeId::new(([127, 0, 0, 1], 7000 + i).into())
    }

    pub fn logger() -> Logger {
        Logger::root(Discard, o!())
    }

    /// A retry policy whose epoch is still current.
    pub fn retry_policy(epoch: Epoch) -> RetryPolicy {
        RetryPolicy::new(epoch, 3, Arc::new(ClusterEpoch::new(epoch)))
    }

    /// Injected misbehaviour of a peer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Fault {
        /// No connection can be acquired.
        Acquire,

        /// Sending the request fails.
        Send,

        /// The peer hangs up before answering.
        Recv,

        /// The peer accepts the request but never answers.
        Silent,

        /// The peer answers with the given result code.
        Result(ResultCode),
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Acquire(NodeId),
        Send(NodeId),
        Recv(NodeId),
        Release(NodeId),
        Evict(NodeId),
        EvictNode(NodeId),
    }

    #[derive(Debug, Clone)]
    pub struct MemoryConnection {
        id: u64,
        node: NodeId,
        reply: Arc<Mutex<Option<Response>>>,
    }

    #[derive(Default)]
    struct Peer {
        objects: HashMap<ObjectId, Vec<u8>>,
        fault: Option<Fault>,
    }

    #[derive(Default)]
    struct Inner {
        peers: HashMap<NodeId, Peer>,
        events: Vec<Event>,
        open: HashSet<u64>,
        next_connection_id: u64,
    }

    /// An in-memory cluster implementing the connection pool and the transport.
    #[derive(Clone)]
    pub struct MemoryNetwork {
        inner: Arc<Mutex<Inner>>,
    }
    impl MemoryNetwork {
        pub fn new(nodes: &[NodeId]) -> Self {
            let mut inner = Inner::default();
            for &n in nodes {
                inner.peers.insert(n, Peer::default());
            }
            MemoryNetwork {
                inner: Arc::new(Mutex::new(inner)),
            }
        }

        pub fn put_object(&self, node: NodeId, oid: ObjectId, data: Vec<u8>) {
            let mut inner = self.lock();
            inner.peers.entry(node).or_default().objects.insert(oid, data);
        }

        pub fn object(&self, node: NodeId, oid: ObjectId) -> Option<Vec<u8>> {
            let inner = self.lock();
            inner
                .peers
                .get(&node)
                .and_then(|p| p.objects.get(&oid).cloned())
        }

        pub fn set_fault(&self, node: NodeId, fault: Fault) {
            let mut inner = self.lock();
            inner.peers.entry(node).or_default().fault = Some(fault);
        }

        pub fn events(&self) -> Vec<Event> {
            self.lock().events.clone()
        }

        pub fn count<F>(&self, f: F) -> usize
        where
            F: Fn(&Event) -> bool,
        {
            self.lock().events.iter().filter(|e| f(e)).count()
        }

        /// Number of connections that were neither released nor evicted.
        pub fn outstanding(&self) -> usize {
            self.lock().open.len()
        }

        fn lock(&self) -> MutexGuard<Inner> {
            self.inner.lock().unwrap_or_else(|e| e.into_inner())
        }

        fn close(&self, connection: &MemoryConnection, event: Event) {
            let mut inner = self.lock();
            assert!(
                inner.open.remove(&connection.id),
                "Connection returned twice: {:?}",
                connection
            );
            inner.events.push(event);
        }

        fn serve(&self, node: NodeId, header: &RequestHeader, payload: &[u8]) -> Result<Response> {
            let header = track!(RequestHeader::decode(&header.encode()))?;
            let mut inner = self.lock();
            let peer = track_assert_some!(inner.peers.get_mut(&node), ErrorKind::Network);
            let mut data = Vec::new();
            let result = match (peer.fault, header.opcode) {
                (Some(Fault::Result(code)), _) => code,
                (_, Opcode::WritePeer) | (_, Opcode::CreateAndWritePeer) => {
                    peer.objects.insert(header.oid, payload.to_vec());
                    ResultCode::Success
                }
                (_, Opcode::RemovePeer) => match peer.objects.remove(&header.oid) {
                    Some(_) => ResultCode::Success,
                    None => ResultCode::NoObj,
                },
                (_, Opcode::ReadPeer) => match peer.objects.get(&header.oid) {
                    Some(d) => {
                        data = d.clone();
                        ResultCode::Success
                    }
                    None => ResultCode::NoObj,
                },
                (_, op) => track_panic!(ErrorKind::InvalidInput, "Unexpected opcode: {:?}", op),
            };
            let mut response = ResponseHeader::reply_to(&header, result);
            response.data_length = track!(data_length(&data))?;
            let response = track!(ResponseHeader::decode(&response.encode()))?;
            Ok(Response {
                header: response,
                data,
            })
        }
    }
    impl ConnectionPool for MemoryNetwork {
        type Connection = MemoryConnection;

        fn acquire(&self, node: &NodeId) -> Result<Self::Connection> {
            let mut inner = self.lock();
            inner.events.push(Event::Acquire(*node));
            let fault = match inner.peers.get(node) {
                None => track_panic!(ErrorKind::Network, "Unknown node: {}", node),
                Some(peer) => peer.fault,
            };
            track_assert_ne!(fault, Some(Fault::Acquire), ErrorKind::Network);

            let id = inner.next_connection_id;
            inner.next_connection_id += 1;
            inner.open.insert(id);
            Ok(MemoryConnection {
                id,
                node: *node,
                reply: Arc::new(Mutex::new(None)),
            })
        }

        fn release(&self, node: &NodeId, connection: Self::Connection) {
            self.close(&connection, Event::Release(*node));
        }

        fn evict(&self, node: &NodeId, connection: Self::Connection) {
            self.close(&connection, Event::Evict(*node));
        }

        fn evict_node(&self, node: &NodeId) {
            self.lock().events.push(Event::EvictNode(*node));
        }
    }
    impl Transport for MemoryNetwork {
        fn send(
            &self,
            connection: &Self::Connection,
            header: &RequestHeader,
            payload: Payload,
            _retry: &RetryPolicy,
        ) -> BoxFuture<()> {
            let node = connection.node;
            let fault = {
                let mut inner = self.lock();
                inner.events.push(Event::Send(node));
                inner.peers.get(&node).and_then(|p| p.fault)
            };
            if fault == Some(Fault::Send) {
                let e = ErrorKind::Network.cause(format!("Broken pipe: {}", node));
                return Box::new(futures::failed(e.into()));
            }

            let result = self.serve(node, header, &payload).map(|response| {
                if let Ok(mut reply) = connection.reply.lock() {
                    *reply = Some(response);
                }
            });
            Box::new(futures::done(result))
        }

        fn recv(&self, connection: &Self::Connection, _retry: &RetryPolicy) -> BoxFuture<Response> {
            let node = connection.node;
            let fault = {
                let mut inner = self.lock();
                inner.events.push(Event::Recv(node));
                inner.peers.get(&node).and_then(|p| p.fault)
            };
            match fault {
                Some(Fault::Silent) => Box::new(futures::empty()),
                Some(Fault::Recv) => {
                    let e = ErrorKind::Network.cause(format!("Connection reset: {}", node));
                    Box::new(futures::failed(e.into()))
                }
                _ => {
                    let reply = connection.reply.lock().ok().and_then(|mut r| r.take());
                    let result = reply.ok_or_else(|| {
                        Error::from(ErrorKind::Network.cause("No request in flight"))
                    });
                    Box::new(futures::done(result))
                }
            }
        }
    }

    /// The local object store of the node under test.
    #[derive(Clone, Default)]
    pub struct MemoryStore {
        objects: Arc<Mutex<HashMap<ObjectId, Vec<u8>>>>,
        failing: Arc<AtomicBool>,
        reads: Arc<AtomicUsize>,
    }
    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn put_object(&self, oid: ObjectId, data: Vec<u8>) {
            self.objects.lock().unwrap().insert(oid, data);
        }

        /// Makes every subsequent read fail with `Eio`.
        pub fn fail(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }
    impl LocalStore for MemoryStore {
        fn read_local(&self, request: &Request) -> BoxFuture<Response> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Box::new(futures::failed(Error::from(ResultCode::Eio)));
            }
            let data = self.objects.lock().unwrap().get(&request.oid()).cloned();
            let result = data
                .ok_or_else(|| Error::from(ResultCode::NoObj))
                .and_then(|d| Response::ok(&request.header, d));
            Box::new(futures::done(result))
        }
    }

    /// An object cache that answers everything and counts what it served.
    #[derive(Clone)]
    pub struct CountingCache {
        requests: Arc<AtomicUsize>,
        result: ResultCode,
    }
    impl CountingCache {
        pub fn new() -> Self {
            Self::answering(ResultCode::Success)
        }

        /// Makes a cache whose responses all carry `result`.
        pub fn answering(result: ResultCode) -> Self {
            CountingCache {
                requests: Arc::new(AtomicUsize::new(0)),
                result,
            }
        }

        pub fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }
    impl ObjectCache for CountingCache {
        fn handle_request(&self, request: Request) -> BoxFuture<Response> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if !self.result.is_success() {
                return Box::new(futures::finished(Response {
                    header: ResponseHeader::reply_to(&request.header, self.result),
                    data: Vec::new(),
                }));
            }
            Box::new(futures::done(Response::ok(
                &request.header,
                b"cached".to_vec(),
            )))
        }
    }

    /// A replica resolver that places every object on the given nodes, in order.
    #[derive(Debug, Clone)]
    pub struct FixedResolver {
        vnodes: Vec<Vnode>,
        local: Option<NodeId>,
    }
    impl FixedResolver {
        pub fn new(nodes: &[NodeId], local: Option<NodeId>) -> Self {
            let vnodes = nodes
                .iter()
                .enumerate()
                .map(|(i, &node)| Vnode { id: i as u64, node })
                .collect();
            FixedResolver { vnodes, local }
        }
    }
    impl ReplicaResolver for FixedResolver {
        fn node_count(&self) -> usize {
            self.vnodes
                .iter()
                .map(|v| v.node)
                .collect::<HashSet<_>>()
                .len()
        }

        fn virtual_nodes_for(&self, _oid: ObjectId, copies: usize) -> Vec<Vnode> {
            self.vnodes.iter().take(copies).cloned().collect()
        }

        fn is_local(&self, vnode: &Vnode) -> bool {
            self.local == Some(vnode.node)
        }
    }

    pub fn request(opcode: Opcode, oid: ObjectId, data: &[u8], resolver: &FixedResolver) -> Request {
        let mut header = RequestHeader::new(opcode, oid, 1);
        header.data_length = data_length(data).expect("small payload");
        Request::new(header, data.to_vec(), Arc::new(resolver.clone()))
    }

    #[test]
    fn memory_network_serves_reads_and_writes() -> TestResult {
        let network = MemoryNetwork::new(&[node(1)]);
        let retry = retry_policy(1);
        let oid = ObjectId::new(3);

        let conn = track!(network.acquire(&node(1)))?;
        let header = RequestHeader::new(Opcode::WriteObj, oid, 1).to_forward();
        track!(network
            .send(&conn, &header, Arc::new(b"bar".to_vec()), &retry)
            .wait())?;
        let response = track!(network.recv(&conn, &retry).wait())?;
        assert!(response.header.result.is_success());
        network.release(&node(1), conn);

        assert_eq!(network.object(node(1), oid), Some(b"bar".to_vec()));
        assert_eq!(network.outstanding(), 0);
        Ok(())
    }
}
