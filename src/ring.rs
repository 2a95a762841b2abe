//! Replica placement on the consistent hash ring.
use siphasher::sip::SipHasher;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use crate::oid::ObjectId;

/// ノードID。
///
/// クラスタ内のノードを一意に識別する(アドレスとポート番号の組)。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// ノードのアドレス。
    pub addr: SocketAddr,
}
impl NodeId {
    /// 新しい`NodeId`インスタンスを生成する。
    pub fn new(addr: SocketAddr) -> Self {
        NodeId { addr }
    }
}
impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NodeId({})", self.addr)
    }
}
impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// A position on the consistent hash ring, owned by a physical node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vnode {
    /// Position of this virtual node on the ring.
    pub id: u64,

    /// The physical node that owns this virtual node.
    pub node: NodeId,
}

/// Maps object ids to the virtual and physical nodes holding their replicas.
///
/// An implementation is a snapshot of the cluster's node table that stays
/// valid for the lifetime of a request.
pub trait ReplicaResolver: Send + Sync + 'static {
    /// Returns the number of distinct physical nodes in the snapshot.
    fn node_count(&self) -> usize;

    /// Returns up to `copies` virtual nodes, in placement order, that hold the
    /// replicas of `oid`.
    ///
    /// Each returned virtual node belongs to a different physical node.
    fn virtual_nodes_for(&self, oid: ObjectId, copies: usize) -> Vec<Vnode>;

    /// Returns up to `copies` distinct physical nodes, in placement order,
    /// that hold the replicas of `oid`.
    fn physical_nodes_for(&self, oid: ObjectId, copies: usize) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.virtual_nodes_for(oid, copies)
            .into_iter()
            .map(|v| v.node)
            .filter(|n| seen.insert(*n))
            .collect()
    }

    /// Returns `true` if `vnode` is owned by the local node.
    fn is_local(&self, vnode: &Vnode) -> bool;
}

/// Virtual node table of the cluster.
#[derive(Debug, Clone)]
pub struct VnodeInfo {
    vnodes: Vec<Vnode>,
    nodes: Vec<NodeId>,
    local: Option<NodeId>,
}
impl VnodeInfo {
    /// Builds the ring from `(node, number of virtual nodes)` pairs.
    ///
    /// `local` is the node this process runs as, if it is a cluster member.
    pub fn new(nodes: &[(NodeId, usize)], local: Option<NodeId>) -> Self {
        let mut vnodes = Vec::new();
        for &(node, count) in nodes {
            for i in 0..count {
                vnodes.push(Vnode {
                    id: hash(&(node, i as u64)),
                    node,
                });
            }
        }
        vnodes.sort_by_key(|v| (v.id, v.node));

        let mut members = nodes
            .iter()
            .filter(|&&(_, count)| count > 0)
            .map(|&(node, _)| node)
            .collect::<Vec<_>>();
        members.sort();
        members.dedup();
        VnodeInfo {
            vnodes,
            nodes: members,
            local,
        }
    }

    /// Returns the physical nodes of the cluster.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Returns the virtual nodes sorted by ring position.
    pub fn vnodes(&self) -> &[Vnode] {
        &self.vnodes
    }
}
impl ReplicaResolver for VnodeInfo {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn virtual_nodes_for(&self, oid: ObjectId, copies: usize) -> Vec<Vnode> {
        let mut result: Vec<Vnode> = Vec::with_capacity(copies);
        if self.vnodes.is_empty() {
            return result;
        }

        let position = hash(&oid.as_u64());
        let start = match self.vnodes.binary_search_by_key(&position, |v| v.id) {
            Ok(i) | Err(i) => i,
        };
        for i in 0..self.vnodes.len() {
            if result.len() == copies {
                break;
            }
            let v = self.vnodes[(start + i) % self.vnodes.len()];
            if result.iter().all(|r| r.node != v.node) {
                result.push(v);
            }
        }
        result
    }

    fn is_local(&self, vnode: &Vnode) -> bool {
        self.local == Some(vnode.node)
    }
}

fn hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = SipHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
