use std::fmt;
use std::sync::Arc;

use crate::oid::ObjectId;
use crate::protocol::RequestHeader;
use crate::ring::ReplicaResolver;

/// A unit of client work handed to the gateway by the request dispatcher.
#[derive(Clone)]
pub struct Request {
    /// リクエストヘッダ。
    pub header: RequestHeader,

    /// 書き込むデータ(読み込み要求では空)。
    pub data: Vec<u8>,

    /// `true` if the request originated on this node.
    pub local: bool,

    /// Snapshot of the node table that stays valid for this request.
    pub vnodes: Arc<dyn ReplicaResolver>,
}
impl Request {
    /// 新しい`Request`インスタンスを生成する。
    pub fn new(header: RequestHeader, data: Vec<u8>, vnodes: Arc<dyn ReplicaResolver>) -> Self {
        Request {
            header,
            data,
            local: false,
            vnodes,
        }
    }

    /// Returns the id of the target object.
    pub fn oid(&self) -> ObjectId {
        self.header.oid
    }
}
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Request {{ header: {:?}, data_len: {}, local: {}, .. }}",
            self.header,
            self.data.len(),
            self.local
        )
    }
}
