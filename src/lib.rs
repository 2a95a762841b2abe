//! Replication gateway of a distributed object storage cluster.
//!
//! For every object request issued by a client, the gateway resolves the
//! replica set of the object on the consistent hash ring and drives the
//! request to those replicas:
//!
//! - reads try the local copy first, then a single remote copy chosen from a
//!   random starting point;
//! - writes and removes are sent to every replica and the gateway waits until
//!   all of them have answered (or have been declared dead).
#![warn(missing_docs)]
extern crate byteorder;
extern crate fibers;
#[cfg(test)]
extern crate fibers_global;
extern crate futures;
extern crate prometrics;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_yaml;
extern crate siphasher;
#[macro_use]
extern crate slog;
#[macro_use]
extern crate trackable;

pub use config::GatewayConfig;
pub use epoch::{ClusterEpoch, Epoch, EpochOracle, RetryPolicy};
pub use error::{Error, ErrorKind};
pub use gateway::Gateway;
pub use oid::ObjectId;
pub use protocol::{Opcode, RequestHeader, Response, ResponseHeader, ResultCode};
pub use request::Request;
pub use ring::{NodeId, ReplicaResolver, Vnode, VnodeInfo};

pub mod config;
pub mod epoch;
pub mod net;
pub mod oid;
pub mod protocol;
pub mod ring;
pub mod serde_ext;
pub mod store;

mod error;
mod gateway;
mod metrics;
mod request;
#[cfg(test)]
mod test_util;
mod util;

pub use util::BoxFuture;

/// クレート固有の`Result`型。
pub type Result<T> = ::std::result::Result<T, Error>;
