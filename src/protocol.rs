//! Request/response headers exchanged between the gateway and its peers.
//!
//! Both headers are fixed-size (`HEADER_SIZE` bytes) little-endian records.
//! Only the fields the gateway reads or rewrites are modelled; the remaining
//! bytes are reserved and always encoded as zero.
use byteorder::{ByteOrder, LittleEndian};
use std::convert::TryFrom;
use trackable::error::ErrorKindExt;

use crate::oid::ObjectId;
use crate::{Error, ErrorKind, Result};

/// Size in bytes of an encoded request or response header.
pub const HEADER_SIZE: usize = 48;

/// Protocol version spoken by clients towards a gateway.
pub const CLIENT_PROTO_VERSION: u8 = 0x02;

/// Protocol version spoken between cluster nodes.
pub const PEER_PROTO_VERSION: u8 = 0x08;

/// Request flag: the payload is written (set on write-class requests).
pub const FLAG_CMD_WRITE: u16 = 0x01;

/// Request flag: bypass the object cache.
pub const FLAG_CMD_DIRECT: u16 = 0x08;

/// Operation codes.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    CreateAndWriteObj,
    ReadObj,
    WriteObj,
    RemoveObj,
    CreateAndWritePeer,
    ReadPeer,
    WritePeer,
    RemovePeer,

    /// Opcodes the gateway does not interpret; copied verbatim.
    Other(u8),
}
impl Opcode {
    /// Converts the raw opcode byte.
    pub fn from_u8(n: u8) -> Self {
        match n {
            0x01 => Opcode::CreateAndWriteObj,
            0x02 => Opcode::ReadObj,
            0x03 => Opcode::WriteObj,
            0x04 => Opcode::RemoveObj,
            0xA4 => Opcode::CreateAndWritePeer,
            0xA5 => Opcode::ReadPeer,
            0xA6 => Opcode::WritePeer,
            0xA7 => Opcode::RemovePeer,
            n => Opcode::Other(n),
        }
    }

    /// Returns the raw opcode byte.
    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::CreateAndWriteObj => 0x01,
            Opcode::ReadObj => 0x02,
            Opcode::WriteObj => 0x03,
            Opcode::RemoveObj => 0x04,
            Opcode::CreateAndWritePeer => 0xA4,
            Opcode::ReadPeer => 0xA5,
            Opcode::WritePeer => 0xA6,
            Opcode::RemovePeer => 0xA7,
            Opcode::Other(n) => n,
        }
    }

    /// Returns the inter-node equivalent of a client opcode.
    ///
    /// Opcodes without a peer equivalent are returned unchanged.
    pub fn to_peer(self) -> Self {
        match self {
            Opcode::CreateAndWriteObj => Opcode::CreateAndWritePeer,
            Opcode::ReadObj => Opcode::ReadPeer,
            Opcode::WriteObj => Opcode::WritePeer,
            Opcode::RemoveObj => Opcode::RemovePeer,
            op => op,
        }
    }
}

/// Result codes carried by response headers.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    Unknown,
    NoObj,
    Eio,
    ReadOnly,
    NetworkError,
    Other(u32),
}
impl ResultCode {
    /// Converts the raw result code.
    pub fn from_u32(n: u32) -> Self {
        match n {
            0x00 => ResultCode::Success,
            0x01 => ResultCode::Unknown,
            0x02 => ResultCode::NoObj,
            0x03 => ResultCode::Eio,
            0x1A => ResultCode::ReadOnly,
            0x86 => ResultCode::NetworkError,
            n => ResultCode::Other(n),
        }
    }

    /// Returns the raw result code.
    pub fn as_u32(self) -> u32 {
        match self {
            ResultCode::Success => 0x00,
            ResultCode::Unknown => 0x01,
            ResultCode::NoObj => 0x02,
            ResultCode::Eio => 0x03,
            ResultCode::ReadOnly => 0x1A,
            ResultCode::NetworkError => 0x86,
            ResultCode::Other(n) => n,
        }
    }

    /// Returns `true` if this is `ResultCode::Success`.
    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }
}

/// Header of a request.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub proto_ver: u8,
    pub opcode: Opcode,
    pub flags: u16,
    pub epoch: u32,
    pub id: u32,
    pub data_length: u32,
    pub oid: ObjectId,
    pub cow_oid: ObjectId,

    /// Requested number of copies; `0` means "use the configured default".
    pub copies: u8,
    pub copy_policy: u8,
    pub offset: u64,
}
impl RequestHeader {
    /// Makes a client request header for the given operation.
    pub fn new(opcode: Opcode, oid: ObjectId, epoch: u32) -> Self {
        RequestHeader {
            proto_ver: CLIENT_PROTO_VERSION,
            opcode,
            flags: 0,
            epoch,
            id: 0,
            data_length: 0,
            oid,
            cow_oid: ObjectId::new(0),
            copies: 0,
            copy_policy: 0,
            offset: 0,
        }
    }

    /// Returns `true` if the request asks for bypassing the object cache.
    pub fn is_direct(&self) -> bool {
        self.flags & FLAG_CMD_DIRECT != 0
    }

    /// Makes the header that is forwarded to peers.
    ///
    /// The opcode is rewritten to its peer equivalent and the protocol
    /// version is stamped; everything else is copied verbatim.
    pub fn to_forward(&self) -> Self {
        RequestHeader {
            opcode: self.opcode.to_peer(),
            proto_ver: PEER_PROTO_VERSION,
            ..*self
        }
    }

    /// Encodes this header.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0; HEADER_SIZE];
        buf[0] = self.proto_ver;
        buf[1] = self.opcode.as_u8();
        LittleEndian::write_u16(&mut buf[2..4], self.flags);
        LittleEndian::write_u32(&mut buf[4..8], self.epoch);
        LittleEndian::write_u32(&mut buf[8..12], self.id);
        LittleEndian::write_u32(&mut buf[12..16], self.data_length);
        LittleEndian::write_u64(&mut buf[16..24], self.oid.as_u64());
        LittleEndian::write_u64(&mut buf[24..32], self.cow_oid.as_u64());
        buf[32] = self.copies;
        buf[33] = self.copy_policy;
        LittleEndian::write_u64(&mut buf[40..48], self.offset);
        buf
    }

    /// Decodes a header from the first `HEADER_SIZE` bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        track_assert!(
            buf.len() >= HEADER_SIZE,
            ErrorKind::InvalidInput,
            "Too short request header: {} bytes",
            buf.len()
        );
        Ok(RequestHeader {
            proto_ver: buf[0],
            opcode: Opcode::from_u8(buf[1]),
            flags: LittleEndian::read_u16(&buf[2..4]),
            epoch: LittleEndian::read_u32(&buf[4..8]),
            id: LittleEndian::read_u32(&buf[8..12]),
            data_length: LittleEndian::read_u32(&buf[12..16]),
            oid: ObjectId::new(LittleEndian::read_u64(&buf[16..24])),
            cow_oid: ObjectId::new(LittleEndian::read_u64(&buf[24..32])),
            copies: buf[32],
            copy_policy: buf[33],
            offset: LittleEndian::read_u64(&buf[40..48]),
        })
    }
}

/// Header of a response.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub proto_ver: u8,
    pub opcode: Opcode,
    pub flags: u16,
    pub epoch: u32,
    pub id: u32,
    pub data_length: u32,
    pub result: ResultCode,
    pub copies: u8,
    pub offset: u64,
}
impl ResponseHeader {
    /// Makes the response header answering `req`.
    pub fn reply_to(req: &RequestHeader, result: ResultCode) -> Self {
        ResponseHeader {
            proto_ver: req.proto_ver,
            opcode: req.opcode,
            flags: req.flags,
            epoch: req.epoch,
            id: req.id,
            data_length: 0,
            result,
            copies: req.copies,
            offset: req.offset,
        }
    }

    /// Encodes this header.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0; HEADER_SIZE];
        buf[0] = self.proto_ver;
        buf[1] = self.opcode.as_u8();
        LittleEndian::write_u16(&mut buf[2..4], self.flags);
        LittleEndian::write_u32(&mut buf[4..8], self.epoch);
        LittleEndian::write_u32(&mut buf[8..12], self.id);
        LittleEndian::write_u32(&mut buf[12..16], self.data_length);
        LittleEndian::write_u32(&mut buf[16..20], self.result.as_u32());
        buf[20] = self.copies;
        LittleEndian::write_u64(&mut buf[24..32], self.offset);
        buf
    }

    /// Decodes a header from the first `HEADER_SIZE` bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        track_assert!(
            buf.len() >= HEADER_SIZE,
            ErrorKind::InvalidInput,
            "Too short response header: {} bytes",
            buf.len()
        );
        Ok(ResponseHeader {
            proto_ver: buf[0],
            opcode: Opcode::from_u8(buf[1]),
            flags: LittleEndian::read_u16(&buf[2..4]),
            epoch: LittleEndian::read_u32(&buf[4..8]),
            id: LittleEndian::read_u32(&buf[8..12]),
            data_length: LittleEndian::read_u32(&buf[12..16]),
            result: ResultCode::from_u32(LittleEndian::read_u32(&buf[16..20])),
            copies: buf[20],
            offset: LittleEndian::read_u64(&buf[24..32]),
        })
    }
}

/// A response header together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// ヘッダ。
    pub header: ResponseHeader,

    /// 中身。
    pub data: Vec<u8>,
}
impl Response {
    /// Makes a successful response answering `req` that carries `data`.
    ///
    /// Fails with `ErrorKind::InvalidInput` if `data` does not fit in the
    /// header's 32-bit length field.
    pub fn ok(req: &RequestHeader, data: Vec<u8>) -> Result<Self> {
        let mut header = ResponseHeader::reply_to(req, ResultCode::Success);
        header.data_length = track!(data_length(&data))?;
        Ok(Response { header, data })
    }
}

/// Returns the value of the `data_length` header field announcing `data`.
pub fn data_length(data: &[u8]) -> Result<u32> {
    let length = track!(u32::try_from(data.len())
        .map_err(|e| Error::from(ErrorKind::InvalidInput.cause(e))))?;
    Ok(length)
}
