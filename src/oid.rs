//! Object identifiers and object classes.
use std::fmt;

/// Set on VDI (virtual disk inode) objects.
pub const VDI_BIT: u64 = 1 << 63;

/// Set on VM-state objects.
pub const VMSTATE_BIT: u64 = 1 << 62;

/// Set on VDI attribute objects.
pub const VDI_ATTR_BIT: u64 = 1 << 61;

const VDI_SPACE_SHIFT: u64 = 32;
const VDI_SPACE_MASK: u64 = 0x00FF_FFFF;

/// オブジェクトID。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(u64);
impl ObjectId {
    /// 新しい`ObjectId`インスタンスを生成する。
    pub fn new(id: u64) -> Self {
        ObjectId(id)
    }

    /// Makes the id of the `index`-th data object of the given VDI.
    pub fn data(vid: u32, index: u32) -> Self {
        ObjectId((u64::from(vid) & VDI_SPACE_MASK) << VDI_SPACE_SHIFT | u64::from(index))
    }

    /// Makes the id of the inode object of the given VDI.
    pub fn vdi(vid: u32) -> Self {
        ObjectId(VDI_BIT | (u64::from(vid) & VDI_SPACE_MASK) << VDI_SPACE_SHIFT)
    }

    /// Returns the raw value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the id of the VDI that owns this object.
    pub fn vid(self) -> u32 {
        ((self.0 >> VDI_SPACE_SHIFT) & VDI_SPACE_MASK) as u32
    }

    /// Returns the class of this object.
    pub fn class(self) -> ObjectClass {
        if self.0 & VDI_BIT != 0 {
            ObjectClass::Vdi
        } else if self.0 & VMSTATE_BIT != 0 {
            ObjectClass::VmState
        } else if self.0 & VDI_ATTR_BIT != 0 {
            ObjectClass::VdiAttr
        } else {
            ObjectClass::Data
        }
    }

    /// Returns `true` if objects of this class may be served by the object cache.
    ///
    /// VM-state and VDI attribute objects are never cached.
    pub fn is_cacheable(self) -> bool {
        match self.class() {
            ObjectClass::Vdi | ObjectClass::Data => true,
            ObjectClass::VmState | ObjectClass::VdiAttr => false,
        }
    }
}
impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectId({:016x})", self.0)
    }
}
impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Classes of objects.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Vdi,
    VmState,
    VdiAttr,
    Data,
}

/// A half-open range `[start, end)` of object ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidRange {
    /// 範囲の始点(この値を含む)。
    pub start: u64,

    /// 範囲の終点(この値を含まない)。
    pub end: u64,
}
impl OidRange {
    /// Returns `true` if `oid` lies within this range.
    pub fn contains(&self, oid: ObjectId) -> bool {
        self.start <= oid.as_u64() && oid.as_u64() < self.end
    }
}

/// Reserved object id ranges that reject every write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOnlyRanges(Vec<OidRange>);
impl ReadOnlyRanges {
    /// 新しい`ReadOnlyRanges`インスタンスを生成する。
    pub fn new(ranges: Vec<OidRange>) -> Self {
        ReadOnlyRanges(ranges)
    }

    /// Returns `true` if writes to `oid` must be rejected.
    pub fn is_readonly(&self, oid: ObjectId) -> bool {
        self.0.iter().any(|r| r.contains(oid))
    }
}
