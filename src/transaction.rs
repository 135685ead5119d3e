//! Flash Transactions
//!
//! Plain-data carriers for the read path. An ordinary flash read holds the
//! addressing and ownership fields the scheduler needs; an in-flash GEMV read
//! embeds one and adds the per-plane dot-product payload that flows to the
//! aggregation unit.

/// Logical page address.
pub type Lpa = u64;
/// Physical page address in the FTL's flat numbering.
pub type Ppa = u64;
/// Host I/O stream identifier.
pub type StreamId = u16;

/// Opaque identity of a host user request. Stable across the request's
/// lifetime; never derived from a memory address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserRequestId(pub u64);

/// Who issued the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionSource {
    #[default]
    UserIo,
    CacheManager,
    GcWearLeveling,
    Mapping,
}

/// Host-assigned priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoPriority {
    #[default]
    Undefined,
    Urgent,
    High,
    Medium,
    Low,
}

/// Resolved flash geometry coordinates of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhysicalPageAddress {
    pub channel: u32,
    pub chip: u32,
    pub die: u32,
    pub plane: u32,
    pub block: u32,
    pub page: u32,
}

/// An ordinary flash page read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReadTransaction {
    pub source: TransactionSource,
    pub stream_id: StreamId,
    pub data_size_bytes: u32,
    pub lpa: Lpa,
    pub ppa: Ppa,
    /// Set once address translation has pinned the physical location.
    pub address: Option<PhysicalPageAddress>,
    pub priority: IoPriority,
    /// Enclosing user request; `None` for internal traffic.
    pub user_request: Option<UserRequestId>,
}

/// A flash read that executes a per-plane dot product before transferring.
///
/// The IFC payload starts at zero-equivalents and is filled in as the
/// simulated plane runs the kernel, the ECC engine decides retries, and the
/// aggregation unit observes completion.
#[derive(Debug, Clone, PartialEq)]
pub struct IfcTransaction {
    pub read: FlashReadTransaction,
    /// Scalar partial result produced by this plane.
    pub partial_dot_product: f64,
    pub ecc_retry_needed: bool,
    pub ecc_retry_count: u32,
    /// Set by the aggregation unit on the transaction that completes the
    /// user request.
    pub aggregation_complete: bool,
}

impl IfcTransaction {
    pub fn new(
        source: TransactionSource,
        stream_id: StreamId,
        data_size_bytes: u32,
        lpa: Lpa,
        ppa: Ppa,
        user_request: Option<UserRequestId>,
    ) -> Self {
        Self::from_read(FlashReadTransaction {
            source,
            stream_id,
            data_size_bytes,
            lpa,
            ppa,
            address: None,
            priority: IoPriority::Undefined,
            user_request,
        })
    }

    pub fn with_address(
        source: TransactionSource,
        stream_id: StreamId,
        data_size_bytes: u32,
        lpa: Lpa,
        ppa: Ppa,
        address: PhysicalPageAddress,
        user_request: Option<UserRequestId>,
    ) -> Self {
        Self::from_read(FlashReadTransaction {
            source,
            stream_id,
            data_size_bytes,
            lpa,
            ppa,
            address: Some(address),
            priority: IoPriority::Undefined,
            user_request,
        })
    }

    pub fn with_priority(
        source: TransactionSource,
        stream_id: StreamId,
        data_size_bytes: u32,
        lpa: Lpa,
        ppa: Ppa,
        priority: IoPriority,
        user_request: Option<UserRequestId>,
    ) -> Self {
        Self::from_read(FlashReadTransaction {
            source,
            stream_id,
            data_size_bytes,
            lpa,
            ppa,
            address: None,
            priority,
            user_request,
        })
    }

    fn from_read(read: FlashReadTransaction) -> Self {
        IfcTransaction {
            read,
            partial_dot_product: 0.0,
            ecc_retry_needed: false,
            ecc_retry_count: 0,
            aggregation_complete: false,
        }
    }

    pub fn user_request(&self) -> Option<UserRequestId> {
        self.read.user_request
    }
}
