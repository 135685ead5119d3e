//! In-Flash Computing Extension for a NAND SSD Simulator
//!
//! Models the subsystem an in-flash GEMV accelerator adds to a flash SSD
//! simulator:
//!
//! - **Per-read error correction** with a physics-inspired raw-bit-error-rate
//!   model driven by block wear (P/E cycles, retention age, read disturb)
//! - **Fan-out/fan-in coordination**: a single logical GEMV request spreads
//!   into per-plane dot-product transactions whose partial results are
//!   accumulated at-most-once back into one scalar
//! - **LLM workload layout**: deterministic placement of a transformer
//!   model's weights over the logical address space, with a trace generator
//!   covering compact, decode, and full-inference read streams
//!
//! The discrete-event engine, chip geometry, FTL, and host interface live in
//! the surrounding simulator; this crate holds the IFC data path and the
//! workload contract it services.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use nand_ifc_sim::prelude::*;
//!
//! // Flash parameters: defaults, or loaded from an attribute document
//! let params = FlashParameters::default();
//!
//! // IFC service path with the linear RBER model and a 100 ns DRAM
//! // accumulation cost per partial
//! let mut ifc = IfcUnit::new(&params, RberModel::linear_from_params(&params), 100);
//!
//! // A per-plane GEMV transaction completes on the plane...
//! let mut txn = IfcTransaction::new(
//!     TransactionSource::UserIo, 0, 8192, 42, 1042, Some(UserRequestId(1)),
//! );
//! txn.partial_dot_product = 0.125;
//!
//! // ...and is serviced: ECC retries decided from wear, partial folded in
//! let wear = BlockWearState { pe_cycles: 1500, pages_per_block: 256, ..Default::default() };
//! let done = ifc.complete_read(&mut txn, &wear.wear_input(0), 0);
//! println!("latency {} ns, result {:?}", done.service_latency, done.result);
//! ```
//!
//! # Trace Generation
//!
//! ```rust,no_run
//! use std::path::Path;
//! use nand_ifc_sim::prelude::*;
//!
//! let workload = LlmWorkload::new(
//!     ModelSpec::llama2_7b(),
//!     InferenceConfig::default(),
//!     256 * 1024 * 1024 * 1024, // 256 GiB SSD
//!     16 * 1024,                // 16 KiB pages
//!     256,                      // pages per block
//! );
//! workload.generate(TraceKind::Compact, Path::new("llm_trace.txt")).unwrap();
//! ```

pub mod aggregation;
pub mod document;
pub mod ecc;
pub mod ifc;
pub mod params;
pub mod transaction;
pub mod workload;

/// Simulated time in nanoseconds, the unit every configured latency uses.
pub type SimTimeNs = u64;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::aggregation::AggregationUnit;
    pub use crate::document::AttributeElement;
    pub use crate::ecc::{BlockWearState, Correction, EccEngine, RberModel, WearInput};
    pub use crate::ifc::{IfcCompletion, IfcUnit};
    pub use crate::params::{
        AggregationMode, CmdSuspensionMode, ConfigError, FlashParameters, FlashTechnology,
    };
    pub use crate::transaction::{
        FlashReadTransaction, IfcTransaction, IoPriority, PhysicalPageAddress,
        TransactionSource, UserRequestId,
    };
    pub use crate::workload::{
        InferenceConfig, LlmWorkload, MatrixName, ModelSpec, TraceKind, TraceSummary,
        WeightBlock, WorkloadError, WorkloadStats,
    };
    pub use crate::SimTimeNs;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
