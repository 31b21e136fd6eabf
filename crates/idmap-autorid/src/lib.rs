//! # idmap-autorid
//!
//! Range allocation layer of the identity-mapping service.
//!
//! ## Role in System
//!
//! - **Range Allocator**: maps each foreign domain SID (plus sub-range index)
//!   to a fixed-size block of local ids
//! - **Shared Database**: all state lives in a transactional key-value store
//!   that several processes may use at once
//! - **Allocation Pool**: hands out single ids from the reserved `ALLOC` range
//!
//! ## Id Space
//!
//! ```text
//!  min_value                                              min_value + max_ranges * range_size
//!     │ range 0  │ range 1  │ range 2  │   ...   │ range max_ranges-1 │
//!     └──────────┴──────────┴──────────┴─────────┴────────────────────┘
//!       low_id(n) = min_value + n * range_size
//! ```
//!
//! ## Invariants (hold after every committed transaction)
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | HWM is one more than the highest assigned range (or 0) | `add_range_action` |
//! | Distinct domain keys own distinct ranges | reverse-slot `Insert` |
//! | Every assigned range is below `max_ranges` | capacity check |
//! | `min_value` / `range_size` never change once saved | `save_config` |
//! | Forward and reverse mappings agree | single transaction |
//!
//! ## Usage
//!
//! ```no_run
//! use idmap_autorid::{
//!     FileStore, FileStoreConfig, GlobalConfig, GlobalConfigApi, RangeAllocatorApi,
//!     RangeAllocatorService,
//! };
//!
//! let store = FileStore::open(FileStoreConfig::new("/var/lib/samba/autorid.tdb"))?;
//! let service = RangeAllocatorService::open(store)?;
//! service.save_config(&GlobalConfig::new(10000, 100000, 42949))?;
//!
//! let range = service.acquire_range("S-1-5-21-1004336348-1177238915-682003330", 0)?;
//! println!("range {} starts at {}", range.range_number, range.low_id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::*;
pub use domain::*;
pub use ports::inbound::*;
pub use ports::outbound::{StoreMode, StoreTxn, TransactionalStore};
pub use service::RangeAllocatorService;
