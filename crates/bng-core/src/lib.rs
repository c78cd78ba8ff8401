//! # bng-core: BNG Domain Model Core
//!
//! Provides the fundamental data structures and trading rules for the
//! Biodiversity Net Gain allocation engine.
//!
//! ## Design Philosophy
//!
//! Everything upstream of the solver is **typed at the boundary**:
//!
//! - Closed enums ([`Tier`], [`ContractSize`], [`Distinctiveness`],
//!   [`UmbrellaType`], [`PromoterKind`]) replace stringly-typed fields.
//! - Reference data arrives as a read-only [`ReferenceTables`] snapshot and
//!   is schema-checked once, on entry, via [`ReferenceTables::validate`].
//! - Lookups run through a per-solve [`TableIndex`] with canonical habitat
//!   names and stable iteration orders, so no process-wide caches exist and
//!   concurrent solves on disjoint inputs are safe.
//!
//! ## Modules
//!
//! - [`types`] - Domain records and enumerations
//! - [`tables`] - Reference-table snapshot, validation, per-solve index
//! - [`trading`] - Like-for-like trading legality rules
//! - [`normalize`] - Geography and habitat name canonicalisation
//! - [`diagnostics`] - Machine-readable warnings and errors for one operation
//! - [`error`] - Unified error type
//!
//! Allocation solving lives in `bng-engine`; metric workbook import lives in
//! `bng-metric`. Both build on the types here.

pub mod diagnostics;
pub mod error;
pub mod normalize;
pub mod tables;
pub mod trading;
pub mod types;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{BngError, BngResult, ConfigError};
pub use normalize::{canonical_habitat, normalize_geo_name, same_habitat};
pub use tables::{ReferenceTables, TableIndex};
pub use trading::{supply_can_offset, DemandSpec, RejectReason};
pub use types::*;
