//! # bng-engine: BNG Allocation Solver
//!
//! Computes the cheapest legally admissible assignment of habitat-bank
//! supply to a development site's residual off-site demand, subject to
//! trading rules, spatial multipliers, contract-size pricing, and a hard cap
//! of two distinct banks per quote.
//!
//! ## Pipeline
//!
//! | Stage | Module | Responsibility |
//! |-------|--------|----------------|
//! | Classify | [`geography`] | Bank tier (local / adjacent / far) from LPA/NCA membership |
//! | Enumerate | [`options`] | Candidate (demand, bank, supply, tier, price) options, paired blends included |
//! | Allocate | [`allocator`] | MIP with deterministic tie-breaks; greedy fallback; shared verification |
//! | Discount | [`suo`] | Surplus uplift offset on the finished quote |
//!
//! The public entry point is [`solve()`]; see [`SolveContext`] for the knobs.
//!
//! ## Solver backends
//!
//! The MIP runs on HiGHS through `good_lp` (feature `solver-highs`, on by
//! default). Without it the deterministic greedy allocator stands alone,
//! which keeps results correct but not always optimal.
//!
//! ## Example
//!
//! ```ignore
//! use bng_core::types::{ContractSize, DemandRow, UmbrellaType};
//! use bng_engine::{solve, SolveContext};
//!
//! let demand = vec![DemandRow::habitat("Lowland meadows", 1.5, UmbrellaType::Area)];
//! let context = SolveContext {
//!     target_lpa: "York".into(),
//!     target_nca: "Vale of York".into(),
//!     contract_size: ContractSize::Small,
//!     ..example_context()
//! };
//! let result = solve(&demand, &context, &reference_tables)?;
//! println!("total: £{:.2}", result.total_cost);
//! ```

pub mod allocator;
pub mod error;
pub mod geography;
pub mod options;
pub mod solve;
pub mod suo;
pub mod test_fixtures;

pub use allocator::check::{verify_assignment, Violation, COST_EPSILON, DEMAND_EPSILON};
pub use allocator::report::{AllocationPartRow, AllocationRow, SiteHabTotal};
pub use allocator::{MAX_BANKS, MIN_UNIT_DELIVERY};
pub use error::{OptionRejection, RejectedSupply, Shortfall, SolveError};
pub use geography::GeographyContext;
pub use options::{
    build_options, lookup_contract_size, paired_blend, CandidateOption, OptionKind, PairPart,
};
pub use solve::{solve, SolveContext, SolveResult, SolverOptions, SuoConfig};
pub use suo::{compute_suo, SuoBreakdown, DEFAULT_MAX_SUO, SUO_HEADROOM};
