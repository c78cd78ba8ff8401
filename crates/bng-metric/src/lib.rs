//! # bng-metric: Metric Workbook Importer
//!
//! Reduces a DEFRA biodiversity-metric workbook to residual off-site demand:
//! trading-rule-aware on-site offsets, headline net-gain reconciliation, and
//! bespoke-compensation surfacing for Very High watercourse losses.
//!
//! The workbook arrives as JSON (see [`workbook`]) - three raw cell-grid
//! sheets plus a headline block. Header rows are located heuristically, so
//! layout drift between metric versions does not break the import.
//!
//! ## Example
//!
//! ```ignore
//! use bng_metric::{parse_metric, MetricOptions};
//!
//! let result = parse_metric(&workbook_bytes, &MetricOptions::default(), &reference)?;
//! let demand = result.to_demand_rows();
//! let quote = bng_engine::solve(&demand, &context, &reference)?;
//! ```

pub mod error;
pub mod parser;
pub mod workbook;

pub use error::MetricParseError;
pub use parser::{
    parse_metric, parse_workbook, BespokeItem, DeficitRow, MetricOptions, MetricResult,
};
pub use workbook::{Cell, Headline, MetricWorkbook, Sheet};
