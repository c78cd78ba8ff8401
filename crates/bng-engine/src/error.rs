//! Solver error taxonomy.
//!
//! Every variant carries machine-readable fields sufficient for a
//! collaborator to render it; user-visible strings are not the engine's
//! concern. Errors are values: one MIP attempt, one greedy attempt, then one
//! of these.

use serde::Serialize;
use thiserror::Error;

use bng_core::trading::RejectReason;
use bng_core::ConfigError;

/// A supply that was considered for a demand and turned away.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedSupply {
    pub bank_id: String,
    pub supply_habitat: String,
    pub reason: OptionRejection,
}

/// Why a (demand, bank, supply) combination produced no option.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OptionRejection {
    /// Trading rules forbid the substitution.
    Trading { detail: RejectReason },
    /// No pricing row at the looked-up contract size and tier.
    NoPricing,
    /// The bank holds no usable stock of the supply habitat.
    NoStock,
}

impl OptionRejection {
    pub fn describe(&self) -> String {
        match self {
            OptionRejection::Trading { detail } => detail.describe(),
            OptionRejection::NoPricing => "no pricing row at this contract size and tier".into(),
            OptionRejection::NoStock => "no stock available".into(),
        }
    }
}

/// Residual shortfall on one demand after the greedy fallback.
#[derive(Debug, Clone, Serialize)]
pub struct Shortfall {
    pub demand_idx: usize,
    pub habitat_name: String,
    pub units_required: f64,
    pub units_unmet: f64,
}

/// Errors surfaced by [`crate::solve`].
#[derive(Error, Debug)]
pub enum SolveError {
    /// Reference tables or solve inputs are invalid. No solve attempted.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A demand row has zero legal options after rule filtering and
    /// stock/pricing lookup.
    #[error("no legal options for demand '{demand_habitat}' (index {demand_idx})")]
    NoLegalOptions {
        demand_idx: usize,
        demand_habitat: String,
        /// A sample of the closest rejected supplies with reasons.
        rejections: Vec<RejectedSupply>,
    },

    /// Options exist but no assignment satisfies all constraints.
    #[error("no feasible assignment: {}", reasons.join("; "))]
    Infeasible { reasons: Vec<String> },

    /// The greedy fallback completed with residual unmet demand.
    #[error("{} demand(s) left unmet by fallback allocation", shortfalls.len())]
    UnmetDemand { shortfalls: Vec<Shortfall> },

    /// The MIP exceeded its wall-clock budget and fallback was not allowed.
    #[error("solver exceeded its {timeout_ms} ms budget")]
    SolverTimeout { timeout_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_legal_options_names_the_demand() {
        let err = SolveError::NoLegalOptions {
            demand_idx: 2,
            demand_habitat: "Lowland meadows".into(),
            rejections: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("Lowland meadows"));
        assert!(msg.contains("index 2"));
    }

    #[test]
    fn rejection_descriptions_are_specific() {
        let rejection = OptionRejection::Trading {
            detail: RejectReason::WrongUmbrella,
        };
        assert!(rejection.describe().contains("umbrella"));
        assert!(OptionRejection::NoPricing.describe().contains("pricing"));
    }
}
