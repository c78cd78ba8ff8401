//! The allocation core.
//!
//! Two independent deterministic solvers sit behind one entry point:
//!
//! 1. [`mip`] - a branch-and-bound MIP over the candidate options
//!    (feature `solver-highs`).
//! 2. [`greedy`] - a merit-order fallback used when the MIP fails,
//!    times out, or the backend is compiled out.
//!
//! Whichever solver returns a candidate assignment, [`check`] verifies it
//! against the engine invariants before it is accepted. A MIP result that
//! fails verification falls through to the greedy; a greedy result that
//! fails verification is an infeasibility.

pub mod check;
pub(crate) mod greedy;
#[cfg(feature = "solver-highs")]
pub(crate) mod mip;
pub mod report;

use bng_core::diagnostics::Diagnostics;
use bng_core::tables::TableIndex;
use bng_core::types::DemandRow;
use tracing::{info, warn};

use crate::error::SolveError;
use crate::options::CandidateOption;
use crate::SolverOptions;

/// Minimum units an active option must deliver.
pub const MIN_UNIT_DELIVERY: f64 = 0.01;

/// Hard cap on distinct banks per quote.
pub const MAX_BANKS: usize = 2;

/// Solve for an assignment `x[i]` of units per option.
///
/// Returns the per-option units supplied, verified against all invariants.
pub(crate) fn allocate(
    options: &[CandidateOption],
    demand: &[DemandRow],
    index: &TableIndex<'_>,
    solver: &SolverOptions,
    diag: &mut Diagnostics,
) -> Result<Vec<f64>, SolveError> {
    if demand.is_empty() {
        return Ok(Vec::new());
    }

    let mut proven_infeasible: Option<String> = None;

    #[cfg(feature = "solver-highs")]
    {
        let timeout = std::time::Duration::from_millis(solver.timeout_ms);
        match mip::solve_mip(options, demand, index, timeout) {
            Ok(assignment) => {
                let violations = check::verify_assignment(&assignment, options, demand, index);
                if violations.is_empty() {
                    info!(options = options.len(), demands = demand.len(), "MIP solve accepted");
                    return Ok(assignment);
                }
                warn!(
                    violations = violations.len(),
                    "MIP solution failed verification, falling back"
                );
                diag.add_warning(
                    "solver",
                    format!(
                        "MIP solution failed verification ({} violation(s)); greedy fallback engaged",
                        violations.len()
                    ),
                );
                if !solver.allow_greedy_fallback {
                    return Err(SolveError::Infeasible {
                        reasons: violations.iter().map(|v| v.to_string()).collect(),
                    });
                }
            }
            Err(mip::MipError::Infeasible(msg)) => {
                proven_infeasible = Some(msg);
            }
            Err(mip::MipError::Failed(msg)) => {
                let timed_out = msg.to_ascii_lowercase().contains("time");
                if !solver.allow_greedy_fallback {
                    if timed_out {
                        return Err(SolveError::SolverTimeout { timeout_ms: solver.timeout_ms });
                    }
                    return Err(SolveError::Infeasible { reasons: vec![msg] });
                }
                warn!(error = %msg, "MIP solve failed, engaging greedy fallback");
                diag.add_warning("solver", format!("MIP solve failed ({msg}); greedy fallback engaged"));
            }
        }
        if let Some(msg) = &proven_infeasible {
            if !solver.allow_greedy_fallback {
                return Err(SolveError::Infeasible { reasons: vec![msg.clone()] });
            }
        }
    }

    #[cfg(not(feature = "solver-highs"))]
    {
        let _ = solver;
        diag.add_warning("solver", "MIP backend not compiled in; using greedy allocator");
    }

    match greedy::solve_greedy(options, demand, index) {
        Ok(assignment) => {
            let violations = check::verify_assignment(&assignment, options, demand, index);
            if !violations.is_empty() {
                return Err(SolveError::Infeasible {
                    reasons: violations.iter().map(|v| v.to_string()).collect(),
                });
            }
            if proven_infeasible.is_none() {
                info!("greedy allocation accepted");
            } else {
                // The MIP proof and a passing greedy disagree; trust the
                // verified assignment and record the disagreement.
                diag.add_warning(
                    "solver",
                    "MIP reported infeasible but greedy found a verified assignment",
                );
            }
            Ok(assignment)
        }
        Err(shortfalls) => {
            if let Some(msg) = proven_infeasible {
                let mut reasons = vec![msg];
                reasons.extend(shortfalls.iter().map(|s| {
                    format!(
                        "demand '{}' short by {:.4} units",
                        s.habitat_name, s.units_unmet
                    )
                }));
                Err(SolveError::Infeasible { reasons })
            } else {
                Err(SolveError::UnmetDemand { shortfalls })
            }
        }
    }
}
