//! MIP formulation of the allocation problem.
//!
//! Decision variables per option `i`:
//!
//! - `x[i] >= 0` - units of demand `d(i)` satisfied by the option
//! - `z[i] in {0,1}` - option-used indicator
//!
//! plus `y[b] in {0,1}` per candidate bank.
//!
//! The objective is a single weighted sum implementing the lexicographic
//! stack: cost, then proximity rank, then a preference for higher-capacity
//! banks, then active-bank count. The epsilon weights are computed from the
//! problem bounds at solve start so each level strictly dominates the next.

use std::collections::BTreeMap;
use std::time::Duration;

use good_lp::solvers::highs::highs;
use good_lp::{constraint, variable, variables, Expression, Solution, SolverModel, Variable};
use tracing::debug;

use bng_core::tables::TableIndex;
use bng_core::types::DemandRow;

use super::{MAX_BANKS, MIN_UNIT_DELIVERY};
use crate::options::CandidateOption;

/// MIP failure modes. `Infeasible` is a solver proof; `Failed` covers
/// timeouts and numeric breakdowns.
#[derive(Debug)]
pub(crate) enum MipError {
    Infeasible(String),
    Failed(String),
}

/// Objective weights for the lexicographic stack beneath cost.
struct EpsilonWeights {
    proximity: f64,
    capacity: f64,
    bank_count: f64,
}

impl EpsilonWeights {
    /// Calibrate from problem bounds.
    ///
    /// The proximity term can move at most `2 * total_units`, so its weight
    /// keeps the whole term under the cost-equality tolerance. The capacity
    /// term in turn stays under the smallest proximity improvement
    /// (one minimum delivery stepping one rank), and the bank-count term
    /// under any capacity difference the data can express.
    fn calibrate(total_units: f64, total_capacity: f64) -> Self {
        let proximity = (1e-6 / (2.0 * total_units + 1.0)).min(1e-9);
        let capacity = (proximity * MIN_UNIT_DELIVERY / (total_capacity + 1.0)).min(1e-14);
        let bank_count = capacity * 1e-6;
        Self { proximity, capacity, bank_count }
    }
}

pub(crate) fn solve_mip(
    options: &[CandidateOption],
    demand: &[DemandRow],
    index: &TableIndex<'_>,
    timeout: Duration,
) -> Result<Vec<f64>, MipError> {
    let total_units: f64 = demand.iter().map(|d| d.units_required).sum();
    let candidate_banks: BTreeMap<usize, f64> = options
        .iter()
        .map(|o| (o.bank_idx, index.bank_capacity(o.bank_idx)))
        .collect();
    let total_capacity: f64 = candidate_banks.values().sum();
    let eps = EpsilonWeights::calibrate(total_units, total_capacity);

    let mut vars = variables!();

    // x and z per option; x is bounded by its demand's requirement, which
    // doubles as the big-M in the linking constraint.
    let mut x_vars: Vec<Variable> = Vec::with_capacity(options.len());
    let mut z_vars: Vec<Variable> = Vec::with_capacity(options.len());
    for option in options {
        let bound = demand[option.demand_idx].units_required;
        x_vars.push(vars.add(variable().min(0.0).max(bound)));
        z_vars.push(vars.add(variable().binary()));
    }

    let mut y_vars: BTreeMap<usize, Variable> = BTreeMap::new();
    for &bank_idx in candidate_banks.keys() {
        y_vars.insert(bank_idx, vars.add(variable().binary()));
    }

    // Objective: cost, then proximity, then capacity preference (maximised,
    // hence negated), then active-bank count.
    let mut objective = Expression::from(0.0);
    for (option, &x) in options.iter().zip(&x_vars) {
        let weight = option.unit_price + eps.proximity * option.tier.proximity_rank();
        objective += weight * x;
    }
    for (&bank_idx, &y) in &y_vars {
        objective -= eps.capacity * candidate_banks[&bank_idx] * y;
        objective += eps.bank_count * y;
    }

    let mut model = vars
        .minimise(objective)
        .using(highs)
        .set_verbose(false)
        .set_time_limit(timeout.as_secs_f64());

    // Demand coverage.
    for (demand_idx, row) in demand.iter().enumerate() {
        let mut covered = Expression::from(0.0);
        for (option, &x) in options.iter().zip(&x_vars) {
            if option.demand_idx == demand_idx {
                covered += x;
            }
        }
        model = model.with(constraint!(covered >= row.units_required));
    }

    // Stock capacity.
    let mut stock_draw: BTreeMap<usize, Expression> = BTreeMap::new();
    for (option, &x) in options.iter().zip(&x_vars) {
        for &(stock_idx, coeff) in &option.stock_use {
            *stock_draw
                .entry(stock_idx)
                .or_insert_with(|| Expression::from(0.0)) += coeff * x;
        }
    }
    for (stock_idx, draw) in stock_draw {
        let available = index.stock_row(stock_idx).quantity_available;
        model = model.with(constraint!(draw <= available));
    }

    // Option linking and minimum delivery.
    for ((option, &x), &z) in options.iter().zip(&x_vars).zip(&z_vars) {
        let big_m = demand[option.demand_idx].units_required;
        model = model.with(constraint!(x <= big_m * z));
        model = model.with(constraint!(x >= MIN_UNIT_DELIVERY * z));
    }

    // Bank activation and the two-bank cap.
    let mut active_banks = Expression::from(0.0);
    for (option, &z) in options.iter().zip(&z_vars) {
        let y = y_vars[&option.bank_idx];
        model = model.with(constraint!(z <= y));
    }
    for (_, &y) in &y_vars {
        active_banks += y;
    }
    model = model.with(constraint!(active_banks <= MAX_BANKS as f64));

    debug!(
        options = options.len(),
        banks = y_vars.len(),
        timeout_s = timeout.as_secs_f64(),
        "solving allocation MIP"
    );

    let solution = model.solve().map_err(|e| match e {
        good_lp::ResolutionError::Infeasible => {
            MipError::Infeasible("MIP proved the problem infeasible".to_string())
        }
        other => MipError::Failed(format!("{other:?}")),
    })?;

    // Extract and snap numeric dust.
    let mut assignment = Vec::with_capacity(options.len());
    for (&x, &z) in x_vars.iter().zip(&z_vars) {
        let x_val = solution.value(x);
        let z_val = solution.value(z);
        let snapped = if z_val < 0.5 || x_val < 1e-9 {
            0.0
        } else if x_val < MIN_UNIT_DELIVERY {
            // Active but a hair under the floor: solver tolerance, snap up.
            MIN_UNIT_DELIVERY
        } else {
            x_val
        };
        assignment.push(snapped);
    }
    Ok(assignment)
}
