//! Shared constraint checker.
//!
//! Verifies a candidate assignment against the engine invariants,
//! independent of which solver produced it. Trading-rule legality is not
//! re-checked here: options are rule-filtered at construction, so an option
//! existing is proof of legality.

use std::collections::{BTreeSet, HashMap};

use bng_core::tables::TableIndex;
use bng_core::types::DemandRow;

use super::MIN_UNIT_DELIVERY;
use crate::options::CandidateOption;

/// Demand-coverage rounding epsilon.
pub const DEMAND_EPSILON: f64 = 1e-6;

/// Cost-equality epsilon, in GBP.
pub const COST_EPSILON: f64 = 1e-4;

/// One invariant breach in a candidate assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    StockOverdraw {
        stock_id: String,
        consumed: f64,
        available: f64,
    },
    DemandShortfall {
        demand_idx: usize,
        supplied: f64,
        required: f64,
    },
    BankCapExceeded {
        banks: Vec<String>,
    },
    BelowMinimumDelivery {
        option_idx: usize,
        units: f64,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::StockOverdraw { stock_id, consumed, available } => write!(
                f,
                "stock '{stock_id}' overdrawn: {consumed:.6} consumed of {available:.6} available"
            ),
            Violation::DemandShortfall { demand_idx, supplied, required } => write!(
                f,
                "demand {demand_idx} short: {supplied:.6} supplied of {required:.6} required"
            ),
            Violation::BankCapExceeded { banks } => {
                write!(f, "more than two banks active: {}", banks.join(", "))
            }
            Violation::BelowMinimumDelivery { option_idx, units } => write!(
                f,
                "option {option_idx} delivers {units:.6}, below the {MIN_UNIT_DELIVERY} minimum"
            ),
        }
    }
}

/// Verify an assignment `x[i]` of units against all solver invariants.
///
/// An empty vector means the assignment is acceptable.
pub fn verify_assignment(
    assignment: &[f64],
    options: &[CandidateOption],
    demand: &[DemandRow],
    index: &TableIndex<'_>,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    // Minimum delivery: zero or >= 0.01 units per active option.
    for (i, &x) in assignment.iter().enumerate() {
        if x > 0.0 && x < MIN_UNIT_DELIVERY - DEMAND_EPSILON {
            violations.push(Violation::BelowMinimumDelivery { option_idx: i, units: x });
        }
    }

    // Stock capacity.
    let mut consumed: HashMap<usize, f64> = HashMap::new();
    for (option, &x) in options.iter().zip(assignment) {
        if x <= 0.0 {
            continue;
        }
        for &(stock_idx, coeff) in &option.stock_use {
            *consumed.entry(stock_idx).or_insert(0.0) += x * coeff;
        }
    }
    let mut stock_indices: Vec<usize> = consumed.keys().copied().collect();
    stock_indices.sort_unstable();
    for stock_idx in stock_indices {
        let used = consumed[&stock_idx];
        let row = index.stock_row(stock_idx);
        if used > row.quantity_available + DEMAND_EPSILON {
            violations.push(Violation::StockOverdraw {
                stock_id: row.stock_id.clone(),
                consumed: used,
                available: row.quantity_available,
            });
        }
    }

    // Demand coverage.
    let mut supplied = vec![0.0; demand.len()];
    for (option, &x) in options.iter().zip(assignment) {
        supplied[option.demand_idx] += x;
    }
    for (demand_idx, row) in demand.iter().enumerate() {
        if supplied[demand_idx] < row.units_required - DEMAND_EPSILON {
            violations.push(Violation::DemandShortfall {
                demand_idx,
                supplied: supplied[demand_idx],
                required: row.units_required,
            });
        }
    }

    // Two-bank cap.
    let active_banks: BTreeSet<usize> = options
        .iter()
        .zip(assignment)
        .filter(|(_, &x)| x > 0.0)
        .map(|(option, _)| option.bank_idx)
        .collect();
    if active_banks.len() > super::MAX_BANKS {
        violations.push(Violation::BankCapExceeded {
            banks: active_banks
                .iter()
                .map(|&b| index.bank(b).bank_id.clone())
                .collect(),
        });
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geography::GeographyContext;
    use crate::options::build_options;
    use crate::test_fixtures::{fixture, FixtureSpec};
    use bng_core::types::{ContractSize, DemandRow, Promoter, UmbrellaType};

    #[test]
    fn detects_shortfall_and_overdraw() {
        let tables = fixture(FixtureSpec { meadow_stock_a: 0.5, ..FixtureSpec::default() });
        let index = tables.index().unwrap();
        let geo = GeographyContext::new("York", "Vale of York", &[], &[]);
        let demand = vec![DemandRow::habitat("Lowland meadows", 2.0, UmbrellaType::Area)];
        let options = build_options(
            &demand,
            &index,
            &geo,
            ContractSize::Small,
            &Promoter::none(),
        )
        .unwrap();

        // Nothing assigned: shortfall.
        let nothing = vec![0.0; options.len()];
        let violations = verify_assignment(&nothing, &options, &demand, &index);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::DemandShortfall { .. })));

        // Drain bank A's half-unit stock far past capacity.
        let mut drained = vec![0.0; options.len()];
        let bank_a_local = options
            .iter()
            .position(|o| {
                index.bank(o.bank_idx).bank_id == "bank-a"
                    && matches!(o.kind, crate::options::OptionKind::Normal { .. })
            })
            .unwrap();
        drained[bank_a_local] = 2.0;
        let violations = verify_assignment(&drained, &options, &demand, &index);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::StockOverdraw { .. })));
    }

    #[test]
    fn detects_sub_minimum_delivery() {
        let tables = fixture(FixtureSpec::default());
        let index = tables.index().unwrap();
        let geo = GeographyContext::new("York", "Vale of York", &[], &[]);
        let demand = vec![DemandRow::habitat("Lowland meadows", 1.0, UmbrellaType::Area)];
        let options = build_options(
            &demand,
            &index,
            &geo,
            ContractSize::Small,
            &Promoter::none(),
        )
        .unwrap();

        let mut assignment = vec![0.0; options.len()];
        assignment[0] = 0.004;
        let violations = verify_assignment(&assignment, &options, &demand, &index);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::BelowMinimumDelivery { .. })));
    }
}
