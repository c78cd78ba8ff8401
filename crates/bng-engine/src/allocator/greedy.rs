//! Deterministic greedy fallback allocator.
//!
//! Merit-order construction: candidate options per demand are sorted by
//! `(unit_price, proximity rank, -bank capacity)` and filled greedily
//! against remaining stock. The two-bank cap is handled by trying bank
//! subsets outright - every single bank, then every pair - ranked so that
//! banks covering more demands are tried first. Among the subsets that
//! fully satisfy the demand set, the cheapest wins (ties: fewer banks, then
//! bank ids).

use std::collections::{BTreeMap, BTreeSet};

use bng_core::tables::TableIndex;
use bng_core::types::DemandRow;
use tracing::debug;

use super::check::DEMAND_EPSILON;
use super::MIN_UNIT_DELIVERY;
use crate::error::Shortfall;
use crate::options::CandidateOption;

struct FillOutcome {
    assignment: Vec<f64>,
    cost: f64,
    covered_units: f64,
    shortfalls: Vec<Shortfall>,
}

pub(crate) fn solve_greedy(
    options: &[CandidateOption],
    demand: &[DemandRow],
    index: &TableIndex<'_>,
) -> Result<Vec<f64>, Vec<Shortfall>> {
    // Rank candidate banks: more coverable demands first, then capacity,
    // then bank_id for stability.
    let mut coverage: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for option in options {
        coverage.entry(option.bank_idx).or_default().insert(option.demand_idx);
    }
    let mut ranked_banks: Vec<usize> = coverage.keys().copied().collect();
    ranked_banks.sort_by(|&a, &b| {
        coverage[&b]
            .len()
            .cmp(&coverage[&a].len())
            .then_with(|| {
                index
                    .bank_capacity(b)
                    .partial_cmp(&index.bank_capacity(a))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| index.bank(a).bank_id.cmp(&index.bank(b).bank_id))
    });

    // Per-demand option order: price, proximity, bigger banks first, then
    // the stable enumeration index.
    let mut demand_options: Vec<Vec<usize>> = vec![Vec::new(); demand.len()];
    for (i, option) in options.iter().enumerate() {
        demand_options[option.demand_idx].push(i);
    }
    for list in &mut demand_options {
        list.sort_by(|&a, &b| {
            let oa = &options[a];
            let ob = &options[b];
            oa.unit_price
                .partial_cmp(&ob.unit_price)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    oa.tier
                        .proximity_rank()
                        .partial_cmp(&ob.tier.proximity_rank())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    index
                        .bank_capacity(ob.bank_idx)
                        .partial_cmp(&index.bank_capacity(oa.bank_idx))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.cmp(&b))
        });
    }

    // Enumerate subsets: singles in rank order, then pairs.
    let mut subsets: Vec<Vec<usize>> = Vec::new();
    for &b in &ranked_banks {
        subsets.push(vec![b]);
    }
    for (i, &a) in ranked_banks.iter().enumerate() {
        for &b in &ranked_banks[i + 1..] {
            subsets.push(vec![a, b]);
        }
    }

    let mut best: Option<(FillOutcome, usize)> = None;
    let mut best_partial: Option<FillOutcome> = None;

    for subset in &subsets {
        let outcome = fill(subset, options, demand, &demand_options, index);
        if outcome.shortfalls.is_empty() {
            let better = match &best {
                None => true,
                Some((current, len)) => {
                    outcome.cost < current.cost - 1e-9
                        || ((outcome.cost - current.cost).abs() <= 1e-9 && subset.len() < *len)
                }
            };
            if better {
                best = Some((outcome, subset.len()));
            }
        } else {
            let better_partial = match &best_partial {
                None => true,
                Some(current) => outcome.covered_units > current.covered_units + 1e-9,
            };
            if better_partial {
                best_partial = Some(outcome);
            }
        }
    }

    match best {
        Some((outcome, banks)) => {
            debug!(banks, cost = outcome.cost, "greedy allocation found");
            Ok(outcome.assignment)
        }
        None => {
            let shortfalls = best_partial
                .map(|o| o.shortfalls)
                .unwrap_or_else(|| {
                    demand
                        .iter()
                        .enumerate()
                        .map(|(demand_idx, row)| Shortfall {
                            demand_idx,
                            habitat_name: row.habitat_name.clone(),
                            units_required: row.units_required,
                            units_unmet: row.units_required,
                        })
                        .collect()
                });
            Err(shortfalls)
        }
    }
}

/// Fill every demand from the given bank subset, respecting stock and the
/// per-option minimum delivery.
fn fill(
    subset: &[usize],
    options: &[CandidateOption],
    demand: &[DemandRow],
    demand_options: &[Vec<usize>],
    index: &TableIndex<'_>,
) -> FillOutcome {
    let allowed: BTreeSet<usize> = subset.iter().copied().collect();
    let mut stock_left: BTreeMap<usize, f64> = BTreeMap::new();
    let mut assignment = vec![0.0; options.len()];
    let mut cost = 0.0;
    let mut covered_units = 0.0;
    let mut shortfalls = Vec::new();

    for (demand_idx, row) in demand.iter().enumerate() {
        let mut remaining = row.units_required;

        for &option_idx in &demand_options[demand_idx] {
            if remaining <= DEMAND_EPSILON {
                break;
            }
            let option = &options[option_idx];
            if !allowed.contains(&option.bank_idx) {
                continue;
            }

            // Units this option can still deliver given its stock draws.
            let mut max_units = f64::INFINITY;
            for &(stock_idx, coeff) in &option.stock_use {
                let left = *stock_left
                    .entry(stock_idx)
                    .or_insert_with(|| index.stock_row(stock_idx).quantity_available);
                if coeff > 0.0 {
                    max_units = max_units.min(left / coeff);
                }
            }

            let take = remaining.min(max_units);
            if take < MIN_UNIT_DELIVERY {
                continue;
            }

            assignment[option_idx] = take;
            cost += take * option.unit_price;
            covered_units += take;
            remaining -= take;
            for &(stock_idx, coeff) in &option.stock_use {
                *stock_left.get_mut(&stock_idx).unwrap() -= take * coeff;
            }
        }

        if remaining > DEMAND_EPSILON {
            shortfalls.push(Shortfall {
                demand_idx,
                habitat_name: row.habitat_name.clone(),
                units_required: row.units_required,
                units_unmet: remaining,
            });
        }
    }

    FillOutcome { assignment, cost, covered_units, shortfalls }
}
