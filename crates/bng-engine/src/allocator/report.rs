//! Post-processing of a verified assignment into reporting rows.
//!
//! Rows sharing `(demand, bank, supply habitat, tier, type)` are collapsed,
//! and `site_hab_totals` aggregates across demands by
//! `(bank, supply habitat, tier, type)` with a weighted-average effective
//! unit price.

use std::collections::BTreeMap;

use serde::Serialize;

use bng_core::tables::TableIndex;
use bng_core::types::{AllocationType, DemandRow, Tier};

use crate::options::{CandidateOption, OptionKind};

/// Component breakdown of a paired allocation row. Costs split by the fixed
/// blend ratios.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationPartRow {
    pub habitat_name: String,
    pub unit_price: f64,
    pub stock_use_ratio: f64,
    /// Raw units drawn from this component's stock.
    pub units_drawn: f64,
    pub cost_share: f64,
}

/// One line of the allocation.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationRow {
    pub demand_idx: usize,
    pub demand_habitat: String,
    pub bank_id: String,
    pub bank_key: String,
    pub supply_habitat: String,
    pub tier: Tier,
    pub allocation_type: AllocationType,
    /// Units of the demand satisfied by this row.
    pub units_supplied: f64,
    /// Units delivered at the bank: `units_supplied * SRM` for normal rows,
    /// `units_supplied` for paired rows (the SRM lives in the blend).
    pub effective_units: f64,
    /// GBP per unit supplied.
    pub unit_price: f64,
    /// Spatial multiplier shown on reports; always 1.0 for paired rows.
    pub srm_display: f64,
    pub cost: f64,
    /// Paired component breakdown; empty for normal rows.
    pub parts: Vec<AllocationPartRow>,
}

/// Aggregated view grouped by `(bank, supply habitat, tier, type)`.
#[derive(Debug, Clone, Serialize)]
pub struct SiteHabTotal {
    pub bank_id: String,
    pub supply_habitat: String,
    pub tier: Tier,
    pub allocation_type: AllocationType,
    pub units_supplied: f64,
    pub effective_units: f64,
    pub cost: f64,
    /// Weighted-average price per effective unit: `cost / effective_units`.
    pub avg_effective_unit_price: f64,
}

/// Build the reporting rows from a verified assignment.
pub(crate) fn build_report(
    assignment: &[f64],
    options: &[CandidateOption],
    demand: &[DemandRow],
    index: &TableIndex<'_>,
) -> (Vec<AllocationRow>, Vec<SiteHabTotal>, f64) {
    // Collapse key: (demand, bank, canonical supply, tier, type).
    let mut collapsed: BTreeMap<(usize, String, String, Tier, u8), AllocationRow> = BTreeMap::new();

    for (option, &units) in options.iter().zip(assignment) {
        if units <= 0.0 {
            continue;
        }
        let bank = index.bank(option.bank_idx);
        let allocation_type = option.allocation_type();
        let srm_display = option.srm_display(index);
        let effective = match option.kind {
            OptionKind::Normal { .. } => units * index.srm(option.tier),
            OptionKind::Paired { .. } => units,
        };
        let cost = units * option.unit_price;

        let mut parts = Vec::new();
        if let OptionKind::Paired { parts: ref blend } = option.kind {
            for part in blend {
                parts.push(AllocationPartRow {
                    habitat_name: part.habitat_name.clone(),
                    unit_price: part.unit_price,
                    stock_use_ratio: part.stock_use_ratio,
                    units_drawn: units * part.stock_use_ratio,
                    cost_share: cost * part.stock_use_ratio,
                });
            }
        }

        let key = (
            option.demand_idx,
            bank.bank_id.clone(),
            bng_core::canonical_habitat(&option.supply_habitat),
            option.tier,
            allocation_type as u8,
        );
        match collapsed.get_mut(&key) {
            Some(row) => {
                row.units_supplied += units;
                row.effective_units += effective;
                row.cost += cost;
                row.unit_price = row.cost / row.units_supplied;
                for part in parts {
                    match row
                        .parts
                        .iter_mut()
                        .find(|p| p.habitat_name == part.habitat_name)
                    {
                        Some(existing) => {
                            existing.units_drawn += part.units_drawn;
                            existing.cost_share += part.cost_share;
                        }
                        None => row.parts.push(part),
                    }
                }
            }
            None => {
                collapsed.insert(
                    key,
                    AllocationRow {
                        demand_idx: option.demand_idx,
                        demand_habitat: demand[option.demand_idx].habitat_name.clone(),
                        bank_id: bank.bank_id.clone(),
                        bank_key: bank.bank_key.clone(),
                        supply_habitat: option.supply_habitat.clone(),
                        tier: option.tier,
                        allocation_type,
                        units_supplied: units,
                        effective_units: effective,
                        unit_price: option.unit_price,
                        srm_display,
                        cost,
                        parts,
                    },
                );
            }
        }
    }

    let rows: Vec<AllocationRow> = collapsed.into_values().collect();

    let mut totals: BTreeMap<(String, String, Tier, u8), SiteHabTotal> = BTreeMap::new();
    for row in &rows {
        let key = (
            row.bank_id.clone(),
            bng_core::canonical_habitat(&row.supply_habitat),
            row.tier,
            row.allocation_type as u8,
        );
        let entry = totals.entry(key).or_insert_with(|| SiteHabTotal {
            bank_id: row.bank_id.clone(),
            supply_habitat: row.supply_habitat.clone(),
            tier: row.tier,
            allocation_type: row.allocation_type,
            units_supplied: 0.0,
            effective_units: 0.0,
            cost: 0.0,
            avg_effective_unit_price: 0.0,
        });
        entry.units_supplied += row.units_supplied;
        entry.effective_units += row.effective_units;
        entry.cost += row.cost;
    }
    let totals: Vec<SiteHabTotal> = totals
        .into_values()
        .map(|mut t| {
            if t.effective_units > 0.0 {
                t.avg_effective_unit_price = t.cost / t.effective_units;
            }
            t
        })
        .collect();

    let total_cost: f64 = rows.iter().map(|r| r.cost).sum();
    (rows, totals, total_cost)
}
