//! The `solve` entry point.
//!
//! A single call is a pure function of `(demand, context, reference tables)`:
//! validate, classify geography, enumerate options, allocate, post-process,
//! apply the surplus uplift offset. Nothing is cached across calls and the
//! core takes no locks, so concurrent solves on disjoint inputs are safe.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use bng_core::diagnostics::Diagnostics;
use bng_core::tables::ReferenceTables;
use bng_core::types::{ContractSize, DemandKind, DemandRow, Promoter, UmbrellaType};
use bng_core::ConfigError;

use crate::allocator::report::{build_report, AllocationRow, SiteHabTotal};
use crate::allocator::allocate;
use crate::error::SolveError;
use crate::geography::GeographyContext;
use crate::options::{build_options, lookup_contract_size};
use crate::suo::{compute_suo, SuoBreakdown, DEFAULT_MAX_SUO};

/// Surplus uplift offset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuoConfig {
    pub enabled: bool,
    /// Cap on the discount fraction.
    pub max_fraction: f64,
    /// On-site surplus units per habitat, from the metric.
    pub onsite_surpluses: BTreeMap<String, f64>,
}

impl Default for SuoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_fraction: DEFAULT_MAX_SUO,
            onsite_surpluses: BTreeMap::new(),
        }
    }
}

/// MIP control knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverOptions {
    pub timeout_ms: u64,
    pub allow_greedy_fallback: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self { timeout_ms: 60_000, allow_greedy_fallback: true }
    }
}

/// Everything about the quote other than the demand itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveContext {
    pub target_lpa: String,
    pub target_nca: String,
    #[serde(default)]
    pub lpa_neighbours: Vec<String>,
    #[serde(default)]
    pub nca_neighbours: Vec<String>,
    pub contract_size: ContractSize,
    #[serde(default)]
    pub promoter: Promoter,
    #[serde(default)]
    pub suo: SuoConfig,
    #[serde(default)]
    pub solver: SolverOptions,
}

/// A successful allocation.
#[derive(Debug, Clone, Serialize)]
pub struct SolveResult {
    pub allocation: Vec<AllocationRow>,
    pub site_hab_totals: Vec<SiteHabTotal>,
    /// The caller's contract size; always the recorded size of the quote.
    pub contract_size: ContractSize,
    /// The size pricing was looked up at (differs under tier-up).
    pub pricing_contract_size: ContractSize,
    pub total_cost: f64,
    pub suo: Option<SuoBreakdown>,
    pub diagnostics: Diagnostics,
}

/// Compute the cheapest legally admissible allocation for the demand set.
pub fn solve(
    demand: &[DemandRow],
    context: &SolveContext,
    reference: &ReferenceTables,
) -> Result<SolveResult, SolveError> {
    let index = reference.index()?;
    validate_demand(demand, &index)?;

    let mut diagnostics = Diagnostics::new();

    let geo = GeographyContext::new(
        &context.target_lpa,
        &context.target_nca,
        &context.lpa_neighbours,
        &context.nca_neighbours,
    );

    let pricing_contract_size =
        lookup_contract_size(context.contract_size, &context.promoter, &index);
    if pricing_contract_size != context.contract_size {
        diagnostics.add_warning(
            "pricing",
            format!(
                "tier-up promoter active: pricing looked up at '{}', quote recorded at '{}'",
                pricing_contract_size, context.contract_size
            ),
        );
    }

    if demand.iter().any(|d| d.umbrella == UmbrellaType::Watercourse) {
        // Catchment-based watercourse tiering needs external data; LPA/NCA
        // tiering is used instead.
        diagnostics.add_warning(
            "geography",
            "watercourse demands are tiered by LPA/NCA, not catchment",
        );
    }

    if demand.is_empty() {
        return Ok(SolveResult {
            allocation: Vec::new(),
            site_hab_totals: Vec::new(),
            contract_size: context.contract_size,
            pricing_contract_size,
            total_cost: 0.0,
            suo: None,
            diagnostics,
        });
    }

    let options = build_options(demand, &index, &geo, pricing_contract_size, &context.promoter)?;
    let assignment = allocate(&options, demand, &index, &context.solver, &mut diagnostics)?;
    let (allocation, site_hab_totals, total_cost) =
        build_report(&assignment, &options, demand, &index);

    let suo = if context.suo.enabled {
        for habitat in context.suo.onsite_surpluses.keys() {
            if index.habitat(habitat).is_none() {
                diagnostics.add_warning_with_entity(
                    "suo",
                    "surplus habitat not in catalogue, ignored",
                    habitat.clone(),
                );
            }
        }
        let total_units: f64 = allocation.iter().map(|r| r.effective_units).sum();
        Some(compute_suo(
            &context.suo.onsite_surpluses,
            &index,
            total_units,
            total_cost,
            context.suo.max_fraction,
        ))
    } else {
        None
    };

    info!(
        rows = allocation.len(),
        total_cost,
        banks = site_hab_totals
            .iter()
            .map(|t| t.bank_id.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len(),
        "allocation complete"
    );

    Ok(SolveResult {
        allocation,
        site_hab_totals,
        contract_size: context.contract_size,
        pricing_contract_size,
        total_cost,
        suo,
        diagnostics,
    })
}

/// Validate demand rows against the catalogue, accumulating every problem.
fn validate_demand(
    demand: &[DemandRow],
    index: &bng_core::tables::TableIndex<'_>,
) -> Result<(), SolveError> {
    let mut problems = Vec::new();
    for (i, row) in demand.iter().enumerate() {
        if !row.units_required.is_finite() || row.units_required <= 0.0 {
            problems.push(format!(
                "demand {i} ('{}') has non-positive units_required",
                row.habitat_name
            ));
        }
        match &row.kind {
            DemandKind::Habitat => match index.habitat(&row.habitat_name) {
                Some(info) => {
                    if info.umbrella != row.umbrella {
                        problems.push(format!(
                            "demand {i} ('{}') declares umbrella '{}' but the catalogue says '{}'",
                            row.habitat_name, row.umbrella, info.umbrella
                        ));
                    }
                }
                None => problems.push(format!(
                    "demand {i} habitat '{}' is not in the catalogue",
                    row.habitat_name
                )),
            },
            DemandKind::NetGain { pct } => {
                if !pct.is_finite() || *pct <= 0.0 {
                    problems.push(format!("demand {i} has a non-positive net-gain percentage"));
                }
            }
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(SolveError::Config(ConfigError::new(problems)))
    }
}
