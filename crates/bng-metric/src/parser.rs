//! Metric reduction: workbook to residual off-site demand.
//!
//! Per umbrella sheet:
//!
//! 1. Locate the header row heuristically (hedgerow/watercourse sheets may
//!    lack a group column; spellings vary between metric versions).
//! 2. Read each habitat row's project-wide change, taking distinctiveness
//!    from an explicit column when present, otherwise from the section
//!    banding rows.
//! 3. Split surpluses from deficits, then burn surpluses against deficits
//!    high-distinctiveness-first under the trading rules.
//! 4. Reconcile the headline net-gain requirement against what surplus
//!    remains.
//!
//! Very High watercourse deficits can never be traded; they are surfaced as
//! bespoke-compensation items, not dropped.

use std::collections::BTreeMap;

use tracing::debug;

use bng_core::diagnostics::Diagnostics;
use bng_core::tables::{ReferenceTables, TableIndex};
use bng_core::trading::{supply_can_offset, DemandSpec};
use bng_core::types::{DemandRow, Distinctiveness, UmbrellaType};

use crate::error::MetricParseError;
use crate::workbook::{Cell, MetricWorkbook, Sheet};

/// Parser options supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct MetricOptions {
    /// Overrides the workbook's headline percentage when set.
    pub target_net_gain_pct: Option<f64>,
}

/// A residual deficit for one habitat.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DeficitRow {
    pub habitat_name: String,
    pub units: f64,
    pub umbrella: UmbrellaType,
}

/// A Very High watercourse loss needing bespoke compensation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BespokeItem {
    pub habitat_name: String,
    pub units: f64,
}

/// The reduced metric: residual off-site demand plus headline reconciliation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricResult {
    pub area_deficits: Vec<DeficitRow>,
    pub hedgerow_deficits: Vec<DeficitRow>,
    pub watercourse_deficits: Vec<DeficitRow>,
    /// Surplus units left after on-site offsets and headline application.
    pub onsite_surpluses: BTreeMap<String, f64>,
    pub target_net_gain_pct: f64,
    /// `baseline * target_pct`.
    pub headline_required: f64,
    pub headline_applied: f64,
    pub headline_residual: f64,
    pub bespoke_required_items: Vec<BespokeItem>,
    pub diagnostics: Diagnostics,
}

impl MetricResult {
    /// The demand rows to hand to the allocation solver.
    pub fn to_demand_rows(&self) -> Vec<DemandRow> {
        let mut rows = Vec::new();
        for deficit in self
            .area_deficits
            .iter()
            .chain(&self.hedgerow_deficits)
            .chain(&self.watercourse_deficits)
        {
            rows.push(DemandRow::habitat(
                deficit.habitat_name.clone(),
                deficit.units,
                deficit.umbrella,
            ));
        }
        if self.headline_residual > 1e-9 {
            rows.push(DemandRow::net_gain(
                self.target_net_gain_pct,
                self.headline_residual,
                UmbrellaType::Area,
            ));
        }
        rows
    }

    /// Total units still needing off-site mitigation.
    pub fn total_offsite_units(&self) -> f64 {
        self.to_demand_rows().iter().map(|d| d.units_required).sum()
    }
}

/// Parse a JSON-encoded metric workbook.
pub fn parse_metric(
    workbook_bytes: &[u8],
    options: &MetricOptions,
    reference: &ReferenceTables,
) -> Result<MetricResult, MetricParseError> {
    let workbook: MetricWorkbook = serde_json::from_slice(workbook_bytes)
        .map_err(|e| MetricParseError::Malformed { detail: e.to_string() })?;
    parse_workbook(&workbook, options, reference)
}

/// Parse an already-deserialized workbook.
pub fn parse_workbook(
    workbook: &MetricWorkbook,
    options: &MetricOptions,
    reference: &ReferenceTables,
) -> Result<MetricResult, MetricParseError> {
    let index = reference.index()?;
    let mut diagnostics = Diagnostics::new();

    let target_pct = options
        .target_net_gain_pct
        .or(workbook.headline.target_net_gain_pct)
        .ok_or_else(|| MetricParseError::Malformed {
            detail: "no target net-gain percentage in options or headline".to_string(),
        })?;

    let mut surpluses: BTreeMap<String, f64> = BTreeMap::new();
    let mut deficits_by_umbrella: BTreeMap<&str, Vec<(String, f64)>> = BTreeMap::new();
    let mut bespoke = Vec::new();

    let sheets = [
        ("area", &workbook.area, UmbrellaType::Area),
        ("hedgerow", &workbook.hedgerow, UmbrellaType::Hedgerow),
        ("watercourse", &workbook.watercourse, UmbrellaType::Watercourse),
    ];

    for (sheet_name, sheet, umbrella) in sheets {
        let parsed = read_sheet(sheet_name, sheet, umbrella, &index, &mut diagnostics)?;
        for entry in parsed {
            if entry.change > 0.0 {
                *surpluses.entry(entry.habitat_name).or_insert(0.0) += entry.change;
            } else if entry.change < 0.0 {
                let units = -entry.change;
                let info = index
                    .habitat(&entry.habitat_name)
                    .expect("checked during sheet read");
                if umbrella == UmbrellaType::Watercourse
                    && info.distinctiveness == Distinctiveness::VeryHigh
                {
                    bespoke.push(BespokeItem { habitat_name: entry.habitat_name, units });
                } else {
                    deficits_by_umbrella
                        .entry(sheet_name)
                        .or_default()
                        .push((entry.habitat_name, units));
                }
            }
        }
    }

    // On-site offsets: deficits high-distinctiveness-first eat the surpluses
    // that pass the trading rules.
    let mut residuals: BTreeMap<&str, Vec<DeficitRow>> = BTreeMap::new();
    for (sheet_name, _, umbrella) in sheets {
        let mut deficits = deficits_by_umbrella.remove(sheet_name).unwrap_or_default();
        deficits.sort_by(|a, b| {
            let da = index.habitat(&a.0).expect("catalogued").distinctiveness;
            let db = index.habitat(&b.0).expect("catalogued").distinctiveness;
            db.cmp(&da).then_with(|| a.0.cmp(&b.0))
        });

        let mut residual_rows = Vec::new();
        for (habitat_name, mut units) in deficits {
            let info = index.habitat(&habitat_name).expect("catalogued");
            let spec = DemandSpec::Habitat(info);
            apply_surpluses(&spec, &mut units, &mut surpluses, &index);
            if units > 1e-9 {
                residual_rows.push(DeficitRow { habitat_name, units, umbrella });
            }
        }
        residuals.insert(sheet_name, residual_rows);
    }

    // Headline reconciliation: remaining surpluses at Low distinctiveness or
    // better feed the net-gain requirement (area umbrella).
    let headline_required = workbook.headline.baseline_units * target_pct / 100.0;
    let mut headline_remaining = headline_required;
    let net_gain_spec = DemandSpec::NetGain { umbrella: UmbrellaType::Area };
    apply_surpluses(&net_gain_spec, &mut headline_remaining, &mut surpluses, &index);
    let headline_applied = headline_required - headline_remaining;

    surpluses.retain(|_, units| *units > 1e-9);

    debug!(
        headline_required,
        headline_residual = headline_remaining,
        bespoke = bespoke.len(),
        "metric reduced"
    );

    Ok(MetricResult {
        area_deficits: residuals.remove("area").unwrap_or_default(),
        hedgerow_deficits: residuals.remove("hedgerow").unwrap_or_default(),
        watercourse_deficits: residuals.remove("watercourse").unwrap_or_default(),
        onsite_surpluses: surpluses,
        target_net_gain_pct: target_pct,
        headline_required,
        headline_applied,
        headline_residual: headline_remaining,
        bespoke_required_items: bespoke,
        diagnostics,
    })
}

/// Burn matching surpluses against one requirement, lowest distinctiveness
/// first so strong surpluses survive for later demands.
fn apply_surpluses(
    spec: &DemandSpec<'_>,
    remaining: &mut f64,
    surpluses: &mut BTreeMap<String, f64>,
    index: &TableIndex<'_>,
) {
    let mut candidates: Vec<String> = surpluses
        .iter()
        .filter(|(_, units)| **units > 1e-9)
        .map(|(name, _)| name.clone())
        .collect();
    candidates.sort_by(|a, b| {
        let da = index.habitat(a).map(|h| h.distinctiveness);
        let db = index.habitat(b).map(|h| h.distinctiveness);
        da.cmp(&db).then_with(|| a.cmp(b))
    });

    for name in candidates {
        if *remaining <= 1e-9 {
            break;
        }
        let info = match index.habitat(&name) {
            Some(info) => info,
            None => continue,
        };
        if supply_can_offset(spec, info, index).is_err() {
            continue;
        }
        let available = surpluses.get_mut(&name).expect("candidate came from the map");
        let used = remaining.min(*available);
        *available -= used;
        *remaining -= used;
    }
}

struct SheetEntry {
    habitat_name: String,
    change: f64,
}

struct ColumnMap {
    habitat: usize,
    distinctiveness: Option<usize>,
    project: usize,
}

/// How many leading rows to scan for a header.
const HEADER_SCAN_LIMIT: usize = 30;

fn fold(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Locate the header row and resolve column positions.
fn locate_header(sheet_name: &str, sheet: &Sheet) -> Result<(usize, ColumnMap), MetricParseError> {
    for (row_idx, row) in sheet.rows.iter().take(HEADER_SCAN_LIMIT).enumerate() {
        let mut habitat = None;
        let mut distinctiveness = None;
        let mut project = None;

        for (col_idx, cell) in row.iter().enumerate() {
            let Some(text) = cell.as_text() else { continue };
            let folded = fold(text);
            if folded.contains("habitat") && !folded.contains("group") && habitat.is_none() {
                habitat = Some(col_idx);
            } else if folded.contains("distinct") && distinctiveness.is_none() {
                distinctiveness = Some(col_idx);
            } else if (folded.contains("project wide") || folded.contains("total change"))
                && project.is_none()
            {
                project = Some(col_idx);
            }
        }

        // A header needs both the habitat column and the project-wide change
        // column; banding rows never carry the latter.
        if let (Some(habitat), Some(project)) = (habitat, project) {
            return Ok((row_idx, ColumnMap { habitat, distinctiveness, project }));
        }
    }
    Err(MetricParseError::HeaderNotFound { sheet: sheet_name.to_string() })
}

/// A banding row announces the distinctiveness of the section below it.
fn banding_distinctiveness(row: &[Cell]) -> Option<Distinctiveness> {
    let mut texts = row.iter().filter_map(|c| c.as_text());
    let first = texts.next()?;
    if texts.next().is_some() {
        return None; // data rows carry more than one text cell
    }
    let folded = fold(first);
    for (pattern, dist) in [
        ("very high", Distinctiveness::VeryHigh),
        ("very low", Distinctiveness::VeryLow),
        ("high", Distinctiveness::High),
        ("medium", Distinctiveness::Medium),
        ("low", Distinctiveness::Low),
    ] {
        if folded == pattern || folded == format!("{pattern} distinctiveness") {
            return Some(dist);
        }
    }
    None
}

fn read_sheet(
    sheet_name: &str,
    sheet: &Sheet,
    umbrella: UmbrellaType,
    index: &TableIndex<'_>,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<SheetEntry>, MetricParseError> {
    if sheet.rows.is_empty() {
        return Ok(Vec::new());
    }
    let (header_row, columns) = locate_header(sheet_name, sheet)?;

    let mut entries = Vec::new();
    let mut section_band: Option<Distinctiveness> = None;

    for (row_idx, row) in sheet.rows.iter().enumerate().skip(header_row + 1) {
        if let Some(band) = banding_distinctiveness(row) {
            section_band = Some(band);
            continue;
        }

        let Some(habitat_text) = row.get(columns.habitat).and_then(Cell::as_text) else {
            continue;
        };

        let change = match row.get(columns.project).and_then(Cell::as_number) {
            Some(v) => v,
            None => {
                diagnostics.add_warning_with_entity(
                    "metric",
                    format!("row {row_idx} of the {sheet_name} sheet has no project-wide change"),
                    habitat_text.to_string(),
                );
                continue;
            }
        };
        if change == 0.0 {
            continue;
        }

        let info = index.habitat(habitat_text).ok_or_else(|| {
            MetricParseError::UnknownHabitat {
                sheet: sheet_name.to_string(),
                habitat: habitat_text.to_string(),
            }
        })?;
        if info.umbrella != umbrella {
            diagnostics.add_warning_with_entity(
                "metric",
                format!("habitat listed on the {sheet_name} sheet belongs to '{}'", info.umbrella),
                habitat_text.to_string(),
            );
            continue;
        }

        // Distinctiveness: explicit column preferred, else the section band.
        let stated = match columns.distinctiveness {
            Some(col) => match row.get(col).and_then(Cell::as_text) {
                Some(text) => Some(Distinctiveness::parse(text).ok_or_else(|| {
                    MetricParseError::UnknownDistinctiveness {
                        sheet: sheet_name.to_string(),
                        row: row_idx,
                        value: text.to_string(),
                    }
                })?),
                None => section_band,
            },
            None => section_band,
        };
        if let Some(stated) = stated {
            if stated != info.distinctiveness {
                diagnostics.add_warning_with_entity(
                    "metric",
                    format!(
                        "sheet says {stated} but the catalogue says {}; using the catalogue",
                        info.distinctiveness
                    ),
                    habitat_text.to_string(),
                );
            }
        }

        entries.push(SheetEntry {
            habitat_name: info.habitat_name.clone(),
            change,
        });
    }

    Ok(entries)
}
