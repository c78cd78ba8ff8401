//! Candidate option enumeration and contract-size selection.
//!
//! For each demand row this module enumerates every way a bank could satisfy
//! it: normal options (one stock resource, rule-checked supply habitat,
//! priced per effective unit) and paired options (the demand habitat blended
//! with a companion habitat at a fixed ratio, SRM folded into the blended
//! price). The allocator then chooses among them.
//!
//! Enumeration order is stable: banks by `bank_id`, stock rows by
//! `(habitat_name, stock_id)`, so identical inputs always yield the same
//! option vector.

use bng_core::normalize::canonical_habitat;
use bng_core::tables::TableIndex;
use bng_core::trading::{supply_can_offset, DemandSpec};
use bng_core::types::{
    AllocationType, ContractSize, DemandKind, DemandRow, Promoter, PromoterKind, Tier,
};

use crate::error::{OptionRejection, RejectedSupply, SolveError};
use crate::geography::GeographyContext;

/// Blend shares for paired options: (demand habitat share, companion share).
pub fn paired_blend(tier: Tier) -> Option<(f64, f64)> {
    match tier {
        // A local pair has no spatial risk to amortise.
        Tier::Local => None,
        Tier::Adjacent => Some((3.0 / 4.0, 1.0 / 4.0)),
        Tier::Far => Some((1.0 / 2.0, 1.0 / 2.0)),
    }
}

/// One component of a paired option.
#[derive(Debug, Clone, PartialEq)]
pub struct PairPart {
    pub habitat_name: String,
    /// Component price per effective unit (discounted).
    pub unit_price: f64,
    /// Fixed blend share; raw stock drawn is `units * stock_use_ratio`.
    pub stock_use_ratio: f64,
    pub stock_idx: usize,
}

/// How an option draws on stock.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    /// Single supply habitat from one stock resource.
    Normal { stock_idx: usize },
    /// Fixed-ratio blend of the demand habitat with a companion.
    Paired { parts: [PairPart; 2] },
}

/// A candidate way of satisfying one demand row.
#[derive(Debug, Clone)]
pub struct CandidateOption {
    pub demand_idx: usize,
    pub bank_idx: usize,
    /// Display habitat: the supply habitat, or the primary (demand) habitat
    /// for paired options.
    pub supply_habitat: String,
    pub tier: Tier,
    /// GBP to satisfy one unit of the demand from this option (blended and
    /// discounted where applicable).
    pub unit_price: f64,
    /// Raw stock drawn per unit supplied: `(stock_idx, coefficient)`.
    pub stock_use: Vec<(usize, f64)>,
    pub kind: OptionKind,
}

impl CandidateOption {
    pub fn allocation_type(&self) -> AllocationType {
        match self.kind {
            OptionKind::Normal { .. } => AllocationType::Normal,
            OptionKind::Paired { .. } => AllocationType::Paired,
        }
    }

    /// Spatial multiplier shown on reports: the tier's SRM for normal
    /// options, always 1.0 for paired (the SRM lives inside the blend).
    pub fn srm_display(&self, index: &TableIndex<'_>) -> f64 {
        match self.kind {
            OptionKind::Normal { .. } => index.srm(self.tier),
            OptionKind::Paired { .. } => 1.0,
        }
    }
}

/// Pick the pricing band to look up.
///
/// The caller's requested size is always the recorded size of the quote; a
/// `tier_up` promoter advances the *lookup* one band when any pricing row
/// exists at the stepped band.
pub fn lookup_contract_size(
    requested: ContractSize,
    promoter: &Promoter,
    index: &TableIndex<'_>,
) -> ContractSize {
    if promoter.kind != PromoterKind::TierUp {
        return requested;
    }
    match requested.step_up() {
        Some(stepped) if index.has_contract_size(stepped) => stepped,
        _ => requested,
    }
}

/// Cap on rejected-supply samples reported per failed demand.
const REJECTION_SAMPLE_CAP: usize = 8;

/// Enumerate all candidate options for the demand set.
///
/// Returns `NoLegalOptions` for the first demand (in input order) that ends
/// up with none, carrying a sample of the nearest rejected supplies.
pub fn build_options(
    demand: &[DemandRow],
    index: &TableIndex<'_>,
    geo: &GeographyContext,
    lookup_size: ContractSize,
    promoter: &Promoter,
) -> Result<Vec<CandidateOption>, SolveError> {
    let price_factor = promoter.price_factor();
    let mut options = Vec::new();

    for (demand_idx, row) in demand.iter().enumerate() {
        let mut rejections: Vec<RejectedSupply> = Vec::new();
        let mut found = 0usize;

        let spec = match &row.kind {
            DemandKind::Habitat => {
                // Validated before option building, so the lookup succeeds.
                let info = index.habitat(&row.habitat_name).ok_or_else(|| {
                    SolveError::Config(bng_core::ConfigError::single(format!(
                        "demand habitat '{}' is not in the catalogue",
                        row.habitat_name
                    )))
                })?;
                DemandSpec::Habitat(info)
            }
            DemandKind::NetGain { .. } => DemandSpec::NetGain { umbrella: row.umbrella },
        };

        for (bank_idx, bank) in index.banks_sorted() {
            let tier = geo.classify(bank);

            for (stock_idx, stock) in index.stock_rows(bank_idx) {
                let supply = match index.habitat(&stock.habitat_name) {
                    Some(info) => info,
                    None => continue, // validation already rejected this
                };
                if supply.umbrella != row.umbrella {
                    continue;
                }
                if let Err(reason) = supply_can_offset(&spec, supply, index) {
                    push_rejection(
                        &mut rejections,
                        bank,
                        &stock.habitat_name,
                        OptionRejection::Trading { detail: reason },
                    );
                    continue;
                }
                if stock.quantity_available <= 0.0 {
                    push_rejection(
                        &mut rejections,
                        bank,
                        &stock.habitat_name,
                        OptionRejection::NoStock,
                    );
                    continue;
                }
                let price = match index.price(bank_idx, &stock.habitat_name, lookup_size, tier) {
                    Some(p) => p,
                    None => {
                        push_rejection(
                            &mut rejections,
                            bank,
                            &stock.habitat_name,
                            OptionRejection::NoPricing,
                        );
                        continue;
                    }
                };

                options.push(CandidateOption {
                    demand_idx,
                    bank_idx,
                    supply_habitat: supply.habitat_name.clone(),
                    tier,
                    unit_price: price * price_factor,
                    stock_use: vec![(stock_idx, index.srm(tier))],
                    kind: OptionKind::Normal { stock_idx },
                });
                found += 1;
            }

            // Paired options: demand habitat as primary, any same-umbrella
            // companion at the same bank, both priced at this tier.
            if let DemandSpec::Habitat(demand_info) = &spec {
                if let Some((primary_share, companion_share)) = paired_blend(tier) {
                    let demand_canonical = canonical_habitat(&demand_info.habitat_name);
                    let primary_price =
                        index.price(bank_idx, &demand_info.habitat_name, lookup_size, tier);

                    if let Some(primary_price) = primary_price {
                        for (primary_idx, primary_stock) in index.stock_rows(bank_idx) {
                            if canonical_habitat(&primary_stock.habitat_name) != demand_canonical
                                || primary_stock.quantity_available <= 0.0
                            {
                                continue;
                            }
                            for (companion_idx, companion_stock) in index.stock_rows(bank_idx) {
                                if companion_idx == primary_idx {
                                    continue;
                                }
                                let companion = match index.habitat(&companion_stock.habitat_name) {
                                    Some(info) => info,
                                    None => continue,
                                };
                                if companion.umbrella != row.umbrella
                                    || canonical_habitat(&companion.habitat_name)
                                        == demand_canonical
                                    || companion_stock.quantity_available <= 0.0
                                {
                                    continue;
                                }
                                let companion_price = match index.price(
                                    bank_idx,
                                    &companion.habitat_name,
                                    lookup_size,
                                    tier,
                                ) {
                                    Some(p) => p,
                                    None => continue,
                                };

                                let primary_unit = primary_price * price_factor;
                                let companion_unit = companion_price * price_factor;
                                let blended =
                                    primary_share * primary_unit + companion_share * companion_unit;

                                options.push(CandidateOption {
                                    demand_idx,
                                    bank_idx,
                                    supply_habitat: demand_info.habitat_name.clone(),
                                    tier,
                                    unit_price: blended,
                                    stock_use: vec![
                                        (primary_idx, primary_share),
                                        (companion_idx, companion_share),
                                    ],
                                    kind: OptionKind::Paired {
                                        parts: [
                                            PairPart {
                                                habitat_name: demand_info.habitat_name.clone(),
                                                unit_price: primary_unit,
                                                stock_use_ratio: primary_share,
                                                stock_idx: primary_idx,
                                            },
                                            PairPart {
                                                habitat_name: companion.habitat_name.clone(),
                                                unit_price: companion_unit,
                                                stock_use_ratio: companion_share,
                                                stock_idx: companion_idx,
                                            },
                                        ],
                                    },
                                });
                                found += 1;
                            }
                        }
                    }
                }
            }
        }

        if found == 0 {
            return Err(SolveError::NoLegalOptions {
                demand_idx,
                demand_habitat: row.habitat_name.clone(),
                rejections,
            });
        }
    }

    Ok(options)
}

fn push_rejection(
    rejections: &mut Vec<RejectedSupply>,
    bank: &bng_core::types::Bank,
    habitat: &str,
    reason: OptionRejection,
) {
    if rejections.len() >= REJECTION_SAMPLE_CAP {
        return;
    }
    // One sample per (bank, habitat) pair keeps the list readable.
    if rejections
        .iter()
        .any(|r| r.bank_id == bank.bank_id && r.supply_habitat == habitat)
    {
        return;
    }
    rejections.push(RejectedSupply {
        bank_id: bank.bank_id.clone(),
        supply_habitat: habitat.to_string(),
        reason,
    });
}
