//! Like-for-like trading rules.
//!
//! Decides whether a supply habitat may legally offset a demand. The decision
//! is layered:
//!
//! 1. Cross-umbrella trading is never legal.
//! 2. An explicit [`crate::types::TradingRule`] set for the demand habitat,
//!    when present, replaces every other rule.
//! 3. Otherwise an umbrella-specific default matrix applies, dispatched
//!    through a function table keyed by [`UmbrellaType`].
//!
//! All name comparisons use canonical habitat forms. Rejections carry a
//! machine-readable [`RejectReason`] so a failed demand can report *why* its
//! nearest supplies were turned away.

use serde::Serialize;

use crate::normalize::same_habitat;
use crate::tables::TableIndex;
use crate::types::{Distinctiveness, HabitatInfo, UmbrellaType};

/// Why a supply habitat was rejected for a demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum RejectReason {
    /// Supply sits under a different umbrella type.
    WrongUmbrella,
    /// An explicit trading rule for the demand excludes this supply.
    ExcludedByExplicitRule,
    /// Supply distinctiveness is below the minimum the matrix allows.
    DistinctivenessTooLow { required: Distinctiveness },
    /// Supply must be strictly more distinctive than the demand.
    TradeUpRequired { above: Distinctiveness },
    /// Medium-tier area trading requires the same broad group.
    WrongBroadGroup,
    /// This demand only accepts the same habitat back.
    NotLikeForLike,
    /// Very High watercourse losses need bespoke compensation and can never
    /// be traded through the bank catalogue.
    BespokeOnly,
}

impl RejectReason {
    pub fn describe(&self) -> String {
        match self {
            RejectReason::WrongUmbrella => "supply is under a different umbrella type".into(),
            RejectReason::ExcludedByExplicitRule => {
                "an explicit trading rule excludes this supply".into()
            }
            RejectReason::DistinctivenessTooLow { required } => {
                format!("supply distinctiveness must be at least {required}")
            }
            RejectReason::TradeUpRequired { above } => {
                format!("supply must be strictly more distinctive than {above}")
            }
            RejectReason::WrongBroadGroup => {
                "Medium-distinctiveness trades must stay within the broad group".into()
            }
            RejectReason::NotLikeForLike => "this demand only accepts like-for-like supply".into(),
            RejectReason::BespokeOnly => {
                "Very High watercourse losses require bespoke compensation".into()
            }
        }
    }
}

/// The demand side of a legality check.
#[derive(Debug, Clone, Copy)]
pub enum DemandSpec<'a> {
    /// Loss of a named habitat with its catalogue entry.
    Habitat(&'a HabitatInfo),
    /// Headline net-gain pseudo-demand for one umbrella.
    NetGain { umbrella: UmbrellaType },
}

impl DemandSpec<'_> {
    pub fn umbrella(&self) -> UmbrellaType {
        match self {
            DemandSpec::Habitat(info) => info.umbrella,
            DemandSpec::NetGain { umbrella } => *umbrella,
        }
    }
}

/// Can `supply` legally offset `demand`?
///
/// `Ok(())` means legal; `Err` carries the rejection reason closest to the
/// decision actually taken.
pub fn supply_can_offset(
    demand: &DemandSpec<'_>,
    supply: &HabitatInfo,
    index: &TableIndex<'_>,
) -> Result<(), RejectReason> {
    if demand.umbrella() != supply.umbrella {
        return Err(RejectReason::WrongUmbrella);
    }

    match demand {
        DemandSpec::Habitat(info) => {
            if let Some(allowed) = index.explicit_supplies(&info.habitat_name) {
                let canonical = crate::normalize::canonical_habitat(&supply.habitat_name);
                return if allowed.contains(&canonical) {
                    Ok(())
                } else {
                    Err(RejectReason::ExcludedByExplicitRule)
                };
            }
            let rule = rule_for(info.umbrella);
            rule(info, supply)
        }
        DemandSpec::NetGain { umbrella } => net_gain_rule(*umbrella, supply),
    }
}

type RuleFn = fn(&HabitatInfo, &HabitatInfo) -> Result<(), RejectReason>;

/// Default-matrix dispatch table, keyed by umbrella.
fn rule_for(umbrella: UmbrellaType) -> RuleFn {
    match umbrella {
        UmbrellaType::Area => area_rule,
        UmbrellaType::Hedgerow => hedgerow_rule,
        UmbrellaType::Watercourse => watercourse_rule,
    }
}

fn same_broad_group(a: &HabitatInfo, b: &HabitatInfo) -> bool {
    a.broad_group.trim().eq_ignore_ascii_case(b.broad_group.trim())
}

fn area_rule(demand: &HabitatInfo, supply: &HabitatInfo) -> Result<(), RejectReason> {
    use Distinctiveness::*;
    match demand.distinctiveness {
        VeryHigh | High => {
            if same_habitat(&demand.habitat_name, &supply.habitat_name) {
                Ok(())
            } else {
                Err(RejectReason::NotLikeForLike)
            }
        }
        Medium => {
            if supply.distinctiveness >= High {
                Ok(())
            } else if supply.distinctiveness == Medium {
                if same_broad_group(demand, supply) {
                    Ok(())
                } else {
                    Err(RejectReason::WrongBroadGroup)
                }
            } else {
                Err(RejectReason::DistinctivenessTooLow { required: Medium })
            }
        }
        Low => {
            if supply.distinctiveness >= Low {
                Ok(())
            } else {
                Err(RejectReason::DistinctivenessTooLow { required: Low })
            }
        }
        // Very Low losses trade freely within the umbrella.
        VeryLow => Ok(()),
    }
}

fn hedgerow_rule(demand: &HabitatInfo, supply: &HabitatInfo) -> Result<(), RejectReason> {
    use Distinctiveness::*;
    match demand.distinctiveness {
        VeryHigh | High | Medium => {
            if same_habitat(&demand.habitat_name, &supply.habitat_name) {
                Ok(())
            } else {
                Err(RejectReason::NotLikeForLike)
            }
        }
        Low | VeryLow => {
            if supply.distinctiveness > demand.distinctiveness {
                Ok(())
            } else {
                Err(RejectReason::TradeUpRequired { above: demand.distinctiveness })
            }
        }
    }
}

fn watercourse_rule(demand: &HabitatInfo, supply: &HabitatInfo) -> Result<(), RejectReason> {
    use Distinctiveness::*;
    match demand.distinctiveness {
        VeryHigh => Err(RejectReason::BespokeOnly),
        // Like-for-like explicitly: canals cannot offset ditches and vice
        // versa even though both are Medium.
        High | Medium => {
            if same_habitat(&demand.habitat_name, &supply.habitat_name) {
                Ok(())
            } else {
                Err(RejectReason::NotLikeForLike)
            }
        }
        Low | VeryLow => {
            if supply.distinctiveness > demand.distinctiveness {
                Ok(())
            } else {
                Err(RejectReason::TradeUpRequired { above: demand.distinctiveness })
            }
        }
    }
}

fn net_gain_rule(umbrella: UmbrellaType, supply: &HabitatInfo) -> Result<(), RejectReason> {
    match umbrella {
        // Net-gain area demand has its own minimum.
        UmbrellaType::Area => {
            if supply.distinctiveness >= Distinctiveness::Low {
                Ok(())
            } else {
                Err(RejectReason::DistinctivenessTooLow { required: Distinctiveness::Low })
            }
        }
        // Net-gain hedgerow and watercourse demand accept any same-umbrella
        // supply.
        UmbrellaType::Hedgerow | UmbrellaType::Watercourse => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::ReferenceTables;
    use crate::types::{
        Bank, ContractSize, DistinctivenessLevelRow, PriceRow, SrmTable, StockRow, Tier,
        TradingRule,
    };

    fn habitat(name: &str, group: &str, dist: Distinctiveness, umbrella: UmbrellaType) -> HabitatInfo {
        HabitatInfo {
            habitat_name: name.to_string(),
            broad_group: group.to_string(),
            distinctiveness: dist,
            umbrella,
        }
    }

    fn fixture_tables(rules: Vec<TradingRule>) -> ReferenceTables {
        use Distinctiveness::*;
        use UmbrellaType::*;
        ReferenceTables {
            banks: vec![Bank {
                bank_id: "b1".into(),
                bank_key: "BK01".into(),
                bank_name: "Bank One".into(),
                lpa_name: "York".into(),
                nca_name: "Vale of York".into(),
                lat: 0.0,
                lon: 0.0,
            }],
            catalog: vec![
                habitat("Lowland meadows", "Grassland", High, Area),
                habitat("Other neutral grassland", "Grassland", Medium, Area),
                habitat("Traditional orchard", "Heathland and shrub", Medium, Area),
                habitat("Mixed scrub", "Heathland and shrub", Medium, Area),
                habitat("Bramble scrub", "Heathland and shrub", Low, Area),
                habitat("Felled woodland", "Woodland and forest", Low, Area),
                habitat("Lowland mixed deciduous", "Woodland and forest", High, Area),
                habitat("Native hedgerow", "Hedgerow", Low, Hedgerow),
                habitat("Species-rich native hedgerow", "Hedgerow", Medium, Hedgerow),
                habitat("Rivers and streams", "Watercourse", High, Watercourse),
                habitat("Canals", "Watercourse", Medium, Watercourse),
                habitat("Ditches", "Watercourse", Medium, Watercourse),
                habitat("Chalk rivers", "Watercourse", VeryHigh, Watercourse),
            ],
            pricing: vec![PriceRow {
                bank_id: "b1".into(),
                habitat_name: "Lowland meadows".into(),
                contract_size: ContractSize::Small,
                tier: Tier::Local,
                price: 1.0,
            }],
            stock: vec![StockRow {
                bank_id: "b1".into(),
                habitat_name: "Lowland meadows".into(),
                stock_id: "s1".into(),
                quantity_available: 1.0,
            }],
            distinctiveness_levels: Distinctiveness::ALL
                .iter()
                .enumerate()
                .map(|(i, d)| DistinctivenessLevelRow {
                    name: d.as_str().to_string(),
                    level_value: (i * 2) as i64,
                })
                .collect(),
            srm: SrmTable::default(),
            trading_rules: rules,
        }
    }

    fn check(
        tables: &ReferenceTables,
        demand_name: &str,
        supply_name: &str,
    ) -> Result<(), RejectReason> {
        let index = tables.index().unwrap();
        let demand = index.habitat(demand_name).unwrap();
        let supply = index.habitat(supply_name).unwrap();
        supply_can_offset(&DemandSpec::Habitat(demand), supply, &index)
    }

    #[test]
    fn high_area_demand_is_like_for_like() {
        let tables = fixture_tables(vec![]);
        assert!(check(&tables, "Lowland meadows", "Lowland meadows").is_ok());
        assert_eq!(
            check(&tables, "Lowland meadows", "Lowland mixed deciduous"),
            Err(RejectReason::NotLikeForLike)
        );
    }

    #[test]
    fn medium_area_demand_trades_up_or_within_group() {
        let tables = fixture_tables(vec![]);
        // Trade up to High, any group.
        assert!(check(&tables, "Traditional orchard", "Lowland meadows").is_ok());
        // Same tier, same group.
        assert!(check(&tables, "Traditional orchard", "Mixed scrub").is_ok());
        // Same tier, different group.
        assert_eq!(
            check(&tables, "Traditional orchard", "Other neutral grassland"),
            Err(RejectReason::WrongBroadGroup)
        );
        // Lower tier never works.
        assert_eq!(
            check(&tables, "Traditional orchard", "Bramble scrub"),
            Err(RejectReason::DistinctivenessTooLow { required: Distinctiveness::Medium })
        );
    }

    #[test]
    fn low_area_demand_needs_low_or_better() {
        let tables = fixture_tables(vec![]);
        assert!(check(&tables, "Bramble scrub", "Mixed scrub").is_ok());
        assert!(check(&tables, "Bramble scrub", "Lowland meadows").is_ok());
    }

    #[test]
    fn cross_umbrella_is_never_legal() {
        let tables = fixture_tables(vec![]);
        assert_eq!(
            check(&tables, "Lowland meadows", "Rivers and streams"),
            Err(RejectReason::WrongUmbrella)
        );
    }

    #[test]
    fn hedgerow_low_demand_trades_strictly_up() {
        let tables = fixture_tables(vec![]);
        assert!(check(&tables, "Native hedgerow", "Species-rich native hedgerow").is_ok());
        assert_eq!(
            check(&tables, "Native hedgerow", "Native hedgerow"),
            Err(RejectReason::TradeUpRequired { above: Distinctiveness::Low })
        );
    }

    #[test]
    fn medium_watercourses_are_strictly_like_for_like() {
        let tables = fixture_tables(vec![]);
        assert!(check(&tables, "Canals", "Canals").is_ok());
        assert_eq!(check(&tables, "Canals", "Ditches"), Err(RejectReason::NotLikeForLike));
        assert_eq!(check(&tables, "Ditches", "Canals"), Err(RejectReason::NotLikeForLike));
    }

    #[test]
    fn very_high_watercourse_demand_is_bespoke_only() {
        let tables = fixture_tables(vec![]);
        assert_eq!(
            check(&tables, "Chalk rivers", "Chalk rivers"),
            Err(RejectReason::BespokeOnly)
        );
    }

    #[test]
    fn explicit_rule_overrides_defaults() {
        // The default matrix forbids a High woodland demand falling back to
        // felled woodland.
        let tables = fixture_tables(vec![]);
        assert_eq!(
            check(&tables, "Lowland mixed deciduous", "Felled woodland"),
            Err(RejectReason::NotLikeForLike)
        );

        let tables = fixture_tables(vec![TradingRule {
            demand_habitat: "Lowland mixed deciduous".into(),
            allowed_supply_habitat: "Felled woodland".into(),
        }]);
        assert!(check(&tables, "Lowland mixed deciduous", "Felled woodland").is_ok());
        // And the override now excludes everything else, even like-for-like.
        assert_eq!(
            check(&tables, "Lowland mixed deciduous", "Lowland mixed deciduous"),
            Err(RejectReason::ExcludedByExplicitRule)
        );
    }

    #[test]
    fn net_gain_area_demand_needs_low_or_better() {
        let tables = fixture_tables(vec![]);
        let index = tables.index().unwrap();
        let net_gain = DemandSpec::NetGain { umbrella: UmbrellaType::Area };
        let meadow = index.habitat("Lowland meadows").unwrap();
        assert!(supply_can_offset(&net_gain, meadow, &index).is_ok());

        let water_gain = DemandSpec::NetGain { umbrella: UmbrellaType::Watercourse };
        let canal = index.habitat("Canals").unwrap();
        assert!(supply_can_offset(&water_gain, canal, &index).is_ok());
        assert_eq!(
            supply_can_offset(&water_gain, meadow, &index),
            Err(RejectReason::WrongUmbrella)
        );
    }

    #[test]
    fn alias_spellings_count_as_like_for_like() {
        let mut tables = fixture_tables(vec![]);
        tables.catalog.push(habitat(
            "Other rivers and streams",
            "Watercourse",
            Distinctiveness::High,
            UmbrellaType::Watercourse,
        ));
        // Alias collides with the canonical entry, so validation refuses it.
        assert!(tables.validate().is_err());

        // With distinct entries the alias still matches like-for-like.
        let tables = fixture_tables(vec![]);
        let index = tables.index().unwrap();
        let demand = index.habitat("Rivers and streams").unwrap();
        let supply_alias = HabitatInfo {
            habitat_name: "Other rivers and streams".into(),
            broad_group: "Watercourse".into(),
            distinctiveness: Distinctiveness::High,
            umbrella: UmbrellaType::Watercourse,
        };
        assert!(supply_can_offset(&DemandSpec::Habitat(demand), &supply_alias, &index).is_ok());
    }
}
