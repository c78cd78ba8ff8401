//! Reference-table fixtures shared by unit and integration tests.
//!
//! The fixture world has three banks against a target site in York:
//!
//! - Bank A (`bank-a`): LPA York, classifies local.
//! - Bank B (`bank-b`): LPA Harrogate, adjacent when the caller lists
//!   Harrogate as an LPA neighbour, otherwise far.
//! - Bank C (`bank-c`): Cornwall, always far.
//!
//! Pricing carries small and medium bands at every tier, with medium at 85%
//! of small, so tier-up scenarios have a cheaper band to step into.

use bng_core::tables::ReferenceTables;
use bng_core::types::{
    Bank, ContractSize, Distinctiveness, DistinctivenessLevelRow, HabitatInfo, PriceRow, SrmTable,
    StockRow, Tier, UmbrellaType,
};

/// Knobs for the fixture world.
#[derive(Debug, Clone)]
pub struct FixtureSpec {
    /// Lowland meadows quantity at Bank A.
    pub meadow_stock_a: f64,
    /// Small-band price for Lowland meadows, all banks.
    pub meadow_price: f64,
    /// Drop every pricing row for Lowland meadows (forces NoPricing).
    pub drop_meadow_pricing: bool,
}

impl Default for FixtureSpec {
    fn default() -> Self {
        Self {
            meadow_stock_a: 10.0,
            meadow_price: 20_000.0,
            drop_meadow_pricing: false,
        }
    }
}

pub fn bank(bank_id: &str, key: &str, lpa: &str, nca: &str) -> Bank {
    Bank {
        bank_id: bank_id.into(),
        bank_key: key.into(),
        bank_name: format!("{key} Habitat Bank"),
        lpa_name: lpa.into(),
        nca_name: nca.into(),
        lat: 0.0,
        lon: 0.0,
    }
}

pub fn habitat_entry(
    name: &str,
    group: &str,
    dist: Distinctiveness,
    umbrella: UmbrellaType,
) -> HabitatInfo {
    HabitatInfo {
        habitat_name: name.into(),
        broad_group: group.into(),
        distinctiveness: dist,
        umbrella,
    }
}

pub fn stock(bank_id: &str, habitat: &str, stock_id: &str, qty: f64) -> StockRow {
    StockRow {
        bank_id: bank_id.into(),
        habitat_name: habitat.into(),
        stock_id: stock_id.into(),
        quantity_available: qty,
    }
}

pub fn standard_levels() -> Vec<DistinctivenessLevelRow> {
    Distinctiveness::ALL
        .iter()
        .enumerate()
        .map(|(i, d)| DistinctivenessLevelRow {
            name: d.as_str().to_string(),
            level_value: (i * 2) as i64,
        })
        .collect()
}

/// Build the fixture snapshot.
pub fn fixture(spec: FixtureSpec) -> ReferenceTables {
    use Distinctiveness::*;
    use UmbrellaType::*;

    let banks = vec![
        bank("bank-a", "BK-A", "York", "Vale of York"),
        bank("bank-b", "BK-B", "Harrogate", "Pennine Fringe"),
        bank("bank-c", "BK-C", "Cornwall", "Bodmin Moor"),
    ];

    let catalog = vec![
        habitat_entry("Lowland meadows", "Grassland", High, Area),
        habitat_entry("Other neutral grassland", "Grassland", Medium, Area),
        habitat_entry("Traditional orchard", "Heathland and shrub", Medium, Area),
        habitat_entry("Mixed scrub", "Heathland and shrub", Medium, Area),
        habitat_entry("Bramble scrub", "Heathland and shrub", Low, Area),
        habitat_entry("Native hedgerow", "Hedgerow", Low, Hedgerow),
        habitat_entry("Species-rich native hedgerow", "Hedgerow", Medium, Hedgerow),
        habitat_entry("Rivers and streams", "Watercourse", High, Watercourse),
        habitat_entry("Canals", "Watercourse", Medium, Watercourse),
        habitat_entry("Ditches", "Watercourse", Medium, Watercourse),
        habitat_entry("Chalk rivers", "Watercourse", VeryHigh, Watercourse),
    ];

    let stock_rows = vec![
        stock("bank-a", "Lowland meadows", "stk-a-meadow", spec.meadow_stock_a),
        stock("bank-a", "Traditional orchard", "stk-a-orchard", 10.0),
        stock("bank-a", "Mixed scrub", "stk-a-scrub", 10.0),
        stock("bank-a", "Native hedgerow", "stk-a-hedge", 5.0),
        stock("bank-b", "Lowland meadows", "stk-b-meadow", 10.0),
        stock("bank-b", "Traditional orchard", "stk-b-orchard", 10.0),
        stock("bank-b", "Mixed scrub", "stk-b-scrub", 10.0),
        stock("bank-b", "Species-rich native hedgerow", "stk-b-hedge", 5.0),
        stock("bank-c", "Lowland meadows", "stk-c-meadow", 10.0),
        stock("bank-c", "Canals", "stk-c-canal", 5.0),
    ];

    let priced: Vec<(&str, f64)> = vec![
        ("Lowland meadows", spec.meadow_price),
        ("Traditional orchard", 30_000.0),
        ("Mixed scrub", 19_000.0),
        ("Native hedgerow", 12_000.0),
        ("Species-rich native hedgerow", 16_000.0),
        ("Canals", 35_000.0),
    ];
    let mut pricing = Vec::new();
    for b in &banks {
        for (habitat, small_price) in &priced {
            if spec.drop_meadow_pricing && *habitat == "Lowland meadows" {
                continue;
            }
            for (size, factor) in [(ContractSize::Small, 1.0), (ContractSize::Medium, 0.85)] {
                for tier in Tier::ALL {
                    pricing.push(PriceRow {
                        bank_id: b.bank_id.clone(),
                        habitat_name: (*habitat).into(),
                        contract_size: size,
                        tier,
                        price: small_price * factor,
                    });
                }
            }
        }
    }

    ReferenceTables {
        banks,
        catalog,
        pricing,
        stock: stock_rows,
        distinctiveness_levels: standard_levels(),
        srm: SrmTable::default(),
        trading_rules: Vec::new(),
    }
}
