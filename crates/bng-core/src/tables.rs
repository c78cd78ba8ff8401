//! Reference-table snapshot and per-solve lookup index.
//!
//! [`ReferenceTables`] is the read-only snapshot a collaborator hands to the
//! engine: plain serde-friendly rows, no behaviour. Schema enforcement
//! happens once at the boundary via [`ReferenceTables::validate`], which
//! accumulates every problem it finds before failing, and
//! [`ReferenceTables::index`] builds the canonical-name lookup structures the
//! engine uses. The index is scoped to one solve; nothing here is cached
//! process-wide.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::normalize::canonical_habitat;
use crate::types::{
    Bank, ContractSize, Distinctiveness, DistinctivenessLevelRow, HabitatInfo, PriceRow, SrmTable,
    StockRow, Tier, TradingRule,
};

/// Immutable snapshot of the reference data for one solve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceTables {
    pub banks: Vec<Bank>,
    pub catalog: Vec<HabitatInfo>,
    pub pricing: Vec<PriceRow>,
    pub stock: Vec<StockRow>,
    pub distinctiveness_levels: Vec<DistinctivenessLevelRow>,
    pub srm: SrmTable,
    #[serde(default)]
    pub trading_rules: Vec<TradingRule>,
}

impl ReferenceTables {
    /// Validate the snapshot, reporting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.banks.is_empty() {
            problems.push("Banks table is empty".to_string());
        }
        if self.catalog.is_empty() {
            problems.push("HabitatCatalog table is empty".to_string());
        }
        if self.pricing.is_empty() {
            problems.push("Pricing table is empty".to_string());
        }
        if self.stock.is_empty() {
            problems.push("Stock table is empty".to_string());
        }
        if self.distinctiveness_levels.is_empty() {
            problems.push("DistinctivenessLevels table is empty".to_string());
        }
        for tier in Tier::ALL {
            if self.srm.multiplier(tier) <= 0.0 {
                problems.push(format!("SRM multiplier for tier '{tier}' must be positive"));
            }
        }

        let bank_ids: BTreeSet<&str> = self.banks.iter().map(|b| b.bank_id.as_str()).collect();
        if bank_ids.len() < self.banks.len() {
            problems.push("duplicate bank_id in Banks table".to_string());
        }

        let mut catalog_names: BTreeSet<String> = BTreeSet::new();
        for entry in &self.catalog {
            let canonical = canonical_habitat(&entry.habitat_name);
            if !catalog_names.insert(canonical) {
                problems.push(format!(
                    "duplicate habitat '{}' in HabitatCatalog",
                    entry.habitat_name
                ));
            }
        }

        for row in &self.stock {
            if !bank_ids.contains(row.bank_id.as_str()) {
                problems.push(format!(
                    "Stock row '{}' references unknown bank_id '{}'",
                    row.stock_id, row.bank_id
                ));
            }
            if !catalog_names.contains(&canonical_habitat(&row.habitat_name)) {
                problems.push(format!(
                    "Stock row '{}' references unknown habitat '{}'",
                    row.stock_id, row.habitat_name
                ));
            }
            if row.quantity_available < 0.0 {
                problems.push(format!(
                    "Stock row '{}' has negative quantity_available",
                    row.stock_id
                ));
            }
        }
        let mut stock_ids: BTreeSet<&str> = BTreeSet::new();
        for row in &self.stock {
            if !stock_ids.insert(row.stock_id.as_str()) {
                problems.push(format!("duplicate stock_id '{}'", row.stock_id));
            }
        }

        for row in &self.pricing {
            if !bank_ids.contains(row.bank_id.as_str()) {
                problems.push(format!(
                    "Pricing row references unknown bank_id '{}'",
                    row.bank_id
                ));
            }
            if !catalog_names.contains(&canonical_habitat(&row.habitat_name)) {
                problems.push(format!(
                    "Pricing row references unknown habitat '{}'",
                    row.habitat_name
                ));
            }
            if row.price < 0.0 {
                problems.push(format!(
                    "Pricing row for '{}' at bank '{}' has negative price",
                    row.habitat_name, row.bank_id
                ));
            }
        }

        // The levels table must name known tiers and order them consistently
        // with the ecological ordering of `Distinctiveness`.
        let mut seen_levels: Vec<(Distinctiveness, i64)> = Vec::new();
        for row in &self.distinctiveness_levels {
            match Distinctiveness::parse(&row.name) {
                Some(d) => seen_levels.push((d, row.level_value)),
                None => problems.push(format!("unknown distinctiveness '{}'", row.name)),
            }
        }
        seen_levels.sort_by_key(|(d, _)| *d);
        for pair in seen_levels.windows(2) {
            if pair[0].1 >= pair[1].1 {
                problems.push(format!(
                    "DistinctivenessLevels out of order: '{}' (level {}) must be below '{}' (level {})",
                    pair[0].0, pair[0].1, pair[1].0, pair[1].1
                ));
                break;
            }
        }

        for rule in &self.trading_rules {
            if !catalog_names.contains(&canonical_habitat(&rule.demand_habitat)) {
                problems.push(format!(
                    "TradingRules names unknown demand habitat '{}'",
                    rule.demand_habitat
                ));
            }
            if !catalog_names.contains(&canonical_habitat(&rule.allowed_supply_habitat)) {
                problems.push(format!(
                    "TradingRules allows unknown supply habitat '{}'",
                    rule.allowed_supply_habitat
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::new(problems))
        }
    }

    /// Validate and build the per-solve lookup index.
    pub fn index(&self) -> Result<TableIndex<'_>, ConfigError> {
        self.validate()?;
        Ok(TableIndex::build(self))
    }
}

/// Per-solve lookup structures over a validated [`ReferenceTables`].
///
/// All habitat keys are canonical forms; all iteration orders are stable
/// (sorted by `(bank_id, habitat_name, stock_id)`), so two solves over the
/// same snapshot walk the data identically regardless of input row order.
pub struct TableIndex<'a> {
    tables: &'a ReferenceTables,
    habitat_by_name: HashMap<String, usize>,
    bank_by_id: HashMap<&'a str, usize>,
    /// (bank index, canonical habitat, size, tier) -> price.
    price_by_key: HashMap<(usize, String, ContractSize, Tier), f64>,
    /// Bank index -> stock row indices, sorted by (habitat, stock_id).
    stock_by_bank: BTreeMap<usize, Vec<usize>>,
    /// Total quantity_available per bank index.
    bank_capacity: Vec<f64>,
    /// Canonical demand habitat -> allowed canonical supply habitats.
    rules_by_demand: HashMap<String, BTreeSet<String>>,
    /// Contract sizes that appear anywhere in Pricing.
    sizes_present: BTreeSet<ContractSize>,
    /// Bank indices sorted by bank_id, the stable iteration order.
    banks_by_id_order: Vec<usize>,
}

impl<'a> TableIndex<'a> {
    fn build(tables: &'a ReferenceTables) -> Self {
        let habitat_by_name = tables
            .catalog
            .iter()
            .enumerate()
            .map(|(i, h)| (canonical_habitat(&h.habitat_name), i))
            .collect();

        let bank_by_id: HashMap<&str, usize> = tables
            .banks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.bank_id.as_str(), i))
            .collect();

        let mut price_by_key = HashMap::new();
        let mut sizes_present = BTreeSet::new();
        for row in &tables.pricing {
            let bank_idx = bank_by_id[row.bank_id.as_str()];
            sizes_present.insert(row.contract_size);
            price_by_key.insert(
                (
                    bank_idx,
                    canonical_habitat(&row.habitat_name),
                    row.contract_size,
                    row.tier,
                ),
                row.price,
            );
        }

        let mut stock_by_bank: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut bank_capacity = vec![0.0; tables.banks.len()];
        let mut stock_order: Vec<usize> = (0..tables.stock.len()).collect();
        stock_order.sort_by(|&a, &b| {
            let ra = &tables.stock[a];
            let rb = &tables.stock[b];
            (&ra.bank_id, &ra.habitat_name, &ra.stock_id)
                .cmp(&(&rb.bank_id, &rb.habitat_name, &rb.stock_id))
        });
        for idx in stock_order {
            let row = &tables.stock[idx];
            let bank_idx = bank_by_id[row.bank_id.as_str()];
            stock_by_bank.entry(bank_idx).or_default().push(idx);
            bank_capacity[bank_idx] += row.quantity_available;
        }

        let mut rules_by_demand: HashMap<String, BTreeSet<String>> = HashMap::new();
        for rule in &tables.trading_rules {
            rules_by_demand
                .entry(canonical_habitat(&rule.demand_habitat))
                .or_default()
                .insert(canonical_habitat(&rule.allowed_supply_habitat));
        }

        let mut banks_by_id_order: Vec<usize> = (0..tables.banks.len()).collect();
        banks_by_id_order.sort_by(|&a, &b| tables.banks[a].bank_id.cmp(&tables.banks[b].bank_id));

        Self {
            tables,
            habitat_by_name,
            bank_by_id,
            price_by_key,
            stock_by_bank,
            bank_capacity,
            rules_by_demand,
            sizes_present,
            banks_by_id_order,
        }
    }

    pub fn tables(&self) -> &'a ReferenceTables {
        self.tables
    }

    pub fn srm(&self, tier: Tier) -> f64 {
        self.tables.srm.multiplier(tier)
    }

    /// Catalogue entry for a habitat name (any variant spelling).
    pub fn habitat(&self, name: &str) -> Option<&'a HabitatInfo> {
        self.habitat_by_name
            .get(&canonical_habitat(name))
            .map(|&i| &self.tables.catalog[i])
    }

    pub fn bank_by_id(&self, bank_id: &str) -> Option<&'a Bank> {
        self.bank_by_id.get(bank_id).map(|&i| &self.tables.banks[i])
    }

    pub fn bank(&self, bank_idx: usize) -> &'a Bank {
        &self.tables.banks[bank_idx]
    }

    pub fn bank_count(&self) -> usize {
        self.tables.banks.len()
    }

    /// Banks in stable `bank_id` order, so input row order never matters.
    pub fn banks_sorted(&self) -> impl Iterator<Item = (usize, &'a Bank)> + '_ {
        self.banks_by_id_order
            .iter()
            .map(move |&i| (i, &self.tables.banks[i]))
    }

    /// Total stock capacity held by a bank, all habitats pooled.
    pub fn bank_capacity(&self, bank_idx: usize) -> f64 {
        self.bank_capacity[bank_idx]
    }

    /// Price per effective unit, if the pricing table carries the row.
    pub fn price(
        &self,
        bank_idx: usize,
        habitat_name: &str,
        size: ContractSize,
        tier: Tier,
    ) -> Option<f64> {
        self.price_by_key
            .get(&(bank_idx, canonical_habitat(habitat_name), size, tier))
            .copied()
    }

    /// Whether any pricing row exists at the given contract size.
    pub fn has_contract_size(&self, size: ContractSize) -> bool {
        self.sizes_present.contains(&size)
    }

    /// Stock rows of a bank in stable (habitat, stock_id) order.
    pub fn stock_rows(&self, bank_idx: usize) -> impl Iterator<Item = (usize, &'a StockRow)> + '_ {
        self.stock_by_bank
            .get(&bank_idx)
            .into_iter()
            .flatten()
            .map(move |&i| (i, &self.tables.stock[i]))
    }

    pub fn stock_row(&self, stock_idx: usize) -> &'a StockRow {
        &self.tables.stock[stock_idx]
    }

    pub fn stock_count(&self) -> usize {
        self.tables.stock.len()
    }

    /// Explicit trading-rule override for a demand habitat, if any rows exist.
    pub fn explicit_supplies(&self, demand_habitat: &str) -> Option<&BTreeSet<String>> {
        self.rules_by_demand.get(&canonical_habitat(demand_habitat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UmbrellaType;

    fn habitat(name: &str, group: &str, dist: Distinctiveness, umbrella: UmbrellaType) -> HabitatInfo {
        HabitatInfo {
            habitat_name: name.to_string(),
            broad_group: group.to_string(),
            distinctiveness: dist,
            umbrella,
        }
    }

    fn minimal_tables() -> ReferenceTables {
        ReferenceTables {
            banks: vec![Bank {
                bank_id: "b1".into(),
                bank_key: "BK01".into(),
                bank_name: "Bank One".into(),
                lpa_name: "York".into(),
                nca_name: "Vale of York".into(),
                lat: 53.9,
                lon: -1.1,
            }],
            catalog: vec![habitat(
                "Lowland meadows",
                "Grassland",
                Distinctiveness::High,
                UmbrellaType::Area,
            )],
            pricing: vec![PriceRow {
                bank_id: "b1".into(),
                habitat_name: "Lowland meadows".into(),
                contract_size: ContractSize::Small,
                tier: Tier::Local,
                price: 20_000.0,
            }],
            stock: vec![StockRow {
                bank_id: "b1".into(),
                habitat_name: "Lowland meadows".into(),
                stock_id: "s1".into(),
                quantity_available: 10.0,
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
            trading_rules: vec![],
        }
    }

    #[test]
    fn minimal_snapshot_validates() {
        assert!(minimal_tables().validate().is_ok());
    }

    #[test]
    fn empty_tables_are_all_reported() {
        let err = ReferenceTables::default().validate().unwrap_err();
        let joined = err.problems.join("\n");
        for table in ["Banks", "HabitatCatalog", "Pricing", "Stock", "DistinctivenessLevels"] {
            assert!(joined.contains(table), "missing complaint about {table}: {joined}");
        }
    }

    #[test]
    fn unresolved_bank_id_is_rejected() {
        let mut tables = minimal_tables();
        tables.stock[0].bank_id = "ghost".into();
        let err = tables.validate().unwrap_err();
        assert!(err.problems.iter().any(|p| p.contains("ghost")));
    }

    #[test]
    fn unknown_distinctiveness_is_rejected() {
        let mut tables = minimal_tables();
        tables.distinctiveness_levels[0].name = "Middling".into();
        let err = tables.validate().unwrap_err();
        assert!(err.problems.iter().any(|p| p.contains("Middling")));
    }

    #[test]
    fn misordered_levels_are_rejected() {
        let mut tables = minimal_tables();
        tables.distinctiveness_levels[4].level_value = -1;
        assert!(tables.validate().is_err());
    }

    #[test]
    fn index_price_lookup_uses_canonical_names() {
        let tables = minimal_tables();
        let index = tables.index().unwrap();
        let price = index.price(0, "lowland   MEADOWS", ContractSize::Small, Tier::Local);
        assert_eq!(price, Some(20_000.0));
        assert_eq!(index.price(0, "Lowland meadows", ContractSize::Large, Tier::Local), None);
    }

    #[test]
    fn stock_iteration_is_stable_under_reorder() {
        let mut tables = minimal_tables();
        tables.stock.push(StockRow {
            bank_id: "b1".into(),
            habitat_name: "Lowland meadows".into(),
            stock_id: "s0".into(),
            quantity_available: 4.0,
        });
        let ids: Vec<String> = tables
            .index()
            .unwrap()
            .stock_rows(0)
            .map(|(_, r)| r.stock_id.clone())
            .collect();

        tables.stock.reverse();
        let ids_reversed: Vec<String> = tables
            .index()
            .unwrap()
            .stock_rows(0)
            .map(|(_, r)| r.stock_id.clone())
            .collect();

        assert_eq!(ids, ids_reversed);
        assert_eq!(ids, vec!["s0".to_string(), "s1".to_string()]);
    }
}
