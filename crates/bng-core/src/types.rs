//! Core domain types for the BNG allocation engine.
//!
//! Everything here is a closed enum or a plain record. Stringly-typed fields
//! from upstream data sources are parsed into these types at the boundary
//! (reference-table construction, metric import) so the rest of the engine
//! never re-validates them.

use serde::{Deserialize, Serialize};

/// Spatial relation of a habitat bank to the target development site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Local,
    Adjacent,
    Far,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Local, Tier::Adjacent, Tier::Far];

    /// Rank used by the proximity tie-break objective: closer is better.
    pub fn proximity_rank(self) -> f64 {
        match self {
            Tier::Local => 0.0,
            Tier::Adjacent => 1.0,
            Tier::Far => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::Adjacent => "adjacent",
            Tier::Far => "far",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pricing band driven by total quote units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractSize {
    Fractional,
    Small,
    Medium,
    Large,
}

impl ContractSize {
    pub const ALL: [ContractSize; 4] = [
        ContractSize::Fractional,
        ContractSize::Small,
        ContractSize::Medium,
        ContractSize::Large,
    ];

    /// The next band up, if one exists (`large` has none).
    pub fn step_up(self) -> Option<ContractSize> {
        match self {
            ContractSize::Fractional => Some(ContractSize::Small),
            ContractSize::Small => Some(ContractSize::Medium),
            ContractSize::Medium => Some(ContractSize::Large),
            ContractSize::Large => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContractSize::Fractional => "fractional",
            ContractSize::Small => "small",
            ContractSize::Medium => "medium",
            ContractSize::Large => "large",
        }
    }
}

impl std::fmt::Display for ContractSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered ecological-quality tier. `Ord` follows ecological ordering:
/// `VeryLow < Low < Medium < High < VeryHigh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Distinctiveness {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl Distinctiveness {
    pub const ALL: [Distinctiveness; 5] = [
        Distinctiveness::VeryLow,
        Distinctiveness::Low,
        Distinctiveness::Medium,
        Distinctiveness::High,
        Distinctiveness::VeryHigh,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Distinctiveness::VeryLow => "Very Low",
            Distinctiveness::Low => "Low",
            Distinctiveness::Medium => "Medium",
            Distinctiveness::High => "High",
            Distinctiveness::VeryHigh => "Very High",
        }
    }

    /// Parse a distinctiveness name tolerantly (case and internal whitespace
    /// are ignored, so `"very  HIGH"` parses).
    pub fn parse(name: &str) -> Option<Distinctiveness> {
        let folded: String = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        match folded.as_str() {
            "very low" | "v.low" | "vlow" => Some(Distinctiveness::VeryLow),
            "low" => Some(Distinctiveness::Low),
            "medium" => Some(Distinctiveness::Medium),
            "high" => Some(Distinctiveness::High),
            "very high" | "v.high" | "vhigh" => Some(Distinctiveness::VeryHigh),
            _ => None,
        }
    }
}

impl std::fmt::Display for Distinctiveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Macro-partition of all habitats. Trading never crosses umbrella types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UmbrellaType {
    Area,
    Hedgerow,
    Watercourse,
}

impl UmbrellaType {
    pub const ALL: [UmbrellaType; 3] = [
        UmbrellaType::Area,
        UmbrellaType::Hedgerow,
        UmbrellaType::Watercourse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UmbrellaType::Area => "area",
            UmbrellaType::Hedgerow => "hedgerow",
            UmbrellaType::Watercourse => "watercourse",
        }
    }

    pub fn parse(name: &str) -> Option<UmbrellaType> {
        match name.trim().to_ascii_lowercase().as_str() {
            "area" => Some(UmbrellaType::Area),
            "hedgerow" | "hedgerows" => Some(UmbrellaType::Hedgerow),
            "watercourse" | "watercourses" => Some(UmbrellaType::Watercourse),
            _ => None,
        }
    }
}

impl std::fmt::Display for UmbrellaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Promoter discount kind resolved by the caller before `solve()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromoterKind {
    #[default]
    None,
    TierUp,
    Percentage,
    NoDiscount,
}

/// Promoter discount parameters. `value` is only meaningful for
/// [`PromoterKind::Percentage`], where it is the discount in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Promoter {
    pub kind: PromoterKind,
    pub value: Option<f64>,
}

impl Promoter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn tier_up() -> Self {
        Self { kind: PromoterKind::TierUp, value: None }
    }

    pub fn percentage(pct: f64) -> Self {
        Self { kind: PromoterKind::Percentage, value: Some(pct) }
    }

    /// Multiplicative price factor for percentage discounts, 1.0 otherwise.
    pub fn price_factor(&self) -> f64 {
        match self.kind {
            PromoterKind::Percentage => 1.0 - self.value.unwrap_or(0.0) / 100.0,
            _ => 1.0,
        }
    }
}

/// How an allocation row satisfies its demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationType {
    Normal,
    Paired,
}

impl AllocationType {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationType::Normal => "normal",
            AllocationType::Paired => "paired",
        }
    }
}

/// A habitat bank offering units for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    /// Opaque identity.
    pub bank_id: String,
    /// Short human code used in quotes.
    pub bank_key: String,
    pub bank_name: String,
    /// Authoritative local planning authority name.
    pub lpa_name: String,
    /// Authoritative national character area name.
    pub nca_name: String,
    pub lat: f64,
    pub lon: f64,
}

/// One habitat catalogue entry. `habitat_name` is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitatInfo {
    pub habitat_name: String,
    /// Ecological family, constrains Medium-tier like-for-like trading.
    pub broad_group: String,
    pub distinctiveness: Distinctiveness,
    pub umbrella: UmbrellaType,
}

/// A capacity-bearing stock resource. Multiple rows for the same
/// (bank, habitat) are distinct resources with independent capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub bank_id: String,
    pub habitat_name: String,
    pub stock_id: String,
    pub quantity_available: f64,
}

/// One price point. Absence of a row makes the option illegal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub bank_id: String,
    pub habitat_name: String,
    pub contract_size: ContractSize,
    pub tier: Tier,
    /// GBP per effective unit.
    pub price: f64,
}

/// Explicit substitution: when any rule exists for a demand habitat, only the
/// listed supply habitats may offset it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingRule {
    pub demand_habitat: String,
    pub allowed_supply_habitat: String,
}

/// Named row of the distinctiveness-levels reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistinctivenessLevelRow {
    pub name: String,
    pub level_value: i64,
}

/// Spatial risk multipliers: raw stock units drawn per effective unit of
/// demand satisfied at each tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SrmTable {
    pub local: f64,
    pub adjacent: f64,
    pub far: f64,
}

impl SrmTable {
    pub fn multiplier(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Local => self.local,
            Tier::Adjacent => self.adjacent,
            Tier::Far => self.far,
        }
    }
}

impl Default for SrmTable {
    fn default() -> Self {
        // Canonical DEFRA values.
        Self { local: 1.0, adjacent: 4.0 / 3.0, far: 2.0 }
    }
}

/// What a demand row stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DemandKind {
    /// Loss of a named habitat.
    Habitat,
    /// Headline net-gain shortfall expressed as a pseudo-habitat that
    /// absorbs any same-umbrella supply passing the net-gain rule.
    NetGain { pct: f64 },
}

/// One unit of residual off-site demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRow {
    pub habitat_name: String,
    pub units_required: f64,
    pub umbrella: UmbrellaType,
    pub kind: DemandKind,
}

impl DemandRow {
    pub fn habitat(habitat_name: impl Into<String>, units_required: f64, umbrella: UmbrellaType) -> Self {
        Self {
            habitat_name: habitat_name.into(),
            units_required,
            umbrella,
            kind: DemandKind::Habitat,
        }
    }

    /// Synthetic headline demand, rendered `"Net Gain (X%)"`.
    pub fn net_gain(pct: f64, units_required: f64, umbrella: UmbrellaType) -> Self {
        Self {
            habitat_name: net_gain_label(pct),
            units_required,
            umbrella,
            kind: DemandKind::NetGain { pct },
        }
    }

    pub fn is_net_gain(&self) -> bool {
        matches!(self.kind, DemandKind::NetGain { .. })
    }
}

/// Display label for the headline pseudo-habitat. Whole-number percentages
/// drop the decimal point: `net_gain_label(10.0) == "Net Gain (10%)"`.
pub fn net_gain_label(pct: f64) -> String {
    if (pct - pct.round()).abs() < 1e-9 {
        format!("Net Gain ({}%)", pct.round() as i64)
    } else {
        format!("Net Gain ({}%)", pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinctiveness_is_ecologically_ordered() {
        assert!(Distinctiveness::VeryLow < Distinctiveness::Low);
        assert!(Distinctiveness::Low < Distinctiveness::Medium);
        assert!(Distinctiveness::Medium < Distinctiveness::High);
        assert!(Distinctiveness::High < Distinctiveness::VeryHigh);
    }

    #[test]
    fn distinctiveness_parses_tolerantly() {
        assert_eq!(Distinctiveness::parse("very  HIGH"), Some(Distinctiveness::VeryHigh));
        assert_eq!(Distinctiveness::parse(" Medium "), Some(Distinctiveness::Medium));
        assert_eq!(Distinctiveness::parse("bogus"), None);
    }

    #[test]
    fn contract_size_steps_up_in_order() {
        assert_eq!(ContractSize::Fractional.step_up(), Some(ContractSize::Small));
        assert_eq!(ContractSize::Small.step_up(), Some(ContractSize::Medium));
        assert_eq!(ContractSize::Medium.step_up(), Some(ContractSize::Large));
        assert_eq!(ContractSize::Large.step_up(), None);
    }

    #[test]
    fn srm_defaults_are_canonical() {
        let srm = SrmTable::default();
        assert_eq!(srm.multiplier(Tier::Local), 1.0);
        assert!((srm.multiplier(Tier::Adjacent) - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(srm.multiplier(Tier::Far), 2.0);
    }

    #[test]
    fn net_gain_label_formats_whole_percentages() {
        assert_eq!(net_gain_label(10.0), "Net Gain (10%)");
        assert_eq!(net_gain_label(12.5), "Net Gain (12.5%)");
    }

    #[test]
    fn percentage_promoter_price_factor() {
        let p = Promoter::percentage(15.0);
        assert!((p.price_factor() - 0.85).abs() < 1e-12);
        assert_eq!(Promoter::tier_up().price_factor(), 1.0);
    }

    #[test]
    fn enums_serialize_to_wire_names() {
        assert_eq!(serde_json::to_string(&Tier::Adjacent).unwrap(), "\"adjacent\"");
        assert_eq!(serde_json::to_string(&ContractSize::Fractional).unwrap(), "\"fractional\"");
        assert_eq!(
            serde_json::to_string(&Distinctiveness::VeryHigh).unwrap(),
            "\"Very High\""
        );
        assert_eq!(serde_json::to_string(&UmbrellaType::Watercourse).unwrap(), "\"watercourse\"");
    }
}
