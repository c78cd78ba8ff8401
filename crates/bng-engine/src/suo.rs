//! Surplus uplift offset (SUO).
//!
//! An optional post-solve discount funded by eligible on-site surplus:
//! surplus units at Medium distinctiveness or better earn 50% headroom,
//! capped at a caller-supplied fraction of the quote. The discount applies
//! to the non-admin-fee portion only and never changes the allocation
//! itself.

use std::collections::BTreeMap;

use serde::Serialize;

use bng_core::tables::TableIndex;
use bng_core::types::Distinctiveness;

/// Fraction of eligible surplus that may fund the discount.
pub const SUO_HEADROOM: f64 = 0.5;

/// Default cap on the discount fraction.
pub const DEFAULT_MAX_SUO: f64 = 0.30;

/// SUO computation breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuoBreakdown {
    /// Surplus units at Medium distinctiveness or better.
    pub eligible_surplus: f64,
    /// `eligible_surplus * 0.5`.
    pub usable_surplus: f64,
    /// `min(usable / total units allocated, cap)`.
    pub discount_fraction: f64,
    /// Flat reduction on the non-admin-fee portion.
    pub discount_amount: f64,
    pub total_after_discount: f64,
}

/// Compute the SUO discount for a finished allocation.
///
/// `onsite_surpluses` maps habitat name to excess units; habitats missing
/// from the catalogue contribute nothing (the caller surfaces a diagnostic).
pub fn compute_suo(
    onsite_surpluses: &BTreeMap<String, f64>,
    index: &TableIndex<'_>,
    total_units_allocated: f64,
    quote_cost: f64,
    max_fraction: f64,
) -> SuoBreakdown {
    let eligible_surplus: f64 = onsite_surpluses
        .iter()
        .filter_map(|(habitat, &units)| {
            let info = index.habitat(habitat)?;
            (info.distinctiveness >= Distinctiveness::Medium && units > 0.0).then_some(units)
        })
        .sum();

    let usable_surplus = eligible_surplus * SUO_HEADROOM;
    let discount_fraction = if total_units_allocated > 0.0 {
        (usable_surplus / total_units_allocated).min(max_fraction)
    } else {
        0.0
    };
    let discount_amount = quote_cost * discount_fraction;

    SuoBreakdown {
        eligible_surplus,
        usable_surplus,
        discount_fraction,
        discount_amount,
        total_after_discount: quote_cost - discount_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{fixture, FixtureSpec};

    #[test]
    fn only_medium_or_better_surplus_is_eligible() {
        let tables = fixture(FixtureSpec::default());
        let index = tables.index().unwrap();

        let mut surpluses = BTreeMap::new();
        surpluses.insert("Lowland meadows".to_string(), 2.0); // High
        surpluses.insert("Bramble scrub".to_string(), 4.0); // Low

        let suo = compute_suo(&surpluses, &index, 10.0, 100_000.0, DEFAULT_MAX_SUO);
        assert!((suo.eligible_surplus - 2.0).abs() < 1e-12);
        assert!((suo.usable_surplus - 1.0).abs() < 1e-12);
        assert!((suo.discount_fraction - 0.1).abs() < 1e-12);
        assert!((suo.discount_amount - 10_000.0).abs() < 1e-9);
        assert!((suo.total_after_discount - 90_000.0).abs() < 1e-9);
    }

    #[test]
    fn discount_fraction_is_capped() {
        let tables = fixture(FixtureSpec::default());
        let index = tables.index().unwrap();

        let mut surpluses = BTreeMap::new();
        surpluses.insert("Lowland meadows".to_string(), 100.0);

        let suo = compute_suo(&surpluses, &index, 1.0, 50_000.0, 0.30);
        assert!((suo.discount_fraction - 0.30).abs() < 1e-12);
        assert!((suo.discount_amount - 15_000.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_habitats_contribute_nothing() {
        let tables = fixture(FixtureSpec::default());
        let index = tables.index().unwrap();

        let mut surpluses = BTreeMap::new();
        surpluses.insert("Martian moss".to_string(), 50.0);

        let suo = compute_suo(&surpluses, &index, 10.0, 100_000.0, DEFAULT_MAX_SUO);
        assert_eq!(suo.eligible_surplus, 0.0);
        assert_eq!(suo.discount_amount, 0.0);
    }
}
