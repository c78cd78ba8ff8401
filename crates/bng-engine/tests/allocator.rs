//! Allocator invariants and algebraic laws.

use std::collections::BTreeSet;

use bng_core::tables::ReferenceTables;
use bng_core::types::{
    ContractSize, DemandRow, Distinctiveness, PriceRow, Promoter, TradingRule, UmbrellaType,
};
use bng_engine::test_fixtures::{fixture, FixtureSpec};
use bng_engine::{solve, verify_assignment, SolveContext, SolveError, SolveResult};

fn york_context() -> SolveContext {
    SolveContext {
        target_lpa: "York".into(),
        target_nca: "Vale of York".into(),
        lpa_neighbours: vec!["Harrogate".into()],
        nca_neighbours: Vec::new(),
        contract_size: ContractSize::Small,
        promoter: Promoter::none(),
        suo: Default::default(),
        solver: Default::default(),
    }
}

fn mixed_demand() -> Vec<DemandRow> {
    vec![
        DemandRow::habitat("Lowland meadows", 2.0, UmbrellaType::Area),
        DemandRow::habitat("Traditional orchard", 1.5, UmbrellaType::Area),
        DemandRow::net_gain(10.0, 0.5, UmbrellaType::Area),
    ]
}

fn assert_invariants(result: &SolveResult, demand: &[DemandRow], tables: &ReferenceTables) {
    // Per-demand coverage.
    for (i, row) in demand.iter().enumerate() {
        let supplied: f64 = result
            .allocation
            .iter()
            .filter(|r| r.demand_idx == i)
            .map(|r| r.units_supplied)
            .sum();
        assert!(
            supplied >= row.units_required - 1e-6,
            "demand {i} short: {supplied} < {}",
            row.units_required
        );
    }

    // Two-bank cap.
    let banks: BTreeSet<&str> = result.allocation.iter().map(|r| r.bank_id.as_str()).collect();
    assert!(banks.len() <= 2, "more than two banks: {banks:?}");

    // Minimum delivery.
    for row in &result.allocation {
        assert!(row.units_supplied >= 0.01 - 1e-9, "row below minimum: {row:?}");
    }

    // Stock ledger: reconstruct raw draws per stock habitat at each bank and
    // compare with availability.
    let mut drawn: std::collections::BTreeMap<(String, String), f64> = Default::default();
    for row in &result.allocation {
        if row.parts.is_empty() {
            *drawn
                .entry((row.bank_id.clone(), row.supply_habitat.clone()))
                .or_default() += row.effective_units;
        } else {
            for part in &row.parts {
                *drawn
                    .entry((row.bank_id.clone(), part.habitat_name.clone()))
                    .or_default() += part.units_drawn;
            }
        }
    }
    for ((bank_id, habitat), used) in drawn {
        let available: f64 = tables
            .stock
            .iter()
            .filter(|s| s.bank_id == bank_id && s.habitat_name == habitat)
            .map(|s| s.quantity_available)
            .sum();
        assert!(
            used <= available + 1e-6,
            "stock overdraw at {bank_id}/{habitat}: {used} > {available}"
        );
    }

    // Cost additivity.
    let summed: f64 = result.allocation.iter().map(|r| r.cost).sum();
    assert!((summed - result.total_cost).abs() < 1e-4);
}

fn allocation_fingerprint(result: &SolveResult) -> Vec<(usize, String, String, String, u64, u64)> {
    result
        .allocation
        .iter()
        .map(|r| {
            (
                r.demand_idx,
                r.bank_id.clone(),
                r.supply_habitat.clone(),
                r.tier.to_string(),
                (r.units_supplied * 1e9).round() as u64,
                (r.cost * 1e4).round() as u64,
            )
        })
        .collect()
}

#[test]
fn solve_satisfies_all_invariants() {
    let tables = fixture(FixtureSpec::default());
    let demand = mixed_demand();
    let result = solve(&demand, &york_context(), &tables).unwrap();
    assert_invariants(&result, &demand, &tables);
}

#[test]
fn solve_is_deterministic() {
    let tables = fixture(FixtureSpec::default());
    let demand = mixed_demand();
    let first = solve(&demand, &york_context(), &tables).unwrap();
    let second = solve(&demand, &york_context(), &tables).unwrap();
    assert_eq!(allocation_fingerprint(&first), allocation_fingerprint(&second));
}

#[test]
fn reordering_reference_rows_changes_nothing() {
    let tables = fixture(FixtureSpec::default());
    let demand = mixed_demand();
    let baseline = solve(&demand, &york_context(), &tables).unwrap();

    let mut shuffled = tables.clone();
    shuffled.banks.reverse();
    shuffled.stock.reverse();
    shuffled.pricing.reverse();
    let reordered = solve(&demand, &york_context(), &shuffled).unwrap();

    assert_eq!(
        allocation_fingerprint(&baseline),
        allocation_fingerprint(&reordered)
    );
}

#[test]
fn doubling_demand_doubles_the_quote() {
    let tables = fixture(FixtureSpec { meadow_stock_a: 100.0, ..FixtureSpec::default() });
    let demand = vec![DemandRow::habitat("Lowland meadows", 1.5, UmbrellaType::Area)];
    let doubled = vec![DemandRow::habitat("Lowland meadows", 3.0, UmbrellaType::Area)];

    let base = solve(&demand, &york_context(), &tables).unwrap();
    let twice = solve(&doubled, &york_context(), &tables).unwrap();

    let base_units: f64 = base.allocation.iter().map(|r| r.units_supplied).sum();
    let twice_units: f64 = twice.allocation.iter().map(|r| r.units_supplied).sum();
    assert!((twice_units - 2.0 * base_units).abs() < 1e-6);
    assert!((twice.total_cost - 2.0 * base.total_cost).abs() < 1e-4);
}

#[test]
fn dominated_option_changes_nothing() {
    let tables = fixture(FixtureSpec::default());
    let demand = mixed_demand();
    let baseline = solve(&demand, &york_context(), &tables).unwrap();

    // A new bank with the same habitats at strictly worse prices and the
    // same (far) tier as the worst incumbent can never enter the optimum.
    let mut dominated = tables.clone();
    dominated
        .banks
        .push(bng_engine::test_fixtures::bank("bank-z", "BK-Z", "Kent", "The Weald"));
    dominated.stock.push(bng_engine::test_fixtures::stock(
        "bank-z",
        "Lowland meadows",
        "stk-z-meadow",
        50.0,
    ));
    for tier in bng_core::types::Tier::ALL {
        dominated.pricing.push(PriceRow {
            bank_id: "bank-z".into(),
            habitat_name: "Lowland meadows".into(),
            contract_size: ContractSize::Small,
            tier,
            price: 1_000_000.0,
        });
    }
    let with_dominated = solve(&demand, &york_context(), &dominated).unwrap();

    assert_eq!(
        allocation_fingerprint(&baseline),
        allocation_fingerprint(&with_dominated)
    );
}

#[test]
fn explicit_trading_rule_enables_previously_illegal_match() {
    // Demand a High woodland with only felled woodland in stock: illegal by
    // default, legal once the explicit rule lands.
    use bng_engine::test_fixtures::{bank, habitat_entry, standard_levels, stock};

    let make_tables = |rules: Vec<TradingRule>| ReferenceTables {
        banks: vec![bank("bank-a", "BK-A", "York", "Vale of York")],
        catalog: vec![
            habitat_entry(
                "Lowland mixed deciduous",
                "Woodland and forest",
                Distinctiveness::High,
                UmbrellaType::Area,
            ),
            habitat_entry(
                "Felled woodland",
                "Woodland and forest",
                Distinctiveness::Low,
                UmbrellaType::Area,
            ),
        ],
        pricing: vec![PriceRow {
            bank_id: "bank-a".into(),
            habitat_name: "Felled woodland".into(),
            contract_size: ContractSize::Small,
            tier: bng_core::types::Tier::Local,
            price: 8_000.0,
        }],
        stock: vec![stock("bank-a", "Felled woodland", "stk-f", 10.0)],
        distinctiveness_levels: standard_levels(),
        srm: bng_core::types::SrmTable::default(),
        trading_rules: rules,
    };
    let demand = vec![DemandRow::habitat(
        "Lowland mixed deciduous",
        1.0,
        UmbrellaType::Area,
    )];
    let ctx = SolveContext { lpa_neighbours: vec![], ..york_context() };

    let err = solve(&demand, &ctx, &make_tables(vec![])).unwrap_err();
    assert!(matches!(err, SolveError::NoLegalOptions { .. }));

    let result = solve(
        &demand,
        &ctx,
        &make_tables(vec![TradingRule {
            demand_habitat: "Lowland mixed deciduous".into(),
            allowed_supply_habitat: "Felled woodland".into(),
        }]),
    )
    .unwrap();
    assert_eq!(result.allocation[0].supply_habitat, "Felled woodland");
    assert!((result.total_cost - 8_000.0).abs() < 1e-4);
}

#[test]
fn no_legal_options_reports_rejection_reasons() {
    let mut spec = FixtureSpec::default();
    spec.drop_meadow_pricing = true;
    let tables = fixture(spec);
    let demand = vec![DemandRow::habitat("Lowland meadows", 1.0, UmbrellaType::Area)];

    let err = solve(&demand, &york_context(), &tables).unwrap_err();
    match err {
        SolveError::NoLegalOptions { demand_habitat, rejections, .. } => {
            assert_eq!(demand_habitat, "Lowland meadows");
            assert!(!rejections.is_empty());
        }
        other => panic!("expected NoLegalOptions, got {other:?}"),
    }
}

#[test]
fn suo_discount_applies_after_allocation() {
    let tables = fixture(FixtureSpec::default());
    let demand = vec![DemandRow::habitat("Lowland meadows", 2.0, UmbrellaType::Area)];
    let mut ctx = york_context();
    ctx.suo.enabled = true;
    ctx.suo.onsite_surpluses.insert("Traditional orchard".into(), 1.0);

    let result = solve(&demand, &ctx, &tables).unwrap();
    let suo = result.suo.expect("SUO breakdown present");

    // 1.0 eligible surplus -> 0.5 usable; 2.0 units allocated locally ->
    // fraction 0.25, under the 0.30 cap.
    assert!((suo.eligible_surplus - 1.0).abs() < 1e-9);
    assert!((suo.usable_surplus - 0.5).abs() < 1e-9);
    assert!((suo.discount_fraction - 0.25).abs() < 1e-9);
    assert!((suo.discount_amount - result.total_cost * 0.25).abs() < 1e-4);
    assert!(
        (suo.total_after_discount - (result.total_cost - suo.discount_amount)).abs() < 1e-4
    );
}

#[test]
fn verify_assignment_is_exposed_for_collaborators() {
    // The shared checker can re-validate any assignment a collaborator holds.
    use bng_engine::{build_options, GeographyContext};

    let tables = fixture(FixtureSpec::default());
    let index = tables.index().unwrap();
    let geo = GeographyContext::new("York", "Vale of York", &[], &[]);
    let demand = vec![DemandRow::habitat("Lowland meadows", 1.0, UmbrellaType::Area)];
    let options = build_options(
        &demand,
        &index,
        &geo,
        ContractSize::Small,
        &Promoter::none(),
    )
    .unwrap();

    let empty = vec![0.0; options.len()];
    let violations = verify_assignment(&empty, &options, &demand, &index);
    assert!(!violations.is_empty());
}
