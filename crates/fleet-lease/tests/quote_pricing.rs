use chrono::NaiveDate;
use fleet_lease::workflows::quote::{
    compute_quote_total, compute_vehicle_cost, parse_vehicle_groups, CalculationConfig,
    ContractParameters, GroupCode, QuoteResultVehicle, SelicBucket, SelicRates, TaxIndexSnapshot,
    Vehicle, VehicleGroup, VehicleId,
};
use rust_decimal::Decimal;

fn hatch() -> Vehicle {
    Vehicle {
        id: VehicleId("v-hb20".to_string()),
        brand: "Hyundai".to_string(),
        model: "HB20".to_string(),
        year: 2024,
        value: Decimal::new(60_000, 0),
        is_used: false,
        plate: None,
        color: None,
        odometer_km: None,
        fuel_type: None,
        group_code: GroupCode("B".to_string()),
        ipva_annual: None,
        licensing_annual: None,
    }
}

fn hatch_group() -> VehicleGroup {
    VehicleGroup {
        code: GroupCode("B".to_string()),
        name: "Compacto".to_string(),
        description: String::new(),
        revision_km: 10_000,
        revision_cost: Decimal::new(600, 0),
        tire_km: 40_000,
        tire_cost: Decimal::new(2_000, 0),
        ipva_annual: None,
        licensing_annual: None,
    }
}

fn snapshot() -> TaxIndexSnapshot {
    TaxIndexSnapshot {
        reference_date: NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid date"),
        ipca: Decimal::new(45, 1),
        igpm: Decimal::new(61, 1),
        spread: Decimal::new(4, 0),
        selic: SelicRates {
            month12: Decimal::new(105, 1),
            month18: Decimal::new(102, 1),
            month24: Decimal::new(99, 1),
        },
    }
}

fn parameters(contract_months: u16, include_taxes: bool) -> ContractParameters {
    ContractParameters {
        contract_months,
        monthly_km: 2_000,
        operation_severity: 3,
        has_tracking: false,
        protection_plan_id: None,
        include_ipva: false,
        include_licensing: false,
        include_taxes,
    }
}

fn line_with_total(total_cost: Decimal) -> QuoteResultVehicle {
    let zero = Decimal::ZERO;
    QuoteResultVehicle {
        vehicle_id: VehicleId("v-any".to_string()),
        group_code: GroupCode("B".to_string()),
        description: String::new(),
        vehicle_value: zero,
        depreciation_cost: zero,
        maintenance_cost: zero,
        tracking_cost: zero,
        protection_cost: zero,
        ipva_cost: zero,
        licensing_cost: zero,
        tax_cost: zero,
        extra_km_rate: zero,
        total_cost,
        selic_bucket: None,
        parameters: parameters(12, false),
        uses_global_parameters: true,
    }
}

#[test]
fn severity_three_depreciation_matches_the_rate_table() {
    let priced = compute_vehicle_cost(
        &hatch(),
        Some(&hatch_group()),
        &parameters(24, false),
        None,
        None,
        &CalculationConfig::default(),
    )
    .expect("prices");

    assert_eq!(priced.result.depreciation_cost, Decimal::new(168_000, 2));
}

#[test]
fn twenty_four_month_tax_cost_uses_the_long_bucket() {
    let priced = compute_vehicle_cost(
        &hatch(),
        Some(&hatch_group()),
        &parameters(24, true),
        None,
        Some(&snapshot()),
        &CalculationConfig::default(),
    )
    .expect("prices");

    assert_eq!(priced.result.tax_cost, Decimal::new(69_500, 2));
    assert_eq!(priced.result.selic_bucket, Some(SelicBucket::Month24));
}

#[test]
fn contract_length_selects_the_selic_bucket() {
    let expectations = [
        (12, SelicBucket::Month12),
        (13, SelicBucket::Month18),
        (18, SelicBucket::Month18),
        (19, SelicBucket::Month24),
        (24, SelicBucket::Month24),
        (60, SelicBucket::Month24),
    ];
    for (months, bucket) in expectations {
        assert_eq!(SelicBucket::for_contract(months), bucket, "{months} months");
    }
}

#[test]
fn quote_total_is_the_sum_of_line_totals() {
    let lines = vec![
        line_with_total(Decimal::new(120_000, 2)),
        line_with_total(Decimal::new(98_050, 2)),
    ];

    assert_eq!(compute_quote_total(&lines), Decimal::new(218_050, 2));
    assert_eq!(compute_quote_total(&[]), Decimal::ZERO);
}

#[test]
fn component_sum_equals_line_total() {
    let mut params = parameters(36, true);
    params.has_tracking = true;
    params.include_ipva = true;
    params.include_licensing = true;

    let result = compute_vehicle_cost(
        &hatch(),
        Some(&hatch_group()),
        &params,
        None,
        Some(&snapshot()),
        &CalculationConfig::default(),
    )
    .expect("prices")
    .result;

    let components = result.depreciation_cost
        + result.maintenance_cost
        + result.tracking_cost
        + result.protection_cost
        + result.ipva_cost
        + result.licensing_cost
        + result.tax_cost;
    assert_eq!(result.total_cost, components);
    assert_eq!(result.total_cost.scale(), 2);
}

#[test]
fn imported_groups_price_like_hand_built_ones() {
    let csv = "code,name,description,revision_km,revision_cost,tire_km,tire_cost,ipva_annual,licensing_annual\n\
b,Compacto,,10000,600.00,40000,2000.00,,\n";
    let groups = parse_vehicle_groups(csv.as_bytes()).expect("catalog parses");

    assert_eq!(groups, vec![hatch_group()]);
}
