use rust_decimal::{Decimal, RoundingStrategy};

use super::super::domain::{SelicBucket, TaxIndexSnapshot, Vehicle, VehicleGroup};
use super::config::CalculationConfig;
use super::validation::PricingError;

const MONTHS_PER_YEAR: i64 = 12;

/// Round a monetary amount to cents, half away from zero.
pub(crate) fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn depreciation(
    value: Decimal,
    base_rate: Decimal,
    multiplier: Decimal,
) -> Result<Decimal, PricingError> {
    base_rate
        .checked_mul(multiplier)
        .and_then(|rate| rate.checked_mul(value))
        .map(round_money)
        .ok_or_else(|| out_of_range("depreciation_cost"))
}

/// Expected monthly wear: revision and tire cost per km times the monthly allowance.
pub(crate) fn maintenance(group: &VehicleGroup, monthly_km: u32) -> Result<Decimal, PricingError> {
    let revision_per_km = group.revision_cost.checked_div(Decimal::from(group.revision_km));
    let tire_per_km = group.tire_cost.checked_div(Decimal::from(group.tire_km));
    revision_per_km
        .zip(tire_per_km)
        .and_then(|(revision, tire)| revision.checked_add(tire))
        .and_then(|per_km| per_km.checked_mul(Decimal::from(monthly_km)))
        .map(round_money)
        .ok_or_else(|| out_of_range("maintenance_cost"))
}

pub(crate) fn tracking(has_tracking: bool, config: &CalculationConfig) -> Decimal {
    if has_tracking {
        round_money(config.tracking_monthly_cost)
    } else {
        Decimal::ZERO
    }
}

/// Annual amounts are spread over twelve months regardless of contract length.
pub(crate) fn monthly_from_annual(annual: Decimal) -> Decimal {
    round_money(annual / Decimal::from(MONTHS_PER_YEAR))
}

pub(crate) fn ipva_annual(
    vehicle: &Vehicle,
    group: &VehicleGroup,
    config: &CalculationConfig,
) -> Result<Decimal, PricingError> {
    match vehicle.ipva_annual.or(group.ipva_annual) {
        Some(registered) => Ok(registered),
        None => vehicle
            .value
            .checked_mul(config.ipva_annual_percent)
            .map(|amount| amount / Decimal::ONE_HUNDRED)
            .ok_or_else(|| out_of_range("ipva_cost")),
    }
}

pub(crate) fn licensing_annual(
    vehicle: &Vehicle,
    group: &VehicleGroup,
    config: &CalculationConfig,
) -> Decimal {
    vehicle
        .licensing_annual
        .or(group.licensing_annual)
        .unwrap_or(config.licensing_annual_fee)
}

/// Monthly cost of capital: `value × (selic + spread) / 100 / 12`.
pub(crate) fn financial_cost(
    value: Decimal,
    taxes: &TaxIndexSnapshot,
    bucket: SelicBucket,
) -> Result<Decimal, PricingError> {
    bucket
        .rate(&taxes.selic)
        .checked_add(taxes.spread)
        .and_then(|annual_rate| value.checked_mul(annual_rate))
        .map(|annual_cost| annual_cost / Decimal::ONE_HUNDRED / Decimal::from(MONTHS_PER_YEAR))
        .map(round_money)
        .ok_or_else(|| out_of_range("tax_cost"))
}

pub(crate) fn extra_km_rate(
    value: Decimal,
    config: &CalculationConfig,
) -> Result<Decimal, PricingError> {
    value
        .checked_mul(config.extra_km_percentage)
        .map(round_money)
        .ok_or_else(|| out_of_range("extra_km_rate"))
}

/// Add rounded components, failing instead of wrapping past the decimal range.
pub(crate) fn sum_components(components: &[Decimal]) -> Result<Decimal, PricingError> {
    components
        .iter()
        .try_fold(Decimal::ZERO, |total, component| total.checked_add(*component))
        .ok_or_else(|| out_of_range("total_cost"))
}

fn out_of_range(component: &str) -> PricingError {
    PricingError::invalid(component, "exceeds the supported monetary range")
}
