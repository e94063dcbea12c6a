mod config;
mod rules;
mod validation;

pub use config::CalculationConfig;
pub(crate) use validation::validate_group;
pub use validation::{
    MissingReference, PricingError, MAX_CONTRACT_MONTHS, MAX_MONEY_AMOUNT, MAX_MONTHLY_KM,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    ContractParameters, PlanId, ProtectionPlan, QuoteResultVehicle, SelicBucket,
    TaxIndexSnapshot, Vehicle, VehicleGroup, VehicleId,
};

/// Recoverable condition reported next to a priced vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingWarning {
    /// The referenced protection plan could not be resolved and was priced at zero.
    ProtectionPlanUnavailable {
        vehicle_id: VehicleId,
        plan_id: PlanId,
    },
}

impl PricingWarning {
    pub fn summary(&self) -> String {
        match self {
            PricingWarning::ProtectionPlanUnavailable {
                vehicle_id,
                plan_id,
            } => format!(
                "protection plan {plan_id} unavailable for vehicle {vehicle_id}; priced without protection"
            ),
        }
    }
}

/// Cost breakdown plus any warnings raised while pricing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedVehicle {
    pub result: QuoteResultVehicle,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PricingWarning>,
}

/// Stateless engine applying a [`CalculationConfig`] to vehicles.
#[derive(Debug, Clone, Default)]
pub struct CostEngine {
    config: CalculationConfig,
}

impl CostEngine {
    pub fn new(config: CalculationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalculationConfig {
        &self.config
    }

    pub fn price(
        &self,
        vehicle: &Vehicle,
        group: Option<&VehicleGroup>,
        params: &ContractParameters,
        plan: Option<&ProtectionPlan>,
        taxes: Option<&TaxIndexSnapshot>,
    ) -> Result<PricedVehicle, PricingError> {
        compute_vehicle_cost(vehicle, group, params, plan, taxes, &self.config)
    }
}

/// Price one vehicle for the given contract parameters.
///
/// Depreciation and maintenance are mandatory and fail on missing or invalid reference data.
/// Tracking and protection fall back to zero. IPVA, licensing and financial cost are only
/// computed when their include flag is set; every component is a monthly amount rounded to
/// cents and `total_cost` is their exact sum.
pub fn compute_vehicle_cost(
    vehicle: &Vehicle,
    group: Option<&VehicleGroup>,
    params: &ContractParameters,
    plan: Option<&ProtectionPlan>,
    taxes: Option<&TaxIndexSnapshot>,
    config: &CalculationConfig,
) -> Result<PricedVehicle, PricingError> {
    config.validate()?;
    validation::validate_parameters(params)?;
    validation::validate_vehicle(vehicle)?;
    let group = validation::require_group(vehicle, group)?;

    let multiplier = config
        .severity_multiplier(params.operation_severity)
        .ok_or_else(|| PricingError::invalid("operation_severity", "must be between 1 and 6"))?;

    let depreciation_cost =
        rules::depreciation(vehicle.value, config.depreciation_base_rate, multiplier)?;
    let maintenance_cost = rules::maintenance(group, params.monthly_km)?;
    let tracking_cost = rules::tracking(params.has_tracking, config);

    let mut warnings = Vec::new();
    let protection_cost = match &params.protection_plan_id {
        Some(plan_id) => match plan.filter(|plan| &plan.id == plan_id) {
            Some(plan) if plan.monthly_cost >= Decimal::ZERO => rules::round_money(plan.monthly_cost),
            Some(_) => {
                return Err(PricingError::invalid(
                    "protection_plan.monthly_cost",
                    "must not be negative",
                ))
            }
            None => {
                warnings.push(PricingWarning::ProtectionPlanUnavailable {
                    vehicle_id: vehicle.id.clone(),
                    plan_id: plan_id.clone(),
                });
                Decimal::ZERO
            }
        },
        None => Decimal::ZERO,
    };

    let ipva_cost = if params.include_ipva {
        rules::monthly_from_annual(rules::ipva_annual(vehicle, group, config)?)
    } else {
        Decimal::ZERO
    };

    let licensing_cost = if params.include_licensing {
        rules::monthly_from_annual(rules::licensing_annual(vehicle, group, config))
    } else {
        Decimal::ZERO
    };

    let (tax_cost, selic_bucket) = if params.include_taxes {
        let taxes = taxes
            .ok_or(PricingError::MissingReferenceData(MissingReference::TaxSnapshot))?;
        validation::validate_tax_snapshot(taxes)?;
        let bucket = SelicBucket::for_contract(params.contract_months);
        (rules::financial_cost(vehicle.value, taxes, bucket)?, Some(bucket))
    } else {
        (Decimal::ZERO, None)
    };

    let total_cost = rules::sum_components(&[
        depreciation_cost,
        maintenance_cost,
        tracking_cost,
        protection_cost,
        ipva_cost,
        licensing_cost,
        tax_cost,
    ])?;
    let extra_km_rate = rules::extra_km_rate(vehicle.value, config)?;

    Ok(PricedVehicle {
        result: QuoteResultVehicle {
            vehicle_id: vehicle.id.clone(),
            group_code: group.code.clone(),
            description: vehicle.description(),
            vehicle_value: vehicle.value,
            depreciation_cost,
            maintenance_cost,
            tracking_cost,
            protection_cost,
            ipva_cost,
            licensing_cost,
            tax_cost,
            extra_km_rate,
            total_cost,
            selic_bucket,
            parameters: params.clone(),
            uses_global_parameters: false,
        },
        warnings,
    })
}

/// Sum of line totals; an empty quote totals zero.
pub fn compute_quote_total(lines: &[QuoteResultVehicle]) -> Decimal {
    lines.iter().map(|line| line.total_cost).sum()
}
