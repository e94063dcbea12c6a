use rust_decimal::Decimal;

use super::super::domain::{
    ContractParameters, GroupCode, TaxIndexSnapshot, Vehicle, VehicleGroup,
};

pub const MAX_CONTRACT_MONTHS: u16 = 60;
pub const MAX_MONTHLY_KM: u32 = 10_000;
/// Largest monetary amount accepted from reference data (R$ 1 billion).
pub const MAX_MONEY_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Reference record required by a mandatory cost component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReference {
    Vehicle(String),
    VehicleGroup(GroupCode),
    TaxSnapshot,
}

impl std::fmt::Display for MissingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingReference::Vehicle(key) => write!(f, "vehicle {key}"),
            MissingReference::VehicleGroup(code) => write!(f, "vehicle group {code}"),
            MissingReference::TaxSnapshot => f.write_str("tax index snapshot"),
        }
    }
}

/// Errors that block a vehicle from being priced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("{field}: {constraint}")]
    Validation { field: String, constraint: String },
    #[error("missing reference data: {0}")]
    MissingReferenceData(MissingReference),
}

impl PricingError {
    pub(crate) fn invalid(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    /// Prefix the offending field with the location of the quote line it came from.
    pub fn in_line(self, position: usize) -> Self {
        match self {
            Self::Validation { field, constraint } => Self::Validation {
                field: format!("vehicles[{position}].{field}"),
                constraint,
            },
            other => other,
        }
    }
}

pub(crate) fn validate_parameters(params: &ContractParameters) -> Result<(), PricingError> {
    if !(1..=MAX_CONTRACT_MONTHS).contains(&params.contract_months) {
        return Err(PricingError::invalid(
            "contract_months",
            format!("must be between 1 and {MAX_CONTRACT_MONTHS}"),
        ));
    }

    if !(1..=MAX_MONTHLY_KM).contains(&params.monthly_km) {
        return Err(PricingError::invalid(
            "monthly_km",
            format!("must be between 1 and {MAX_MONTHLY_KM}"),
        ));
    }

    if !(1..=6).contains(&params.operation_severity) {
        return Err(PricingError::invalid(
            "operation_severity",
            "must be between 1 and 6",
        ));
    }

    Ok(())
}

pub(crate) fn validate_vehicle(vehicle: &Vehicle) -> Result<(), PricingError> {
    if vehicle.value <= Decimal::ZERO {
        return Err(PricingError::invalid("vehicle.value", "must be greater than zero"));
    }
    check_money_amount("vehicle.value", vehicle.value)?;

    for (field, base) in [
        ("vehicle.ipva_annual", vehicle.ipva_annual),
        ("vehicle.licensing_annual", vehicle.licensing_annual),
    ] {
        if let Some(amount) = base {
            check_money_amount(field, amount)?;
        }
    }

    Ok(())
}

/// Resolve the group for a vehicle, rejecting absent or inconsistent records.
pub(crate) fn require_group<'a>(
    vehicle: &Vehicle,
    group: Option<&'a VehicleGroup>,
) -> Result<&'a VehicleGroup, PricingError> {
    let group = group
        .filter(|group| group.code == vehicle.group_code)
        .ok_or_else(|| {
            PricingError::MissingReferenceData(MissingReference::VehicleGroup(
                vehicle.group_code.clone(),
            ))
        })?;

    validate_group(group)?;
    Ok(group)
}

pub(crate) fn validate_group(group: &VehicleGroup) -> Result<(), PricingError> {
    if group.revision_km == 0 {
        return Err(PricingError::invalid("group.revision_km", "must be greater than zero"));
    }
    if group.tire_km == 0 {
        return Err(PricingError::invalid("group.tire_km", "must be greater than zero"));
    }

    for (field, amount) in [
        ("group.revision_cost", Some(group.revision_cost)),
        ("group.tire_cost", Some(group.tire_cost)),
        ("group.ipva_annual", group.ipva_annual),
        ("group.licensing_annual", group.licensing_annual),
    ] {
        if let Some(amount) = amount {
            check_money_amount(field, amount)?;
        }
    }

    Ok(())
}

/// SELIC rates and spread are annual percentages.
pub(crate) fn validate_tax_snapshot(taxes: &TaxIndexSnapshot) -> Result<(), PricingError> {
    for (field, rate) in [
        ("tax_snapshot.selic.month12", taxes.selic.month12),
        ("tax_snapshot.selic.month18", taxes.selic.month18),
        ("tax_snapshot.selic.month24", taxes.selic.month24),
        ("tax_snapshot.spread", taxes.spread),
    ] {
        if rate < Decimal::ZERO {
            return Err(PricingError::invalid(field, "must not be negative"));
        }
    }

    Ok(())
}

fn check_money_amount(field: &str, amount: Decimal) -> Result<(), PricingError> {
    if amount < Decimal::ZERO {
        return Err(PricingError::invalid(field, "must not be negative"));
    }
    if amount > MAX_MONEY_AMOUNT {
        return Err(PricingError::invalid(
            field,
            format!("must not exceed {MAX_MONEY_AMOUNT}"),
        ));
    }
    Ok(())
}
