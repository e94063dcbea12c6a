use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::validation::PricingError;

/// Tunable rates consumed by the cost engine. Sourced once from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationConfig {
    /// Monthly depreciation base rate applied to the vehicle value.
    pub depreciation_base_rate: Decimal,
    /// Multipliers for operation severities 1 through 6.
    pub severity_multipliers: [Decimal; 6],
    pub tracking_monthly_cost: Decimal,
    /// Fraction of the vehicle value charged per extra km.
    pub extra_km_percentage: Decimal,
    /// Annual IPVA as a percentage of value, used when no base cost is registered.
    pub ipva_annual_percent: Decimal,
    /// Annual licensing fee used when no base cost is registered.
    pub licensing_annual_fee: Decimal,
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            depreciation_base_rate: Decimal::new(35, 2),
            severity_multipliers: [
                Decimal::new(4, 2),
                Decimal::new(6, 2),
                Decimal::new(8, 2),
                Decimal::new(10, 2),
                Decimal::new(12, 2),
                Decimal::new(15, 2),
            ],
            tracking_monthly_cost: Decimal::new(8990, 2),
            extra_km_percentage: Decimal::new(1, 5),
            ipva_annual_percent: Decimal::new(4, 0),
            licensing_annual_fee: Decimal::new(16000, 2),
        }
    }
}

impl CalculationConfig {
    pub fn severity_multiplier(&self, severity: u8) -> Option<Decimal> {
        match severity {
            1..=6 => Some(self.severity_multipliers[usize::from(severity - 1)]),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        if self.depreciation_base_rate <= Decimal::ZERO {
            return Err(PricingError::invalid(
                "depreciation_base_rate",
                "must be greater than zero",
            ));
        }

        if let Some(position) = self
            .severity_multipliers
            .iter()
            .position(|multiplier| *multiplier <= Decimal::ZERO)
        {
            return Err(PricingError::invalid(
                "severity_multipliers",
                format!("multiplier for severity {} must be greater than zero", position + 1),
            ));
        }

        let non_negative = [
            ("tracking_monthly_cost", self.tracking_monthly_cost),
            ("extra_km_percentage", self.extra_km_percentage),
            ("ipva_annual_percent", self.ipva_annual_percent),
            ("licensing_annual_fee", self.licensing_annual_fee),
        ];
        for (field, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(PricingError::invalid(field, "must not be negative"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_maps_every_severity() {
        let config = CalculationConfig::default();
        assert_eq!(config.severity_multiplier(1), Some(Decimal::new(4, 2)));
        assert_eq!(config.severity_multiplier(3), Some(Decimal::new(8, 2)));
        assert_eq!(config.severity_multiplier(6), Some(Decimal::new(15, 2)));
        assert_eq!(config.severity_multiplier(0), None);
        assert_eq!(config.severity_multiplier(7), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_multiplier() {
        let mut config = CalculationConfig::default();
        config.severity_multipliers[4] = Decimal::ZERO;

        let error = config.validate().expect_err("zero multiplier rejected");
        assert_eq!(
            error.to_string(),
            "severity_multipliers: multiplier for severity 5 must be greater than zero"
        );
    }
}
