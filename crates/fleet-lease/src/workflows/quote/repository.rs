use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{
    ContractParameters, GroupCode, PlanId, ProtectionPlan, Quote, QuoteId, QuoteResultVehicle,
    QuoteStatus, StatusHistoryEntry, TaxIndexSnapshot, Vehicle, VehicleGroup, VehicleId,
};
use super::status::calculate_progress;

impl Quote {
    pub fn status_view(&self) -> QuoteStatusView {
        QuoteStatusView {
            quote_id: self.id.clone(),
            status: self.status,
            status_label: self.status.label(),
            progress: calculate_progress(self.status),
            total_value: self.total_value,
            vehicle_count: self.vehicles.len(),
        }
    }
}

/// Storage abstraction for quotes so the service can be exercised in isolation.
pub trait QuoteRepository: Send + Sync {
    fn insert(&self, quote: Quote) -> Result<Quote, RepositoryError>;
    fn fetch(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    /// Replace the priced lines, global parameters and total of a stored quote.
    ///
    /// Implementations must check [`QuotePricing::ensure_current`] and write under the same
    /// lock, so a quote that moved since it was read is never overwritten.
    fn update_pricing(&self, id: &QuoteId, pricing: QuotePricing) -> Result<Quote, RepositoryError>;
    /// Write `next` only if the stored status still equals `expected`.
    ///
    /// Implementations must fail with [`RepositoryError::StatusMismatch`] otherwise.
    fn compare_and_swap_status(
        &self,
        id: &QuoteId,
        expected: QuoteStatus,
        next: QuoteStatus,
        at: DateTime<Utc>,
    ) -> Result<Quote, RepositoryError>;
}

/// Append-only audit trail.
pub trait StatusHistoryRepository: Send + Sync {
    fn append(&self, entry: StatusHistoryEntry) -> Result<(), RepositoryError>;
    fn list(&self, quote_id: &QuoteId) -> Result<Vec<StatusHistoryEntry>, RepositoryError>;
}

/// Read-only lookups of administrator-maintained records.
pub trait ReferenceData: Send + Sync {
    fn vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError>;
    fn vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>, RepositoryError>;
    fn group(&self, code: &GroupCode) -> Result<Option<VehicleGroup>, RepositoryError>;
    fn protection_plan(&self, id: &PlanId) -> Result<Option<ProtectionPlan>, RepositoryError>;
    fn tax_snapshot(&self) -> Result<Option<TaxIndexSnapshot>, RepositoryError>;
}

/// Pricing fields written back after a recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePricing {
    pub global_parameters: Option<ContractParameters>,
    pub vehicles: Vec<QuoteResultVehicle>,
    pub total_value: Decimal,
    pub updated_at: DateTime<Utc>,
    /// Status of the quote the lines were priced from.
    pub expected_status: QuoteStatus,
    /// `updated_at` of the quote the lines were priced from.
    pub expected_updated_at: DateTime<Utc>,
}

impl QuotePricing {
    /// Refuse the write when the stored quote changed after it was read.
    pub fn ensure_current(&self, stored: &Quote) -> Result<(), RepositoryError> {
        if stored.status != self.expected_status {
            return Err(RepositoryError::StatusMismatch {
                expected: self.expected_status,
                actual: stored.status,
            });
        }
        if stored.updated_at != self.expected_updated_at {
            return Err(RepositoryError::Stale);
        }
        Ok(())
    }

    pub fn apply_to(self, quote: &mut Quote) {
        quote.global_parameters = self.global_parameters;
        quote.vehicles = self.vehicles;
        quote.total_value = self.total_value;
        quote.updated_at = self.updated_at;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stored status is {actual}, expected {expected}")]
    StatusMismatch {
        expected: QuoteStatus,
        actual: QuoteStatus,
    },
    #[error("record was modified after it was read")]
    Stale,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Plate comparison key: uppercase without separators.
pub fn normalize_plate(plate: &str) -> String {
    plate
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// Sanitized representation of a quote's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteStatusView {
    pub quote_id: QuoteId,
    pub status: QuoteStatus,
    pub status_label: &'static str,
    pub progress: u8,
    pub total_value: Decimal,
    pub vehicle_count: usize,
}
