use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::quote::domain::{
    ActorId, ClientId, ContractParameters, GroupCode, PlanId, ProtectionPlan, ProtectionTier,
    Quote, QuoteId, QuoteStatus, SelicRates, StatusHistoryEntry, TaxIndexSnapshot, Vehicle,
    VehicleGroup, VehicleId,
};
use crate::workflows::quote::pricing::{CalculationConfig, CostEngine};
use crate::workflows::quote::repository::{
    normalize_plate, QuotePricing, QuoteRepository, ReferenceData, RepositoryError,
    StatusHistoryRepository,
};
use crate::workflows::quote::service::{
    CreateQuoteRequest, QuoteLineRequest, QuoteService, VehicleSelector,
};

pub(super) fn money(units: i64, cents: u32) -> Decimal {
    Decimal::new(units * 100 + i64::from(cents), 2)
}

pub(super) fn compact_group() -> VehicleGroup {
    VehicleGroup {
        code: GroupCode("B".to_string()),
        name: "Compacto".to_string(),
        description: "Hatch e sedã compactos".to_string(),
        revision_km: 10_000,
        revision_cost: money(600, 0),
        tire_km: 40_000,
        tire_cost: money(2_000, 0),
        ipva_annual: Some(money(2_400, 0)),
        licensing_annual: None,
    }
}

pub(super) fn suv_group() -> VehicleGroup {
    VehicleGroup {
        code: GroupCode("C".to_string()),
        name: "SUV".to_string(),
        description: String::new(),
        revision_km: 10_000,
        revision_cost: money(900, 0),
        tire_km: 45_000,
        tire_cost: money(3_600, 0),
        ipva_annual: None,
        licensing_annual: Some(money(240, 0)),
    }
}

pub(super) fn compact_vehicle() -> Vehicle {
    Vehicle {
        id: VehicleId("v-onix".to_string()),
        brand: "Chevrolet".to_string(),
        model: "Onix".to_string(),
        year: 2024,
        value: money(60_000, 0),
        is_used: true,
        plate: Some("ABC-1D23".to_string()),
        color: Some("Prata".to_string()),
        odometer_km: Some(18_000),
        fuel_type: Some("flex".to_string()),
        group_code: GroupCode("B".to_string()),
        ipva_annual: None,
        licensing_annual: None,
    }
}

pub(super) fn suv_vehicle() -> Vehicle {
    Vehicle {
        id: VehicleId("v-compass".to_string()),
        brand: "Jeep".to_string(),
        model: "Compass".to_string(),
        year: 2025,
        value: money(150_000, 0),
        is_used: false,
        plate: None,
        color: None,
        odometer_km: None,
        fuel_type: Some("diesel".to_string()),
        group_code: GroupCode("C".to_string()),
        ipva_annual: None,
        licensing_annual: None,
    }
}

pub(super) fn basic_plan() -> ProtectionPlan {
    ProtectionPlan {
        id: PlanId("pp-basic".to_string()),
        name: "Proteção Básica".to_string(),
        description: "Roubo e furto".to_string(),
        tier: ProtectionTier::Basic,
        monthly_cost: money(79, 90),
    }
}

pub(super) fn tax_snapshot() -> TaxIndexSnapshot {
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

/// 24 months, 2 500 km, severity 3, every add-on enabled.
pub(super) fn full_parameters() -> ContractParameters {
    ContractParameters {
        contract_months: 24,
        monthly_km: 2_500,
        operation_severity: 3,
        has_tracking: true,
        protection_plan_id: Some(PlanId("pp-basic".to_string())),
        include_ipva: true,
        include_licensing: true,
        include_taxes: true,
    }
}

pub(super) fn bare_parameters() -> ContractParameters {
    ContractParameters {
        contract_months: 12,
        monthly_km: 1_000,
        operation_severity: 1,
        has_tracking: false,
        protection_plan_id: None,
        include_ipva: false,
        include_licensing: false,
        include_taxes: false,
    }
}

pub(super) fn engine() -> CostEngine {
    CostEngine::new(CalculationConfig::default())
}

pub(super) fn actor(name: &str) -> ActorId {
    ActorId(name.to_string())
}

pub(super) fn line_by_id(id: &str, parameters: Option<ContractParameters>) -> QuoteLineRequest {
    QuoteLineRequest {
        vehicle: VehicleSelector {
            vehicle_id: Some(VehicleId(id.to_string())),
            plate: None,
        },
        parameters,
    }
}

pub(super) fn create_request() -> CreateQuoteRequest {
    CreateQuoteRequest {
        client_id: ClientId("cli-logistica-sul".to_string()),
        created_by: actor("ana.souza"),
        global_parameters: Some(full_parameters()),
        vehicles: vec![
            line_by_id("v-onix", None),
            line_by_id("v-compass", Some(bare_parameters())),
        ],
        save_as_draft: false,
    }
}

pub(super) type TestService = QuoteService<MemoryQuotes, MemoryHistory, MemoryReference>;

pub(super) fn build_service() -> (TestService, Arc<MemoryQuotes>, Arc<MemoryHistory>) {
    let quotes = Arc::new(MemoryQuotes::default());
    let history = Arc::new(MemoryHistory::default());
    let reference = Arc::new(MemoryReference::seeded());
    let service = QuoteService::new(quotes.clone(), history.clone(), reference, engine());
    (service, quotes, history)
}

#[derive(Default, Clone)]
pub(super) struct MemoryQuotes {
    pub(super) records: Arc<Mutex<HashMap<QuoteId, Quote>>>,
}

impl MemoryQuotes {
    pub(super) fn force_status(&self, id: &QuoteId, status: QuoteStatus) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(quote) = guard.get_mut(id) {
            quote.status = status;
        }
    }

    /// Commit a write from another caller: new status and a later `updated_at`.
    pub(super) fn commit_foreign_write(&self, id: &QuoteId, status: QuoteStatus) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(quote) = guard.get_mut(id) {
            quote.status = status;
            quote.updated_at += chrono::Duration::seconds(1);
        }
    }
}

impl QuoteRepository for MemoryQuotes {
    fn insert(&self, quote: Quote) -> Result<Quote, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&quote.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(quote.id.clone(), quote.clone());
        Ok(quote)
    }

    fn fetch(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_pricing(&self, id: &QuoteId, pricing: QuotePricing) -> Result<Quote, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let quote = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        pricing.ensure_current(quote)?;
        pricing.apply_to(quote);
        Ok(quote.clone())
    }

    fn compare_and_swap_status(
        &self,
        id: &QuoteId,
        expected: QuoteStatus,
        next: QuoteStatus,
        at: DateTime<Utc>,
    ) -> Result<Quote, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let quote = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if quote.status != expected {
            return Err(RepositoryError::StatusMismatch {
                expected,
                actual: quote.status,
            });
        }
        quote.status = next;
        quote.updated_at = at;
        Ok(quote.clone())
    }
}

/// Another caller wins the race between the read and the write.
pub(super) struct RacingQuotes {
    pub(super) inner: MemoryQuotes,
    pub(super) winner: QuoteStatus,
}

impl QuoteRepository for RacingQuotes {
    fn insert(&self, quote: Quote) -> Result<Quote, RepositoryError> {
        self.inner.insert(quote)
    }

    fn fetch(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn update_pricing(&self, id: &QuoteId, pricing: QuotePricing) -> Result<Quote, RepositoryError> {
        self.inner.commit_foreign_write(id, self.winner);
        self.inner.update_pricing(id, pricing)
    }

    fn compare_and_swap_status(
        &self,
        id: &QuoteId,
        expected: QuoteStatus,
        next: QuoteStatus,
        at: DateTime<Utc>,
    ) -> Result<Quote, RepositoryError> {
        self.inner.force_status(id, self.winner);
        self.inner.compare_and_swap_status(id, expected, next, at)
    }
}

pub(super) struct UnavailableQuotes;

impl QuoteRepository for UnavailableQuotes {
    fn insert(&self, _quote: Quote) -> Result<Quote, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_pricing(&self, _id: &QuoteId, _pricing: QuotePricing) -> Result<Quote, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn compare_and_swap_status(
        &self,
        _id: &QuoteId,
        _expected: QuoteStatus,
        _next: QuoteStatus,
        _at: DateTime<Utc>,
    ) -> Result<Quote, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryHistory {
    entries: Arc<Mutex<Vec<StatusHistoryEntry>>>,
}

impl MemoryHistory {
    pub(super) fn entries(&self) -> Vec<StatusHistoryEntry> {
        self.entries.lock().expect("history mutex poisoned").clone()
    }
}

impl StatusHistoryRepository for MemoryHistory {
    fn append(&self, entry: StatusHistoryEntry) -> Result<(), RepositoryError> {
        self.entries
            .lock()
            .expect("history mutex poisoned")
            .push(entry);
        Ok(())
    }

    fn list(&self, quote_id: &QuoteId) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        Ok(self
            .entries()
            .into_iter()
            .filter(|entry| &entry.quote_id == quote_id)
            .collect())
    }
}

pub(super) struct FailingHistory;

impl StatusHistoryRepository for FailingHistory {
    fn append(&self, _entry: StatusHistoryEntry) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("audit store offline".to_string()))
    }

    fn list(&self, _quote_id: &QuoteId) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("audit store offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryReference {
    pub(super) vehicles: Vec<Vehicle>,
    pub(super) groups: Vec<VehicleGroup>,
    pub(super) plans: Vec<ProtectionPlan>,
    pub(super) taxes: Option<TaxIndexSnapshot>,
}

impl MemoryReference {
    pub(super) fn seeded() -> Self {
        Self {
            vehicles: vec![compact_vehicle(), suv_vehicle()],
            groups: vec![compact_group(), suv_group()],
            plans: vec![basic_plan()],
            taxes: Some(tax_snapshot()),
        }
    }
}

impl ReferenceData for MemoryReference {
    fn vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        Ok(self.vehicles.iter().find(|vehicle| &vehicle.id == id).cloned())
    }

    fn vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>, RepositoryError> {
        let wanted = normalize_plate(plate);
        Ok(self
            .vehicles
            .iter()
            .find(|vehicle| {
                vehicle
                    .plate
                    .as_deref()
                    .is_some_and(|candidate| normalize_plate(candidate) == wanted)
            })
            .cloned())
    }

    fn group(&self, code: &GroupCode) -> Result<Option<VehicleGroup>, RepositoryError> {
        Ok(self.groups.iter().find(|group| &group.code == code).cloned())
    }

    fn protection_plan(&self, id: &PlanId) -> Result<Option<ProtectionPlan>, RepositoryError> {
        Ok(self.plans.iter().find(|plan| &plan.id == id).cloned())
    }

    fn tax_snapshot(&self) -> Result<Option<TaxIndexSnapshot>, RepositoryError> {
        Ok(self.taxes.clone())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
