use chrono::{DateTime, NaiveDate, Utc};
use fleet_lease::error::AppError;
use fleet_lease::workflows::quote::{
    normalize_plate, parse_vehicle_groups, GroupCode, PlanId, ProtectionPlan, ProtectionTier,
    Quote, QuoteId, QuotePricing, QuoteRepository, QuoteStatus, ReferenceData, RepositoryError,
    SelicRates, StatusHistoryEntry, StatusHistoryRepository, TaxIndexSnapshot, Vehicle,
    VehicleGroup, VehicleId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, store: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{store} lock poisoned")))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryQuoteRepository {
    records: Arc<Mutex<HashMap<QuoteId, Quote>>>,
}

impl QuoteRepository for InMemoryQuoteRepository {
    fn insert(&self, quote: Quote) -> Result<Quote, RepositoryError> {
        let mut guard = lock(&self.records, "quote store")?;
        if guard.contains_key(&quote.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(quote.id.clone(), quote.clone());
        Ok(quote)
    }

    fn fetch(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let guard = lock(&self.records, "quote store")?;
        Ok(guard.get(id).cloned())
    }

    fn update_pricing(&self, id: &QuoteId, pricing: QuotePricing) -> Result<Quote, RepositoryError> {
        let mut guard = lock(&self.records, "quote store")?;
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
        let mut guard = lock(&self.records, "quote store")?;
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryStatusHistory {
    entries: Arc<Mutex<Vec<StatusHistoryEntry>>>,
}

impl StatusHistoryRepository for InMemoryStatusHistory {
    fn append(&self, entry: StatusHistoryEntry) -> Result<(), RepositoryError> {
        lock(&self.entries, "status history")?.push(entry);
        Ok(())
    }

    fn list(&self, quote_id: &QuoteId) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let guard = lock(&self.entries, "status history")?;
        Ok(guard
            .iter()
            .filter(|entry| &entry.quote_id == quote_id)
            .cloned()
            .collect())
    }
}

/// Administrator-maintained records, seeded with a small demonstration fleet.
#[derive(Debug, Clone)]
pub(crate) struct InMemoryReferenceData {
    vehicles: Vec<Vehicle>,
    groups: Vec<VehicleGroup>,
    plans: Vec<ProtectionPlan>,
    taxes: Option<TaxIndexSnapshot>,
}

impl InMemoryReferenceData {
    pub(crate) fn seeded() -> Self {
        Self {
            vehicles: seed_vehicles(),
            groups: seed_groups(),
            plans: seed_plans(),
            taxes: seed_tax_snapshot(),
        }
    }

    /// Replace the seeded groups with groups read from a CSV export.
    pub(crate) fn with_groups(mut self, groups: Vec<VehicleGroup>) -> Self {
        self.groups = groups;
        self
    }

    pub(crate) fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }
}

impl ReferenceData for InMemoryReferenceData {
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

/// Seeded reference data, with vehicle groups optionally read from a CSV catalog.
pub(crate) fn load_reference(catalog: Option<&Path>) -> Result<InMemoryReferenceData, AppError> {
    let reference = InMemoryReferenceData::seeded();
    let Some(path) = catalog else {
        return Ok(reference);
    };

    let file = File::open(path)?;
    let groups = parse_vehicle_groups(BufReader::new(file))?;
    info!(path = %path.display(), groups = groups.len(), "vehicle group catalog loaded");
    Ok(reference.with_groups(groups))
}

fn money(units: i64, cents: i64) -> Decimal {
    Decimal::new(units * 100 + cents, 2)
}

fn seed_groups() -> Vec<VehicleGroup> {
    vec![
        VehicleGroup {
            code: GroupCode("A".to_string()),
            name: "Econômico".to_string(),
            description: "Hatches de entrada".to_string(),
            revision_km: 10_000,
            revision_cost: money(450, 0),
            tire_km: 40_000,
            tire_cost: money(1_600, 0),
            ipva_annual: None,
            licensing_annual: None,
        },
        VehicleGroup {
            code: GroupCode("B".to_string()),
            name: "Compacto".to_string(),
            description: "Hatches e sedãs compactos".to_string(),
            revision_km: 10_000,
            revision_cost: money(600, 0),
            tire_km: 40_000,
            tire_cost: money(2_000, 0),
            ipva_annual: None,
            licensing_annual: None,
        },
        VehicleGroup {
            code: GroupCode("C".to_string()),
            name: "SUV".to_string(),
            description: "Utilitários esportivos médios".to_string(),
            revision_km: 10_000,
            revision_cost: money(900, 0),
            tire_km: 45_000,
            tire_cost: money(3_600, 0),
            ipva_annual: None,
            licensing_annual: Some(money(240, 0)),
        },
        VehicleGroup {
            code: GroupCode("P".to_string()),
            name: "Picape".to_string(),
            description: "Picapes médias a diesel".to_string(),
            revision_km: 10_000,
            revision_cost: money(1_200, 0),
            tire_km: 50_000,
            tire_cost: money(4_800, 0),
            ipva_annual: None,
            licensing_annual: Some(money(240, 0)),
        },
    ]
}

fn seed_vehicles() -> Vec<Vehicle> {
    let vehicle = |id: &str, brand: &str, model: &str, year: u16, value: Decimal, group: &str| Vehicle {
        id: VehicleId(id.to_string()),
        brand: brand.to_string(),
        model: model.to_string(),
        year,
        value,
        is_used: false,
        plate: None,
        color: None,
        odometer_km: None,
        fuel_type: Some("flex".to_string()),
        group_code: GroupCode(group.to_string()),
        ipva_annual: None,
        licensing_annual: None,
    };

    vec![
        vehicle("v-mobi", "Fiat", "Mobi", 2025, money(72_990, 0), "A"),
        vehicle("v-onix", "Chevrolet", "Onix", 2025, money(60_000, 0), "B"),
        Vehicle {
            is_used: true,
            plate: Some("RIO-2A19".to_string()),
            color: Some("Prata".to_string()),
            odometer_km: Some(38_400),
            ..vehicle("v-polo-usado", "Volkswagen", "Polo", 2022, money(68_500, 0), "B")
        },
        vehicle("v-compass", "Jeep", "Compass", 2025, money(150_000, 0), "C"),
        Vehicle {
            fuel_type: Some("diesel".to_string()),
            ipva_annual: Some(money(5_200, 0)),
            ..vehicle("v-hilux", "Toyota", "Hilux", 2025, money(289_990, 0), "P")
        },
    ]
}

fn seed_plans() -> Vec<ProtectionPlan> {
    vec![
        ProtectionPlan {
            id: PlanId("pp-basic".to_string()),
            name: "Proteção Básica".to_string(),
            description: "Roubo, furto e incêndio".to_string(),
            tier: ProtectionTier::Basic,
            monthly_cost: money(79, 90),
        },
        ProtectionPlan {
            id: PlanId("pp-intermediate".to_string()),
            name: "Proteção Intermediária".to_string(),
            description: "Básica mais colisão com franquia".to_string(),
            tier: ProtectionTier::Intermediate,
            monthly_cost: money(149, 90),
        },
        ProtectionPlan {
            id: PlanId("pp-premium".to_string()),
            name: "Proteção Premium".to_string(),
            description: "Cobertura total e carro reserva".to_string(),
            tier: ProtectionTier::Premium,
            monthly_cost: money(229, 90),
        },
    ]
}

fn seed_tax_snapshot() -> Option<TaxIndexSnapshot> {
    NaiveDate::from_ymd_opt(2025, 6, 2).map(|reference_date| TaxIndexSnapshot {
        reference_date,
        ipca: Decimal::new(532, 2),
        igpm: Decimal::new(704, 2),
        spread: Decimal::new(4, 0),
        selic: SelicRates {
            month12: Decimal::new(1_475, 2),
            month18: Decimal::new(1_425, 2),
            month24: Decimal::new(1_375, 2),
        },
    })
}
