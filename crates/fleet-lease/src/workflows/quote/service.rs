use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::domain::{
    ActorId, ClientId, ContractParameters, Quote, QuoteId, QuoteResultVehicle, QuoteStatus,
    StatusHistoryEntry, TaxIndexSnapshot, Vehicle, VehicleId,
};
use super::pricing::{
    compute_quote_total, CostEngine, MissingReference, PricedVehicle, PricingError,
    PricingWarning,
};
use super::repository::{
    QuotePricing, QuoteRepository, ReferenceData, RepositoryError, StatusHistoryRepository,
};
use super::status::{apply_transition, calculate_progress, valid_next_statuses, TransitionRejection};

/// Vehicle reference on a quote line: by id, or by plate for used vehicles.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VehicleSelector {
    #[serde(default)]
    pub vehicle_id: Option<VehicleId>,
    #[serde(default)]
    pub plate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLineRequest {
    #[serde(flatten)]
    pub vehicle: VehicleSelector,
    /// Line-specific parameters; when absent the quote's global parameters apply.
    #[serde(default)]
    pub parameters: Option<ContractParameters>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQuoteRequest {
    pub client_id: ClientId,
    pub created_by: ActorId,
    #[serde(default)]
    pub global_parameters: Option<ContractParameters>,
    pub vehicles: Vec<QuoteLineRequest>,
    #[serde(default)]
    pub save_as_draft: bool,
}

/// Parameter change for an existing line. `None` reverts the line to the global parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineParametersUpdate {
    pub position: usize,
    #[serde(default)]
    pub parameters: Option<ContractParameters>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepriceRequest {
    pub actor_id: ActorId,
    #[serde(default)]
    pub global_parameters: Option<ContractParameters>,
    #[serde(default)]
    pub lines: Vec<LineParametersUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub actor_id: ActorId,
    pub next_status: QuoteStatus,
    #[serde(default)]
    pub observation: Option<String>,
    /// Status the caller last read; a mismatch is reported as a concurrent modification.
    #[serde(default)]
    pub expected_status: Option<QuoteStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    #[serde(flatten)]
    pub vehicle: VehicleSelector,
    pub parameters: ContractParameters,
}

/// Quote plus warnings gathered while pricing it.
#[derive(Debug, Clone, Serialize)]
pub struct PricedQuote {
    pub quote: Quote,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PricingWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionReceipt {
    pub quote: Quote,
    pub history_entry: StatusHistoryEntry,
    /// False when the status was committed but the audit entry could not be written.
    pub audit_recorded: bool,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusOption {
    pub status: QuoteStatus,
    pub label: &'static str,
    pub progress: u8,
}

impl From<QuoteStatus> for StatusOption {
    fn from(status: QuoteStatus) -> Self {
        Self {
            status,
            label: status.label(),
            progress: calculate_progress(status),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOptions {
    pub quote_id: QuoteId,
    pub current: StatusOption,
    pub allowed: Vec<StatusOption>,
}

/// Service composing reference lookups, the cost engine, and the status workflow.
pub struct QuoteService<R, H, D> {
    quotes: Arc<R>,
    history: Arc<H>,
    reference: Arc<D>,
    engine: Arc<CostEngine>,
}

static QUOTE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_quote_id() -> QuoteId {
    let id = QUOTE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    QuoteId(format!("qt-{id:06}"))
}

impl<R, H, D> QuoteService<R, H, D>
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    pub fn new(quotes: Arc<R>, history: Arc<H>, reference: Arc<D>, engine: CostEngine) -> Self {
        Self {
            quotes,
            history,
            reference,
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &CostEngine {
        &self.engine
    }

    /// Price every line and store the quote in `ORCAMENTO`, or `draft` when requested.
    pub fn create(&self, request: CreateQuoteRequest) -> Result<PricedQuote, QuoteServiceError> {
        if request.vehicles.is_empty() {
            return Err(PricingError::Validation {
                field: "vehicles".to_string(),
                constraint: "at least one vehicle is required".to_string(),
            }
            .into());
        }

        let taxes = self.reference.tax_snapshot()?;
        let mut vehicles = Vec::with_capacity(request.vehicles.len());
        let mut warnings = Vec::new();

        for (position, line) in request.vehicles.iter().enumerate() {
            let vehicle = self.resolve_vehicle(&line.vehicle, position)?;
            let (params, uses_global) =
                effective_parameters(line.parameters.as_ref(), request.global_parameters.as_ref(), position)?;
            let priced = self.price_line(&vehicle, params, taxes.as_ref(), position)?;
            vehicles.push(QuoteResultVehicle {
                uses_global_parameters: uses_global,
                ..priced.result
            });
            warnings.extend(priced.warnings);
        }

        let status = if request.save_as_draft {
            QuoteStatus::Draft
        } else {
            QuoteStatus::Orcamento
        };
        let now = Utc::now();
        let quote = Quote {
            id: next_quote_id(),
            client_id: request.client_id,
            total_value: compute_quote_total(&vehicles),
            vehicles,
            status,
            created_at: now,
            created_by: request.created_by.clone(),
            updated_at: now,
            global_parameters: request.global_parameters,
        };

        let stored = self.quotes.insert(quote)?;
        self.record_history(StatusHistoryEntry {
            quote_id: stored.id.clone(),
            previous_status: None,
            new_status: stored.status,
            actor_id: request.created_by,
            recorded_at: now,
            observation: None,
        });
        self.report_warnings(&stored.id, &warnings);

        info!(
            quote_id = %stored.id,
            status = %stored.status,
            total = %stored.total_value,
            vehicles = stored.vehicles.len(),
            "quote created"
        );

        Ok(PricedQuote {
            quote: stored,
            warnings,
        })
    }

    /// Re-run the engine after a parameter change and persist the new lines and total.
    pub fn reprice(
        &self,
        quote_id: &QuoteId,
        request: RepriceRequest,
    ) -> Result<PricedQuote, QuoteServiceError> {
        let quote = self.get(quote_id)?;
        if matches!(quote.status, QuoteStatus::Cancelado | QuoteStatus::Concluido) {
            return Err(QuoteServiceError::QuoteLocked {
                quote_id: quote.id,
                status: quote.status,
            });
        }

        let global = request
            .global_parameters
            .clone()
            .or_else(|| quote.global_parameters.clone());

        for update in &request.lines {
            if update.position >= quote.vehicles.len() {
                return Err(PricingError::Validation {
                    field: format!("lines[{}].position", update.position),
                    constraint: format!("quote has {} vehicle(s)", quote.vehicles.len()),
                }
                .into());
            }
        }

        let taxes = self.reference.tax_snapshot()?;
        let mut vehicles = Vec::with_capacity(quote.vehicles.len());
        let mut warnings = Vec::new();

        for (position, line) in quote.vehicles.iter().enumerate() {
            let own = match request.lines.iter().rev().find(|update| update.position == position) {
                Some(update) => update.parameters.clone(),
                None if line.uses_global_parameters => None,
                None => Some(line.parameters.clone()),
            };
            let (params, uses_global) = effective_parameters(own.as_ref(), global.as_ref(), position)?;

            let vehicle = self
                .reference
                .vehicle(&line.vehicle_id)?
                .ok_or_else(|| {
                    PricingError::MissingReferenceData(MissingReference::Vehicle(
                        line.vehicle_id.to_string(),
                    ))
                })?;
            let priced = self.price_line(&vehicle, params, taxes.as_ref(), position)?;
            vehicles.push(QuoteResultVehicle {
                uses_global_parameters: uses_global,
                ..priced.result
            });
            warnings.extend(priced.warnings);
        }

        let pricing = QuotePricing {
            global_parameters: global,
            total_value: compute_quote_total(&vehicles),
            vehicles,
            updated_at: Utc::now(),
            expected_status: quote.status,
            expected_updated_at: quote.updated_at,
        };
        let previous_total = quote.total_value;
        let stored = match self.quotes.update_pricing(quote_id, pricing) {
            Ok(stored) => stored,
            Err(RepositoryError::StatusMismatch { expected, actual }) => {
                warn!(quote_id = %quote.id, %expected, %actual, "status changed while repricing");
                return Err(TransitionRejection::ConcurrentModification { expected, actual }.into());
            }
            Err(RepositoryError::Stale) => {
                warn!(quote_id = %quote.id, "quote rewritten while repricing");
                return Err(QuoteServiceError::ConcurrentUpdate { quote_id: quote.id });
            }
            Err(other) => return Err(other.into()),
        };
        self.report_warnings(&stored.id, &warnings);

        info!(
            quote_id = %stored.id,
            actor = %request.actor_id.0,
            previous_total = %previous_total,
            total = %stored.total_value,
            "quote repriced"
        );

        Ok(PricedQuote {
            quote: stored,
            warnings,
        })
    }

    /// Apply a status transition guarded by a compare-and-swap on the stored status.
    pub fn transition(
        &self,
        quote_id: &QuoteId,
        request: TransitionRequest,
    ) -> Result<TransitionReceipt, QuoteServiceError> {
        let quote = self.get(quote_id)?;
        let current = quote.status;

        if let Some(expected) = request.expected_status {
            if expected != current {
                warn!(quote_id = %quote.id, %expected, actual = %current, "stale transition request");
                return Err(TransitionRejection::ConcurrentModification {
                    expected,
                    actual: current,
                }
                .into());
            }
        }

        let applied = apply_transition(
            &quote.id,
            current,
            request.next_status,
            &request.actor_id,
            request.observation,
            Utc::now(),
        )?;

        let stored = match self.quotes.compare_and_swap_status(
            &quote.id,
            current,
            applied.updated_status,
            applied.history_entry.recorded_at,
        ) {
            Ok(stored) => stored,
            Err(RepositoryError::StatusMismatch { expected, actual }) => {
                warn!(quote_id = %quote.id, %expected, %actual, "status compare-and-swap failed");
                return Err(TransitionRejection::ConcurrentModification { expected, actual }.into());
            }
            Err(other) => return Err(other.into()),
        };

        let audit_recorded = self.record_history(applied.history_entry.clone());

        info!(
            quote_id = %stored.id,
            from = %current,
            to = %stored.status,
            actor = %request.actor_id.0,
            "quote status changed"
        );

        Ok(TransitionReceipt {
            progress: calculate_progress(stored.status),
            quote: stored,
            history_entry: applied.history_entry,
            audit_recorded,
        })
    }

    pub fn transition_options(
        &self,
        quote_id: &QuoteId,
    ) -> Result<TransitionOptions, QuoteServiceError> {
        let quote = self.get(quote_id)?;
        Ok(TransitionOptions {
            quote_id: quote.id,
            current: quote.status.into(),
            allowed: valid_next_statuses(quote.status)
                .into_iter()
                .map(StatusOption::from)
                .collect(),
        })
    }

    pub fn history(&self, quote_id: &QuoteId) -> Result<Vec<StatusHistoryEntry>, QuoteServiceError> {
        let quote = self.get(quote_id)?;
        Ok(self.history.list(&quote.id)?)
    }

    pub fn get(&self, quote_id: &QuoteId) -> Result<Quote, QuoteServiceError> {
        let quote = self
            .quotes
            .fetch(quote_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(quote)
    }

    /// Price a single vehicle without persisting anything.
    pub fn preview(&self, request: PreviewRequest) -> Result<PricedVehicle, QuoteServiceError> {
        let vehicle = self.resolve_vehicle(&request.vehicle, 0)?;
        let taxes = self.reference.tax_snapshot()?;
        let group = self.reference.group(&vehicle.group_code)?;
        let plan = match &request.parameters.protection_plan_id {
            Some(plan_id) => self.reference.protection_plan(plan_id)?,
            None => None,
        };

        Ok(self.engine.price(
            &vehicle,
            group.as_ref(),
            &request.parameters,
            plan.as_ref(),
            taxes.as_ref(),
        )?)
    }

    fn resolve_vehicle(
        &self,
        selector: &VehicleSelector,
        position: usize,
    ) -> Result<Vehicle, QuoteServiceError> {
        let (found, key) = match (&selector.vehicle_id, &selector.plate) {
            (Some(id), _) => (self.reference.vehicle(id)?, id.to_string()),
            (None, Some(plate)) => (self.reference.vehicle_by_plate(plate)?, plate.clone()),
            (None, None) => {
                return Err(PricingError::invalid("vehicle_id", "a vehicle id or plate is required")
                    .in_line(position)
                    .into())
            }
        };

        found.ok_or_else(|| {
            PricingError::MissingReferenceData(MissingReference::Vehicle(key)).into()
        })
    }

    fn price_line(
        &self,
        vehicle: &Vehicle,
        params: &ContractParameters,
        taxes: Option<&TaxIndexSnapshot>,
        position: usize,
    ) -> Result<PricedVehicle, QuoteServiceError> {
        let group = self.reference.group(&vehicle.group_code)?;
        let plan = match &params.protection_plan_id {
            Some(plan_id) => self.reference.protection_plan(plan_id)?,
            None => None,
        };

        self.engine
            .price(vehicle, group.as_ref(), params, plan.as_ref(), taxes)
            .map_err(|err| err.in_line(position).into())
    }

    fn record_history(&self, entry: StatusHistoryEntry) -> bool {
        let quote_id = entry.quote_id.clone();
        let new_status = entry.new_status;
        match self.history.append(entry) {
            Ok(()) => true,
            Err(err) => {
                error!(%quote_id, status = %new_status, error = %err, "failed to record status history");
                false
            }
        }
    }

    fn report_warnings(&self, quote_id: &QuoteId, warnings: &[PricingWarning]) {
        for warning in warnings {
            warn!(%quote_id, "{}", warning.summary());
        }
    }
}

fn effective_parameters<'a>(
    own: Option<&'a ContractParameters>,
    global: Option<&'a ContractParameters>,
    position: usize,
) -> Result<(&'a ContractParameters, bool), QuoteServiceError> {
    match (own, global) {
        (Some(params), _) => Ok((params, false)),
        (None, Some(params)) => Ok((params, true)),
        (None, None) => Err(PricingError::invalid(
            "parameters",
            "required when the quote has no global parameters",
        )
        .in_line(position)
        .into()),
    }
}

/// Error raised by the quote service.
#[derive(Debug, thiserror::Error)]
pub enum QuoteServiceError {
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Transition(#[from] TransitionRejection),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("quote {quote_id} is {status} and can no longer be repriced")]
    QuoteLocked {
        quote_id: QuoteId,
        status: QuoteStatus,
    },
    #[error("quote {quote_id} was updated by another request; reload and retry")]
    ConcurrentUpdate { quote_id: QuoteId },
}
