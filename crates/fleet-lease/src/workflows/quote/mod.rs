//! Fleet-lease quotes: monthly cost composition and the proposal status workflow.

pub mod catalog;
pub mod domain;
pub mod pricing;
pub mod repository;
pub mod router;
pub mod service;
pub mod status;

#[cfg(test)]
mod tests;

pub use catalog::{parse_vehicle_groups, CatalogError};
pub use domain::{
    ActorId, ClientId, ContractParameters, GroupCode, PlanId, ProtectionPlan, ProtectionTier,
    Quote, QuoteId, QuoteResultVehicle, QuoteStatus, SelicBucket, SelicRates, StatusHistoryEntry,
    TaxIndexSnapshot, Vehicle, VehicleGroup, VehicleId,
};
pub use pricing::{
    compute_quote_total, compute_vehicle_cost, CalculationConfig, CostEngine, MissingReference,
    PricedVehicle, PricingError, PricingWarning,
};
pub use repository::{
    normalize_plate, QuotePricing, QuoteRepository, QuoteStatusView, ReferenceData,
    RepositoryError, StatusHistoryRepository,
};
pub use router::quote_router;
pub use service::{
    CreateQuoteRequest, LineParametersUpdate, PreviewRequest, PricedQuote, QuoteLineRequest,
    QuoteService, QuoteServiceError, RepriceRequest, StatusOption, TransitionOptions,
    TransitionReceipt, TransitionRequest, VehicleSelector,
};
pub use status::{
    apply_transition, calculate_progress, is_valid_transition, valid_next_statuses,
    AppliedTransition, TransitionRejection,
};
