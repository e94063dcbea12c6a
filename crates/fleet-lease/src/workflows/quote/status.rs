//! Quote lifecycle rules.
//!
//! Quotes advance one stage at a time along [`QuoteStatus::ordered`], may return to any
//! earlier stage for rework, and may be cancelled from anywhere. Nothing leaves
//! `CANCELADO`. The functions here are pure; the storage layer guards the status write
//! with a compare-and-swap on the status the caller read.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{ActorId, QuoteId, QuoteStatus, StatusHistoryEntry};

pub fn is_valid_transition(current: QuoteStatus, next: QuoteStatus) -> bool {
    if current == QuoteStatus::Cancelado {
        return false;
    }
    if next == QuoteStatus::Cancelado {
        return true;
    }

    match (current.position(), next.position()) {
        (Some(from), Some(to)) => to < from || to == from + 1,
        _ => false,
    }
}

/// Every status reachable from `current`, in workflow order with `CANCELADO` last.
pub fn valid_next_statuses(current: QuoteStatus) -> Vec<QuoteStatus> {
    QuoteStatus::all()
        .into_iter()
        .filter(|candidate| *candidate != current && is_valid_transition(current, *candidate))
        .collect()
}

/// Display-only completion percentage.
pub fn calculate_progress(status: QuoteStatus) -> u8 {
    match status {
        QuoteStatus::Cancelado => 0,
        QuoteStatus::Concluido => 100,
        other => {
            let Some(position) = other.position() else {
                return 0;
            };
            let last = QuoteStatus::ordered().len() - 1;
            ((position * 100 + last / 2) / last) as u8
        }
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionRejection {
    #[error("cannot move quote from {current} to {attempted}; allowed: {}", format_statuses(allowed))]
    Illegal {
        current: QuoteStatus,
        attempted: QuoteStatus,
        allowed: Vec<QuoteStatus>,
    },
    #[error("quote status changed concurrently: expected {expected}, found {actual}")]
    ConcurrentModification {
        expected: QuoteStatus,
        actual: QuoteStatus,
    },
}

fn format_statuses(statuses: &[QuoteStatus]) -> String {
    if statuses.is_empty() {
        return "none".to_string();
    }
    statuses
        .iter()
        .map(|status| status.code())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of a legal transition: the status to persist and its audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedTransition {
    pub updated_status: QuoteStatus,
    pub history_entry: StatusHistoryEntry,
}

pub fn apply_transition(
    quote_id: &QuoteId,
    current: QuoteStatus,
    next: QuoteStatus,
    actor_id: &ActorId,
    observation: Option<String>,
    at: DateTime<Utc>,
) -> Result<AppliedTransition, TransitionRejection> {
    if !is_valid_transition(current, next) {
        return Err(TransitionRejection::Illegal {
            current,
            attempted: next,
            allowed: valid_next_statuses(current),
        });
    }

    let observation = observation
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(AppliedTransition {
        updated_status: next,
        history_entry: StatusHistoryEntry {
            quote_id: quote_id.clone(),
            previous_status: Some(current),
            new_status: next,
            actor_id: actor_id.clone(),
            recorded_at: at,
            observation,
        },
    })
}
