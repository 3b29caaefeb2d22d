use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::InstallmentId;

/// audit events emitted while accruing mora
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoraEvent {
    AccrualRunStarted {
        as_of: NaiveDate,
        installments_fetched: usize,
    },
    PenaltyAccrued {
        installment_id: InstallmentId,
        previous_penalty: Money,
        new_penalty: Money,
        days_late: u32,
        was_capped: bool,
        as_of: NaiveDate,
    },
    PenaltyUpdateFailed {
        installment_id: InstallmentId,
        message: String,
        as_of: NaiveDate,
    },
    AccrualRunCompleted {
        as_of: NaiveDate,
        installments_updated: u32,
        installments_skipped: u32,
        total_penalty_accrued: Money,
    },
    AccrualRunCancelled {
        as_of: NaiveDate,
        installments_evaluated: u32,
    },
    /// a run or single operation refused to start because of its configuration
    ConfigurationRejected {
        message: String,
    },
}

/// event store for collecting events during operations
///
/// A bounded store keeps only the newest `limit` events; older ones are
/// dropped on emit.
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<MoraEvent>,
    limit: Option<usize>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            limit: None,
        }
    }

    pub fn bounded(limit: usize) -> Self {
        Self {
            events: Vec::new(),
            limit: Some(limit),
        }
    }

    pub fn emit(&mut self, event: MoraEvent) {
        self.events.push(event);
        self.trim();
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = MoraEvent>) {
        self.events.extend(events);
        self.trim();
    }

    pub fn take_events(&mut self) -> Vec<MoraEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[MoraEvent] {
        &self.events
    }

    fn trim(&mut self) {
        if let Some(limit) = self.limit {
            let excess = self.events.len().saturating_sub(limit);
            if excess > 0 {
                self.events.drain(..excess);
            }
        }
    }
}
