//! Notification events emitted once per committed transition
use super::action::Transition;
use super::error::Result;
use super::types::{AccountId, ItemState, LedgerKind, ProductCode, TimeStamp};
use super::utils::digest_cbor;
use chrono::Utc;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct TransitionEvent {
    #[n(0)]
    pub sequence: u64, // position among all committed transitions
    #[n(1)]
    pub ledger: LedgerKind,
    #[n(2)]
    pub code: ProductCode,
    #[n(3)]
    pub transition: Transition,
    #[n(4)]
    pub new_state: ItemState,
    #[n(5)]
    pub caller: AccountId,
    #[n(6)]
    pub timestamp: TimeStamp<Utc>, // issued when the transition is committed
}

impl TransitionEvent {
    pub fn new(
        sequence: u64,
        code: ProductCode,
        transition: Transition,
        new_state: ItemState,
        caller: AccountId,
    ) -> Self {
        Self {
            sequence,
            ledger: transition.ledger(),
            code,
            transition,
            new_state,
            caller,
            timestamp: TimeStamp::new(),
        }
    }
    /// CBOR encoding of the event and the sha256 digest that identifies it.
    pub fn build(&self) -> Result<(String, Vec<u8>)> {
        digest_cbor(self)
    }
}

/// Observer of committed transitions. Called with the service lock held, so
/// implementations must not call back into the service.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &TransitionEvent);
}

impl<F> EventSink for F
where
    F: Fn(&TransitionEvent) + Send + Sync,
{
    fn notify(&self, event: &TransitionEvent) {
        self(event)
    }
}

/// Sink that keeps every event it is handed, in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<TransitionEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// History of a single item, oldest first.
    pub fn for_item(&self, ledger: LedgerKind, code: ProductCode) -> Vec<TransitionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.ledger == ledger && event.code == code)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn notify(&self, event: &TransitionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
