//! C1 — Event Bus: typed pub/sub with unsubscribe handles and per-subscriber
//! error isolation.
//!
//! Payload shapes live on [`EngineEvent`]; dispatch is synchronous and
//! in registration order, matching the single-threaded cooperative model
//! described for the facade.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tracing::error;

use crate::types::{ColumnId, FilterState, PaginationState, Row, RowId, SelectionState, SortState};

/// Every payload shape the engine itself emits. `RowClick` exists only so
/// consumers can forward their own input events through the same bus the
/// engine publishes to — the engine never constructs one.
#[derive(Debug, Clone)]
pub enum EngineEvent<T> {
    Init,
    DataChange(Vec<Row<T>>),
    DataLoad(Vec<Row<T>>),
    DataError(String),
    SortChange(SortState),
    FilterChange(FilterState),
    SearchChange(String),
    PageChange(PaginationState),
    SelectionChange(SelectionState),
    RowSelect { row_id: RowId, selected: bool },
    RowClick { row_id: RowId },
    ColumnVisibility { column_id: ColumnId, visible: bool },
    StateChange,
    Destroy,
}

/// The discriminant used to register/match subscriptions, independent of
/// the payload carried by a given emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Init,
    DataChange,
    DataLoad,
    DataError,
    SortChange,
    FilterChange,
    SearchChange,
    PageChange,
    SelectionChange,
    RowSelect,
    RowClick,
    ColumnVisibility,
    StateChange,
    Destroy,
}

impl<T> EngineEvent<T> {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::Init => EventKind::Init,
            EngineEvent::DataChange(_) => EventKind::DataChange,
            EngineEvent::DataLoad(_) => EventKind::DataLoad,
            EngineEvent::DataError(_) => EventKind::DataError,
            EngineEvent::SortChange(_) => EventKind::SortChange,
            EngineEvent::FilterChange(_) => EventKind::FilterChange,
            EngineEvent::SearchChange(_) => EventKind::SearchChange,
            EngineEvent::PageChange(_) => EventKind::PageChange,
            EngineEvent::SelectionChange(_) => EventKind::SelectionChange,
            EngineEvent::RowSelect { .. } => EventKind::RowSelect,
            EngineEvent::RowClick { .. } => EventKind::RowClick,
            EngineEvent::ColumnVisibility { .. } => EventKind::ColumnVisibility,
            EngineEvent::StateChange => EventKind::StateChange,
            EngineEvent::Destroy => EventKind::Destroy,
        }
    }
}

/// An idempotent unregister handle returned by [`EventBus::on`]. Calling
/// [`SubscriptionId::id`] and later [`EventBus::off`] twice with the same id
/// is a no-op the second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Box<dyn Fn(&EngineEvent<T>) + Send + Sync>;

struct Subscriber<T> {
    id: SubscriptionId,
    callback: Callback<T>,
}

/// Typed pub/sub hub owned by the engine facade.
pub struct EventBus<T> {
    subscribers: HashMap<EventKind, Vec<Subscriber<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        EventBus {
            subscribers: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for `kind`. Returns a handle that can be passed
    /// to [`EventBus::off`] to unregister it.
    pub fn on(&mut self, kind: EventKind, callback: impl Fn(&EngineEvent<T>) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        self.subscribers.entry(kind).or_default().push(Subscriber {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Removes a previously registered subscription. Idempotent: removing
    /// an id twice (or one that never existed) is a silent no-op.
    pub fn off(&mut self, kind: EventKind, id: SubscriptionId) {
        if let Some(subs) = self.subscribers.get_mut(&kind) {
            subs.retain(|s| s.id != id);
        }
    }

    /// Dispatches `event` to every subscriber registered for its kind, in
    /// registration order. A panicking callback is caught and logged so it
    /// cannot prevent the remaining subscribers from being called, and
    /// cannot escape `emit` — Rust has no catchable exceptions, so a
    /// panic is the closest analogue to the source design's "exception from
    /// one callback must not prevent the others."
    pub fn emit(&self, event: EngineEvent<T>) {
        if let Some(subs) = self.subscribers.get(&event.kind()) {
            for sub in subs {
                let result = catch_unwind(AssertUnwindSafe(|| (sub.callback)(&event)));
                if result.is_err() {
                    error!(target: "datatable::event_bus", "subscriber panicked while handling {:?}", event.kind());
                }
            }
        }
    }

    /// Removes every subscriber for `kind`, or every subscriber for every
    /// kind when `kind` is `None`.
    pub fn remove_all(&mut self, kind: Option<EventKind>) {
        match kind {
            Some(k) => {
                self.subscribers.remove(&k);
            }
            None => self.subscribers.clear(),
        }
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn emits_in_registration_order() {
        let mut bus: EventBus<()> = EventBus::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.on(EventKind::StateChange, move |_| o1.lock().unwrap().push(1));
        let o2 = order.clone();
        bus.on(EventKind::StateChange, move |_| o2.lock().unwrap().push(2));

        bus.emit(EngineEvent::StateChange);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn off_is_idempotent() {
        let mut bus: EventBus<()> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = bus.on(EventKind::StateChange, move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        });

        bus.off(EventKind::StateChange, id);
        bus.off(EventKind::StateChange, id);
        bus.emit(EngineEvent::StateChange);
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let mut bus: EventBus<()> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::StateChange, |_| panic!("boom"));
        let c = count.clone();
        bus.on(EventKind::StateChange, move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        });

        bus.emit(EngineEvent::StateChange);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn remove_all_clears_only_requested_kind() {
        let mut bus: EventBus<()> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.on(EventKind::StateChange, move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        });
        let c2 = count.clone();
        bus.on(EventKind::Destroy, move |_| {
            c2.fetch_add(10, Ordering::Relaxed);
        });

        bus.remove_all(Some(EventKind::StateChange));
        bus.emit(EngineEvent::StateChange);
        bus.emit(EngineEvent::Destroy);
        assert_eq!(count.load(Ordering::Relaxed), 10);
    }
}
