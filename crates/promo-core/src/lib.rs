//! Promo Core Library
//!
//! Campaign targeting, scheduling and frequency-capping engine: decides,
//! for a visitor currently viewing some page, whether any registered
//! promotional popup should be shown, which one, and through which trigger
//! condition.
//!
//! # Architecture
//!
//! Eligibility is a pipeline of pure predicates evaluated over an explicit
//! [`VisitorContext`] (path, language, viewport, clock) so every decision is
//! deterministic and unit-testable. The [`Engine`] facade owns the popup
//! registry, the per-page trigger scheduler, and the persistent state store,
//! and enforces the single-active-popup invariant.
//!
//! # Modules
//!
//! - `types`: popup definitions, display state, visitor context
//! - `targeting`: page/device/language predicate
//! - `schedule`: date/day/time-of-day window predicate
//! - `frequency`: per-visitor display-rate gate
//! - `selector`: candidate filtering and priority selection
//! - `trigger`: trigger scheduler state machine and armed-listener model
//! - `store`: durable + session-scoped persistence documents
//! - `engine`: active-popup controller facade

pub mod engine;
pub mod frequency;
pub mod schedule;
pub mod selector;
pub mod store;
pub mod targeting;
pub mod trigger;
pub mod types;

// Re-export commonly used types
pub use engine::Engine;
pub use selector::{is_eligible, select_candidate};
pub use store::{FileBackend, MemoryBackend, StateStore, StorageBackend, StoreError};
pub use trigger::{ArmedTrigger, PageState, TriggerScheduler};
pub use types::{
    AnalyticsEvent, DeviceMask, DisplayState, EventKind, Frequency, Popup, Schedule, Targeting,
    Trigger, TriggerKind, VisitorContext,
};
