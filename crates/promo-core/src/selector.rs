//! Candidate selection
//!
//! Combines the three predicates across the registry for one trigger kind
//! and picks the highest-priority match. The best-candidate scan keeps the
//! first popup seen on priority ties, so ties resolve to registration order.

use crate::frequency::is_frequency_eligible;
use crate::schedule::matches_schedule;
use crate::store::StateStore;
use crate::targeting::matches_targeting;
use crate::types::{Popup, Trigger, TriggerKind, VisitorContext};

/// All three gates for one popup against the current context and state.
pub fn is_eligible(popup: &Popup, ctx: &VisitorContext<'_>, store: &StateStore) -> bool {
    matches_targeting(popup.targeting.as_ref(), ctx)
        && matches_schedule(popup.schedule.as_ref(), ctx.now)
        && is_frequency_eligible(
            &popup.frequency,
            store.display_state(&popup.id),
            store.session_count(&popup.id),
            ctx.now,
        )
}

/// Pick the winner for a requested trigger kind, or none.
pub fn select_candidate<'a>(
    popups: &'a [Popup],
    kind: TriggerKind,
    ctx: &VisitorContext<'_>,
    store: &StateStore,
) -> Option<&'a Popup> {
    let mut best: Option<&Popup> = None;
    for popup in popups {
        if !popup.active || popup.trigger.kind() != kind {
            continue;
        }
        if !is_eligible(popup, ctx, store) {
            continue;
        }
        if best.map_or(true, |b| popup.priority > b.priority) {
            best = Some(popup);
        }
    }
    best
}

/// Manual-trigger lookup: `button_click` popups whose selector matches the
/// requested trigger id.
pub fn select_button_click<'a>(
    popups: &'a [Popup],
    trigger_id: &str,
    ctx: &VisitorContext<'_>,
    store: &StateStore,
) -> Option<&'a Popup> {
    let mut best: Option<&Popup> = None;
    for popup in popups {
        let selector = match &popup.trigger {
            Trigger::ButtonClick { element_selector } => element_selector,
            _ => continue,
        };
        if !popup.active || selector != trigger_id {
            continue;
        }
        if !is_eligible(popup, ctx, store) {
            continue;
        }
        if best.map_or(true, |b| popup.priority > b.priority) {
            best = Some(popup);
        }
    }
    best
}
