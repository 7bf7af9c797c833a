//! Engine facade: registry, active-popup controller, and scheduler glue
//!
//! Owns the single-active-popup invariant and the show/hide/dismiss/convert
//! transitions, writing display history through to the state store. All
//! ambient inputs arrive through [`VisitorContext`]; nothing here reads
//! globals or the real clock.

use chrono::NaiveDateTime;

use crate::selector;
use crate::store::StateStore;
use crate::trigger::{scroll_percent, ArmedTrigger, PageState, TriggerScheduler};
use crate::types::{AnalyticsEvent, Popup, VisitorContext};

pub struct Engine {
    /// Registration order is significant: it breaks priority ties.
    registry: Vec<Popup>,
    store: StateStore,
    scheduler: TriggerScheduler,
    active: Option<String>,
    current_path: Option<String>,
    events: Vec<AnalyticsEvent>,
}

impl Engine {
    pub fn new(store: StateStore) -> Self {
        Self {
            registry: Vec::new(),
            store,
            scheduler: TriggerScheduler::new(),
            active: None,
            current_path: None,
            events: Vec::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(StateStore::in_memory())
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Upsert by id. A re-registration keeps the original slot so priority
    /// ties keep resolving the same way.
    pub fn register_popup(&mut self, popup: Popup) {
        if let Some(slot) = self.registry.iter_mut().find(|p| p.id == popup.id) {
            *slot = popup;
        } else {
            self.registry.push(popup);
        }
    }

    pub fn unregister_popup(&mut self, id: &str) {
        self.registry.retain(|p| p.id != id);
        self.scheduler.cancel(id);
        if self.active.as_deref() == Some(id) {
            self.active = None;
            self.scheduler.on_popup_cleared();
        }
    }

    pub fn popups(&self) -> &[Popup] {
        &self.registry
    }

    // =========================================================================
    // Page lifecycle
    // =========================================================================

    /// Pathname changed: tear down the old listener set, then re-evaluate
    /// every popup and arm its trigger. Safe to call repeatedly for the
    /// same path; exactly one listener set per popup results.
    pub fn handle_page_change(&mut self, ctx: &VisitorContext<'_>) {
        let same_path = self.current_path.as_deref() == Some(ctx.path);
        if same_path && matches!(self.scheduler.state(), PageState::Active | PageState::Spent) {
            // A popup already ran on this page view; re-arm only on a
            // real pathname change.
            return;
        }
        self.current_path = Some(ctx.path.to_string());
        self.scheduler.reset_for_page();

        if self.active.is_some() {
            // A popup survived navigation; stay active, arm nothing.
            self.scheduler.on_popup_shown();
            return;
        }

        for popup in &self.registry {
            if !popup.active || !selector::is_eligible(popup, ctx, &self.store) {
                continue;
            }
            if let Some(armed) = ArmedTrigger::arm(&popup.trigger, ctx.now) {
                self.scheduler.arm(&popup.id, armed);
            }
        }
        log::debug!("armed triggers for '{}'", ctx.path);
    }

    // =========================================================================
    // Event entry points (host-driven)
    // =========================================================================

    /// Advance deadline-based triggers to `ctx.now`.
    pub fn poll(&mut self, ctx: &VisitorContext<'_>) {
        while let Some(id) = self.scheduler.poll(ctx.now) {
            if self.try_show(&id, ctx) {
                break;
            }
        }
    }

    /// Scroll event, passing the raw page metrics.
    pub fn on_scroll(
        &mut self,
        ctx: &VisitorContext<'_>,
        scroll_y: f64,
        scroll_height: f64,
        inner_height: f64,
    ) {
        let percent = scroll_percent(scroll_y, scroll_height, inner_height);
        while let Some(id) = self.scheduler.on_scroll(percent) {
            if self.try_show(&id, ctx) {
                break;
            }
        }
        // Scrolling is visitor activity as far as inactivity timers go.
        self.scheduler.on_activity(ctx.now);
    }

    /// Mouse-out event with the cursor's client Y coordinate.
    pub fn on_mouse_out(&mut self, ctx: &VisitorContext<'_>, client_y: i32) {
        while let Some(id) = self.scheduler.on_mouse_out(client_y) {
            if self.try_show(&id, ctx) {
                break;
            }
        }
    }

    /// Any visitor activity: movement, typing, touch.
    pub fn on_activity(&mut self, ctx: &VisitorContext<'_>) {
        self.scheduler.on_activity(ctx.now);
    }

    /// Manual external trigger for `button_click` popups.
    pub fn trigger_popup(&mut self, ctx: &VisitorContext<'_>, trigger_id: &str) -> bool {
        if self.active.is_some() {
            return false;
        }
        let id = match selector::select_button_click(&self.registry, trigger_id, ctx, &self.store)
        {
            Some(popup) => popup.id.clone(),
            None => return false,
        };
        self.show(&id, ctx.now)
    }

    // =========================================================================
    // Controller operations
    // =========================================================================

    /// Show a popup by id. No-op if another popup is already active or the
    /// id is unregistered. Gates are the caller's business; the event entry
    /// points re-confirm eligibility before calling this.
    pub fn show(&mut self, id: &str, now: NaiveDateTime) -> bool {
        if self.active.is_some() {
            return false;
        }
        let track_views = match self.registry.iter().find(|p| p.id == id) {
            Some(popup) => popup.track_views,
            None => return false,
        };

        self.active = Some(id.to_string());
        self.store.record_display(id, now);
        if track_views {
            self.events.push(AnalyticsEvent::view(id));
        }
        self.scheduler.on_popup_shown();
        log::debug!("popup '{id}' shown");
        true
    }

    /// Non-destructive close: clears the active popup, touches no history.
    pub fn hide(&mut self) {
        if self.active.take().is_some() {
            self.scheduler.on_popup_cleared();
        }
    }

    /// Permanent dismissal; the popup never becomes eligible again until
    /// the store is cleared externally.
    pub fn dismiss(&mut self, id: &str) {
        self.store.mark_dismissed(id);
        if self.active.as_deref() == Some(id) {
            self.active = None;
            self.scheduler.on_popup_cleared();
        }
    }

    /// Record a conversion. Does not clear the active popup.
    pub fn track_conversion(&mut self, id: &str) {
        self.store.mark_converted(id);
        let track_clicks = self
            .registry
            .iter()
            .find(|p| p.id == id)
            .map_or(false, |p| p.track_clicks);
        if track_clicks {
            self.events.push(AnalyticsEvent::conversion(id));
        }
    }

    // =========================================================================
    // Outputs
    // =========================================================================

    pub fn active_popup(&self) -> Option<&Popup> {
        let id = self.active.as_deref()?;
        self.registry.iter().find(|p| p.id == id)
    }

    /// Take the pending view/conversion events.
    pub fn drain_events(&mut self) -> Vec<AnalyticsEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn page_state(&self) -> PageState {
        self.scheduler.state()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    /// A listener fired: re-run candidate selection for its trigger kind
    /// and show the winner, which may be a higher-priority popup on the
    /// same trigger.
    fn try_show(&mut self, fired_id: &str, ctx: &VisitorContext<'_>) -> bool {
        if self.active.is_some() {
            return false;
        }
        let kind = match self.registry.iter().find(|p| p.id == fired_id) {
            Some(popup) => popup.trigger.kind(),
            None => return false,
        };
        let winner = match selector::select_candidate(&self.registry, kind, ctx, &self.store) {
            Some(popup) => popup.id.clone(),
            None => return false,
        };
        self.show(&winner, ctx.now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, Frequency, Trigger};
    use chrono::{Duration, NaiveDate};

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 29)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn ctx_at<'a>(path: &'a str, now: NaiveDateTime) -> VisitorContext<'a> {
        VisitorContext {
            path,
            language: "en",
            viewport_width: 1280,
            now,
        }
    }

    fn popup(id: &str, priority: i32, trigger: Trigger) -> Popup {
        Popup {
            id: id.to_string(),
            name: id.to_string(),
            active: true,
            priority,
            trigger,
            targeting: None,
            schedule: None,
            frequency: Frequency {
                cooldown_minutes: None,
                ..Frequency::default()
            },
            track_views: true,
            track_clicks: true,
        }
    }

    #[test]
    fn test_page_load_flow() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup("p", 0, Trigger::PageLoad { delay: 0 }));

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.poll(&ctx);

        assert_eq!(engine.active_popup().unwrap().id, "p");
        assert_eq!(engine.page_state(), PageState::Active);
        let events = engine.drain_events();
        assert_eq!(events, vec![AnalyticsEvent::view("p")]);
        assert_eq!(engine.store().display_state("p").unwrap().display_count, 1);
    }

    #[test]
    fn test_at_most_one_active_popup() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup("a", 0, Trigger::PageLoad { delay: 0 }));
        engine.register_popup(popup("b", 0, Trigger::PageLoad { delay: 0 }));

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.poll(&ctx);

        assert_eq!(engine.active_popup().unwrap().id, "a");
        // Second show attempt is a no-op while one is active.
        assert!(!engine.show("b", noon()));
        assert_eq!(engine.store().display_state("b"), None);
    }

    #[test]
    fn test_session_cap_blocks_rearm() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup("p", 0, Trigger::PageLoad { delay: 0 }));

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.poll(&ctx);
        engine.hide();

        // Next navigation: one show already in this session, cap is 1.
        let ctx2 = ctx_at("/other", noon() + Duration::minutes(10));
        engine.handle_page_change(&ctx2);
        engine.poll(&ctx2);
        assert!(engine.active_popup().is_none());
    }

    #[test]
    fn test_dismiss_survives_navigation_until_clear() {
        let mut engine = Engine::in_memory();
        let mut p = popup("p", 0, Trigger::PageLoad { delay: 0 });
        p.frequency.max_displays_per_session = 10;
        engine.register_popup(p);

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.poll(&ctx);
        engine.dismiss("p");
        assert!(engine.active_popup().is_none());
        assert!(engine.store().display_state("p").unwrap().dismissed);

        let ctx2 = ctx_at("/other", noon() + Duration::hours(1));
        engine.handle_page_change(&ctx2);
        engine.poll(&ctx2);
        assert!(engine.active_popup().is_none());

        engine.store_mut().clear();
        let ctx3 = ctx_at("/third", noon() + Duration::hours(2));
        engine.handle_page_change(&ctx3);
        engine.poll(&ctx3);
        assert_eq!(engine.active_popup().unwrap().id, "p");
    }

    #[test]
    fn test_no_rearm_after_hide_same_page() {
        let mut engine = Engine::in_memory();
        let mut p = popup("p", 0, Trigger::ScrollDepth { scroll_depth: 50.0 });
        p.frequency.max_displays_per_session = 10;
        engine.register_popup(p);

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.on_scroll(&ctx, 600.0, 2000.0, 1000.0);
        assert!(engine.active_popup().is_some());

        engine.hide();
        assert_eq!(engine.page_state(), PageState::Spent);
        // Same page view: nothing re-pops.
        engine.on_scroll(&ctx, 900.0, 2000.0, 1000.0);
        assert!(engine.active_popup().is_none());

        // Re-invoking the handler for the same path must not re-arm either.
        engine.handle_page_change(&ctx);
        engine.on_scroll(&ctx, 900.0, 2000.0, 1000.0);
        assert!(engine.active_popup().is_none());

        // Next navigation re-arms.
        let ctx2 = ctx_at("/next", noon() + Duration::minutes(1));
        engine.handle_page_change(&ctx2);
        engine.on_scroll(&ctx2, 600.0, 2000.0, 1000.0);
        assert!(engine.active_popup().is_some());
    }

    #[test]
    fn test_double_page_change_single_listener_set() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup("p", 0, Trigger::ScrollDepth { scroll_depth: 50.0 }));

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.handle_page_change(&ctx);

        engine.on_scroll(&ctx, 600.0, 2000.0, 1000.0);
        assert_eq!(engine.store().display_state("p").unwrap().display_count, 1);
    }

    #[test]
    fn test_priority_selection_on_timer() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup("low", 5, Trigger::PageLoad { delay: 0 }));
        engine.register_popup(popup("high", 10, Trigger::PageLoad { delay: 0 }));

        // Both deadlines are due at once; the lower-priority timer fires
        // first in registration order, but selection at fire time still
        // picks the priority-10 popup.
        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.poll(&ctx);
        assert_eq!(engine.active_popup().unwrap().id, "high");
    }

    #[test]
    fn test_trigger_popup_manual() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup(
            "p",
            0,
            Trigger::ButtonClick {
                element_selector: "#deal".to_string(),
            },
        ));

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        // Button click popups never arm listeners.
        assert_eq!(engine.page_state(), PageState::Idle);

        assert!(!engine.trigger_popup(&ctx, "#other"));
        assert!(engine.trigger_popup(&ctx, "#deal"));
        assert_eq!(engine.active_popup().unwrap().id, "p");
        // While active, further manual triggers are no-ops.
        assert!(!engine.trigger_popup(&ctx, "#deal"));
    }

    #[test]
    fn test_track_conversion_keeps_popup_open() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup("p", 0, Trigger::PageLoad { delay: 0 }));

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.poll(&ctx);
        engine.drain_events();

        engine.track_conversion("p");
        assert!(engine.active_popup().is_some());
        assert!(engine.store().display_state("p").unwrap().converted);
        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Conversion);
    }

    #[test]
    fn test_unregister_cancels_armed_trigger() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup("p", 0, Trigger::ScrollDepth { scroll_depth: 50.0 }));

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.unregister_popup("p");

        engine.on_scroll(&ctx, 600.0, 2000.0, 1000.0);
        assert!(engine.active_popup().is_none());
    }

    #[test]
    fn test_inactivity_trigger_with_activity() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup("p", 0, Trigger::Inactivity { inactivity_time: 30 }));

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);

        let later = ctx_at("/", noon() + Duration::seconds(25));
        engine.on_activity(&later);
        engine.poll(&ctx_at("/", noon() + Duration::seconds(40)));
        assert!(engine.active_popup().is_none());

        engine.poll(&ctx_at("/", noon() + Duration::seconds(56)));
        assert_eq!(engine.active_popup().unwrap().id, "p");
    }

    #[test]
    fn test_registration_replacement_keeps_slot() {
        let mut engine = Engine::in_memory();
        engine.register_popup(popup("a", 5, Trigger::ExitIntent));
        engine.register_popup(popup("b", 5, Trigger::ExitIntent));
        // Re-register "a"; it must keep beating "b" on the tie.
        engine.register_popup(popup("a", 5, Trigger::ExitIntent));

        let ctx = ctx_at("/", noon());
        engine.handle_page_change(&ctx);
        engine.on_mouse_out(&ctx, 0);
        assert_eq!(engine.active_popup().unwrap().id, "a");
    }
}
