//! Trigger scheduler
//!
//! Owns the per-page state machine and the armed-listener set. Each popup's
//! trigger arms as one [`ArmedTrigger`] variant with a uniform
//! arm / fire / cancel contract, so the scheduler iterates entries
//! generically instead of special-casing each listener kind.
//!
//! The host drives the scheduler: `poll` with the current clock fires due
//! deadlines, and the `on_*` event entry points resume evaluation
//! synchronously. Firing detaches the entry; whoever catches the returned
//! popup id re-confirms eligibility before showing.

use chrono::{Duration, NaiveDateTime};

use crate::types::Trigger;

/// Per-page lifecycle. `Spent` means a popup was shown and closed on this
/// page view; nothing re-arms until the next pathname change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Idle,
    Armed,
    Active,
    Spent,
}

/// The armed form of a popup trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum ArmedTrigger {
    /// One-shot deadline (page_load / time_delay).
    Timer { deadline: NaiveDateTime },
    /// Fires once the scroll percentage reaches the threshold, then detaches.
    Scroll { threshold: f32 },
    /// Fires when the cursor leaves through the top of the viewport.
    ExitIntent,
    /// Deadline that visitor activity pushes back by `window_secs`.
    Inactivity {
        deadline: NaiveDateTime,
        window_secs: u32,
    },
}

impl ArmedTrigger {
    /// Build the armed form, or `None` for kinds that never arm
    /// (manual button clicks, unrecognized types).
    pub fn arm(trigger: &Trigger, now: NaiveDateTime) -> Option<Self> {
        match trigger {
            Trigger::PageLoad { delay } | Trigger::TimeDelay { delay } => Some(Self::Timer {
                deadline: now + Duration::seconds(*delay as i64),
            }),
            Trigger::ScrollDepth { scroll_depth } => Some(Self::Scroll {
                threshold: *scroll_depth,
            }),
            Trigger::ExitIntent => Some(Self::ExitIntent),
            Trigger::Inactivity { inactivity_time } => Some(Self::Inactivity {
                deadline: now + Duration::seconds(*inactivity_time as i64),
                window_secs: *inactivity_time,
            }),
            Trigger::ButtonClick { .. } | Trigger::Unknown => None,
        }
    }
}

/// Scheduler for one page view: state machine plus armed entries tracked
/// per popup id in registration order.
#[derive(Debug)]
pub struct TriggerScheduler {
    state: PageState,
    armed: Vec<(String, ArmedTrigger)>,
}

impl Default for TriggerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerScheduler {
    pub fn new() -> Self {
        Self {
            state: PageState::Idle,
            armed: Vec::new(),
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// Pathname changed: cancel everything and return to `Idle`.
    pub fn reset_for_page(&mut self) {
        if !self.armed.is_empty() {
            log::debug!("cancelling {} armed trigger(s)", self.armed.len());
        }
        self.armed.clear();
        self.state = PageState::Idle;
    }

    /// Arm one popup's trigger, replacing any entry already held for that id
    /// so repeated page-change evaluation installs exactly one listener set.
    pub fn arm(&mut self, popup_id: &str, trigger: ArmedTrigger) {
        match self.state() {
            PageState::Idle | PageState::Armed => {}
            // Never arm on top of an active popup or a spent page.
            PageState::Active | PageState::Spent => return,
        }
        if let Some(entry) = self.armed.iter_mut().find(|(id, _)| id == popup_id) {
            entry.1 = trigger;
        } else {
            self.armed.push((popup_id.to_string(), trigger));
        }
        self.state = PageState::Armed;
    }

    /// A popup was shown: tear down every remaining armed entry.
    pub fn on_popup_shown(&mut self) {
        self.armed.clear();
        self.state = PageState::Active;
    }

    /// The active popup was hidden or dismissed. No re-arming until the
    /// next pathname change.
    pub fn on_popup_cleared(&mut self) {
        self.state = PageState::Spent;
    }

    pub fn cancel(&mut self, popup_id: &str) {
        self.armed.retain(|(id, _)| id != popup_id);
    }

    /// Fire the first due deadline, if any. Detaches the fired entry.
    pub fn poll(&mut self, now: NaiveDateTime) -> Option<String> {
        if self.state() != PageState::Armed {
            return None;
        }
        let idx = self.armed.iter().position(|(_, t)| match t {
            ArmedTrigger::Timer { deadline } | ArmedTrigger::Inactivity { deadline, .. } => {
                now >= *deadline
            }
            _ => false,
        })?;
        Some(self.armed.remove(idx).0)
    }

    /// Scroll event: fire the first entry whose threshold is reached.
    /// `percent` is `scroll_y / (scroll_height - inner_height) * 100`.
    pub fn on_scroll(&mut self, percent: f32) -> Option<String> {
        if self.state() != PageState::Armed {
            return None;
        }
        let idx = self.armed.iter().position(|(_, t)| match t {
            ArmedTrigger::Scroll { threshold } => percent >= *threshold,
            _ => false,
        })?;
        Some(self.armed.remove(idx).0)
    }

    /// Mouse-out event: exit intent fires when the cursor crosses the top
    /// edge (`client_y <= 0`). The listener stays armed otherwise.
    pub fn on_mouse_out(&mut self, client_y: i32) -> Option<String> {
        if self.state() != PageState::Armed || client_y > 0 {
            return None;
        }
        let idx = self
            .armed
            .iter()
            .position(|(_, t)| matches!(t, ArmedTrigger::ExitIntent))?;
        Some(self.armed.remove(idx).0)
    }

    /// Visitor activity (movement/typing/scroll/touch): push every
    /// inactivity deadline back by its window.
    pub fn on_activity(&mut self, now: NaiveDateTime) {
        for (_, trigger) in &mut self.armed {
            if let ArmedTrigger::Inactivity {
                deadline,
                window_secs,
            } = trigger
            {
                *deadline = now + Duration::seconds(*window_secs as i64);
            }
        }
    }

    #[cfg(test)]
    fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

/// Scroll depth as a percentage. A page too short to scroll counts as
/// fully scrolled.
pub fn scroll_percent(scroll_y: f64, scroll_height: f64, inner_height: f64) -> f32 {
    let scrollable = scroll_height - inner_height;
    if scrollable <= 0.0 {
        return 100.0;
    }
    ((scroll_y / scrollable) * 100.0) as f32
}
