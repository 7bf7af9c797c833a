//! Core type definitions for the promo engine
//!
//! These types mirror the JSON popup-definition and persistence documents
//! and are used throughout the eligibility pipeline.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// Device Mask
// =============================================================================

bitflags::bitflags! {
    /// Device class membership mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceMask: u8 {
        const MOBILE = 1 << 0;
        const DESKTOP = 1 << 1;
        /// All device classes
        const ALL = Self::MOBILE.bits() | Self::DESKTOP.bits();
    }
}

/// Viewport widths below this are classified as mobile.
pub const MOBILE_BREAKPOINT_PX: u32 = 768;

impl DeviceMask {
    /// Classify the current viewport into a single device class.
    pub fn from_viewport_width(px: u32) -> Self {
        if px < MOBILE_BREAKPOINT_PX {
            Self::MOBILE
        } else {
            Self::DESKTOP
        }
    }

    /// Wire names are lowercase; distinct from the flag identifiers the
    /// generated `from_name` matches.
    fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "mobile" => Some(Self::MOBILE),
            "desktop" => Some(Self::DESKTOP),
            _ => None,
        }
    }
}

// On the wire the mask is a list of class names; unknown names are ignored
// so a malformed definition degrades to "no restriction" instead of failing.
impl Serialize for DeviceMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut names: Vec<&str> = Vec::new();
        if self.contains(Self::MOBILE) {
            names.push("mobile");
        }
        if self.contains(Self::DESKTOP) {
            names.push("desktop");
        }
        names.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DeviceMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        let mut mask = Self::empty();
        for name in &names {
            if let Some(flag) = Self::from_wire_name(name) {
                mask |= flag;
            }
        }
        Ok(mask)
    }
}

// =============================================================================
// Triggers
// =============================================================================

/// The condition under which a popup asks to be shown.
///
/// JSON form is tagged by `type`; unrecognized types deserialize to
/// [`Trigger::Unknown`], which never arms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Trigger {
    /// Show on page load, after an optional delay.
    PageLoad {
        #[serde(default)]
        delay: u32,
    },
    /// Show after a fixed delay on the page.
    TimeDelay {
        #[serde(default = "default_time_delay")]
        delay: u32,
    },
    /// Show once the visitor has scrolled past a percentage of the page.
    ScrollDepth {
        #[serde(default = "default_scroll_depth")]
        scroll_depth: f32,
    },
    /// Show when the cursor leaves through the top of the viewport.
    ExitIntent,
    /// Show after a stretch with no visitor activity.
    Inactivity {
        #[serde(default = "default_inactivity_time")]
        inactivity_time: u32,
    },
    /// Shown only via an explicit manual trigger call matching the selector.
    ButtonClick { element_selector: String },
    /// Catch-all for trigger types this engine does not know. Never arms.
    #[serde(other)]
    Unknown,
}

fn default_time_delay() -> u32 {
    5
}

fn default_scroll_depth() -> f32 {
    50.0
}

fn default_inactivity_time() -> u32 {
    30
}

/// Trigger discriminant, used to request candidates for one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    PageLoad,
    TimeDelay,
    ScrollDepth,
    ExitIntent,
    Inactivity,
    ButtonClick,
    Unknown,
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::PageLoad { .. } => TriggerKind::PageLoad,
            Trigger::TimeDelay { .. } => TriggerKind::TimeDelay,
            Trigger::ScrollDepth { .. } => TriggerKind::ScrollDepth,
            Trigger::ExitIntent => TriggerKind::ExitIntent,
            Trigger::Inactivity { .. } => TriggerKind::Inactivity,
            Trigger::ButtonClick { .. } => TriggerKind::ButtonClick,
            Trigger::Unknown => TriggerKind::Unknown,
        }
    }
}

// =============================================================================
// Targeting / Schedule / Frequency
// =============================================================================

/// Page, device and language restrictions. Absent field means no restriction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Targeting {
    /// Page patterns: `*` matches all, trailing `*` is a prefix match,
    /// anything else is exact. Empty list matches all.
    pub pages: Vec<String>,
    /// Same pattern syntax; a hit here vetoes `pages`.
    pub exclude_pages: Vec<String>,
    pub devices: Option<DeviceMask>,
    pub languages: Option<Vec<String>>,
}

/// Date / day-of-week / time-of-day activation window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Schedule {
    /// Inclusive lower date bound.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper date bound.
    pub end_date: Option<NaiveDate>,
    /// 0=Sun .. 6=Sat.
    pub days_of_week: Option<Vec<u8>>,
    /// "HH:MM", local time.
    pub start_time: Option<String>,
    /// "HH:MM", local time.
    pub end_time: Option<String>,
}

/// Per-visitor display-rate limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Frequency {
    pub max_displays_per_session: u32,
    pub max_displays_per_day: u32,
    pub max_displays_total: Option<u32>,
    /// Explicit `null` disables the cooldown.
    pub cooldown_minutes: Option<u32>,
}

impl Default for Frequency {
    fn default() -> Self {
        Self {
            max_displays_per_session: 1,
            max_displays_per_day: 3,
            max_displays_total: None,
            cooldown_minutes: Some(5),
        }
    }
}

// =============================================================================
// Popup
// =============================================================================

/// A targeted/scheduled promotional popup definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Popup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Higher wins; ties go to registration order.
    #[serde(default)]
    pub priority: i32,
    pub trigger: Trigger,
    #[serde(default)]
    pub targeting: Option<Targeting>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub track_views: bool,
    #[serde(default)]
    pub track_clicks: bool,
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Display State
// =============================================================================

/// Per-ISO-day display counter. A stale date counts as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u32,
}

/// Durable per-popup display history. Timestamps are visitor-local wall clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayState {
    pub popup_id: String,
    #[serde(default)]
    pub display_count: u32,
    #[serde(default)]
    pub last_displayed: Option<NaiveDateTime>,
    #[serde(default)]
    pub dismissed: bool,
    #[serde(default)]
    pub converted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_count: Option<DayCount>,
}

impl DisplayState {
    pub fn new(popup_id: &str) -> Self {
        Self {
            popup_id: popup_id.to_string(),
            display_count: 0,
            last_displayed: None,
            dismissed: false,
            converted: false,
            day_count: None,
        }
    }
}

// =============================================================================
// Visitor Context
// =============================================================================

/// Everything the eligibility pipeline reads about the world, passed
/// explicitly so evaluation stays pure and unit-testable.
#[derive(Debug, Clone)]
pub struct VisitorContext<'a> {
    /// Current pathname, e.g. `/menu/pasta`.
    pub path: &'a str,
    /// Current UI language code, e.g. `en`.
    pub language: &'a str,
    /// Viewport width in CSS pixels.
    pub viewport_width: u32,
    /// Visitor-local wall clock.
    pub now: NaiveDateTime,
}

// =============================================================================
// Analytics Events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    View,
    Conversion,
}

/// Event emitted toward the (out-of-scope) analytics consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsEvent {
    pub kind: EventKind,
    pub popup_id: String,
}

impl AnalyticsEvent {
    pub fn view(popup_id: &str) -> Self {
        Self {
            kind: EventKind::View,
            popup_id: popup_id.to_string(),
        }
    }

    pub fn conversion(popup_id: &str) -> Self {
        Self {
            kind: EventKind::Conversion,
            popup_id: popup_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_mask_from_viewport() {
        assert_eq!(DeviceMask::from_viewport_width(320), DeviceMask::MOBILE);
        assert_eq!(DeviceMask::from_viewport_width(767), DeviceMask::MOBILE);
        assert_eq!(DeviceMask::from_viewport_width(768), DeviceMask::DESKTOP);
        assert_eq!(DeviceMask::from_viewport_width(1920), DeviceMask::DESKTOP);
    }

    #[test]
    fn test_device_mask_round_trip() {
        let json = serde_json::to_string(&DeviceMask::ALL).unwrap();
        assert_eq!(json, r#"["mobile","desktop"]"#);
        let back: DeviceMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DeviceMask::ALL);
    }

    #[test]
    fn test_device_mask_ignores_unknown_names() {
        let mask: DeviceMask = serde_json::from_str(r#"["mobile","tablet"]"#).unwrap();
        assert_eq!(mask, DeviceMask::MOBILE);
    }

    #[test]
    fn test_device_mask_wire_names_are_lowercase() {
        // The wire vocabulary is lowercase; flag identifiers are not names.
        let mask: DeviceMask = serde_json::from_str(r#"["MOBILE","DESKTOP"]"#).unwrap();
        assert_eq!(mask, DeviceMask::empty());
        let mask: DeviceMask = serde_json::from_str(r#"["desktop"]"#).unwrap();
        assert_eq!(mask, DeviceMask::DESKTOP);
    }

    #[test]
    fn test_trigger_tag_round_trip() {
        let trigger: Trigger =
            serde_json::from_str(r#"{"type":"scroll_depth","scrollDepth":75.0}"#).unwrap();
        assert_eq!(
            trigger,
            Trigger::ScrollDepth { scroll_depth: 75.0 }
        );
        assert_eq!(trigger.kind(), TriggerKind::ScrollDepth);
    }

    #[test]
    fn test_trigger_defaults() {
        let trigger: Trigger = serde_json::from_str(r#"{"type":"time_delay"}"#).unwrap();
        assert_eq!(trigger, Trigger::TimeDelay { delay: 5 });
        let trigger: Trigger = serde_json::from_str(r#"{"type":"inactivity"}"#).unwrap();
        assert_eq!(trigger, Trigger::Inactivity { inactivity_time: 30 });
    }

    #[test]
    fn test_unknown_trigger_type() {
        let trigger: Trigger =
            serde_json::from_str(r#"{"type":"shake_gesture","intensity":3}"#).unwrap();
        assert_eq!(trigger, Trigger::Unknown);
    }

    #[test]
    fn test_frequency_defaults() {
        let freq: Frequency = serde_json::from_str("{}").unwrap();
        assert_eq!(freq.max_displays_per_session, 1);
        assert_eq!(freq.max_displays_per_day, 3);
        assert_eq!(freq.max_displays_total, None);
        assert_eq!(freq.cooldown_minutes, Some(5));
    }

    #[test]
    fn test_frequency_null_cooldown_disables() {
        let freq: Frequency = serde_json::from_str(r#"{"cooldownMinutes":null}"#).unwrap();
        assert_eq!(freq.cooldown_minutes, None);
    }

    #[test]
    fn test_popup_minimal_document() {
        let popup: Popup = serde_json::from_str(
            r#"{"id":"summer","trigger":{"type":"page_load"}}"#,
        )
        .unwrap();
        assert!(popup.active);
        assert_eq!(popup.priority, 0);
        assert_eq!(popup.trigger, Trigger::PageLoad { delay: 0 });
        assert_eq!(popup.frequency.max_displays_per_session, 1);
    }

    #[test]
    fn test_display_state_round_trip() {
        let state = DisplayState {
            popup_id: "summer".to_string(),
            display_count: 4,
            last_displayed: Some(
                NaiveDate::from_ymd_opt(2026, 8, 29)
                    .unwrap()
                    .and_hms_opt(14, 30, 0)
                    .unwrap(),
            ),
            dismissed: false,
            converted: true,
            day_count: Some(DayCount {
                date: NaiveDate::from_ymd_opt(2026, 8, 29).unwrap(),
                count: 2,
            }),
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: DisplayState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
