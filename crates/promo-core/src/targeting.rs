//! Page / device / language targeting predicates
//!
//! All functions are pure over `&str` slices; nothing here allocates.

use crate::types::{DeviceMask, Targeting, VisitorContext};

/// Match one pattern against a pathname.
/// `*` matches everything, a trailing `*` is a prefix match, otherwise exact.
fn pattern_matches(path: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return path.starts_with(prefix);
    }
    path == pattern
}

/// Match a pathname against a pattern list. Empty list matches everything.
pub fn matches_page(path: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    patterns.iter().any(|p| pattern_matches(path, p))
}

/// Full targeting predicate. `None` targeting means no restriction at all;
/// an exclude hit vetoes an include hit.
pub fn matches_targeting(targeting: Option<&Targeting>, ctx: &VisitorContext<'_>) -> bool {
    let t = match targeting {
        Some(t) => t,
        None => return true,
    };

    if t.exclude_pages.iter().any(|p| pattern_matches(ctx.path, p)) {
        return false;
    }

    if !matches_page(ctx.path, &t.pages) {
        return false;
    }

    if let Some(devices) = t.devices {
        // An empty mask (all names unrecognized) degrades to no restriction.
        if !devices.is_empty()
            && !devices.contains(DeviceMask::from_viewport_width(ctx.viewport_width))
        {
            return false;
        }
    }

    if let Some(languages) = &t.languages {
        if !languages.is_empty() && !languages.iter().any(|l| l == ctx.language) {
            return false;
        }
    }

    true
}
