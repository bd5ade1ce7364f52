use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::FILLER_LABEL;

#[derive(Debug, Clone, PartialEq)]
pub enum PrefsError {
    /// The write was based on an older snapshot than the one stored.
    Stale { stored: i64, incoming: i64 },
}

impl fmt::Display for PrefsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale { stored, incoming } => write!(
                f,
                "Wheel preferences changed since {} (stored version {})",
                incoming, stored
            ),
        }
    }
}

impl std::error::Error for PrefsError {}

/// Per-user wheel configuration: shops added by hand and shops kept off the wheel.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct WheelPrefs {
    #[serde(default)]
    pub custom_shops: Vec<String>,
    #[serde(default)]
    pub excluded_shops: Vec<String>,
    /// Unix milliseconds of the last save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// A single edit from the wheel management panel.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PrefsAction {
    AddCustom { name: String },
    RemoveCustom { name: String },
    ClearCustom,
    Exclude { name: String },
    Include { name: String },
}

pub fn normalize_shop(name: &str) -> &str {
    name.trim()
}

fn normalized_unique<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for name in names {
        let name = normalize_shop(name.as_ref());
        if !name.is_empty() && seen.insert(name.to_string()) {
            unique.push(name.to_string());
        }
    }
    unique
}

impl WheelPrefs {
    /// Trimmed, non-empty, de-duplicated lists in first-seen order.
    pub fn normalized(&self) -> Self {
        Self {
            custom_shops: normalized_unique(&self.custom_shops),
            excluded_shops: normalized_unique(&self.excluded_shops),
            updated_at: self.updated_at,
        }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        let name = normalize_shop(name);
        self.excluded_shops.iter().any(|s| normalize_shop(s) == name)
    }

    /// Rejects a write whose version predates `stored`.
    pub fn check_fresh(&self, stored: Option<&WheelPrefs>) -> Result<(), PrefsError> {
        match (stored.and_then(|s| s.updated_at), self.updated_at) {
            (Some(stored), Some(incoming)) if incoming < stored => {
                Err(PrefsError::Stale { stored, incoming })
            }
            _ => Ok(()),
        }
    }

    pub fn apply(&self, action: PrefsAction) -> Self {
        match action {
            PrefsAction::AddCustom { name } => self.add_custom(&name),
            PrefsAction::RemoveCustom { name } => self.remove_custom(&name),
            PrefsAction::ClearCustom => self.clear_custom(),
            PrefsAction::Exclude { name } => self.exclude(&name),
            PrefsAction::Include { name } => self.include(&name),
        }
    }

    pub fn add_custom(&self, name: &str) -> Self {
        let name = normalize_shop(name);
        let mut next = self.clone();
        if !name.is_empty() && !self.custom_shops.iter().any(|s| normalize_shop(s) == name) {
            next.custom_shops.push(name.to_string());
        }
        next
    }

    pub fn clear_custom(&self) -> Self {
        Self {
            custom_shops: Vec::new(),
            ..self.clone()
        }
    }

    /// Keeps a shop off the wheel without touching the records it came from.
    pub fn exclude(&self, name: &str) -> Self {
        let name = normalize_shop(name);
        let mut next = self.clone();
        if !name.is_empty() && !self.is_excluded(name) {
            next.excluded_shops.push(name.to_string());
        }
        next
    }

    pub fn include(&self, name: &str) -> Self {
        let name = normalize_shop(name);
        let mut next = self.clone();
        next.excluded_shops.retain(|s| normalize_shop(s) != name);
        next
    }

    /// Drops a custom shop entirely, including any exclusion left behind.
    pub fn remove_custom(&self, name: &str) -> Self {
        let name = normalize_shop(name);
        let mut next = self.clone();
        next.custom_shops.retain(|s| normalize_shop(s) != name);
        next.excluded_shops.retain(|s| normalize_shop(s) != name);
        next
    }
}

/// Every candidate shop: shops seen in records first, then custom shops.
pub fn all_shops<'a, I>(record_shops: I, prefs: &WheelPrefs) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut names: Vec<&str> = record_shops.into_iter().map(String::as_str).collect();
    names.extend(prefs.custom_shops.iter().map(String::as_str));
    normalized_unique(names)
}

/// Segments for the wheel. A lone shop is padded with a filler entry so the
/// wheel always has at least two slices; no shops means nothing to spin.
pub fn wheel_labels<'a, I>(record_shops: I, prefs: &WheelPrefs) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut labels: Vec<String> = all_shops(record_shops, prefs)
        .into_iter()
        .filter(|shop| !prefs.is_excluded(shop))
        .collect();

    if labels.len() == 1 {
        labels.push(FILLER_LABEL.to_string());
    }
    labels
}
