//! User preferences persisted in the shared store.

use crate::origin::{SharedStore, StorageChange};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SHOW_DELETE_WARNING_KEY: &str = "showDeleteWarning";
pub const LOCALE_KEY: &str = "locale";
pub const DEFAULT_LOCALE: &str = "en";

/// Plain copy of the current preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub show_delete_warning: bool,
    pub locale: String,
}

pub struct Settings {
    store: Arc<dyn SharedStore>,
    show_delete_warning: bool,
    locale: String,
}

impl Settings {
    /// Read the stored values, falling back to defaults. The delete warning
    /// flag is written back; the locale is only stored once chosen.
    pub fn load(store: Arc<dyn SharedStore>) -> Self {
        let show_delete_warning = read_flag(store.as_ref(), SHOW_DELETE_WARNING_KEY, true);
        let locale = read_locale(store.as_ref()).unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        let settings = Self {
            store,
            show_delete_warning,
            locale,
        };
        settings.persist();
        settings
    }

    pub fn show_delete_warning(&self) -> bool {
        self.show_delete_warning
    }

    pub fn set_show_delete_warning(&mut self, value: bool) {
        self.show_delete_warning = value;
        self.persist();
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: &str) {
        let locale = locale.trim();
        if locale.is_empty() {
            tracing::warn!("Ignoring empty locale");
            return;
        }
        self.locale = locale.to_string();
        self.store.set(LOCALE_KEY, &self.locale);
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            show_delete_warning: self.show_delete_warning,
            locale: self.locale.clone(),
        }
    }

    /// Pick up a change written by another tab
    pub fn apply_change(&mut self, change: &StorageChange) {
        if change.affects(SHOW_DELETE_WARNING_KEY) {
            self.show_delete_warning =
                read_flag(self.store.as_ref(), SHOW_DELETE_WARNING_KEY, self.show_delete_warning);
        }
        if change.affects(LOCALE_KEY) {
            self.locale =
                read_locale(self.store.as_ref()).unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        }
    }

    fn persist(&self) {
        self.store
            .set(SHOW_DELETE_WARNING_KEY, &self.show_delete_warning.to_string());
    }
}

/// Anything stored other than "true" reads as false
fn read_flag(store: &dyn SharedStore, key: &str, default: bool) -> bool {
    store.get(key).map_or(default, |value| value == "true")
}

fn read_locale(store: &dyn SharedStore) -> Option<String> {
    store
        .get(LOCALE_KEY)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
