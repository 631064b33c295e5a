#![forbid(unsafe_code)]

//! Cross-tab reconciliation of one preference key.
//!
//! When another tab writes the watched key, the new value is handed to an
//! `apply` callback. Nothing is written back and no outbound event is sent,
//! so two tabs cannot ping-pong a value between them.

use crate::dom::Dom;
use crate::prefs::{PreferenceChange, SubscriptionId};
use crate::scope::HookScope;

#[derive(Debug, Clone)]
pub struct CrossTabReconciler {
    key: String,
}

impl CrossTabReconciler {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Whether `change` should be re-applied locally: same key and a
    /// non-empty new value (a cleared key is ignored).
    #[must_use]
    pub fn accepts<'c>(&self, change: &'c PreferenceChange) -> Option<&'c str> {
        if change.key != self.key {
            return None;
        }
        change.new_value.as_deref().filter(|v| !v.is_empty())
    }

    /// Subscribe through `scope`; the subscription dies with the scope.
    pub fn attach<D: Dom>(
        &self,
        scope: &HookScope<D>,
        apply: impl Fn(&str) + 'static,
    ) -> Option<SubscriptionId> {
        let this = self.clone();
        scope.on_external_preference_change(move |change| {
            let Some(value) = this.accepts(change) else {
                return;
            };
            tracing::debug!(
                message = "prefs.cross_tab_apply",
                key = this.key.as_str(),
                value
            );
            apply(value);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(key: &str, new_value: Option<&str>) -> PreferenceChange {
        PreferenceChange {
            key: key.into(),
            old_value: Some("dark".into()),
            new_value: new_value.map(str::to_string),
        }
    }

    #[test]
    fn only_matching_non_empty_changes_are_accepted() {
        let r = CrossTabReconciler::new("xpando-theme-preference");
        assert_eq!(
            r.accepts(&change("xpando-theme-preference", Some("light"))),
            Some("light")
        );
        assert_eq!(r.accepts(&change("other", Some("light"))), None);
        assert_eq!(r.accepts(&change("xpando-theme-preference", None)), None);
        assert_eq!(r.accepts(&change("xpando-theme-preference", Some(""))), None);
    }
}
