//! Explicit localization context.
//!
//! A [`Locale`] is handed to every title and bucket-formatting call instead
//! of being looked up from request-scoped state. Message catalogs are loaded
//! once at startup and shared read-only.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Translated strings keyed by msgid.
pub type Messages = BTreeMap<String, String>;

/// Placeholder substituted by [`Locale::format`].
pub const VALUE_PLACEHOLDER: &str = "{value}";

/// The language of one request and its message catalog.
#[derive(Debug, Clone)]
pub struct Locale {
    lang: String,
    messages: Arc<Messages>,
}

impl Locale {
    /// A locale with no translations; every msgid renders as itself.
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            messages: Arc::new(Messages::new()),
        }
    }

    pub fn with_messages(lang: impl Into<String>, messages: Arc<Messages>) -> Self {
        Self {
            lang: lang.into(),
            messages,
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Translate `msgid`, falling back to the msgid itself.
    pub fn gettext(&self, msgid: &str) -> String {
        self.messages
            .get(msgid)
            .cloned()
            .unwrap_or_else(|| msgid.to_string())
    }

    /// Translate `template` and substitute `{value}`.
    pub fn format(&self, template: &str, value: &str) -> String {
        self.gettext(template).replace(VALUE_PLACEHOLDER, value)
    }
}

/// All configured languages. Built once at startup.
#[derive(Debug, Clone)]
pub struct Locales {
    default_lang: String,
    catalogs: BTreeMap<String, Arc<Messages>>,
}

impl Locales {
    pub fn new(default_lang: impl Into<String>) -> Self {
        let default_lang = default_lang.into();
        let mut catalogs = BTreeMap::new();
        catalogs.insert(default_lang.clone(), Arc::new(Messages::new()));
        Self {
            default_lang,
            catalogs,
        }
    }

    /// Add (or replace) the catalog for `lang`.
    pub fn insert(&mut self, lang: impl Into<String>, messages: Messages) {
        self.catalogs.insert(lang.into(), Arc::new(messages));
    }

    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.catalogs.keys().map(String::as_str)
    }

    /// Resolve a request's `lang` parameter. Unknown or missing languages
    /// resolve to the default.
    pub fn resolve(&self, lang: Option<&str>) -> Locale {
        let lang = lang
            .map(str::trim)
            .filter(|l| self.catalogs.contains_key(*l))
            .unwrap_or(self.default_lang.as_str());
        let messages = self.catalogs.get(lang).cloned().unwrap_or_default();
        Locale::with_messages(lang, messages)
    }
}
