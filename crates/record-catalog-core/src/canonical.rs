//! Canonical search URLs.
//!
//! Every logical query has exactly one URL:
//! `{base_url}/{type}/search?{pairs}`, where the pairs are the state's
//! URL-visible values (plus `lang` for non-default locales), sorted by name
//! and form-urlencoded. Requests arriving on any other URL are redirected.

use ::url::form_urlencoded;

use crate::catalog::RecordType;
use crate::fields::LANG;
use crate::locale::Locale;
use crate::models::{collect_params, QueryState, RawParams};

/// Builds canonical URLs for one site.
#[derive(Debug, Clone)]
pub struct UrlCanonicalizer {
    base_url: String,
    default_lang: String,
}

impl UrlCanonicalizer {
    /// `base_url` is the scheme and authority (and optional prefix) that
    /// absolute URLs start with; a trailing `/` is ignored.
    pub fn new(base_url: impl Into<String>, default_lang: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_lang: default_lang.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The canonical URL of `state`. A pure function of its inputs.
    pub fn canonical_url(
        &self,
        locale: &Locale,
        record_type: &RecordType,
        state: &QueryState,
        absolute: bool,
    ) -> String {
        let mut pairs: Vec<(&str, String)> = state
            .iter()
            .filter_map(|(name, value)| {
                let def = record_type.query(name)?;
                def.url_value(value).map(|v| (name.as_str(), v))
            })
            .collect();
        if locale.lang() != self.default_lang {
            pairs.push((LANG, locale.lang().to_string()));
        }
        pairs.sort();

        let mut url = format!("/{}/search", record_type.id());
        if !pairs.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            url.push('?');
            url.push_str(&query);
        }

        if absolute {
            self.absolute(&url)
        } else {
            url
        }
    }

    /// Prefix a path (with optional query) with the base URL.
    pub fn absolute(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }
}

/// Decode a query string (without the leading `?`) into raw parameters.
pub fn parse_query(query: &str) -> RawParams {
    collect_params(form_urlencoded::parse(query.as_bytes()).into_owned())
}
