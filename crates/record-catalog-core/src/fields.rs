//! Built-in query field and facet kinds.
//!
//! Every record type starts with the reserved fields (`type`, `start`,
//! `rows`, `sort`, `source`), then adds configurable [`TermField`],
//! [`TextField`] and [`RangeField`] definitions plus [`TermsFacet`]s.

use std::collections::BTreeMap;

use crate::facet::{FacetDefinition, FormattedBucket};
use crate::locale::Locale;
use crate::models::{Aggregation, Filter, ParamValue, RawBucket, RawParams, SortOrder, SortSpec};
use crate::query::{QueryDefinition, Sanitizer};

pub const TYPE: &str = "type";
pub const START: &str = "start";
pub const ROWS: &str = "rows";
pub const SORT: &str = "sort";
pub const SOURCE: &str = "source";
/// Not a query field; carried in canonical URLs for non-default locales.
pub const LANG: &str = "lang";

/// Names no configured field may use.
pub const RESERVED: [&str; 6] = [TYPE, START, ROWS, SORT, SOURCE, LANG];

/// Trimmed, non-empty raw value.
fn raw_text<'a>(params: &'a RawParams, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn titled(template: Option<&str>, value: &ParamValue, locale: &Locale) -> String {
    match template {
        Some(t) => locale.format(t, &value.to_string()),
        None => value.to_string(),
    }
}

// ============ Reserved fields ============

/// The record type id. Resolved before extraction and carried in the path.
pub struct TypeField {
    id: String,
    display_name: String,
}

impl TypeField {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

impl QueryDefinition for TypeField {
    fn name(&self) -> &str {
        TYPE
    }

    fn extract_value(&self, _params: &RawParams) -> Option<ParamValue> {
        Some(ParamValue::text(self.id.as_str()))
    }

    fn search_title(&self, _value: &ParamValue, locale: &Locale) -> String {
        locale.gettext(&self.display_name)
    }

    fn url_value(&self, _value: &ParamValue) -> Option<String> {
        None
    }
}

/// Offset of the first hit.
pub struct StartField;

impl QueryDefinition for StartField {
    fn name(&self) -> &str {
        START
    }

    fn extract_value(&self, params: &RawParams) -> Option<ParamValue> {
        raw_text(params, START)?
            .parse::<u64>()
            .ok()
            .map(ParamValue::Number)
    }

    fn default_value(&self, _params: &RawParams) -> Option<ParamValue> {
        Some(ParamValue::Number(0))
    }

    fn search_title(&self, _value: &ParamValue, _locale: &Locale) -> String {
        String::new()
    }

    fn url_value(&self, value: &ParamValue) -> Option<String> {
        match value {
            ParamValue::Number(0) => None,
            other => Some(other.to_string()),
        }
    }
}

/// Page size, clamped to `max_rows`.
pub struct RowsField {
    default_rows: u64,
    max_rows: u64,
}

impl RowsField {
    pub fn new(default_rows: u64, max_rows: u64) -> Self {
        Self {
            default_rows,
            max_rows,
        }
    }
}

impl QueryDefinition for RowsField {
    fn name(&self) -> &str {
        ROWS
    }

    fn extract_value(&self, params: &RawParams) -> Option<ParamValue> {
        raw_text(params, ROWS)?
            .parse::<u64>()
            .ok()
            .filter(|rows| *rows > 0)
            .map(|rows| ParamValue::Number(rows.min(self.max_rows)))
    }

    fn default_value(&self, _params: &RawParams) -> Option<ParamValue> {
        Some(ParamValue::Number(self.default_rows))
    }

    fn search_title(&self, _value: &ParamValue, _locale: &Locale) -> String {
        String::new()
    }

    fn url_value(&self, value: &ParamValue) -> Option<String> {
        match value.as_number() {
            Some(rows) if rows == self.default_rows => None,
            _ => Some(value.to_string()),
        }
    }
}

/// Selected sort id, `<field>.<key>`. Only ids the type declares are accepted.
pub struct SortField {
    ids: Vec<String>,
    default: Option<String>,
}

impl SortField {
    pub fn new(ids: Vec<String>, default: Option<String>) -> Self {
        Self { ids, default }
    }
}

impl QueryDefinition for SortField {
    fn name(&self) -> &str {
        SORT
    }

    fn extract_value(&self, params: &RawParams) -> Option<ParamValue> {
        let id = raw_text(params, SORT)?;
        self.ids
            .iter()
            .any(|known| known == id)
            .then(|| ParamValue::text(id))
    }

    fn default_value(&self, _params: &RawParams) -> Option<ParamValue> {
        self.default.as_deref().map(ParamValue::text)
    }

    fn search_title(&self, _value: &ParamValue, _locale: &Locale) -> String {
        String::new()
    }

    fn url_value(&self, value: &ParamValue) -> Option<String> {
        match (value.as_str(), self.default.as_deref()) {
            (Some(id), Some(default)) if id == default => None,
            _ => Some(value.to_string()),
        }
    }
}

/// Restricts results to one contributing source. Titles with the source name.
pub struct SourceField {
    names: BTreeMap<String, String>,
}

impl SourceField {
    /// `names` maps source id to display name.
    pub fn new(names: BTreeMap<String, String>) -> Self {
        Self { names }
    }
}

impl QueryDefinition for SourceField {
    fn name(&self) -> &str {
        SOURCE
    }

    fn extract_value(&self, params: &RawParams) -> Option<ParamValue> {
        let id = raw_text(params, SOURCE)?;
        self.names.contains_key(id).then(|| ParamValue::text(id))
    }

    fn filter_clause(&self, value: &ParamValue, _sanitize: Sanitizer) -> Option<Filter> {
        Some(Filter::Term {
            field: SOURCE.to_string(),
            value: value.to_string(),
        })
    }

    fn search_title(&self, value: &ParamValue, locale: &Locale) -> String {
        let id = value.to_string();
        match self.names.get(&id) {
            Some(name) => locale.gettext(name),
            None => id,
        }
    }

    fn is_primary(&self) -> bool {
        true
    }
}

// ============ Configurable fields ============

/// Exact match on a keyword field.
pub struct TermField {
    name: String,
    field: String,
    sort_field: String,
    primary: bool,
    title: Option<String>,
    sorts: BTreeMap<String, SortOrder>,
}

impl TermField {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: name.into(),
            sort_field: field.clone(),
            field,
            primary: false,
            title: None,
            sorts: BTreeMap::new(),
        }
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    /// Title template; `{value}` is replaced by the searched value.
    pub fn title(mut self, template: impl Into<String>) -> Self {
        self.title = Some(template.into());
        self
    }

    /// Offer a sort under `key`.
    pub fn sort(mut self, key: impl Into<String>, order: SortOrder) -> Self {
        self.sorts.insert(key.into(), order);
        self
    }

    /// Backend field to sort on when it differs from the filter field.
    pub fn sort_field(mut self, field: impl Into<String>) -> Self {
        self.sort_field = field.into();
        self
    }
}

impl QueryDefinition for TermField {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract_value(&self, params: &RawParams) -> Option<ParamValue> {
        raw_text(params, &self.name).map(ParamValue::text)
    }

    fn filter_clause(&self, value: &ParamValue, _sanitize: Sanitizer) -> Option<Filter> {
        Some(Filter::Term {
            field: self.field.clone(),
            value: value.to_string(),
        })
    }

    fn sort_options(&self) -> BTreeMap<String, SortSpec> {
        self.sorts
            .iter()
            .map(|(key, order)| {
                (
                    key.clone(),
                    SortSpec {
                        field: self.sort_field.clone(),
                        order: *order,
                    },
                )
            })
            .collect()
    }

    fn search_title(&self, value: &ParamValue, locale: &Locale) -> String {
        titled(self.title.as_deref(), value, locale)
    }

    fn is_primary(&self) -> bool {
        self.primary
    }
}

/// Free-text match over one or more fields.
pub struct TextField {
    name: String,
    fields: Vec<String>,
    primary: bool,
    title: Option<String>,
}

impl TextField {
    /// An empty `fields` list searches every field.
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
            primary: false,
            title: None,
        }
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn title(mut self, template: impl Into<String>) -> Self {
        self.title = Some(template.into());
        self
    }
}

impl QueryDefinition for TextField {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract_value(&self, params: &RawParams) -> Option<ParamValue> {
        let text = raw_text(params, &self.name)?;
        Some(ParamValue::text(
            text.split_whitespace().collect::<Vec<_>>().join(" "),
        ))
    }

    fn filter_clause(&self, value: &ParamValue, sanitize: Sanitizer) -> Option<Filter> {
        Some(Filter::QueryString {
            query: sanitize(&value.to_string()),
            fields: self.fields.clone(),
        })
    }

    fn search_title(&self, value: &ParamValue, locale: &Locale) -> String {
        titled(self.title.as_deref(), value, locale)
    }

    fn is_primary(&self) -> bool {
        self.primary
    }
}

/// Inclusive year range: `1800-1850`, `1800-`, `-1850`, or `1820`.
pub struct RangeField {
    name: String,
    field: String,
    primary: bool,
    title: Option<String>,
}

impl RangeField {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            primary: false,
            title: None,
        }
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn title(mut self, template: impl Into<String>) -> Self {
        self.title = Some(template.into());
        self
    }
}

/// Parse a year range. Open ends are `None`; both open is invalid, as is a
/// reversed range.
pub fn parse_year_range(input: &str) -> Option<(Option<i64>, Option<i64>)> {
    fn bound(part: &str) -> Option<Option<i64>> {
        let part = part.trim();
        if part.is_empty() {
            return Some(None);
        }
        if !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        part.parse::<i64>().ok().map(Some)
    }

    let (gte, lte) = match input.split_once('-') {
        Some((low, high)) => (bound(low)?, bound(high)?),
        None => {
            let year = bound(input)?;
            (year, year)
        }
    };

    match (gte, lte) {
        (None, None) => None,
        (Some(low), Some(high)) if low > high => None,
        bounds => Some(bounds),
    }
}

/// Canonical text of a parsed range.
pub fn format_year_range(gte: Option<i64>, lte: Option<i64>) -> String {
    match (gte, lte) {
        (Some(low), Some(high)) if low == high => low.to_string(),
        (Some(low), Some(high)) => format!("{}-{}", low, high),
        (Some(low), None) => format!("{}-", low),
        (None, Some(high)) => format!("-{}", high),
        (None, None) => String::new(),
    }
}

impl QueryDefinition for RangeField {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract_value(&self, params: &RawParams) -> Option<ParamValue> {
        let (gte, lte) = parse_year_range(raw_text(params, &self.name)?)?;
        Some(ParamValue::Text(format_year_range(gte, lte)))
    }

    fn filter_clause(&self, value: &ParamValue, _sanitize: Sanitizer) -> Option<Filter> {
        let (gte, lte) = parse_year_range(value.as_str()?)?;
        Some(Filter::Range {
            field: self.field.clone(),
            gte,
            lte,
        })
    }

    fn search_title(&self, value: &ParamValue, locale: &Locale) -> String {
        titled(self.title.as_deref(), value, locale)
    }

    fn is_primary(&self) -> bool {
        self.primary
    }
}

// ============ Facets ============

/// Terms aggregation over a keyword field. Each bucket narrows the search
/// through the query field named by `param`.
pub struct TermsFacet {
    name: String,
    field: String,
    param: String,
    size: usize,
    title: String,
    labels: BTreeMap<String, String>,
}

impl TermsFacet {
    /// A facet whose buckets set the query field of the same name.
    pub fn new(name: impl Into<String>, field: impl Into<String>, size: usize) -> Self {
        let name = name.into();
        Self {
            param: name.clone(),
            title: name.clone(),
            name,
            field: field.into(),
            size,
            labels: BTreeMap::new(),
        }
    }

    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Display label (msgid) for a bucket key.
    pub fn label(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(key.into(), label.into());
        self
    }

    pub fn param_name(&self) -> &str {
        &self.param
    }
}

impl FacetDefinition for TermsFacet {
    fn name(&self) -> &str {
        &self.name
    }

    fn aggregation(&self) -> Aggregation {
        Aggregation::Terms {
            field: self.field.clone(),
            size: self.size,
        }
    }

    fn format_buckets(&self, buckets: &[RawBucket], locale: &Locale) -> Vec<FormattedBucket> {
        buckets
            .iter()
            .map(|bucket| {
                let label = match self.labels.get(&bucket.key) {
                    Some(msgid) => locale.gettext(msgid),
                    None => bucket.key.clone(),
                };
                let mut url_params = BTreeMap::new();
                url_params.insert(self.param.clone(), ParamValue::text(bucket.key.as_str()));
                FormattedBucket {
                    label,
                    count: bucket.doc_count,
                    url_params,
                }
            })
            .collect()
    }

    fn title(&self, locale: &Locale) -> String {
        locale.gettext(&self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::collect_params;
    use crate::query::sanitize_query_string;

    #[test]
    fn test_start_parses_and_omits_zero() {
        let field = StartField;
        let params = collect_params([("start", " 20 ")]);
        assert_eq!(field.extract_value(&params), Some(ParamValue::Number(20)));
        assert_eq!(field.extract_value(&collect_params([("start", "x")])), None);
        assert_eq!(field.url_value(&ParamValue::Number(0)), None);
        assert_eq!(field.url_value(&ParamValue::Number(20)).as_deref(), Some("20"));
    }

    #[test]
    fn test_rows_clamps_and_omits_default() {
        let field = RowsField::new(20, 100);
        assert_eq!(
            field.extract_value(&collect_params([("rows", "500")])),
            Some(ParamValue::Number(100))
        );
        assert_eq!(field.extract_value(&collect_params([("rows", "0")])), None);
        assert_eq!(field.url_value(&ParamValue::Number(20)), None);
        assert_eq!(field.url_value(&ParamValue::Number(50)).as_deref(), Some("50"));
    }

    #[test]
    fn test_sort_accepts_declared_ids_only() {
        let field = SortField::new(vec!["city.asc".into()], None);
        assert_eq!(
            field.extract_value(&collect_params([("sort", "city.asc")])),
            Some(ParamValue::text("city.asc"))
        );
        assert_eq!(field.extract_value(&collect_params([("sort", "bogus.asc")])), None);
    }

    #[test]
    fn test_source_unknown_is_dropped() {
        let mut names = BTreeMap::new();
        names.insert("nypl".to_string(), "New York Public Library".to_string());
        let field = SourceField::new(names);
        assert!(field
            .extract_value(&collect_params([("source", "nope")]))
            .is_none());
        let value = field
            .extract_value(&collect_params([("source", "nypl")]))
            .unwrap();
        assert_eq!(
            field.search_title(&value, &Locale::new("en")),
            "New York Public Library"
        );
        assert!(field.is_primary());
    }

    #[test]
    fn test_term_field_filter_and_title() {
        let field = TermField::new("city", "city.keyword")
            .primary(true)
            .title("City: {value}")
            .sort("asc", SortOrder::Asc);
        let value = field
            .extract_value(&collect_params([("city", "  Boston ")]))
            .unwrap();
        assert_eq!(value, ParamValue::text("Boston"));
        assert_eq!(
            field.filter_clause(&value, sanitize_query_string),
            Some(Filter::Term {
                field: "city.keyword".into(),
                value: "Boston".into()
            })
        );
        assert_eq!(
            field.search_title(&value, &Locale::new("en")),
            "City: Boston"
        );
        assert_eq!(field.sort_options()["asc"].order, SortOrder::Asc);
        assert!(field.extract_value(&collect_params([("city", "   ")])).is_none());
    }

    #[test]
    fn test_text_field_collapses_whitespace_and_sanitizes() {
        let field = TextField::new("filter", vec![]);
        let value = field
            .extract_value(&collect_params([("filter", "  old   (map) ")]))
            .unwrap();
        assert_eq!(value, ParamValue::text("old (map)"));
        match field.filter_clause(&value, sanitize_query_string) {
            Some(Filter::QueryString { query, .. }) => assert_eq!(query, "old \\(map\\)"),
            other => panic!("unexpected clause: {:?}", other),
        }
    }

    #[test]
    fn test_year_range_parsing() {
        assert_eq!(parse_year_range("1800-1850"), Some((Some(1800), Some(1850))));
        assert_eq!(parse_year_range("1800 - "), Some((Some(1800), None)));
        assert_eq!(parse_year_range("-1850"), Some((None, Some(1850))));
        assert_eq!(parse_year_range("1820"), Some((Some(1820), Some(1820))));
        assert_eq!(parse_year_range("1850-1800"), None);
        assert_eq!(parse_year_range("-"), None);
        assert_eq!(parse_year_range("abc"), None);
    }

    #[test]
    fn test_range_field_normalizes_value() {
        let field = RangeField::new("date", "year");
        let value = field
            .extract_value(&collect_params([("date", "1800 - 1850")]))
            .unwrap();
        assert_eq!(value, ParamValue::text("1800-1850"));
        assert_eq!(
            field.filter_clause(&value, sanitize_query_string),
            Some(Filter::Range {
                field: "year".into(),
                gte: Some(1800),
                lte: Some(1850)
            })
        );
    }

    #[test]
    fn test_terms_facet_formats_buckets() {
        let facet = TermsFacet::new("country", "country", 50)
            .title("Country")
            .label("US", "United States");
        let buckets = facet.format_buckets(
            &[RawBucket::new("US", 40), RawBucket::new("CA", 3)],
            &Locale::new("en"),
        );
        assert_eq!(buckets[0].label, "United States");
        assert_eq!(buckets[1].label, "CA");
        assert_eq!(buckets[1].count, 3);
        assert_eq!(buckets[0].url_params["country"], ParamValue::text("US"));
        assert_eq!(
            facet.aggregation(),
            Aggregation::Terms {
                field: "country".into(),
                size: 50
            }
        );
    }
}
