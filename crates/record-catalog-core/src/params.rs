//! Splits a resolved query state into primary and secondary parameters.

use serde::Serialize;

use crate::catalog::RecordType;
use crate::models::QueryState;

/// Parameter names of one state, in registry declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParamClasses {
    /// Names that define page identity (title, breadcrumbs).
    pub primary: Vec<String>,
    /// Refinements such as pagination and sort.
    pub secondary: Vec<String>,
}

/// Classify every parameter present in `state` by its definition's
/// `is_primary` flag. Names without a definition are ignored.
pub fn classify(record_type: &RecordType, state: &QueryState) -> ParamClasses {
    let mut classes = ParamClasses::default();
    for def in record_type.queries().iter() {
        if !state.contains(def.name()) {
            continue;
        }
        if def.is_primary() {
            classes.primary.push(def.name().to_string());
        } else {
            classes.secondary.push(def.name().to_string());
        }
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RecordTypeOptions;
    use crate::fields::{TermField, TextField};

    #[test]
    fn test_classify_in_registry_order() {
        let mut rt = RecordType::new(RecordTypeOptions::new("location", "Locations")).unwrap();
        rt.add_query(Box::new(TermField::new("country", "country").primary(true)))
            .unwrap();
        rt.add_query(Box::new(TermField::new("city", "city").primary(true)))
            .unwrap();
        rt.add_query(Box::new(TextField::new("filter", vec![]))).unwrap();

        let mut state = QueryState::new();
        state.insert("type", "location");
        state.insert("start", 0u64);
        state.insert("city", "Boston");
        state.insert("filter", "harbor");
        state.insert("country", "US");
        state.insert("unknown", "x");

        let classes = classify(&rt, &state);
        assert_eq!(classes.primary, vec!["country", "city"]);
        assert_eq!(classes.secondary, vec!["type", "start", "filter"]);
        assert_eq!(classify(&rt, &state), classes);
    }
}
