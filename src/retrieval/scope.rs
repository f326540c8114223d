//! Scope constraints and the filter expression handed to retrieval backends

use crate::retrieval::RetrievalCandidate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Properties a scope constraint can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    /// Parent interview/recording
    DocumentId,
    /// Collection the interview belongs to
    CollectionId,
    /// NER labels attached to the chunk
    EntityLabels,
    /// Named entity surface text, matched case-insensitively
    EntityText,
}

impl FilterField {
    /// Property name in candidate payloads and backend schemas
    pub fn property_name(&self) -> &'static str {
        match self {
            FilterField::DocumentId => "document_id",
            FilterField::CollectionId => "collection_id",
            FilterField::EntityLabels => "ner_labels",
            FilterField::EntityText => "ner_text",
        }
    }

    fn value_matches(&self, actual: &str, wanted: &str) -> bool {
        match self {
            FilterField::EntityText => actual.to_lowercase() == wanted.to_lowercase(),
            _ => actual == wanted,
        }
    }

    fn values<'a>(&self, candidate: &'a RetrievalCandidate) -> Vec<&'a str> {
        match self {
            FilterField::DocumentId => vec![candidate.document_id.as_str()],
            other => candidate.payload.string_values(other.property_name()),
        }
    }
}

/// Backend-agnostic filter expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum Filter {
    Equal { field: FilterField, value: String },
    NotEqual { field: FilterField, value: String },
    ContainsAny { field: FilterField, values: Vec<String> },
    And { filters: Vec<Filter> },
}

impl Filter {
    /// Evaluate the expression against a candidate's fields and payload
    pub fn matches(&self, candidate: &RetrievalCandidate) -> bool {
        match self {
            Filter::Equal { field, value } => field
                .values(candidate)
                .iter()
                .any(|v| field.value_matches(v, value)),
            Filter::NotEqual { field, value } => !field
                .values(candidate)
                .iter()
                .any(|v| field.value_matches(v, value)),
            Filter::ContainsAny { field, values } => field
                .values(candidate)
                .iter()
                .any(|v| values.iter().any(|wanted| field.value_matches(v, wanted))),
            Filter::And { filters } => filters.iter().all(|f| f.matches(candidate)),
        }
    }
}

/// Constraints restricting which chunks a search may return
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchScope {
    /// Exact document (search within one interview)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    /// Any of these documents
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub document_ids: BTreeSet<String>,

    /// Any of these collections
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub collection_ids: BTreeSet<String>,

    /// Any of these NER labels
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub entity_labels: BTreeSet<String>,

    /// Any of these entity texts, stored lowercased
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub entity_texts: BTreeSet<String>,

    /// Everything except this document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_document_id: Option<String>,
}

impl SearchScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn within_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_document_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_collections<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collection_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_entity_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_labels.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Chunks mentioning any of these entities, e.g. the same person in
    /// other interviews
    pub fn with_entity_texts<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.entity_texts
            .extend(texts.into_iter().map(|t| t.as_ref().to_lowercase()));
        self
    }

    pub fn excluding_document(mut self, document_id: impl Into<String>) -> Self {
        self.exclude_document_id = Some(document_id.into());
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.to_filter().is_none()
    }

    /// Compile to a filter expression
    ///
    /// No constraints yield `None`, a single constraint is returned bare, and
    /// several are joined with `And`.
    pub fn to_filter(&self) -> Option<Filter> {
        let mut filters = Vec::new();

        if let Some(document_id) = &self.document_id {
            filters.push(Filter::Equal {
                field: FilterField::DocumentId,
                value: document_id.clone(),
            });
        }

        if !self.document_ids.is_empty() {
            filters.push(Filter::ContainsAny {
                field: FilterField::DocumentId,
                values: self.document_ids.iter().cloned().collect(),
            });
        }

        if !self.entity_texts.is_empty() {
            filters.push(Filter::ContainsAny {
                field: FilterField::EntityText,
                values: self.entity_texts.iter().cloned().collect(),
            });
        }

        if !self.entity_labels.is_empty() {
            filters.push(Filter::ContainsAny {
                field: FilterField::EntityLabels,
                values: self.entity_labels.iter().cloned().collect(),
            });
        }

        if !self.collection_ids.is_empty() {
            filters.push(Filter::ContainsAny {
                field: FilterField::CollectionId,
                values: self.collection_ids.iter().cloned().collect(),
            });
        }

        if let Some(excluded) = &self.exclude_document_id {
            filters.push(Filter::NotEqual {
                field: FilterField::DocumentId,
                value: excluded.clone(),
            });
        }

        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::And { filters }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::Payload;

    fn chunk(document_id: &str, collection: &str, labels: &[&str]) -> RetrievalCandidate {
        RetrievalCandidate::new("c1", document_id, 0.0, 5.0, 1.0).with_payload(
            Payload::new()
                .with("collection_id", collection)
                .with("ner_labels", serde_json::json!(labels)),
        )
    }

    #[test]
    fn test_empty_scope_has_no_filter() {
        assert!(SearchScope::new().to_filter().is_none());
        assert!(SearchScope::new().is_unrestricted());
    }

    #[test]
    fn test_single_constraint_is_bare() {
        let filter = SearchScope::new().within_document("story-1").to_filter();
        assert_eq!(
            filter,
            Some(Filter::Equal {
                field: FilterField::DocumentId,
                value: "story-1".to_string(),
            })
        );
    }

    #[test]
    fn test_multiple_constraints_are_anded() {
        let filter = SearchScope::new()
            .within_document("story-1")
            .with_entity_labels(["PERSON"])
            .to_filter();

        match filter {
            Some(Filter::And { filters }) => {
                assert_eq!(filters.len(), 2);
                assert!(matches!(filters[0], Filter::Equal { .. }));
                assert!(matches!(filters[1], Filter::ContainsAny { .. }));
            }
            other => panic!("expected And filter, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_matching() {
        let scope = SearchScope::new()
            .with_collections(["flood-1927", "levee"])
            .with_entity_labels(["GPE", "PERSON"]);
        let filter = scope.to_filter().unwrap();

        assert!(filter.matches(&chunk("d1", "levee", &["DATE", "GPE"])));
        assert!(!filter.matches(&chunk("d1", "other", &["GPE"])));
        assert!(!filter.matches(&chunk("d1", "levee", &["DATE"])));
    }

    #[test]
    fn test_exclusion() {
        let filter = SearchScope::new()
            .excluding_document("d1")
            .to_filter()
            .unwrap();

        assert!(!filter.matches(&chunk("d1", "levee", &[])));
        assert!(filter.matches(&chunk("d2", "levee", &[])));
    }

    #[test]
    fn test_same_entity_in_other_interviews() {
        let scope = SearchScope::new()
            .with_entity_texts(["Mississippi River"])
            .with_entity_labels(["LOC"])
            .excluding_document("d1");
        assert!(scope.entity_texts.contains("mississippi river"));

        match scope.to_filter() {
            Some(Filter::And { filters }) => {
                assert_eq!(filters.len(), 3);
                assert!(matches!(
                    filters[0],
                    Filter::ContainsAny {
                        field: FilterField::EntityText,
                        ..
                    }
                ));
                assert!(matches!(filters[2], Filter::NotEqual { .. }));
            }
            other => panic!("expected And filter, got {:?}", other),
        }

        let mention = |document_id: &str, text: &str, label: &str| {
            RetrievalCandidate::new("c1", document_id, 0.0, 5.0, 1.0).with_payload(
                Payload::new()
                    .with("ner_text", serde_json::json!([text]))
                    .with("ner_labels", serde_json::json!([label])),
            )
        };
        let filter = scope.to_filter().unwrap();

        assert!(filter.matches(&mention("d2", "MISSISSIPPI RIVER", "LOC")));
        assert!(!filter.matches(&mention("d1", "Mississippi River", "LOC")));
        assert!(!filter.matches(&mention("d2", "Mississippi River", "PERSON")));
        assert!(!filter.matches(&mention("d2", "Ohio River", "LOC")));
    }

    #[test]
    fn test_filter_serializes_tagged() {
        let filter = SearchScope::new().with_document_ids(["a"]).to_filter().unwrap();
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["operator"], "contains_any");
        assert_eq!(json["field"], "document_id");
    }
}
