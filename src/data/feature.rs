//! Feature-service client: executes queries and decodes responses into
//! typed rows.
//!
//! The service reports errors two ways: transport-level status codes, and a
//! JSON `error` object inside an HTTP 200 body. Both are checked here so
//! callers only ever see decoded rows or a classified failure.
//!
//! Fetching and decoding are split so the decode path can be exercised on
//! captured response bodies without a network.

use std::collections::BTreeMap;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::data::query::{Dataset, QuerySpec};
use crate::data::value::{self, FieldKind, FieldTotals, TypedRow};
use crate::error::PipelineError;

pub struct FeatureClient {
    client: Client,
}

impl FeatureClient {
    pub fn new(user_agent: &str) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Run a single-aggregate query and return its one `value` as a count.
    pub fn single_statistic(&self, dataset: Dataset, spec: &QuerySpec) -> Result<i64, PipelineError> {
        let body = self.query(dataset, spec)?;
        parse_single_statistic(dataset, &body)
    }

    /// Run a row query, returning typed rows plus per-field numeric totals.
    pub fn rows_with_totals(
        &self,
        dataset: Dataset,
        spec: &QuerySpec,
    ) -> Result<(Vec<TypedRow>, FieldTotals), PipelineError> {
        let body = self.query(dataset, spec)?;
        parse_rows_with_totals(&body)
    }

    fn query(&self, dataset: Dataset, spec: &QuerySpec) -> Result<QueryResponse, PipelineError> {
        let params = spec.to_params()?;
        let resp = self
            .client
            .get(dataset.endpoint())
            .query(&params)
            .send()
            .map_err(|e| PipelineError::fetch(dataset.endpoint(), e))?;

        if !resp.status().is_success() {
            return Err(PipelineError::fetch(
                dataset.endpoint(),
                format!("status {}", resp.status()),
            ));
        }

        let body: QueryResponse = resp.json().map_err(|e| {
            PipelineError::malformed(dataset.label(), format!("response is not feature JSON: {e}"))
        })?;

        if let Some(err) = &body.error {
            return Err(PipelineError::malformed(
                dataset.label(),
                format!("service error {}: {}", err.code, err.message),
            ));
        }

        Ok(body)
    }
}

/// Decode an aggregation response that must carry exactly one statistics row.
pub fn parse_single_statistic(dataset: Dataset, body: &QueryResponse) -> Result<i64, PipelineError> {
    if body.features.len() != 1 {
        return Err(PipelineError::malformed(
            dataset.label(),
            format!("expected exactly one statistics row, got {}", body.features.len()),
        ));
    }
    let attributes = &body.features[0].attributes;
    let raw = attributes.get("value").ok_or_else(|| {
        PipelineError::malformed(dataset.label(), "statistics row has no `value` attribute")
    })?;

    // Statistics responses usually declare the result as a double; when the
    // metadata is missing entirely we assume the same.
    let kind = match body.fields.iter().find(|f| f.name == "value") {
        Some(info) => FieldKind::from_declared(&info.declared).unwrap_or(FieldKind::Text),
        None => FieldKind::Double,
    };
    let typed = value::coerce(kind, "value", raw)?;
    typed.as_count().ok_or_else(|| PipelineError::TypeMismatch {
        field: "value".to_string(),
        expected: "an integer statistic",
        value: raw.to_string(),
    })
}

/// Decode a row response against its field metadata.
///
/// Fields without a metadata entry, and fields whose declared type we do not
/// recognize, are carried as text. Numeric values are folded into a fresh
/// `FieldTotals` as a side product.
pub fn parse_rows_with_totals(
    body: &QueryResponse,
) -> Result<(Vec<TypedRow>, FieldTotals), PipelineError> {
    let kinds: BTreeMap<&str, FieldKind> = body
        .fields
        .iter()
        .map(|f| {
            (
                f.name.as_str(),
                FieldKind::from_declared(&f.declared).unwrap_or(FieldKind::Text),
            )
        })
        .collect();

    let mut totals = FieldTotals::new();
    let mut rows = Vec::with_capacity(body.features.len());
    for feature in &body.features {
        let mut row = TypedRow::new();
        for (name, raw) in &feature.attributes {
            let kind = kinds.get(name.as_str()).copied().unwrap_or(FieldKind::Text);
            let typed = value::coerce_into(kind, name, raw, &mut totals)?;
            row.insert(name.clone(), typed);
        }
        rows.push(row);
    }
    Ok((rows, totals))
}

/// Wire shape of a feature query response.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub declared: String,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceError {
    pub code: i64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::TypedField;

    fn decode(json: &str) -> QueryResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn single_statistic_reads_the_value_row() {
        let body = decode(
            r#"{
                "fields": [{"name": "value", "type": "esriFieldTypeDouble"}],
                "features": [{"attributes": {"value": 154545}}]
            }"#,
        );
        assert_eq!(
            parse_single_statistic(Dataset::Counties, &body).unwrap(),
            154545
        );
    }

    #[test]
    fn single_statistic_requires_exactly_one_row() {
        let empty = decode(r#"{"fields": [], "features": []}"#);
        assert!(parse_single_statistic(Dataset::Counties, &empty).is_err());

        let two = decode(
            r#"{
                "fields": [{"name": "value", "type": "esriFieldTypeDouble"}],
                "features": [
                    {"attributes": {"value": 1}},
                    {"attributes": {"value": 2}}
                ]
            }"#,
        );
        assert!(parse_single_statistic(Dataset::Counties, &two).is_err());
    }

    #[test]
    fn single_statistic_rejects_textual_values() {
        let body = decode(
            r#"{
                "fields": [{"name": "value", "type": "esriFieldTypeString"}],
                "features": [{"attributes": {"value": "154545"}}]
            }"#,
        );
        let err = parse_single_statistic(Dataset::States, &body).unwrap_err();
        match err {
            PipelineError::TypeMismatch { field, .. } => assert_eq!(field, "value"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn single_statistic_without_metadata_accepts_numbers() {
        let body = decode(r#"{"features": [{"attributes": {"value": 90}}]}"#);
        assert_eq!(parse_single_statistic(Dataset::CaseRecords, &body).unwrap(), 90);
    }

    #[test]
    fn service_error_bodies_are_detected() {
        // The service wraps errors in HTTP 200; `query` maps them before any
        // row decoding. Here we only check the DTO shape decodes.
        let body = decode(
            r#"{"error": {"code": 400, "message": "Invalid query parameters."}}"#,
        );
        let err = body.error.unwrap();
        assert_eq!(err.code, 400);
        assert!(err.message.contains("Invalid"));
    }

    #[test]
    fn rows_decode_against_declared_types() {
        let body = decode(
            r#"{
                "fields": [
                    {"name": "Meldedatum", "type": "esriFieldTypeDate"},
                    {"name": "AnzahlFall", "type": "esriFieldTypeInteger"},
                    {"name": "Bundesland", "type": "esriFieldTypeString"}
                ],
                "features": [
                    {"attributes": {"Meldedatum": 1587686400000, "AnzahlFall": 10, "Bundesland": "Bayern"}},
                    {"attributes": {"Meldedatum": 1587772800000, "AnzahlFall": 32, "Bundesland": "Berlin"}}
                ]
            }"#,
        );
        let (rows, totals) = parse_rows_with_totals(&body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("AnzahlFall"), Some(&TypedField::Integer(10)));
        match rows[1].get("Meldedatum") {
            Some(TypedField::Timestamp(ts)) => {
                assert_eq!(ts.date_naive(), "2020-04-25".parse().unwrap());
            }
            other => panic!("unexpected field: {other:?}"),
        }
        assert_eq!(totals.sum_as_count("AnzahlFall"), Some(42));
        assert_eq!(totals.sum("Bundesland"), None);
    }

    #[test]
    fn rows_with_unknown_declarations_degrade_to_text() {
        let body = decode(
            r#"{
                "fields": [{"name": "Shape__Area", "type": "esriFieldTypeGeometry"}],
                "features": [{"attributes": {"Shape__Area": 12.5, "Unlisted": 3}}]
            }"#,
        );
        let (rows, totals) = parse_rows_with_totals(&body).unwrap();
        assert_eq!(rows[0].get("Shape__Area"), Some(&TypedField::Text("12.5".into())));
        assert_eq!(rows[0].get("Unlisted"), Some(&TypedField::Text("3".into())));
        assert_eq!(totals.sum("Shape__Area"), None);
    }

    #[test]
    fn typed_failures_abort_the_decode_pass() {
        let body = decode(
            r#"{
                "fields": [{"name": "AnzahlFall", "type": "esriFieldTypeInteger"}],
                "features": [
                    {"attributes": {"AnzahlFall": 10}},
                    {"attributes": {"AnzahlFall": "zehn"}}
                ]
            }"#,
        );
        assert!(parse_rows_with_totals(&body).is_err());
    }
}
