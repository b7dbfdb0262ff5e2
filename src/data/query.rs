//! Query model for the feature-statistics service.
//!
//! The service accepts a large form-encoded parameter surface; we model the
//! recognized subset as a struct so a query is assembled with names and
//! defaults instead of loose string pairs. `to_params` is the single place
//! where the wire encoding happens.

use serde::Serialize;

use crate::error::PipelineError;

/// The feature layers the pipeline reads.
///
/// All four are views over the same reporting database, refreshed on
/// slightly different schedules. That redundancy is what makes
/// cross-validation possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// Per-county summary rows (one row per county, cumulative columns).
    Counties,
    /// Per-state summary rows.
    States,
    /// Individual case-record table (one row per reporting group).
    CaseRecords,
    /// Per-state recovered counts carrying a running national total.
    RecoveredByState,
}

impl Dataset {
    pub fn endpoint(self) -> &'static str {
        match self {
            Dataset::Counties => {
                "https://services7.arcgis.com/mOBPykOjAyBO2ZKk/arcgis/rest/services/RKI_Landkreisdaten/FeatureServer/0/query"
            }
            Dataset::States => {
                "https://services7.arcgis.com/mOBPykOjAyBO2ZKk/arcgis/rest/services/Coronaf%C3%A4lle_in_den_Bundesl%C3%A4ndern/FeatureServer/0/query"
            }
            Dataset::CaseRecords => {
                "https://services7.arcgis.com/mOBPykOjAyBO2ZKk/arcgis/rest/services/RKI_COVID19/FeatureServer/0/query"
            }
            Dataset::RecoveredByState => {
                "https://services7.arcgis.com/mOBPykOjAyBO2ZKk/arcgis/rest/services/RKI_COVID19_Recovered_BL/FeatureServer/0/query"
            }
        }
    }

    /// Short label used in log lines and error contexts.
    pub fn label(self) -> &'static str {
        match self {
            Dataset::Counties => "county summary layer",
            Dataset::States => "state summary layer",
            Dataset::CaseRecords => "case record layer",
            Dataset::RecoveredByState => "recovered-by-state layer",
        }
    }
}

/// Server-side aggregation applied to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticKind {
    Sum,
    Max,
    Min,
    Avg,
    Count,
}

impl StatisticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatisticKind::Sum => "sum",
            StatisticKind::Max => "max",
            StatisticKind::Min => "min",
            StatisticKind::Avg => "avg",
            StatisticKind::Count => "count",
        }
    }
}

/// One requested output statistic.
#[derive(Debug, Clone)]
pub struct Statistic {
    pub kind: StatisticKind,
    pub field: String,
    pub out_name: String,
}

/// Which attributes a row query should return.
#[derive(Debug, Clone, Default)]
pub enum OutFields {
    #[default]
    All,
    Named(Vec<String>),
}

/// The recognized query surface.
///
/// `Default` yields the service's permissive baseline: no filter (`1=1`),
/// all fields, no statistics, no paging.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    /// SQL-ish row predicate (`where`).
    pub filter: Option<String>,
    pub out_fields: OutFields,
    /// Server-side statistics; non-empty turns the query into an aggregation.
    pub statistics: Vec<Statistic>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl QuerySpec {
    /// A single aggregate producing one row with one `value` attribute.
    pub fn statistic(kind: StatisticKind, field: &str) -> Self {
        Self {
            statistics: vec![Statistic {
                kind,
                field: field.to_string(),
                out_name: "value".to_string(),
            }],
            ..Self::default()
        }
    }

    /// Encode this query as wire parameters.
    pub fn to_params(&self) -> Result<Vec<(&'static str, String)>, PipelineError> {
        let mut params: Vec<(&'static str, String)> = vec![
            ("f", "json".to_string()),
            (
                "where",
                self.filter.clone().unwrap_or_else(|| "1=1".to_string()),
            ),
            ("returnGeometry", "false".to_string()),
            ("spatialRel", "esriSpatialRelIntersects".to_string()),
            (
                "outFields",
                match &self.out_fields {
                    OutFields::All => "*".to_string(),
                    OutFields::Named(names) => names.join(","),
                },
            ),
            ("resultType", "standard".to_string()),
            ("cacheHint", "true".to_string()),
        ];
        if !self.statistics.is_empty() {
            params.push(("outStatistics", self.statistics_json()?));
        }
        if !self.group_by.is_empty() {
            params.push(("groupByFieldsForStatistics", self.group_by.join(",")));
        }
        if !self.order_by.is_empty() {
            params.push(("orderByFields", self.order_by.join(",")));
        }
        if let Some(offset) = self.offset {
            params.push(("resultOffset", offset.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("resultRecordCount", limit.to_string()));
        }
        Ok(params)
    }

    fn statistics_json(&self) -> Result<String, PipelineError> {
        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(rename = "statisticType")]
            statistic_type: &'static str,
            #[serde(rename = "onStatisticField")]
            on_statistic_field: &'a str,
            #[serde(rename = "outStatisticFieldName")]
            out_statistic_field_name: &'a str,
        }
        let wire: Vec<Wire<'_>> = self
            .statistics
            .iter()
            .map(|s| Wire {
                statistic_type: s.kind.as_str(),
                on_statistic_field: &s.field,
                out_statistic_field_name: &s.out_name,
            })
            .collect();
        serde_json::to_string(&wire)
            .map_err(|e| PipelineError::Config(format!("failed to encode outStatistics: {e}")))
    }
}
