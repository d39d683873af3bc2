//! Diesel rows and their mapping onto domain types.

use crate::DatabaseResult;
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use diesel::prelude::*;
use std::str::FromStr;
use uuid::Uuid;
use vellum_core::{
    BatchId, Credentials, ModelConfig, ModelId, ModelStats, Proposal, ProposalId, ProposalStatus,
    ProposalVersion, ProviderKind, Rating, VersionContent, VersionId, VersionStatus,
};
use vellum_error::{DatabaseError, DatabaseErrorKind};

fn parse_column<T: FromStr>(column: &'static str, value: &str) -> DatabaseResult<T> {
    T::from_str(value).map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::InvalidValue {
            column,
            value: value.to_string(),
        })
    })
}

fn unsigned(column: &'static str, value: i64) -> DatabaseResult<u64> {
    u64::try_from(value).map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::InvalidValue {
            column,
            value: value.to_string(),
        })
    })
}

/// Clamp a counter into the signed column range.
pub(crate) fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Database row for the proposal_versions table.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::proposal_versions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VersionRow {
    /// Version identifier
    pub id: i64,
    /// Owning proposal
    pub proposal_id: i64,
    /// Number scoped to the proposal
    pub version_number: i32,
    /// Dispatch batch
    pub batch_id: Uuid,
    /// Model used
    pub model_id: i64,
    /// Model display name snapshot
    pub model_name: String,
    /// Provider family snapshot
    pub provider: String,
    /// Lifecycle status
    pub status: String,
    /// Parent version
    pub parent_version_id: Option<i64>,
    /// Iteration feedback
    pub iteration_feedback: Option<String>,
    /// Request payload
    pub request: serde_json::Value,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Admission time
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time
    pub finished_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds
    pub duration_ms: Option<i64>,
    /// Tokens consumed
    pub tokens_used: Option<i64>,
    /// Parsed summary
    pub summary: Option<String>,
    /// Parsed solution overview
    pub solution_overview: Option<String>,
    /// Raw generated text
    pub full_content: Option<String>,
    /// Error summary
    pub error: Option<String>,
    /// User rating
    pub rating: Option<i16>,
    /// Selected flag
    pub selected: bool,
}

impl TryFrom<VersionRow> for ProposalVersion {
    type Error = DatabaseError;

    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        let content = row.full_content.map(|full| {
            VersionContent::new(
                row.summary.unwrap_or_default(),
                row.solution_overview.unwrap_or_default(),
                full,
            )
        });
        let rating = row
            .rating
            .map(|r| {
                u8::try_from(r)
                    .ok()
                    .and_then(|r| Rating::new(r).ok())
                    .ok_or_else(|| {
                        DatabaseError::new(DatabaseErrorKind::InvalidValue {
                            column: "rating",
                            value: r.to_string(),
                        })
                    })
            })
            .transpose()?;

        Ok(ProposalVersion {
            id: VersionId(row.id),
            proposal_id: ProposalId(row.proposal_id),
            version_number: row.version_number,
            batch_id: BatchId(row.batch_id),
            model_id: ModelId(row.model_id),
            model_name: row.model_name,
            provider: parse_column::<ProviderKind>("provider", &row.provider)?,
            status: parse_column::<VersionStatus>("status", &row.status)?,
            parent_version_id: row.parent_version_id.map(VersionId),
            iteration_feedback: row.iteration_feedback,
            request: serde_json::from_value(row.request)?,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            duration_ms: row
                .duration_ms
                .map(|v| unsigned("duration_ms", v))
                .transpose()?,
            tokens_used: row
                .tokens_used
                .map(|v| unsigned("tokens_used", v))
                .transpose()?,
            content,
            error: row.error,
            rating,
            selected: row.selected,
        })
    }
}

/// Insertable struct for the proposal_versions table.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::proposal_versions)]
pub struct NewVersionRow {
    /// Owning proposal
    pub proposal_id: i64,
    /// Allocated version number
    pub version_number: i32,
    /// Dispatch batch
    pub batch_id: Uuid,
    /// Model used
    pub model_id: i64,
    /// Model display name snapshot
    pub model_name: String,
    /// Provider family snapshot
    pub provider: String,
    /// Initial status
    pub status: String,
    /// Parent version
    pub parent_version_id: Option<i64>,
    /// Iteration feedback
    pub iteration_feedback: Option<String>,
    /// Request payload
    pub request: serde_json::Value,
}

/// Database row for the proposals table.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::proposals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProposalRow {
    /// Proposal identifier
    pub id: i64,
    /// Title
    pub title: String,
    /// Customer name
    pub customer_name: String,
    /// Requirements
    pub requirements: String,
    /// Status
    pub status: String,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = DatabaseError;

    fn try_from(row: ProposalRow) -> Result<Self, Self::Error> {
        Ok(Proposal::new(
            ProposalId(row.id),
            row.title,
            row.customer_name,
            row.requirements,
            parse_column::<ProposalStatus>("status", &row.status)?,
        ))
    }
}

/// Insertable struct for the proposals table with builder pattern.
///
/// The engine never creates proposals; this exists for seeding and tests.
#[derive(Debug, Clone, Insertable, Builder)]
#[diesel(table_name = crate::schema::proposals)]
#[builder(setter(into))]
pub struct NewProposalRow {
    /// Title
    pub title: String,
    /// Customer name
    #[builder(default)]
    pub customer_name: String,
    /// Requirements
    #[builder(default)]
    pub requirements: String,
    /// Status
    #[builder(default = "ProposalStatus::Draft.to_string()")]
    pub status: String,
}

/// Database row for the model_configs table.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::model_configs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ModelConfigRow {
    /// Model identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Provider family
    pub provider: String,
    /// Provider-side model name
    pub model_name: String,
    /// Endpoint override
    pub base_url: Option<String>,
    /// Inline API key
    pub api_key: Option<String>,
    /// Environment variable holding the key
    pub api_key_env: Option<String>,
    /// Generation parameters
    pub params: serde_json::Value,
    /// Admission limits
    pub limits: serde_json::Value,
    /// Enabled flag
    pub enabled: bool,
    /// Default flag
    pub is_default: bool,
    /// Description
    pub description: Option<String>,
    /// Finished attempts
    pub total_calls: i64,
    /// Successful attempts
    pub success_calls: i64,
    /// Tokens consumed
    pub total_tokens: i64,
    /// Summed duration in milliseconds
    pub total_duration_ms: i64,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

impl ModelConfigRow {
    /// Split the row into configuration and statistics.
    pub fn into_domain(self) -> DatabaseResult<(ModelConfig, ModelStats)> {
        let stats = ModelStats::new(
            unsigned("total_calls", self.total_calls)?,
            unsigned("success_calls", self.success_calls)?,
            unsigned("total_tokens", self.total_tokens)?,
            unsigned("total_duration_ms", self.total_duration_ms)?,
        );
        let config = ModelConfig::builder()
            .id(ModelId(self.id))
            .name(self.name)
            .provider(parse_column::<ProviderKind>("provider", &self.provider)?)
            .model_name(self.model_name)
            .base_url(self.base_url)
            .credentials(Credentials {
                api_key: self.api_key,
                api_key_env: self.api_key_env,
            })
            .params(serde_json::from_value::<vellum_core::GenerationParams>(
                self.params,
            )?)
            .limits(serde_json::from_value::<vellum_core::ModelLimits>(
                self.limits,
            )?)
            .enabled(self.enabled)
            .is_default(self.is_default)
            .description(self.description)
            .build()
            .map_err(|e| DatabaseError::new(DatabaseErrorKind::Serialization(e.to_string())))?;
        Ok((config, stats))
    }
}

/// Insertable and updatable model configuration, without counters.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::model_configs)]
#[diesel(treat_none_as_null = true)]
pub struct NewModelConfigRow {
    /// Model identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Provider family
    pub provider: String,
    /// Provider-side model name
    pub model_name: String,
    /// Endpoint override
    pub base_url: Option<String>,
    /// Inline API key
    pub api_key: Option<String>,
    /// Environment variable holding the key
    pub api_key_env: Option<String>,
    /// Generation parameters
    pub params: serde_json::Value,
    /// Admission limits
    pub limits: serde_json::Value,
    /// Enabled flag
    pub enabled: bool,
    /// Default flag
    pub is_default: bool,
    /// Description
    pub description: Option<String>,
}

impl TryFrom<&ModelConfig> for NewModelConfigRow {
    type Error = DatabaseError;

    fn try_from(config: &ModelConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            id: config.id().0,
            name: config.name().clone(),
            provider: config.provider().to_string(),
            model_name: config.model_name().clone(),
            base_url: config.base_url().clone(),
            api_key: config.credentials().api_key.clone(),
            api_key_env: config.credentials().api_key_env.clone(),
            params: serde_json::to_value(config.params())?,
            limits: serde_json::to_value(config.limits())?,
            enabled: *config.enabled(),
            is_default: *config.is_default(),
            description: config.description().clone(),
        })
    }
}
