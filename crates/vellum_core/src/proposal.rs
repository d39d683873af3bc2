//! Proposal records read from the CRUD layer and request payloads.

use crate::ProposalId;
use serde::{Deserialize, Serialize};

/// Status of the proposal record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProposalStatus {
    /// Created, nothing generated yet
    Draft,
    /// A batch is in flight
    Generating,
    /// Last batch produced at least one version
    Completed,
    /// Last batch produced nothing
    Failed,
}

/// Proposal as owned by the CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct Proposal {
    /// Proposal identifier
    pub id: ProposalId,
    /// Title
    pub title: String,
    /// Customer the proposal is written for
    pub customer_name: String,
    /// Customer requirements
    pub requirements: String,
    /// Current status
    pub status: ProposalStatus,
}

/// Payload rendered into the generation prompt.
///
/// # Examples
///
/// ```
/// use vellum_core::ProposalRequest;
///
/// let base = ProposalRequest::builder()
///     .title("Core banking migration")
///     .customer_name("Acme Bank")
///     .requirements("Move ledger to the cloud")
///     .build()
///     .unwrap();
/// let next = base.iterate("Add a risk section", "previous draft");
/// assert_eq!(next.feedback, vec!["Add a risk section".to_string()]);
/// assert_eq!(next.previous_content.as_deref(), Some("previous draft"));
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, derive_builder::Builder,
)]
#[builder(default, setter(into))]
#[serde(default)]
pub struct ProposalRequest {
    /// Proposal title
    pub title: String,
    /// Customer name
    pub customer_name: String,
    /// Customer requirements
    pub requirements: String,
    /// Excerpts from reference documents
    pub reference_excerpts: Vec<String>,
    /// Feedback accumulated over iterations, oldest first
    pub feedback: Vec<String>,
    /// Full content of the version being iterated on
    pub previous_content: Option<String>,
}

impl ProposalRequest {
    /// Creates a builder for ProposalRequest.
    pub fn builder() -> ProposalRequestBuilder {
        ProposalRequestBuilder::default()
    }

    /// Payload for a first generation from the proposal record.
    pub fn from_proposal(proposal: &Proposal) -> Self {
        Self {
            title: proposal.title.clone(),
            customer_name: proposal.customer_name.clone(),
            requirements: proposal.requirements.clone(),
            ..Self::default()
        }
    }

    /// Payload for an iteration: appends feedback and carries the parent's content.
    pub fn iterate(&self, feedback: impl Into<String>, previous_content: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.feedback.push(feedback.into());
        next.previous_content = Some(previous_content.into());
        next
    }
}
