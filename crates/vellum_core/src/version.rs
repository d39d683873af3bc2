//! Proposal version records and their lifecycle.

use crate::{BatchId, ModelId, ProposalId, ProposalRequest, ProviderKind, VersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vellum_error::{ConflictError, ConflictErrorKind, ValidationError};

/// Lifecycle status of a version.
///
/// Transitions are monotonic: `pending -> generating -> completed | failed`,
/// and `pending -> failed` when a unit never starts.
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
pub enum VersionStatus {
    /// Row exists, generation not admitted yet
    Pending,
    /// Provider call in flight
    Generating,
    /// Content stored
    Completed,
    /// Error summary stored
    Failed,
}

impl VersionStatus {
    /// Returns true for `completed` and `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VersionStatus::Completed | VersionStatus::Failed)
    }

    /// Whether a version in this status may move to `next`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_core::VersionStatus;
    ///
    /// assert!(VersionStatus::Pending.can_transition_to(VersionStatus::Generating));
    /// assert!(VersionStatus::Pending.can_transition_to(VersionStatus::Failed));
    /// assert!(!VersionStatus::Completed.can_transition_to(VersionStatus::Failed));
    /// ```
    pub fn can_transition_to(&self, next: VersionStatus) -> bool {
        use VersionStatus::*;
        matches!(
            (self, next),
            (Pending, Generating) | (Pending, Failed) | (Generating, Completed) | (Generating, Failed)
        )
    }
}

/// Structured content parsed from a completed generation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, derive_new::new)]
pub struct VersionContent {
    /// Executive summary
    pub summary: String,
    /// Solution overview section
    pub solution_overview: String,
    /// Full generated text
    pub full_content: String,
}

/// User rating between 1 and 5 inclusive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Lowest accepted rating.
    pub const MIN: u8 = 1;
    /// Highest accepted rating.
    pub const MAX: u8 = 5;

    /// Validate a raw rating.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_core::Rating;
    ///
    /// assert_eq!(Rating::new(4).unwrap().value(), 4);
    /// assert!(Rating::new(0).is_err());
    /// assert!(Rating::new(6).is_err());
    /// ```
    #[track_caller]
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::new(format!(
                "rating must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    /// Raw value.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// One stored generation attempt of a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalVersion {
    /// Version identifier
    pub id: VersionId,
    /// Owning proposal
    pub proposal_id: ProposalId,
    /// Number scoped to the proposal, starting at 1
    pub version_number: i32,
    /// Dispatch that created this version
    pub batch_id: BatchId,
    /// Model used
    pub model_id: ModelId,
    /// Model display name at dispatch time
    pub model_name: String,
    /// Provider family at dispatch time
    pub provider: ProviderKind,
    /// Lifecycle status
    pub status: VersionStatus,
    /// Version this one iterates on
    pub parent_version_id: Option<VersionId>,
    /// Feedback that produced this version
    pub iteration_feedback: Option<String>,
    /// Request payload used for generation
    pub request: ProposalRequest,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Time the unit was admitted
    pub started_at: Option<DateTime<Utc>>,
    /// Time the unit finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Generation wall-clock duration in milliseconds
    pub duration_ms: Option<u64>,
    /// Tokens consumed
    pub tokens_used: Option<u64>,
    /// Parsed content, present when completed
    pub content: Option<VersionContent>,
    /// Error summary, present when failed
    pub error: Option<String>,
    /// User rating
    pub rating: Option<Rating>,
    /// Whether this is the proposal's selected version
    pub selected: bool,
}

impl ProposalVersion {
    /// Returns true once the version is completed or failed.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check that the version may move to `next`.
    #[track_caller]
    pub fn ensure_transition(&self, next: VersionStatus) -> Result<(), ConflictError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(ConflictError::new(ConflictErrorKind::InvalidTransition {
                version: self.id.0,
                from: self.status.to_string(),
                to: next.to_string(),
            }))
        }
    }

    /// Check that a new version of `proposal_id` may iterate on this one.
    #[track_caller]
    pub fn ensure_can_parent(&self, proposal_id: ProposalId) -> Result<(), ConflictError> {
        if self.proposal_id != proposal_id {
            return Err(ConflictError::new(ConflictErrorKind::ParentProposalMismatch {
                parent: self.id.0,
                expected: proposal_id.0,
                actual: self.proposal_id.0,
            }));
        }
        if !self.is_terminal() {
            return Err(ConflictError::new(ConflictErrorKind::ParentNotTerminal {
                parent: self.id.0,
                status: self.status.to_string(),
            }));
        }
        Ok(())
    }

    /// Check that the version may become the selected one.
    #[track_caller]
    pub fn ensure_selectable(&self) -> Result<(), ConflictError> {
        if self.status != VersionStatus::Completed {
            return Err(ConflictError::new(ConflictErrorKind::NotSelectable {
                version: self.id.0,
                status: self.status.to_string(),
            }));
        }
        if self.selected {
            return Err(ConflictError::new(ConflictErrorKind::AlreadySelected(
                self.id.0,
            )));
        }
        Ok(())
    }

    /// Check that the version may be rated.
    #[track_caller]
    pub fn ensure_ratable(&self) -> Result<(), ConflictError> {
        if self.is_terminal() {
            Ok(())
        } else {
            Err(ConflictError::new(ConflictErrorKind::NotRatable {
                version: self.id.0,
                status: self.status.to_string(),
            }))
        }
    }
}
