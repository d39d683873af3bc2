//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a proposal record owned by the CRUD layer.
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
    derive_more::From,
)]
#[serde(transparent)]
pub struct ProposalId(pub i64);

/// Identifier of a stored proposal version.
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
    derive_more::From,
)]
#[serde(transparent)]
pub struct VersionId(pub i64);

/// Identifier of a configured model.
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
    derive_more::From,
)]
#[serde(transparent)]
pub struct ModelId(pub i64);

/// Identifier shared by every version created in one dispatch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Generate a fresh random batch id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a batch id from its hyphenated string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}
