use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Review lifecycle states. `Approved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Open,
    ChangesRequested,
    Discussing,
    Updated,
    Approved,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved)
    }

    /// States in which the human may create, edit, and delete comments.
    pub fn is_human_editable(self) -> bool {
        matches!(self, Self::Open | Self::Updated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VersionAuthor {
    Human,
    Agent,
}

/// Anchoring health of a comment's text position. Positions are recorded
/// against the version the comment was attached to and are not migrated when
/// new versions land; `Adjusted` and `Stale` exist on the wire for clients
/// that track drift themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Valid,
    Adjusted,
    Stale,
}

impl Default for PositionStatus {
    fn default() -> Self {
        Self::Valid
    }
}

/// `Accepted` is a terminal acknowledgement: it resolves the comment
/// immediately instead of waiting on a human answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
    Clarification,
    Choice,
    MultiChoice,
    Accepted,
}

impl QuestionType {
    pub fn requires_options(self) -> bool {
        matches!(self, Self::Choice | Self::MultiChoice)
    }
}
