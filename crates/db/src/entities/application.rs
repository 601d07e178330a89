//! Application entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an application.
///
/// ```text
/// draft -> submitted <-> under_review
/// submitted | under_review -> approved | rejected | waitlisted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "waitlisted")]
    Waitlisted,
}

impl ApplicationStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::Approved,
        Self::Rejected,
        Self::Waitlisted,
    ];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Waitlisted => "waitlisted",
        }
    }

    /// Content may only be edited by the owner while in draft.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft)
    }

    /// A reviewer may act on the application.
    #[must_use]
    pub const fn is_reviewable(self) -> bool {
        matches!(self, Self::Submitted | Self::UnderReview)
    }

    /// Statuses a reviewer may set.
    #[must_use]
    pub const fn is_review_outcome(self) -> bool {
        matches!(
            self,
            Self::UnderReview | Self::Approved | Self::Rejected | Self::Waitlisted
        )
    }

    /// Approved, rejected and waitlisted applications have no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Waitlisted)
    }

    /// Whether the state machine permits `self -> next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Draft => matches!(next, Self::Submitted),
            Self::Submitted => next.is_review_outcome(),
            Self::UnderReview => {
                matches!(next, Self::Submitted) || next.is_review_outcome()
            }
            Self::Approved | Self::Rejected | Self::Waitlisted => false,
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown application status: {s}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "application")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Human-readable number, e.g. `BSU-4821937312`. Immutable.
    #[sea_orm(unique)]
    pub application_number: String,

    /// Owning applicant
    pub user_id: String,

    pub status: ApplicationStatus,

    /// Wizard step the applicant is on (1-4)
    pub current_step: i32,

    /// Completed wizard steps as a JSON array of integers
    #[sea_orm(column_type = "JsonBinary")]
    pub completed_steps: Json,

    #[sea_orm(nullable)]
    pub program: Option<String>,

    #[sea_orm(nullable)]
    pub department: Option<String>,

    #[sea_orm(nullable)]
    pub academic_year: Option<String>,

    #[sea_orm(nullable)]
    pub semester: Option<String>,

    #[sea_orm(default_value = false)]
    pub disability_status: bool,

    #[sea_orm(nullable)]
    pub disability_type: Option<String>,

    #[sea_orm(nullable)]
    pub emergency_contact_name: Option<String>,

    #[sea_orm(nullable)]
    pub emergency_contact_phone: Option<String>,

    #[sea_orm(nullable)]
    pub emergency_contact_relationship: Option<String>,

    #[sea_orm(nullable)]
    pub submitted_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub reviewed_at: Option<DateTimeWithTimeZone>,

    /// Reviewer who last acted on the application
    #[sea_orm(nullable)]
    pub reviewed_by: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Completed steps, sorted and de-duplicated.
    #[must_use]
    pub fn completed_step_set(&self) -> Vec<i32> {
        let mut steps: Vec<i32> =
            serde_json::from_value(self.completed_steps.clone()).unwrap_or_default();
        steps.sort_unstable();
        steps.dedup();
        steps
    }
}

/// Encode a step set for the `completed_steps` column.
#[must_use]
pub fn steps_json(steps: &[i32]) -> Json {
    Json::Array(steps.iter().map(|s| Json::from(*s)).collect())
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_many = "super::education::Entity")]
    Education,

    #[sea_orm(has_many = "super::document::Entity")]
    Documents,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::education::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Education.def()
    }
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    #[test]
    fn test_draft_only_moves_to_submitted() {
        assert!(Draft.can_transition_to(Submitted));
        for next in [Draft, UnderReview, Approved, Rejected, Waitlisted] {
            assert!(!Draft.can_transition_to(next), "draft -> {next}");
        }
    }

    #[test]
    fn test_review_transitions() {
        for from in [Submitted, UnderReview] {
            for to in [UnderReview, Approved, Rejected, Waitlisted] {
                assert!(from.can_transition_to(to), "{from} -> {to}");
            }
        }
        assert!(UnderReview.can_transition_to(Submitted));
    }

    #[test]
    fn test_terminal_statuses_have_no_transitions() {
        for from in [Approved, Rejected, Waitlisted] {
            assert!(from.is_terminal());
            for to in ApplicationStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_status_parses_from_wire_value() {
        for status in ApplicationStatus::ALL {
            assert_eq!(status.as_str().parse::<ApplicationStatus>(), Ok(status));
        }
        assert!("archived".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn test_steps_json() {
        assert_eq!(steps_json(&[1, 2]), serde_json::json!([1, 2]));
    }
}
