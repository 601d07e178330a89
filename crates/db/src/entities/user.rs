//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role held by a user. Stored as a JSON array of strings on the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Applicant,
    Admin,
    Reviewer,
}

impl Role {
    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Admin => "admin",
            Self::Reviewer => "reviewer",
        }
    }
}

/// Gender.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum Gender {
    #[sea_orm(string_value = "male")]
    #[serde(rename = "male")]
    Male,
    #[sea_orm(string_value = "female")]
    #[serde(rename = "female")]
    Female,
    #[sea_orm(string_value = "other")]
    #[serde(rename = "other")]
    Other,
    #[sea_orm(string_value = "prefer not to say")]
    #[serde(rename = "prefer not to say")]
    PreferNotToSay,
}

impl Gender {
    /// Stored value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::PreferNotToSay => "prefer not to say",
        }
    }
}

/// Refugee settlement the applicant is affiliated with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum SettlementSite {
    #[sea_orm(string_value = "Rwamwanja")]
    Rwamwanja,
    #[sea_orm(string_value = "Kyangwali")]
    Kyangwali,
    #[sea_orm(string_value = "Nakivale")]
    Nakivale,
    #[sea_orm(string_value = "Other")]
    Other,
    #[default]
    #[sea_orm(string_value = "None")]
    None,
}

impl SettlementSite {
    /// Display name, identical to the stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rwamwanja => "Rwamwanja",
            Self::Kyangwali => "Kyangwali",
            Self::Nakivale => "Nakivale",
            Self::Other => "Other",
            Self::None => "None",
        }
    }
}

impl std::str::FromStr for SettlementSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Rwamwanja,
            Self::Kyangwali,
            Self::Nakivale,
            Self::Other,
            Self::None,
        ]
        .into_iter()
        .find(|site| site.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("Unknown settlement site: {s}"))
    }
}

/// Preferred interface/communication language.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PreferredLanguage {
    #[default]
    #[sea_orm(string_value = "english")]
    English,
    #[sea_orm(string_value = "swahili")]
    Swahili,
    #[sea_orm(string_value = "french")]
    French,
    #[sea_orm(string_value = "arabic")]
    Arabic,
    #[sea_orm(string_value = "runyankole")]
    Runyankole,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub first_name: String,

    pub last_name: String,

    /// Lower-cased email address
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2 password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// E.164-style phone number
    #[sea_orm(nullable)]
    pub phone: Option<String>,

    #[sea_orm(nullable)]
    pub gender: Option<Gender>,

    #[sea_orm(nullable)]
    pub date_of_birth: Option<Date>,

    #[sea_orm(nullable)]
    pub nationality: Option<String>,

    pub settlement_site: SettlementSite,

    /// UNHCR/OPM refugee identification number
    #[sea_orm(nullable)]
    pub refugee_id: Option<String>,

    #[sea_orm(nullable)]
    pub address: Option<String>,

    #[sea_orm(nullable)]
    pub city: Option<String>,

    #[sea_orm(nullable)]
    pub state: Option<String>,

    #[sea_orm(nullable)]
    pub country: Option<String>,

    #[sea_orm(nullable)]
    pub postal_code: Option<String>,

    pub preferred_language: PreferredLanguage,

    /// Role set, e.g. `["applicant"]`
    #[sea_orm(column_type = "JsonBinary")]
    pub roles: Json,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    #[sea_orm(default_value = false)]
    pub is_verified: bool,

    /// Argon2 hash of the outstanding password reset secret
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub reset_password_token: Option<String>,

    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub reset_password_expires_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub last_login_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,

    /// Soft deletion timestamp; rows are never purged
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Parsed role set. Unknown entries are ignored.
    #[must_use]
    pub fn role_set(&self) -> Vec<Role> {
        serde_json::from_value::<Vec<serde_json::Value>>(self.roles.clone())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }

    /// Whether the user holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role_set().contains(&role)
    }

    /// Whether the account may sign in.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    /// Full display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Encode a role set for the `roles` column.
#[must_use]
pub fn roles_json(roles: &[Role]) -> Json {
    Json::Array(
        roles
            .iter()
            .map(|r| Json::String(r.as_str().to_string()))
            .collect(),
    )
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::application::Entity")]
    Applications,

    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Applications.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_json_round_trips_through_role_set() {
        let json = roles_json(&[Role::Applicant, Role::Reviewer]);
        assert_eq!(json, serde_json::json!(["applicant", "reviewer"]));

        let parsed: Vec<Role> = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, vec![Role::Applicant, Role::Reviewer]);
    }

    #[test]
    fn test_settlement_site_defaults_to_none() {
        assert_eq!(SettlementSite::default(), SettlementSite::None);
        assert_eq!(SettlementSite::Nakivale.as_str(), "Nakivale");
    }

    #[test]
    fn test_settlement_site_parses_case_insensitively() {
        assert_eq!("kyangwali".parse::<SettlementSite>(), Ok(SettlementSite::Kyangwali));
        assert_eq!("Rwamwanja".parse::<SettlementSite>(), Ok(SettlementSite::Rwamwanja));
        assert!("Kampala".parse::<SettlementSite>().is_err());
    }
}
