//! Uploaded document entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[sea_orm(string_value = "transcript")]
    Transcript,
    #[sea_orm(string_value = "certificate")]
    Certificate,
    #[sea_orm(string_value = "identification")]
    Identification,
    #[sea_orm(string_value = "recommendation")]
    Recommendation,
    #[sea_orm(string_value = "other")]
    Other,
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcript" => Ok(Self::Transcript),
            "certificate" => Ok(Self::Certificate),
            "identification" => Ok(Self::Identification),
            "recommendation" => Ok(Self::Recommendation),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown document type: {s}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub application_id: String,

    /// Display name chosen by the applicant
    pub name: String,

    pub document_type: DocumentType,

    #[sea_orm(nullable)]
    pub institution: Option<String>,

    /// Opaque blob key; never sent to clients
    #[serde(skip_serializing)]
    pub storage_key: String,

    pub original_file_name: String,

    pub file_size: i64,

    pub mime_type: String,

    #[sea_orm(default_value = false)]
    pub verified: bool,

    #[sea_orm(nullable)]
    pub verified_by: Option<String>,

    #[sea_orm(nullable)]
    pub verified_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,

    pub uploaded_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::application::Entity",
        from = "Column::ApplicationId",
        to = "super::application::Column::Id",
        on_delete = "Cascade"
    )]
    Application,
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Application.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
