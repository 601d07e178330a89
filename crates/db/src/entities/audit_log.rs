//! Audit log entity. Rows are append-only.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Acting user; `None` for system actions
    #[sea_orm(nullable)]
    pub user_id: Option<String>,

    /// Action name, e.g. `SUBMIT_APPLICATION`
    pub action: String,

    /// Resource kind, e.g. `Application`
    pub resource_type: String,

    #[sea_orm(nullable)]
    pub resource_id: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(nullable)]
    pub ip_address: Option<String>,

    #[sea_orm(nullable)]
    pub user_agent: Option<String>,

    /// Snapshot before the change
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub previous_values: Option<Json>,

    /// Snapshot after the change
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub new_values: Option<Json>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
