use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User-submitted product review with a moderation state machine.
///
/// Authenticated authors get at most one active (non-deleted) review per
/// product; anonymous reviews carry only `author_name` and are
/// unconstrained. `verified_purchase` is computed once at creation and
/// never recomputed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    #[sea_orm(nullable)]
    pub user_id: Option<Uuid>,
    pub author_name: String,
    pub rating: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub moderation_status: ModerationStatus,
    pub moderation_note: String,
    #[sea_orm(nullable)]
    pub moderated_by: Option<Uuid>,
    #[sea_orm(nullable)]
    pub moderated_at: Option<DateTime<Utc>>,
    pub verified_purchase: bool,
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    Author,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ModeratedBy",
        to = "super::user::Column::Id"
    )]
    Moderator,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Review moderation state. Not sticky: edits reset the review to
/// `Pending` and staff may re-moderate any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}
