use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A part consumed by a work order. Owned exclusively by one work order;
/// replacing the part list drops rows absent from the new list.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "work_order_parts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub work_order_id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Part number must be between 1 and 50 characters"
    ))]
    pub part_number: String,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Part name must be between 1 and 100 characters"
    ))]
    pub name: String,

    pub quantity_used: f64,

    pub unit_cost: f64,

    /// Must equal `quantity_used * unit_cost` within 0.01; validated at
    /// intake, never silently corrected.
    pub total_cost: f64,

    pub warranty_expires_at: Option<DateTime<Utc>>,

    pub is_critical: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::work_order::Entity",
        from = "Column::WorkOrderId",
        to = "super::work_order::Column::Id",
        on_delete = "Cascade"
    )]
    WorkOrder,
}

impl Related<super::work_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkOrder.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr> {
        Ok(self)
    }
}
