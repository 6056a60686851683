use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Work order status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum WorkOrderStatus {
    #[sea_orm(string_value = "scheduled")]
    Scheduled,

    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,

    #[sea_orm(string_value = "approved")]
    Approved,

    #[sea_orm(string_value = "in_progress")]
    InProgress,

    #[sea_orm(string_value = "on_hold")]
    OnHold,

    #[sea_orm(string_value = "completed")]
    Completed,

    #[sea_orm(string_value = "cancelled")]
    Cancelled,

    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkOrderStatus::Scheduled => write!(f, "scheduled"),
            WorkOrderStatus::PendingApproval => write!(f, "pending_approval"),
            WorkOrderStatus::Approved => write!(f, "approved"),
            WorkOrderStatus::InProgress => write!(f, "in_progress"),
            WorkOrderStatus::OnHold => write!(f, "on_hold"),
            WorkOrderStatus::Completed => write!(f, "completed"),
            WorkOrderStatus::Cancelled => write!(f, "cancelled"),
            WorkOrderStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for WorkOrderStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(WorkOrderStatus::Scheduled),
            "pending_approval" => Ok(WorkOrderStatus::PendingApproval),
            "approved" => Ok(WorkOrderStatus::Approved),
            "in_progress" | "inprogress" => Ok(WorkOrderStatus::InProgress),
            "on_hold" => Ok(WorkOrderStatus::OnHold),
            "completed" => Ok(WorkOrderStatus::Completed),
            "cancelled" | "canceled" => Ok(WorkOrderStatus::Cancelled),
            "rejected" => Ok(WorkOrderStatus::Rejected),
            _ => Err(ServiceError::ValidationFailed(format!(
                "unknown work order status: {}",
                s
            ))),
        }
    }
}

impl WorkOrderStatus {
    /// The work-order transition table. Every legal edge of the lifecycle is
    /// listed here; anything else is rejected before any mutation.
    ///
    /// `completed -> in_progress` is a privileged reopen: the table permits
    /// it, callers must gate it with their own authorization.
    pub fn can_transition_to(self, target: WorkOrderStatus) -> bool {
        use WorkOrderStatus::*;
        match (self, target) {
            (Scheduled, InProgress)
            | (Scheduled, OnHold)
            | (Scheduled, Cancelled)
            | (Scheduled, PendingApproval) => true,

            (PendingApproval, Approved)
            | (PendingApproval, Rejected)
            | (PendingApproval, Cancelled) => true,

            (Approved, InProgress) | (Approved, Scheduled) | (Approved, Cancelled) => true,

            (InProgress, Completed) | (InProgress, OnHold) | (InProgress, Cancelled) => true,

            (OnHold, InProgress) | (OnHold, Cancelled) => true,

            (Completed, InProgress) => true,

            (Cancelled, Scheduled) | (Cancelled, PendingApproval) => true,

            (Rejected, PendingApproval) | (Rejected, Cancelled) => true,

            _ => false,
        }
    }
}

/// Maintenance type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum MaintenanceType {
    #[sea_orm(string_value = "preventive")]
    Preventive,

    #[sea_orm(string_value = "corrective")]
    Corrective,

    #[sea_orm(string_value = "inspection")]
    Inspection,

    #[sea_orm(string_value = "emergency")]
    Emergency,

    #[sea_orm(string_value = "overhaul")]
    Overhaul,
}

impl fmt::Display for MaintenanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceType::Preventive => write!(f, "preventive"),
            MaintenanceType::Corrective => write!(f, "corrective"),
            MaintenanceType::Inspection => write!(f, "inspection"),
            MaintenanceType::Emergency => write!(f, "emergency"),
            MaintenanceType::Overhaul => write!(f, "overhaul"),
        }
    }
}

/// Work order priority enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PriorityLevel {
    #[sea_orm(string_value = "low")]
    Low,

    #[sea_orm(string_value = "normal")]
    Normal,

    #[sea_orm(string_value = "high")]
    High,

    #[sea_orm(string_value = "critical")]
    Critical,
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityLevel::Low => write!(f, "low"),
            PriorityLevel::Normal => write!(f, "normal"),
            PriorityLevel::High => write!(f, "high"),
            PriorityLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Approval policy, computed once when the work order is created and never
/// re-derived afterwards.
pub fn requires_approval(
    maintenance_type: MaintenanceType,
    priority: PriorityLevel,
    estimated_total_cost: f64,
    cost_threshold: f64,
) -> bool {
    matches!(
        maintenance_type,
        MaintenanceType::Emergency | MaintenanceType::Overhaul
    ) || priority == PriorityLevel::Critical
        || estimated_total_cost > cost_threshold
}

/// Maintenance work order entity model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "work_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Work order number must be between 1 and 50 characters"
    ))]
    pub work_order_number: String,

    pub equipment_id: Uuid,

    pub maintenance_type: MaintenanceType,

    pub priority: PriorityLevel,

    pub status: WorkOrderStatus,

    /// Computed at creation from type, priority and estimated cost.
    pub approval_required: bool,

    pub approved_by: Option<Uuid>,

    pub approved_at: Option<DateTime<Utc>>,

    pub rejected_by: Option<Uuid>,

    pub rejected_at: Option<DateTime<Utc>>,

    pub rejection_reason: Option<String>,

    #[validate(length(
        min = 1,
        max = 2000,
        message = "Description must be between 1 and 2000 characters"
    ))]
    pub description: String,

    pub scheduled_start: Option<DateTime<Utc>>,

    pub scheduled_end: Option<DateTime<Utc>>,

    pub actual_start: Option<DateTime<Utc>>,

    pub actual_end: Option<DateTime<Utc>>,

    pub actual_duration_hours: Option<f64>,

    pub completion_percentage: i32,

    pub completion_notes: Option<String>,

    pub estimated_labor_cost: f64,

    pub estimated_parts_cost: f64,

    pub estimated_external_cost: f64,

    pub estimated_total_cost: f64,

    pub actual_labor_cost: f64,

    pub actual_parts_cost: f64,

    pub actual_external_cost: f64,

    pub actual_total_cost: f64,

    pub created_by: Option<Uuid>,

    pub status_changed_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::equipment::Entity",
        from = "Column::EquipmentId",
        to = "super::equipment::Column::Id"
    )]
    Equipment,
    #[sea_orm(has_many = "super::work_order_part::Entity")]
    Parts,
    #[sea_orm(has_many = "super::work_order_schedule::Entity")]
    ScheduleLinks,
    #[sea_orm(has_many = "super::work_order_status_log::Entity")]
    StatusLogs,
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl Related<super::work_order_part::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parts.def()
    }
}

impl Related<super::work_order_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleLinks.def()
    }
}

impl Related<super::work_order_status_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusLogs.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr> {
        Ok(self)
    }
}

impl Model {
    /// True when approval gating does not block execution: either no
    /// approval is required, or an approval timestamp exists.
    pub fn approval_satisfied(&self) -> bool {
        !self.approval_required || self.approved_at.is_some()
    }
}
