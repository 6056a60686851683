use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Equipment lifecycle status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum EquipmentStatus {
    #[sea_orm(string_value = "active")]
    Active,

    #[sea_orm(string_value = "maintenance")]
    Maintenance,

    #[sea_orm(string_value = "repair")]
    Repair,

    #[sea_orm(string_value = "standby")]
    Standby,

    #[sea_orm(string_value = "retired")]
    Retired,

    #[sea_orm(string_value = "disposal")]
    Disposal,
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquipmentStatus::Active => write!(f, "active"),
            EquipmentStatus::Maintenance => write!(f, "maintenance"),
            EquipmentStatus::Repair => write!(f, "repair"),
            EquipmentStatus::Standby => write!(f, "standby"),
            EquipmentStatus::Retired => write!(f, "retired"),
            EquipmentStatus::Disposal => write!(f, "disposal"),
        }
    }
}

impl FromStr for EquipmentStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(EquipmentStatus::Active),
            "maintenance" => Ok(EquipmentStatus::Maintenance),
            "repair" => Ok(EquipmentStatus::Repair),
            "standby" => Ok(EquipmentStatus::Standby),
            "retired" => Ok(EquipmentStatus::Retired),
            "disposal" => Ok(EquipmentStatus::Disposal),
            _ => Err(ServiceError::ValidationFailed(format!(
                "unknown equipment status: {}",
                s
            ))),
        }
    }
}

impl EquipmentStatus {
    /// Equipment status transition graph. Evaluated independently of any
    /// maintenance work-order state.
    pub fn can_transition_to(self, target: EquipmentStatus) -> bool {
        use EquipmentStatus::*;
        match (self, target) {
            (Active, Maintenance) | (Active, Repair) | (Active, Standby) | (Active, Retired) => {
                true
            }

            (Maintenance, Active) | (Maintenance, Repair) | (Maintenance, Retired) => true,

            (Repair, Active) | (Repair, Maintenance) | (Repair, Retired) | (Repair, Disposal) => {
                true
            }

            (Standby, Active) | (Standby, Maintenance) | (Standby, Repair) | (Standby, Retired) => {
                true
            }

            (Retired, Disposal) => true,

            // Disposal is terminal
            _ => false,
        }
    }

    /// Non-operational statuses must not keep an operator assignment.
    pub fn requires_operator_release(self) -> bool {
        matches!(
            self,
            EquipmentStatus::Maintenance
                | EquipmentStatus::Repair
                | EquipmentStatus::Retired
                | EquipmentStatus::Disposal
        )
    }
}

/// Equipment entity model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "equipment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Asset number must be between 1 and 50 characters"
    ))]
    pub asset_number: String,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Serial number must be between 1 and 100 characters"
    ))]
    pub serial_number: String,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    pub status: EquipmentStatus,

    /// Exclusive assignment: at most one operator holds a unit at a time.
    pub assigned_operator: Option<Uuid>,

    /// Cumulative operating hours, monotonically non-decreasing.
    pub operating_hours: f64,

    /// Cumulative distance in kilometers, monotonically non-decreasing.
    pub distance_km: f64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::work_order::Entity")]
    WorkOrders,
    #[sea_orm(has_many = "super::maintenance_schedule::Entity")]
    Schedules,
    #[sea_orm(has_many = "super::equipment_status_log::Entity")]
    StatusLogs,
}

impl Related<super::work_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkOrders.def()
    }
}

impl Related<super::maintenance_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedules.def()
    }
}

impl Related<super::equipment_status_log::Entity> for Entity {
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
    /// Checks whether this unit can accept an operator assignment.
    /// Assignment requires active status and no current operator.
    pub fn check_assignable(&self) -> Result<(), ServiceError> {
        if self.status != EquipmentStatus::Active {
            return Err(ServiceError::AssignmentConflict(format!(
                "equipment {} is '{}', operators may only be assigned to active equipment",
                self.id, self.status
            )));
        }
        if let Some(current) = self.assigned_operator {
            return Err(ServiceError::AssignmentConflict(format!(
                "equipment {} is already assigned to operator {}",
                self.id, current
            )));
        }
        Ok(())
    }

    /// Validates new cumulative counter values against the monotonicity
    /// invariant. Counters never decrease.
    pub fn check_counter_update(
        &self,
        operating_hours: f64,
        distance_km: f64,
    ) -> Result<(), ServiceError> {
        if operating_hours < self.operating_hours {
            return Err(ServiceError::ValidationFailed(format!(
                "operating hours counter cannot decrease: {} -> {}",
                self.operating_hours, operating_hours
            )));
        }
        if distance_km < self.distance_km {
            return Err(ServiceError::ValidationFailed(format!(
                "distance counter cannot decrease: {} -> {}",
                self.distance_km, distance_km
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_reaches_every_non_disposal_status() {
        use EquipmentStatus::*;
        for target in [Maintenance, Repair, Standby, Retired] {
            assert!(Active.can_transition_to(target), "active -> {target}");
        }
        assert!(!Active.can_transition_to(Disposal));
    }

    #[test]
    fn disposal_is_terminal() {
        use EquipmentStatus::*;
        for target in [Active, Maintenance, Repair, Standby, Retired, Disposal] {
            assert!(!Disposal.can_transition_to(target));
        }
    }

    #[test]
    fn retired_only_reaches_disposal() {
        use EquipmentStatus::*;
        assert!(Retired.can_transition_to(Disposal));
        for target in [Active, Maintenance, Repair, Standby, Retired] {
            assert!(!Retired.can_transition_to(target));
        }
    }

    #[test]
    fn non_operational_statuses_release_operator() {
        use EquipmentStatus::*;
        assert!(Maintenance.requires_operator_release());
        assert!(Repair.requires_operator_release());
        assert!(Retired.requires_operator_release());
        assert!(Disposal.requires_operator_release());
        assert!(!Active.requires_operator_release());
        assert!(!Standby.requires_operator_release());
    }

    #[test]
    fn status_round_trips_through_from_str() {
        use EquipmentStatus::*;
        for status in [Active, Maintenance, Repair, Standby, Retired, Disposal] {
            assert_eq!(status.to_string().parse::<EquipmentStatus>().ok(), Some(status));
        }
        assert!("scrapped".parse::<EquipmentStatus>().is_err());
    }

    fn test_model(status: EquipmentStatus, operator: Option<Uuid>) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            asset_number: "EX-001".to_string(),
            serial_number: "SN-12345".to_string(),
            name: "Excavator".to_string(),
            status,
            assigned_operator: operator,
            operating_hours: 100.0,
            distance_km: 50.0,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[test]
    fn assignment_requires_active_unassigned_unit() {
        assert!(test_model(EquipmentStatus::Active, None)
            .check_assignable()
            .is_ok());

        let standby = test_model(EquipmentStatus::Standby, None);
        assert!(matches!(
            standby.check_assignable(),
            Err(ServiceError::AssignmentConflict(_))
        ));

        let taken = test_model(EquipmentStatus::Active, Some(Uuid::new_v4()));
        assert!(matches!(
            taken.check_assignable(),
            Err(ServiceError::AssignmentConflict(_))
        ));
    }

    #[test]
    fn counters_must_not_decrease() {
        let equipment = test_model(EquipmentStatus::Active, None);
        assert!(equipment.check_counter_update(100.0, 50.0).is_ok());
        assert!(equipment.check_counter_update(150.0, 80.0).is_ok());
        assert!(matches!(
            equipment.check_counter_update(99.9, 50.0),
            Err(ServiceError::ValidationFailed(_))
        ));
        assert!(matches!(
            equipment.check_counter_update(100.0, 49.0),
            Err(ServiceError::ValidationFailed(_))
        ));
    }
}
