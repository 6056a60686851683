use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::Deserialize;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::equipment::{self, EquipmentStatus},
    entities::equipment_status_log,
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Service enforcing equipment-level invariants: the equipment status
/// transition graph, exclusive operator assignment, and monotonic usage
/// counters.
#[derive(Debug, Clone)]
pub struct EquipmentService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEquipmentInput {
    #[validate(length(min = 1, max = 50))]
    pub asset_number: String,
    #[validate(length(min = 1, max = 100))]
    pub serial_number: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

impl EquipmentService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self), err)]
    pub async fn create_equipment(
        &self,
        input: CreateEquipmentInput,
    ) -> Result<equipment::Model, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let model = equipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            asset_number: Set(input.asset_number),
            serial_number: Set(input.serial_number),
            name: Set(input.name),
            status: Set(EquipmentStatus::Active),
            assigned_operator: Set(None),
            operating_hours: Set(0.0),
            distance_km: Set(0.0),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        };

        let created = model.insert(self.db.as_ref()).await?;
        self.emit(Event::EquipmentCreated(created.id)).await?;
        Ok(created)
    }

    #[instrument(skip(self), err)]
    pub async fn get_equipment(&self, id: Uuid) -> Result<equipment::Model, ServiceError> {
        equipment::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("equipment {} not found", id)))
    }

    /// Changes the equipment's lifecycle status.
    ///
    /// Entering a non-operational status clears the operator assignment in
    /// the same transaction, and every change appends a status log row.
    #[instrument(skip(self), fields(equipment_id = %equipment_id, target = %target), err)]
    pub async fn change_status(
        &self,
        equipment_id: Uuid,
        target: EquipmentStatus,
        reason: Option<String>,
        changed_by: Option<Uuid>,
    ) -> Result<equipment::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let current = equipment::Entity::find_by_id(equipment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("equipment {} not found", equipment_id)))?;

        let from = current.status;
        if !from.can_transition_to(target) {
            error!("invalid equipment status transition {} -> {}", from, target);
            return Err(ServiceError::invalid_transition(from, target));
        }

        let operator_released = target.requires_operator_release() && current.assigned_operator.is_some();
        let expected_version = current.version;
        let now = Utc::now();

        let update = equipment::ActiveModel {
            status: Set(target),
            assigned_operator: Set(if target.requires_operator_release() {
                None
            } else {
                current.assigned_operator
            }),
            updated_at: Set(now),
            version: Set(expected_version + 1),
            ..Default::default()
        };

        let result = equipment::Entity::update_many()
            .set(update)
            .filter(equipment::Column::Id.eq(equipment_id))
            .filter(equipment::Column::Version.eq(expected_version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(equipment_id));
        }

        equipment_status_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            equipment_id: Set(equipment_id),
            from_status: Set(from),
            to_status: Set(target),
            changed_by: Set(changed_by),
            reason: Set(reason),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(
            "equipment {} status changed from '{}' to '{}'",
            equipment_id, from, target
        );
        self.emit(Event::EquipmentStatusChanged {
            equipment_id,
            old_status: from.to_string(),
            new_status: target.to_string(),
        })
        .await?;
        if operator_released {
            self.emit(Event::EquipmentOperatorUnassigned { equipment_id })
                .await?;
        }

        self.get_equipment(equipment_id).await
    }

    /// Assigns an operator to an active, unassigned unit. Assignment is
    /// exclusive; conflicting requests fail instead of silently reassigning.
    #[instrument(skip(self), err)]
    pub async fn assign_operator(
        &self,
        equipment_id: Uuid,
        operator_id: Uuid,
    ) -> Result<equipment::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let current = equipment::Entity::find_by_id(equipment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("equipment {} not found", equipment_id)))?;

        current.check_assignable()?;

        let expected_version = current.version;
        let update = equipment::ActiveModel {
            assigned_operator: Set(Some(operator_id)),
            updated_at: Set(Utc::now()),
            version: Set(expected_version + 1),
            ..Default::default()
        };

        let result = equipment::Entity::update_many()
            .set(update)
            .filter(equipment::Column::Id.eq(equipment_id))
            .filter(equipment::Column::Version.eq(expected_version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(equipment_id));
        }

        txn.commit().await?;

        self.emit(Event::EquipmentOperatorAssigned {
            equipment_id,
            operator_id,
        })
        .await?;

        self.get_equipment(equipment_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn unassign_operator(
        &self,
        equipment_id: Uuid,
    ) -> Result<equipment::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let current = equipment::Entity::find_by_id(equipment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("equipment {} not found", equipment_id)))?;

        let expected_version = current.version;
        let update = equipment::ActiveModel {
            assigned_operator: Set(None),
            updated_at: Set(Utc::now()),
            version: Set(expected_version + 1),
            ..Default::default()
        };

        let result = equipment::Entity::update_many()
            .set(update)
            .filter(equipment::Column::Id.eq(equipment_id))
            .filter(equipment::Column::Version.eq(expected_version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(equipment_id));
        }

        txn.commit().await?;

        self.emit(Event::EquipmentOperatorUnassigned { equipment_id })
            .await?;

        self.get_equipment(equipment_id).await
    }

    /// Records new cumulative usage counters. Counters are append-only:
    /// a value below the current reading is rejected as a data anomaly.
    #[instrument(skip(self), err)]
    pub async fn record_usage(
        &self,
        equipment_id: Uuid,
        operating_hours: f64,
        distance_km: f64,
    ) -> Result<equipment::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let current = equipment::Entity::find_by_id(equipment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("equipment {} not found", equipment_id)))?;

        current.check_counter_update(operating_hours, distance_km)?;

        let expected_version = current.version;
        let update = equipment::ActiveModel {
            operating_hours: Set(operating_hours),
            distance_km: Set(distance_km),
            updated_at: Set(Utc::now()),
            version: Set(expected_version + 1),
            ..Default::default()
        };

        let result = equipment::Entity::update_many()
            .set(update)
            .filter(equipment::Column::Id.eq(equipment_id))
            .filter(equipment::Column::Version.eq(expected_version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(equipment_id));
        }

        txn.commit().await?;

        self.emit(Event::EquipmentUsageRecorded {
            equipment_id,
            operating_hours,
            distance_km,
        })
        .await?;

        self.get_equipment(equipment_id).await
    }

    /// Status history for a unit, oldest first.
    #[instrument(skip(self), err)]
    pub async fn status_history(
        &self,
        equipment_id: Uuid,
    ) -> Result<Vec<equipment_status_log::Model>, ServiceError> {
        use sea_orm::QueryOrder;

        let logs = equipment_status_log::Entity::find()
            .filter(equipment_status_log::Column::EquipmentId.eq(equipment_id))
            .order_by_asc(equipment_status_log::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(logs)
    }

    async fn emit(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }
}
