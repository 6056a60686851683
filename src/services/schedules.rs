use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::MaintenancePolicy,
    db::DbPool,
    entities::equipment,
    entities::maintenance_schedule::{self, DueStatus, ScheduleType},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Service owning recurring maintenance schedules: creation-time validation,
/// due evaluation against equipment counters, and fulfillment bookkeeping
/// when linked work orders complete.
#[derive(Debug, Clone)]
pub struct MaintenanceScheduleService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    policy: MaintenancePolicy,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateScheduleInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub equipment_id: Option<Uuid>,
    pub equipment_type: Option<String>,
    pub schedule_type: ScheduleType,
    pub interval_days: Option<i32>,
    pub interval_hours: Option<f64>,
    pub interval_kilometers: Option<f64>,
    pub interval_cycles: Option<i32>,
    pub tolerance_days: Option<i32>,
    pub tolerance_hours: Option<f64>,
    pub tolerance_kilometers: Option<f64>,
    /// Optional seed snapshot for equipment with prior maintenance history.
    pub last_performed_at: Option<DateTime<Utc>>,
    pub last_performed_hours: Option<f64>,
    pub last_performed_kilometers: Option<f64>,
    pub created_by: Option<Uuid>,
}

impl MaintenanceScheduleService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, policy: MaintenancePolicy) -> Self {
        Self {
            db,
            event_sender,
            policy,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn create_schedule(
        &self,
        input: CreateScheduleInput,
    ) -> Result<maintenance_schedule::Model, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let mut model = maintenance_schedule::Model {
            id: Uuid::new_v4(),
            name: input.name,
            equipment_id: input.equipment_id,
            equipment_type: input.equipment_type,
            schedule_type: input.schedule_type,
            interval_days: input.interval_days,
            interval_hours: input.interval_hours,
            interval_kilometers: input.interval_kilometers,
            interval_cycles: input.interval_cycles,
            tolerance_days: input.tolerance_days,
            tolerance_hours: input.tolerance_hours,
            tolerance_kilometers: input.tolerance_kilometers,
            last_performed_at: input.last_performed_at,
            last_performed_hours: input.last_performed_hours,
            last_performed_kilometers: input.last_performed_kilometers,
            next_due_date: None,
            next_due_hours: None,
            next_due_kilometers: None,
            is_active: true,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        model.validate_definition()?;
        model.recompute_next_due();

        if let Some(equipment_id) = model.equipment_id {
            equipment::Entity::find_by_id(equipment_id)
                .one(self.db.as_ref())
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("equipment {} not found", equipment_id))
                })?;
        }

        let active: maintenance_schedule::ActiveModel = to_insert_model(&model);
        let created = active.insert(self.db.as_ref()).await?;

        self.emit(Event::ScheduleCreated(created.id)).await?;
        Ok(created)
    }

    #[instrument(skip(self), err)]
    pub async fn get_schedule(
        &self,
        id: Uuid,
    ) -> Result<maintenance_schedule::Model, ServiceError> {
        maintenance_schedule::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("schedule {} not found", id)))
    }

    /// Evaluates due / overdue / due-soon for a schedule as of a point in
    /// time, reading the bound equipment's current counters.
    ///
    /// Type-bound schedules carry no equipment context of their own and
    /// cannot be evaluated through this entry point.
    #[instrument(skip(self), err)]
    pub async fn evaluate(
        &self,
        schedule_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<DueStatus, ServiceError> {
        let schedule = self.get_schedule(schedule_id).await?;

        let equipment_id = schedule.equipment_id.ok_or_else(|| {
            ServiceError::ConfigurationError(format!(
                "schedule {} is bound to an equipment type; evaluate it against a specific unit",
                schedule_id
            ))
        })?;

        let unit = equipment::Entity::find_by_id(equipment_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("equipment {} not found", equipment_id)))?;

        schedule.evaluate_due(
            unit.operating_hours,
            unit.distance_km,
            as_of,
            self.policy.advance_notice_days,
        )
    }

    /// Records a maintenance fulfillment: snapshots the completion time and
    /// counters, then rolls every configured metric forward by its interval.
    #[instrument(skip(self), err)]
    pub async fn fulfill(
        &self,
        schedule_id: Uuid,
        completed_at: DateTime<Utc>,
        operating_hours: Option<f64>,
        distance_km: Option<f64>,
    ) -> Result<maintenance_schedule::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let updated =
            fulfill_in_txn(&txn, schedule_id, completed_at, operating_hours, distance_km).await?;
        txn.commit().await?;

        self.emit(Event::ScheduleFulfilled {
            schedule_id,
            completed_at,
        })
        .await?;
        Ok(updated)
    }

    /// All active, equipment-bound schedules whose due state is reached as of
    /// the given time. Usage metrics need the current equipment counters, so
    /// each candidate is evaluated against its unit.
    #[instrument(skip(self), err)]
    pub async fn find_due(
        &self,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<(maintenance_schedule::Model, DueStatus)>, ServiceError> {
        let schedules = maintenance_schedule::Entity::find()
            .filter(maintenance_schedule::Column::IsActive.eq(true))
            .filter(maintenance_schedule::Column::EquipmentId.is_not_null())
            .all(self.db.as_ref())
            .await?;

        let mut due = Vec::new();
        for schedule in schedules {
            let equipment_id = match schedule.equipment_id {
                Some(id) => id,
                None => continue,
            };
            let unit = match equipment::Entity::find_by_id(equipment_id)
                .one(self.db.as_ref())
                .await?
            {
                Some(unit) => unit,
                None => continue,
            };
            let status = schedule.evaluate_due(
                unit.operating_hours,
                unit.distance_km,
                as_of,
                self.policy.advance_notice_days,
            )?;
            if status.is_due {
                due.push((schedule, status));
            }
        }
        Ok(due)
    }

    async fn emit(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }
}

/// Fulfillment body shared with the work-order completion path, which runs
/// it inside its own transaction.
pub(crate) async fn fulfill_in_txn<C: sea_orm::ConnectionTrait>(
    conn: &C,
    schedule_id: Uuid,
    completed_at: DateTime<Utc>,
    operating_hours: Option<f64>,
    distance_km: Option<f64>,
) -> Result<maintenance_schedule::Model, ServiceError> {
    let mut schedule = maintenance_schedule::Entity::find_by_id(schedule_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("schedule {} not found", schedule_id)))?;

    let expected_version = schedule.version;
    schedule.apply_fulfillment(completed_at, operating_hours, distance_km);
    schedule.version = expected_version + 1;

    let update = maintenance_schedule::ActiveModel {
        last_performed_at: Set(schedule.last_performed_at),
        last_performed_hours: Set(schedule.last_performed_hours),
        last_performed_kilometers: Set(schedule.last_performed_kilometers),
        next_due_date: Set(schedule.next_due_date),
        next_due_hours: Set(schedule.next_due_hours),
        next_due_kilometers: Set(schedule.next_due_kilometers),
        updated_at: Set(schedule.updated_at),
        version: Set(schedule.version),
        ..Default::default()
    };

    let result = maintenance_schedule::Entity::update_many()
        .set(update)
        .filter(maintenance_schedule::Column::Id.eq(schedule_id))
        .filter(maintenance_schedule::Column::Version.eq(expected_version))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(schedule_id));
    }

    info!(
        schedule_id = %schedule_id,
        ?completed_at,
        "schedule fulfilled, next due targets recomputed"
    );
    Ok(schedule)
}

fn to_insert_model(model: &maintenance_schedule::Model) -> maintenance_schedule::ActiveModel {
    maintenance_schedule::ActiveModel {
        id: Set(model.id),
        name: Set(model.name.clone()),
        equipment_id: Set(model.equipment_id),
        equipment_type: Set(model.equipment_type.clone()),
        schedule_type: Set(model.schedule_type),
        interval_days: Set(model.interval_days),
        interval_hours: Set(model.interval_hours),
        interval_kilometers: Set(model.interval_kilometers),
        interval_cycles: Set(model.interval_cycles),
        tolerance_days: Set(model.tolerance_days),
        tolerance_hours: Set(model.tolerance_hours),
        tolerance_kilometers: Set(model.tolerance_kilometers),
        last_performed_at: Set(model.last_performed_at),
        last_performed_hours: Set(model.last_performed_hours),
        last_performed_kilometers: Set(model.last_performed_kilometers),
        next_due_date: Set(model.next_due_date),
        next_due_hours: Set(model.next_due_hours),
        next_due_kilometers: Set(model.next_due_kilometers),
        is_active: Set(model.is_active),
        created_by: Set(model.created_by),
        created_at: Set(model.created_at),
        updated_at: Set(model.updated_at),
        version: Set(model.version),
    }
}
