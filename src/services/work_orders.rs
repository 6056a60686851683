use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::MaintenancePolicy,
    db::DbPool,
    entities::equipment,
    entities::work_order::{self, MaintenanceType, PriorityLevel, WorkOrderStatus},
    entities::work_order_part,
    entities::work_order_schedule,
    entities::work_order_status_log,
    errors::ServiceError,
    events::{Event, EventSender},
    services::costing::{self, VarianceReport},
    services::schedules,
};

/// Service driving the work-order lifecycle: creation with approval routing,
/// the status state machine with its per-state side effects, part and cost
/// bookkeeping, and schedule fulfillment on completion.
#[derive(Debug, Clone)]
pub struct WorkOrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    policy: MaintenancePolicy,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWorkOrderInput {
    #[validate(length(min = 1, max = 50))]
    pub work_order_number: String,
    pub equipment_id: Uuid,
    pub maintenance_type: MaintenanceType,
    pub priority: PriorityLevel,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    #[validate(range(min = 0.0))]
    pub estimated_labor_cost: f64,
    #[validate(range(min = 0.0))]
    pub estimated_parts_cost: f64,
    #[validate(range(min = 0.0))]
    pub estimated_external_cost: f64,
    /// Schedules this work order fulfills when completed.
    pub schedule_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
}

/// Caller context for a status transition. Which fields are required depends
/// on the target status; the service rejects transitions with missing context
/// before mutating anything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionInput {
    pub actor: Option<Uuid>,
    pub reason: Option<String>,
    pub completion_notes: Option<String>,
    pub completion_percentage: Option<i32>,
    /// End timestamp for completion; stamped with the current time if the
    /// caller omits it.
    pub actual_end: Option<DateTime<Utc>>,
    /// Version observed by the caller when it last read the work order.
    /// When set, the write fails with `ConcurrentModification` if another
    /// mutation landed in between.
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PartLineInput {
    #[validate(length(min = 1, max = 50))]
    pub part_number: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub quantity_used: f64,
    pub unit_cost: f64,
    pub total_cost: f64,
    pub warranty_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_critical: bool,
}

impl WorkOrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, policy: MaintenancePolicy) -> Self {
        Self {
            db,
            event_sender,
            policy,
        }
    }

    /// Creates a work order. The approval requirement is computed once, here,
    /// from type, priority and estimated cost; orders that need approval
    /// start in `pending_approval` instead of `scheduled`.
    #[instrument(skip(self, input), fields(number = %input.work_order_number), err)]
    pub async fn create_work_order(
        &self,
        input: CreateWorkOrderInput,
    ) -> Result<work_order::Model, ServiceError> {
        input.validate()?;

        let estimated_total = costing::reconcile(
            input.estimated_labor_cost,
            input.estimated_external_cost,
            &[input.estimated_parts_cost],
        )
        .total_cost;

        let approval_required = work_order::requires_approval(
            input.maintenance_type,
            input.priority,
            estimated_total,
            self.policy.approval_cost_threshold,
        );
        let initial_status = if approval_required {
            WorkOrderStatus::PendingApproval
        } else {
            WorkOrderStatus::Scheduled
        };

        let txn = self.db.begin().await?;

        equipment::Entity::find_by_id(input.equipment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("equipment {} not found", input.equipment_id))
            })?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let model = work_order::ActiveModel {
            id: Set(id),
            work_order_number: Set(input.work_order_number),
            equipment_id: Set(input.equipment_id),
            maintenance_type: Set(input.maintenance_type),
            priority: Set(input.priority),
            status: Set(initial_status),
            approval_required: Set(approval_required),
            approved_by: Set(None),
            approved_at: Set(None),
            rejected_by: Set(None),
            rejected_at: Set(None),
            rejection_reason: Set(None),
            description: Set(input.description),
            scheduled_start: Set(input.scheduled_start),
            scheduled_end: Set(input.scheduled_end),
            actual_start: Set(None),
            actual_end: Set(None),
            actual_duration_hours: Set(None),
            completion_percentage: Set(0),
            completion_notes: Set(None),
            estimated_labor_cost: Set(input.estimated_labor_cost),
            estimated_parts_cost: Set(input.estimated_parts_cost),
            estimated_external_cost: Set(input.estimated_external_cost),
            estimated_total_cost: Set(estimated_total),
            actual_labor_cost: Set(0.0),
            actual_parts_cost: Set(0.0),
            actual_external_cost: Set(0.0),
            actual_total_cost: Set(0.0),
            created_by: Set(input.created_by),
            status_changed_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        };
        let created = model.insert(&txn).await?;

        for schedule_id in &input.schedule_ids {
            crate::entities::maintenance_schedule::Entity::find_by_id(*schedule_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("schedule {} not found", schedule_id))
                })?;
            work_order_schedule::ActiveModel {
                work_order_id: Set(id),
                schedule_id: Set(*schedule_id),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(
            "work order {} created with status '{}', approval_required={}",
            id, initial_status, approval_required
        );
        self.emit(Event::WorkOrderCreated(id)).await?;
        Ok(created)
    }

    #[instrument(skip(self), err)]
    pub async fn get_work_order(&self, id: Uuid) -> Result<work_order::Model, ServiceError> {
        work_order::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("work order {} not found", id)))
    }

    #[instrument(skip(self), err)]
    pub async fn get_parts(
        &self,
        work_order_id: Uuid,
    ) -> Result<Vec<work_order_part::Model>, ServiceError> {
        let parts = work_order_part::Entity::find()
            .filter(work_order_part::Column::WorkOrderId.eq(work_order_id))
            .order_by_asc(work_order_part::Column::PartNumber)
            .all(self.db.as_ref())
            .await?;
        Ok(parts)
    }

    #[instrument(skip(self), err)]
    pub async fn list_by_status(
        &self,
        status: WorkOrderStatus,
    ) -> Result<Vec<work_order::Model>, ServiceError> {
        let orders = work_order::Entity::find()
            .filter(work_order::Column::Status.eq(status))
            .order_by_asc(work_order::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(orders)
    }

    /// Status history for a work order, oldest first.
    #[instrument(skip(self), err)]
    pub async fn status_history(
        &self,
        work_order_id: Uuid,
    ) -> Result<Vec<work_order_status_log::Model>, ServiceError> {
        let logs = work_order_status_log::Entity::find()
            .filter(work_order_status_log::Column::WorkOrderId.eq(work_order_id))
            .order_by_asc(work_order_status_log::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(logs)
    }

    /// Drives the work order through one status transition.
    ///
    /// The transition table is checked first; then the target-specific
    /// requirements (approval gates, required context fields) are enforced,
    /// and the target's side effects are applied in the same transaction as
    /// the status write. On any error the order is left untouched.
    #[instrument(skip(self, input), fields(work_order_id = %work_order_id, target = %target), err)]
    pub async fn transition(
        &self,
        work_order_id: Uuid,
        target: WorkOrderStatus,
        input: TransitionInput,
    ) -> Result<work_order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let current = work_order::Entity::find_by_id(work_order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("work order {} not found", work_order_id))
            })?;

        let from = current.status;
        if !from.can_transition_to(target) {
            error!("invalid work order transition {} -> {}", from, target);
            return Err(ServiceError::invalid_transition(from, target));
        }

        let now = Utc::now();
        let expected_version = input.expected_version.unwrap_or(current.version);
        let mut update = work_order::ActiveModel {
            status: Set(target),
            status_changed_at: Set(now),
            updated_at: Set(now),
            version: Set(expected_version + 1),
            ..Default::default()
        };

        let mut fulfilled_schedules: Vec<Uuid> = Vec::new();
        let mut completed_at: Option<DateTime<Utc>> = None;

        match target {
            WorkOrderStatus::InProgress => {
                if !current.approval_satisfied() {
                    return Err(ServiceError::ApprovalRequired(format!(
                        "work order {} requires approval before execution",
                        work_order_id
                    )));
                }
                if current.actual_start.is_none() {
                    update.actual_start = Set(Some(now));
                }
            }
            WorkOrderStatus::Completed => {
                if !current.approval_satisfied() {
                    return Err(ServiceError::ApprovalRequired(format!(
                        "work order {} requires approval before completion",
                        work_order_id
                    )));
                }
                let notes = input
                    .completion_notes
                    .clone()
                    .or_else(|| current.completion_notes.clone());
                let notes = match notes {
                    Some(n) if !n.trim().is_empty() => n,
                    _ => {
                        return Err(ServiceError::ValidationFailed(
                            "completion notes are required to complete a work order".to_string(),
                        ))
                    }
                };
                let percentage = input
                    .completion_percentage
                    .unwrap_or(current.completion_percentage);
                if percentage != 100 {
                    return Err(ServiceError::ValidationFailed(format!(
                        "completion percentage must be 100, got {}",
                        percentage
                    )));
                }

                let ended_at = input.actual_end.unwrap_or(now);
                update.completion_notes = Set(Some(notes));
                update.completion_percentage = Set(100);
                update.actual_end = Set(Some(ended_at));
                if let Some(started) = current.actual_start {
                    let hours = (ended_at - started).num_seconds() as f64 / 3600.0;
                    update.actual_duration_hours = Set(Some(hours.max(0.0)));
                }

                // Actual costs are recomputed from the recorded part lines so
                // the persisted aggregate can never drift from its inputs.
                let part_totals: Vec<f64> = work_order_part::Entity::find()
                    .filter(work_order_part::Column::WorkOrderId.eq(work_order_id))
                    .all(&txn)
                    .await?
                    .iter()
                    .map(|p| p.total_cost)
                    .collect();
                let summary = costing::reconcile(
                    current.actual_labor_cost,
                    current.actual_external_cost,
                    &part_totals,
                );
                update.actual_parts_cost = Set(summary.parts_cost);
                update.actual_total_cost = Set(summary.total_cost);

                let unit = equipment::Entity::find_by_id(current.equipment_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "equipment {} not found",
                            current.equipment_id
                        ))
                    })?;

                let links = work_order_schedule::Entity::find()
                    .filter(work_order_schedule::Column::WorkOrderId.eq(work_order_id))
                    .all(&txn)
                    .await?;
                for link in links {
                    schedules::fulfill_in_txn(
                        &txn,
                        link.schedule_id,
                        ended_at,
                        Some(unit.operating_hours),
                        Some(unit.distance_km),
                    )
                    .await?;
                    fulfilled_schedules.push(link.schedule_id);
                }
                completed_at = Some(ended_at);
            }
            WorkOrderStatus::Approved => {
                let approver = input.actor.ok_or_else(|| {
                    ServiceError::ValidationFailed(
                        "an approver is required to approve a work order".to_string(),
                    )
                })?;
                update.approved_by = Set(Some(approver));
                update.approved_at = Set(Some(now));
            }
            WorkOrderStatus::Rejected => {
                let rejector = input.actor.ok_or_else(|| {
                    ServiceError::ValidationFailed(
                        "a rejector is required to reject a work order".to_string(),
                    )
                })?;
                let reason = match input.reason.as_deref() {
                    Some(r) if !r.trim().is_empty() => r.to_string(),
                    _ => {
                        return Err(ServiceError::ValidationFailed(
                            "a non-empty reason is required to reject a work order".to_string(),
                        ))
                    }
                };
                update.rejected_by = Set(Some(rejector));
                update.rejected_at = Set(Some(now));
                update.rejection_reason = Set(Some(reason));
            }
            WorkOrderStatus::PendingApproval => {
                // Resubmission clears the rejection trail from the previous
                // review round.
                update.rejected_by = Set(None);
                update.rejected_at = Set(None);
                update.rejection_reason = Set(None);
            }
            WorkOrderStatus::OnHold | WorkOrderStatus::Cancelled => {
                // The reason is appended to the description, never replacing
                // the original scope of work.
                if let Some(reason) = input.reason.as_deref() {
                    if !reason.trim().is_empty() {
                        update.description =
                            Set(format!("{}\n[{}] {}", current.description, target, reason));
                    }
                }
            }
            WorkOrderStatus::Scheduled => {}
        }

        let result = work_order::Entity::update_many()
            .set(update)
            .filter(work_order::Column::Id.eq(work_order_id))
            .filter(work_order::Column::Version.eq(expected_version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(work_order_id));
        }

        work_order_status_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            work_order_id: Set(work_order_id),
            from_status: Set(from),
            to_status: Set(target),
            changed_by: Set(input.actor),
            reason: Set(input.reason),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(
            "work order {} status changed from '{}' to '{}'",
            work_order_id, from, target
        );
        self.emit(Event::WorkOrderStatusChanged {
            work_order_id,
            old_status: from.to_string(),
            new_status: target.to_string(),
        })
        .await?;
        if let Some(completed_at) = completed_at {
            self.emit(Event::WorkOrderCompleted(work_order_id)).await?;
            for schedule_id in fulfilled_schedules {
                self.emit(Event::ScheduleFulfilled {
                    schedule_id,
                    completed_at,
                })
                .await?;
            }
        }

        self.get_work_order(work_order_id).await
    }

    /// Replaces the work order's part list. Every line is validated before
    /// any row changes; the aggregate parts and total costs are reconciled in
    /// the same transaction.
    #[instrument(skip(self, lines), fields(work_order_id = %work_order_id, lines = lines.len()), err)]
    pub async fn update_parts(
        &self,
        work_order_id: Uuid,
        lines: Vec<PartLineInput>,
    ) -> Result<Vec<work_order_part::Model>, ServiceError> {
        for line in &lines {
            line.validate()?;
            costing::validate_part_line(
                &line.part_number,
                line.quantity_used,
                line.unit_cost,
                line.total_cost,
            )?;
        }

        let txn = self.db.begin().await?;

        let current = work_order::Entity::find_by_id(work_order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("work order {} not found", work_order_id))
            })?;

        work_order_part::Entity::delete_many()
            .filter(work_order_part::Column::WorkOrderId.eq(work_order_id))
            .exec(&txn)
            .await?;

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(lines.len());
        for line in lines {
            let part = work_order_part::ActiveModel {
                id: Set(Uuid::new_v4()),
                work_order_id: Set(work_order_id),
                part_number: Set(line.part_number),
                name: Set(line.name),
                quantity_used: Set(line.quantity_used),
                unit_cost: Set(line.unit_cost),
                total_cost: Set(line.total_cost),
                warranty_expires_at: Set(line.warranty_expires_at),
                is_critical: Set(line.is_critical),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
            inserted.push(part);
        }

        let part_totals: Vec<f64> = inserted.iter().map(|p| p.total_cost).collect();
        let summary = costing::reconcile(
            current.actual_labor_cost,
            current.actual_external_cost,
            &part_totals,
        );

        let expected_version = current.version;
        let update = work_order::ActiveModel {
            actual_parts_cost: Set(summary.parts_cost),
            actual_total_cost: Set(summary.total_cost),
            updated_at: Set(now),
            version: Set(expected_version + 1),
            ..Default::default()
        };
        let result = work_order::Entity::update_many()
            .set(update)
            .filter(work_order::Column::Id.eq(work_order_id))
            .filter(work_order::Column::Version.eq(expected_version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(work_order_id));
        }

        txn.commit().await?;

        self.emit(Event::WorkOrderPartsUpdated {
            work_order_id,
            parts_cost: summary.parts_cost,
        })
        .await?;
        Ok(inserted)
    }

    /// Updates the actual labor and external cost components, keeping the
    /// aggregate total reconciled against the current part lines.
    #[instrument(skip(self), err)]
    pub async fn update_costs(
        &self,
        work_order_id: Uuid,
        actual_labor_cost: Option<f64>,
        actual_external_cost: Option<f64>,
    ) -> Result<work_order::Model, ServiceError> {
        if actual_labor_cost.map_or(false, |c| c < 0.0)
            || actual_external_cost.map_or(false, |c| c < 0.0)
        {
            return Err(ServiceError::ValidationFailed(
                "actual costs must be non-negative".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let current = work_order::Entity::find_by_id(work_order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("work order {} not found", work_order_id))
            })?;

        let labor = actual_labor_cost.unwrap_or(current.actual_labor_cost);
        let external = actual_external_cost.unwrap_or(current.actual_external_cost);

        let part_totals: Vec<f64> = work_order_part::Entity::find()
            .filter(work_order_part::Column::WorkOrderId.eq(work_order_id))
            .all(&txn)
            .await?
            .iter()
            .map(|p| p.total_cost)
            .collect();
        let summary = costing::reconcile(labor, external, &part_totals);

        let expected_version = current.version;
        let update = work_order::ActiveModel {
            actual_labor_cost: Set(summary.labor_cost),
            actual_external_cost: Set(summary.external_cost),
            actual_parts_cost: Set(summary.parts_cost),
            actual_total_cost: Set(summary.total_cost),
            updated_at: Set(Utc::now()),
            version: Set(expected_version + 1),
            ..Default::default()
        };
        let result = work_order::Entity::update_many()
            .set(update)
            .filter(work_order::Column::Id.eq(work_order_id))
            .filter(work_order::Column::Version.eq(expected_version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(work_order_id));
        }

        txn.commit().await?;
        self.get_work_order(work_order_id).await
    }

    /// Estimated-vs-actual variance for a work order. Derived on demand,
    /// never persisted.
    #[instrument(skip(self), err)]
    pub async fn cost_report(&self, work_order_id: Uuid) -> Result<VarianceReport, ServiceError> {
        let order = self.get_work_order(work_order_id).await?;
        Ok(costing::variance_report(
            order.estimated_total_cost,
            order.actual_total_cost,
        ))
    }

    async fn emit(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }
}
