use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

/// Recurring maintenance schedule type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ScheduleType {
    #[sea_orm(string_value = "time_based")]
    TimeBased,

    #[sea_orm(string_value = "hour_based")]
    HourBased,

    #[sea_orm(string_value = "mileage_based")]
    MileageBased,

    #[sea_orm(string_value = "cycle_based")]
    CycleBased,

    #[sea_orm(string_value = "condition_based")]
    ConditionBased,

    #[sea_orm(string_value = "calendar_based")]
    CalendarBased,
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleType::TimeBased => write!(f, "time_based"),
            ScheduleType::HourBased => write!(f, "hour_based"),
            ScheduleType::MileageBased => write!(f, "mileage_based"),
            ScheduleType::CycleBased => write!(f, "cycle_based"),
            ScheduleType::ConditionBased => write!(f, "condition_based"),
            ScheduleType::CalendarBased => write!(f, "calendar_based"),
        }
    }
}

impl FromStr for ScheduleType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "time_based" | "time" => Ok(ScheduleType::TimeBased),
            "hour_based" | "hours" => Ok(ScheduleType::HourBased),
            "mileage_based" | "mileage" => Ok(ScheduleType::MileageBased),
            "cycle_based" | "cycles" => Ok(ScheduleType::CycleBased),
            "condition_based" | "condition" => Ok(ScheduleType::ConditionBased),
            "calendar_based" | "calendar" => Ok(ScheduleType::CalendarBased),
            _ => Err(ServiceError::ValidationFailed(format!(
                "unknown schedule type: {}",
                s
            ))),
        }
    }
}

/// Due state of a schedule across its configured metrics, evaluated on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueStatus {
    pub is_due: bool,
    pub is_overdue: bool,
    pub is_due_soon: bool,
}

/// Maintenance schedule entity model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "maintenance_schedules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    /// Bound to exactly one equipment unit, or ...
    pub equipment_id: Option<Uuid>,

    /// ... exactly one equipment type. Never both, never neither.
    pub equipment_type: Option<String>,

    pub schedule_type: ScheduleType,

    pub interval_days: Option<i32>,

    pub interval_hours: Option<f64>,

    pub interval_kilometers: Option<f64>,

    pub interval_cycles: Option<i32>,

    pub tolerance_days: Option<i32>,

    pub tolerance_hours: Option<f64>,

    pub tolerance_kilometers: Option<f64>,

    /// Snapshot taken when a linked work order last completed.
    pub last_performed_at: Option<DateTime<Utc>>,

    pub last_performed_hours: Option<f64>,

    pub last_performed_kilometers: Option<f64>,

    pub next_due_date: Option<DateTime<Utc>>,

    pub next_due_hours: Option<f64>,

    pub next_due_kilometers: Option<f64>,

    pub is_active: bool,

    pub created_by: Option<Uuid>,

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
    #[sea_orm(has_many = "super::work_order_schedule::Entity")]
    WorkOrderLinks,
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl Related<super::work_order_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkOrderLinks.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr> {
        Ok(self)
    }
}

fn require_positive_i32(value: Option<i32>, field: &str) -> Result<(), ServiceError> {
    match value {
        Some(v) if v <= 0 => Err(ServiceError::ConfigurationError(format!(
            "{} must be positive, got {}",
            field, v
        ))),
        _ => Ok(()),
    }
}

fn require_positive_f64(value: Option<f64>, field: &str) -> Result<(), ServiceError> {
    match value {
        Some(v) if v <= 0.0 => Err(ServiceError::ConfigurationError(format!(
            "{} must be positive, got {}",
            field, v
        ))),
        _ => Ok(()),
    }
}

impl Model {
    /// Validates the schedule definition at creation time.
    ///
    /// Binding is exclusive (equipment XOR equipment type), every supplied
    /// interval must be positive, and the schedule type's primary interval
    /// must be present.
    pub fn validate_definition(&self) -> Result<(), ServiceError> {
        match (&self.equipment_id, &self.equipment_type) {
            (Some(_), Some(_)) => {
                return Err(ServiceError::ConfigurationError(
                    "schedule must be bound to an equipment unit or an equipment type, not both"
                        .to_string(),
                ))
            }
            (None, None) => {
                return Err(ServiceError::ConfigurationError(
                    "schedule must be bound to an equipment unit or an equipment type".to_string(),
                ))
            }
            _ => {}
        }

        require_positive_i32(self.interval_days, "interval_days")?;
        require_positive_f64(self.interval_hours, "interval_hours")?;
        require_positive_f64(self.interval_kilometers, "interval_kilometers")?;
        require_positive_i32(self.interval_cycles, "interval_cycles")?;
        require_positive_i32(self.tolerance_days, "tolerance_days")?;
        require_positive_f64(self.tolerance_hours, "tolerance_hours")?;
        require_positive_f64(self.tolerance_kilometers, "tolerance_kilometers")?;

        let missing = match self.schedule_type {
            ScheduleType::TimeBased | ScheduleType::CalendarBased => {
                self.interval_days.is_none().then_some("interval_days")
            }
            ScheduleType::HourBased => self.interval_hours.is_none().then_some("interval_hours"),
            ScheduleType::MileageBased => self
                .interval_kilometers
                .is_none()
                .then_some("interval_kilometers"),
            ScheduleType::CycleBased => self.interval_cycles.is_none().then_some("interval_cycles"),
            // Condition-based schedules are triggered externally
            ScheduleType::ConditionBased => None,
        };
        if let Some(field) = missing {
            return Err(ServiceError::ConfigurationError(format!(
                "schedule type '{}' requires {}",
                self.schedule_type, field
            )));
        }

        Ok(())
    }

    /// Decides due / due-soon / overdue for the current equipment counters.
    ///
    /// Metrics are evaluated independently and OR-combined: any one metric
    /// reaching its threshold marks the schedule due. A metric with no
    /// computed `next_due_*` target contributes nothing; in particular a
    /// schedule that has never been performed has no calendar target.
    pub fn evaluate_due(
        &self,
        operating_hours: f64,
        distance_km: f64,
        as_of: DateTime<Utc>,
        advance_notice_days: i64,
    ) -> Result<DueStatus, ServiceError> {
        // A counter below the last-performed snapshot means the source data
        // went backwards. Reject instead of silently reporting "not due".
        if let Some(snapshot) = self.last_performed_hours {
            if operating_hours < snapshot {
                warn!(
                    schedule_id = %self.id,
                    snapshot, operating_hours,
                    "operating hours counter decreased below last-performed snapshot"
                );
                return Err(ServiceError::ValidationFailed(format!(
                    "operating hours {} below last-performed snapshot {}",
                    operating_hours, snapshot
                )));
            }
        }
        if let Some(snapshot) = self.last_performed_kilometers {
            if distance_km < snapshot {
                warn!(
                    schedule_id = %self.id,
                    snapshot, distance_km,
                    "distance counter decreased below last-performed snapshot"
                );
                return Err(ServiceError::ValidationFailed(format!(
                    "distance {} below last-performed snapshot {}",
                    distance_km, snapshot
                )));
            }
        }

        if !self.is_active {
            return Ok(DueStatus::default());
        }

        let calendar_due = self.next_due_date.map_or(false, |due| due <= as_of);
        let hours_due = self
            .next_due_hours
            .map_or(false, |due| operating_hours >= due);
        let distance_due = self
            .next_due_kilometers
            .map_or(false, |due| distance_km >= due);

        let is_due = calendar_due || hours_due || distance_due;

        // Overdue requires the triggered metric's tolerance to be exceeded
        // as well. Due-but-within-tolerance is not overdue.
        let calendar_overdue = calendar_due
            && self.next_due_date.map_or(false, |due| {
                as_of > due + Duration::days(i64::from(self.tolerance_days.unwrap_or(0)))
            });
        let hours_overdue = hours_due
            && self.next_due_hours.map_or(false, |due| {
                operating_hours > due + self.tolerance_hours.unwrap_or(0.0)
            });
        let distance_overdue = distance_due
            && self.next_due_kilometers.map_or(false, |due| {
                distance_km > due + self.tolerance_kilometers.unwrap_or(0.0)
            });

        let is_overdue = is_due && (calendar_overdue || hours_overdue || distance_overdue);

        // Only the calendar metric can warn ahead of time; future usage
        // cannot be predicted for hour or distance metrics.
        let is_due_soon = !is_due
            && self.next_due_date.map_or(false, |due| {
                due <= as_of + Duration::days(advance_notice_days)
            });

        Ok(DueStatus {
            is_due,
            is_overdue,
            is_due_soon,
        })
    }

    /// Records a fulfillment and recomputes the next due targets.
    ///
    /// Each metric with a configured interval advances from the new
    /// last-performed value; metrics without an interval are untouched.
    /// Applying the same inputs twice yields the same targets.
    pub fn apply_fulfillment(
        &mut self,
        completed_at: DateTime<Utc>,
        operating_hours: Option<f64>,
        distance_km: Option<f64>,
    ) {
        self.last_performed_at = Some(completed_at);
        if let Some(hours) = operating_hours {
            self.last_performed_hours = Some(hours);
        }
        if let Some(km) = distance_km {
            self.last_performed_kilometers = Some(km);
        }
        self.recompute_next_due();
        self.updated_at = Utc::now();
    }

    /// Derives `next_due_*` from the last-performed snapshot and the
    /// configured intervals.
    pub fn recompute_next_due(&mut self) {
        if let (Some(days), Some(performed_at)) = (self.interval_days, self.last_performed_at) {
            self.next_due_date = Some(performed_at + Duration::days(i64::from(days)));
        }
        if let (Some(interval), Some(performed)) = (self.interval_hours, self.last_performed_hours)
        {
            self.next_due_hours = Some(performed + interval);
        }
        if let (Some(interval), Some(performed)) =
            (self.interval_kilometers, self.last_performed_kilometers)
        {
            self.next_due_kilometers = Some(performed + interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hour_schedule(last_performed: f64, interval: f64, tolerance: f64) -> Model {
        let now = Utc::now();
        let mut schedule = Model {
            id: Uuid::new_v4(),
            name: "250h service".to_string(),
            equipment_id: Some(Uuid::new_v4()),
            equipment_type: None,
            schedule_type: ScheduleType::HourBased,
            interval_days: None,
            interval_hours: Some(interval),
            interval_kilometers: None,
            interval_cycles: None,
            tolerance_days: None,
            tolerance_hours: Some(tolerance),
            tolerance_kilometers: None,
            last_performed_at: Some(now - Duration::days(30)),
            last_performed_hours: Some(last_performed),
            last_performed_kilometers: None,
            next_due_date: None,
            next_due_hours: None,
            next_due_kilometers: None,
            is_active: true,
            created_by: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        schedule.recompute_next_due();
        schedule
    }

    fn calendar_schedule(last_performed: DateTime<Utc>, days: i32, tolerance: i32) -> Model {
        let now = Utc::now();
        let mut schedule = Model {
            id: Uuid::new_v4(),
            name: "annual inspection".to_string(),
            equipment_id: Some(Uuid::new_v4()),
            equipment_type: None,
            schedule_type: ScheduleType::TimeBased,
            interval_days: Some(days),
            interval_hours: None,
            interval_kilometers: None,
            interval_cycles: None,
            tolerance_days: Some(tolerance),
            tolerance_hours: None,
            tolerance_kilometers: None,
            last_performed_at: Some(last_performed),
            last_performed_hours: None,
            last_performed_kilometers: None,
            next_due_date: None,
            next_due_hours: None,
            next_due_kilometers: None,
            is_active: true,
            created_by: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        schedule.recompute_next_due();
        schedule
    }

    #[test]
    fn hour_based_due_and_tolerance_window() {
        // interval 250h, tolerance 25h, last performed at 1000h => due at 1250h
        let schedule = hour_schedule(1000.0, 250.0, 25.0);
        assert_eq!(schedule.next_due_hours, Some(1250.0));
        let now = Utc::now();

        let at_1240 = schedule.evaluate_due(1240.0, 0.0, now, 14).unwrap();
        assert!(!at_1240.is_due);
        assert!(!at_1240.is_overdue);

        let at_1255 = schedule.evaluate_due(1255.0, 0.0, now, 14).unwrap();
        assert!(at_1255.is_due);
        assert!(!at_1255.is_overdue, "within 25h tolerance");

        let at_1290 = schedule.evaluate_due(1290.0, 0.0, now, 14).unwrap();
        assert!(at_1290.is_due);
        assert!(at_1290.is_overdue);
    }

    #[test]
    fn hour_metrics_have_no_due_soon_signal() {
        let schedule = hour_schedule(1000.0, 250.0, 25.0);
        let status = schedule
            .evaluate_due(1249.0, 0.0, Utc::now(), 365)
            .unwrap();
        assert!(!status.is_due);
        assert!(!status.is_due_soon);
    }

    #[test]
    fn calendar_due_overdue_and_due_soon() {
        let now = Utc::now();
        // performed 100 days ago on a 90-day interval with 5-day tolerance:
        // due 10 days ago, overdue by 5
        let overdue = calendar_schedule(now - Duration::days(100), 90, 5);
        let status = overdue.evaluate_due(0.0, 0.0, now, 14).unwrap();
        assert!(status.is_due);
        assert!(status.is_overdue);

        // performed 92 days ago: due 2 days ago, within tolerance
        let within = calendar_schedule(now - Duration::days(92), 90, 5);
        let status = within.evaluate_due(0.0, 0.0, now, 14).unwrap();
        assert!(status.is_due);
        assert!(!status.is_overdue);

        // performed 80 days ago: due in 10 days, inside the notice window
        let soon = calendar_schedule(now - Duration::days(80), 90, 5);
        let status = soon.evaluate_due(0.0, 0.0, now, 14).unwrap();
        assert!(!status.is_due);
        assert!(status.is_due_soon);

        // same schedule with a 7-day notice window: not yet "soon"
        let status = soon.evaluate_due(0.0, 0.0, now, 7).unwrap();
        assert!(!status.is_due_soon);
    }

    #[test]
    fn never_performed_schedule_is_not_calendar_due() {
        let mut schedule = calendar_schedule(Utc::now(), 90, 5);
        schedule.last_performed_at = None;
        schedule.next_due_date = None;
        let status = schedule.evaluate_due(0.0, 0.0, Utc::now(), 14).unwrap();
        assert!(!status.is_due);
        assert!(!status.is_due_soon);
    }

    #[test]
    fn inactive_schedule_is_never_due() {
        let mut schedule = hour_schedule(1000.0, 250.0, 25.0);
        schedule.is_active = false;
        let status = schedule.evaluate_due(2000.0, 0.0, Utc::now(), 14).unwrap();
        assert_eq!(status, DueStatus::default());
    }

    #[test]
    fn metrics_combine_with_or() {
        let mut schedule = hour_schedule(1000.0, 250.0, 25.0);
        schedule.interval_kilometers = Some(5000.0);
        schedule.last_performed_kilometers = Some(10_000.0);
        schedule.recompute_next_due();

        // hours below threshold, distance past it
        let status = schedule
            .evaluate_due(1100.0, 15_500.0, Utc::now(), 14)
            .unwrap();
        assert!(status.is_due);
    }

    #[test]
    fn counter_below_snapshot_is_rejected() {
        let schedule = hour_schedule(1000.0, 250.0, 25.0);
        let result = schedule.evaluate_due(900.0, 0.0, Utc::now(), 14);
        assert!(matches!(result, Err(ServiceError::ValidationFailed(_))));
    }

    #[test]
    fn fulfillment_advances_configured_metrics_only() {
        let mut schedule = hour_schedule(1000.0, 250.0, 25.0);
        let completed = Utc::now();
        schedule.apply_fulfillment(completed, Some(1255.0), None);

        assert_eq!(schedule.last_performed_at, Some(completed));
        assert_eq!(schedule.last_performed_hours, Some(1255.0));
        assert_eq!(schedule.next_due_hours, Some(1505.0));
        // no calendar interval configured, calendar target untouched
        assert_eq!(schedule.next_due_date, None);
    }

    #[test]
    fn fulfillment_is_idempotent_for_identical_inputs() {
        let mut first = hour_schedule(1000.0, 250.0, 25.0);
        let completed = Utc::now();
        first.apply_fulfillment(completed, Some(1255.0), None);
        let mut second = first.clone();
        second.apply_fulfillment(completed, Some(1255.0), None);

        assert_eq!(first.next_due_hours, second.next_due_hours);
        assert_eq!(first.next_due_date, second.next_due_date);
        assert_eq!(first.last_performed_hours, second.last_performed_hours);
    }

    #[test]
    fn definition_requires_exclusive_binding() {
        let mut schedule = hour_schedule(1000.0, 250.0, 25.0);
        schedule.equipment_type = Some("excavator".to_string());
        assert!(matches!(
            schedule.validate_definition(),
            Err(ServiceError::ConfigurationError(_))
        ));

        schedule.equipment_id = None;
        schedule.equipment_type = None;
        assert!(matches!(
            schedule.validate_definition(),
            Err(ServiceError::ConfigurationError(_))
        ));
    }

    #[test]
    fn definition_rejects_non_positive_intervals() {
        let mut schedule = hour_schedule(1000.0, 250.0, 25.0);
        schedule.interval_hours = Some(-250.0);
        assert!(matches!(
            schedule.validate_definition(),
            Err(ServiceError::ConfigurationError(_))
        ));

        schedule.interval_hours = Some(0.0);
        assert!(matches!(
            schedule.validate_definition(),
            Err(ServiceError::ConfigurationError(_))
        ));
    }

    #[test]
    fn definition_requires_primary_interval_for_type() {
        let mut schedule = hour_schedule(1000.0, 250.0, 25.0);
        schedule.interval_hours = None;
        assert!(matches!(
            schedule.validate_definition(),
            Err(ServiceError::ConfigurationError(_))
        ));

        // condition-based needs no interval at all
        schedule.schedule_type = ScheduleType::ConditionBased;
        assert!(schedule.validate_definition().is_ok());
    }
}
