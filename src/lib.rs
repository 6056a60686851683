#![forbid(unsafe_code)]

//! Maintenance core for heavy-equipment fleets.
//!
//! The crate owns three tightly coupled decision engines and the entities
//! they operate on:
//!
//! - recurring maintenance schedules with multi-metric due evaluation
//!   (calendar, operating hours, distance),
//! - the work-order lifecycle state machine with approval routing, cost
//!   reconciliation and schedule fulfillment on completion,
//! - equipment lifecycle status with exclusive operator assignment and
//!   monotonic usage counters.
//!
//! All writes go through optimistic version checks; domain events are
//! emitted only after the owning transaction commits.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod services;

use std::sync::Arc;

pub use config::{AppConfig, MaintenancePolicy};
pub use db::DbPool;
pub use errors::ServiceError;
pub use events::{Event, EventSender};

/// Shared application state: the database pool, the event channel, and the
/// domain services built on top of them.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub event_sender: Arc<EventSender>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: AppConfig) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    pub fn work_order_service(&self) -> services::work_orders::WorkOrderService {
        services::work_orders::WorkOrderService::new(
            self.db.clone(),
            self.event_sender.clone(),
            self.config.maintenance.clone(),
        )
    }

    pub fn schedule_service(&self) -> services::schedules::MaintenanceScheduleService {
        services::schedules::MaintenanceScheduleService::new(
            self.db.clone(),
            self.event_sender.clone(),
            self.config.maintenance.clone(),
        )
    }

    pub fn equipment_service(&self) -> services::equipment::EquipmentService {
        services::equipment::EquipmentService::new(self.db.clone(), self.event_sender.clone())
    }
}
