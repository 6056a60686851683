pub mod equipment;
pub mod equipment_status_log;
pub mod maintenance_schedule;
pub mod work_order;
pub mod work_order_part;
pub mod work_order_schedule;
pub mod work_order_status_log;

pub use equipment::EquipmentStatus;
pub use maintenance_schedule::{DueStatus, ScheduleType};
pub use work_order::{MaintenanceType, PriorityLevel, WorkOrderStatus};
