pub mod costing;
pub mod equipment;
pub mod schedules;
pub mod work_orders;

pub use costing::{BudgetStatus, CostSummary, VarianceReport};
pub use equipment::EquipmentService;
pub use schedules::MaintenanceScheduleService;
pub use work_orders::WorkOrderService;
