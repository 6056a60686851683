use std::sync::Arc;

use equipment_maintenance::{
    config::AppConfig,
    db,
    events, logging, AppState,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use tempfile::TempDir;

/// Test harness backed by a throwaway file-based SQLite database.
///
/// A single-connection pool keeps statements serialized, so tests exercising
/// conflicting writes behave deterministically.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE equipment (
        id TEXT PRIMARY KEY NOT NULL,
        asset_number TEXT NOT NULL,
        serial_number TEXT NOT NULL,
        name TEXT NOT NULL,
        status TEXT NOT NULL,
        assigned_operator TEXT,
        operating_hours REAL NOT NULL,
        distance_km REAL NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        version INTEGER NOT NULL
    );",
    "CREATE TABLE maintenance_schedules (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        equipment_id TEXT,
        equipment_type TEXT,
        schedule_type TEXT NOT NULL,
        interval_days INTEGER,
        interval_hours REAL,
        interval_kilometers REAL,
        interval_cycles INTEGER,
        tolerance_days INTEGER,
        tolerance_hours REAL,
        tolerance_kilometers REAL,
        last_performed_at TEXT,
        last_performed_hours REAL,
        last_performed_kilometers REAL,
        next_due_date TEXT,
        next_due_hours REAL,
        next_due_kilometers REAL,
        is_active INTEGER NOT NULL,
        created_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        version INTEGER NOT NULL
    );",
    "CREATE TABLE work_orders (
        id TEXT PRIMARY KEY NOT NULL,
        work_order_number TEXT NOT NULL,
        equipment_id TEXT NOT NULL,
        maintenance_type TEXT NOT NULL,
        priority TEXT NOT NULL,
        status TEXT NOT NULL,
        approval_required INTEGER NOT NULL,
        approved_by TEXT,
        approved_at TEXT,
        rejected_by TEXT,
        rejected_at TEXT,
        rejection_reason TEXT,
        description TEXT NOT NULL,
        scheduled_start TEXT,
        scheduled_end TEXT,
        actual_start TEXT,
        actual_end TEXT,
        actual_duration_hours REAL,
        completion_percentage INTEGER NOT NULL,
        completion_notes TEXT,
        estimated_labor_cost REAL NOT NULL,
        estimated_parts_cost REAL NOT NULL,
        estimated_external_cost REAL NOT NULL,
        estimated_total_cost REAL NOT NULL,
        actual_labor_cost REAL NOT NULL,
        actual_parts_cost REAL NOT NULL,
        actual_external_cost REAL NOT NULL,
        actual_total_cost REAL NOT NULL,
        created_by TEXT,
        status_changed_at TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        version INTEGER NOT NULL
    );",
    "CREATE TABLE work_order_parts (
        id TEXT PRIMARY KEY NOT NULL,
        work_order_id TEXT NOT NULL,
        part_number TEXT NOT NULL,
        name TEXT NOT NULL,
        quantity_used REAL NOT NULL,
        unit_cost REAL NOT NULL,
        total_cost REAL NOT NULL,
        warranty_expires_at TEXT,
        is_critical INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );",
    "CREATE TABLE work_order_schedules (
        work_order_id TEXT NOT NULL,
        schedule_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (work_order_id, schedule_id)
    );",
    "CREATE TABLE work_order_status_logs (
        id TEXT PRIMARY KEY NOT NULL,
        work_order_id TEXT NOT NULL,
        from_status TEXT NOT NULL,
        to_status TEXT NOT NULL,
        changed_by TEXT,
        reason TEXT,
        created_at TEXT NOT NULL
    );",
    "CREATE TABLE equipment_status_logs (
        id TEXT PRIMARY KEY NOT NULL,
        equipment_id TEXT NOT NULL,
        from_status TEXT NOT NULL,
        to_status TEXT NOT NULL,
        changed_by TEXT,
        reason TEXT,
        created_at TEXT NOT NULL
    );",
];

impl TestApp {
    pub async fn new() -> Self {
        logging::init_test();

        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = dir.path().join("maintenance_test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let cfg = AppConfig::for_tests(url);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        for ddl in SCHEMA {
            pool.execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                (*ddl).to_string(),
            ))
            .await
            .expect("failed to create test schema");
        }

        let (sender, receiver) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(receiver));

        let state = AppState::new(Arc::new(pool), Arc::new(sender), cfg);

        Self {
            state,
            _event_task: event_task,
            _dir: dir,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}
