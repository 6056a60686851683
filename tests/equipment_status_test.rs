mod common;

use assert_matches::assert_matches;
use common::TestApp;
use equipment_maintenance::{
    entities::EquipmentStatus, services::equipment::CreateEquipmentInput, ServiceError,
};
use uuid::Uuid;

async fn create_test_equipment(app: &TestApp) -> Uuid {
    app.state
        .equipment_service()
        .create_equipment(CreateEquipmentInput {
            asset_number: "DZ-042".to_string(),
            serial_number: "SN-1337".to_string(),
            name: "Dozer D8".to_string(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn new_equipment_starts_active_and_unassigned() {
    let app = TestApp::new().await;
    let service = app.state.equipment_service();
    let id = create_test_equipment(&app).await;

    let unit = service.get_equipment(id).await.unwrap();
    assert_eq!(unit.status, EquipmentStatus::Active);
    assert_eq!(unit.assigned_operator, None);
    assert_eq!(unit.operating_hours, 0.0);
    assert_eq!(unit.version, 1);
}

#[tokio::test]
async fn entering_repair_releases_the_operator() {
    let app = TestApp::new().await;
    let service = app.state.equipment_service();
    let id = create_test_equipment(&app).await;

    let operator = Uuid::new_v4();
    let unit = service.assign_operator(id, operator).await.unwrap();
    assert_eq!(unit.assigned_operator, Some(operator));

    let unit = service
        .change_status(id, EquipmentStatus::Repair, Some("hydraulic leak".to_string()), None)
        .await
        .unwrap();
    assert_eq!(unit.status, EquipmentStatus::Repair);
    assert_eq!(unit.assigned_operator, None);
}

#[tokio::test]
async fn standby_keeps_the_operator() {
    let app = TestApp::new().await;
    let service = app.state.equipment_service();
    let id = create_test_equipment(&app).await;

    let operator = Uuid::new_v4();
    service.assign_operator(id, operator).await.unwrap();

    let unit = service
        .change_status(id, EquipmentStatus::Standby, None, None)
        .await
        .unwrap();
    assert_eq!(unit.assigned_operator, Some(operator));
}

#[tokio::test]
async fn assignment_is_exclusive_and_requires_active_status() {
    let app = TestApp::new().await;
    let service = app.state.equipment_service();
    let id = create_test_equipment(&app).await;

    service.assign_operator(id, Uuid::new_v4()).await.unwrap();
    let err = service.assign_operator(id, Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, ServiceError::AssignmentConflict(_));

    service.unassign_operator(id).await.unwrap();
    service
        .change_status(id, EquipmentStatus::Maintenance, None, None)
        .await
        .unwrap();
    let err = service.assign_operator(id, Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, ServiceError::AssignmentConflict(_));
}

#[tokio::test]
async fn illegal_status_edges_are_rejected() {
    let app = TestApp::new().await;
    let service = app.state.equipment_service();
    let id = create_test_equipment(&app).await;

    // active units cannot go straight to disposal
    let err = service
        .change_status(id, EquipmentStatus::Disposal, None, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });

    service
        .change_status(id, EquipmentStatus::Retired, None, None)
        .await
        .unwrap();
    let unit = service
        .change_status(id, EquipmentStatus::Disposal, None, None)
        .await
        .unwrap();
    assert_eq!(unit.status, EquipmentStatus::Disposal);

    // disposal is terminal
    let err = service
        .change_status(id, EquipmentStatus::Active, None, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });
}

#[tokio::test]
async fn usage_counters_never_decrease() {
    let app = TestApp::new().await;
    let service = app.state.equipment_service();
    let id = create_test_equipment(&app).await;

    let unit = service.record_usage(id, 120.5, 340.0).await.unwrap();
    assert_eq!(unit.operating_hours, 120.5);
    assert_eq!(unit.distance_km, 340.0);

    let err = service.record_usage(id, 100.0, 340.0).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationFailed(_));
    let err = service.record_usage(id, 120.5, 300.0).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationFailed(_));

    // equal readings are a no-op update, not an anomaly
    let unit = service.record_usage(id, 120.5, 340.0).await.unwrap();
    assert_eq!(unit.operating_hours, 120.5);
}

#[tokio::test]
async fn status_changes_accumulate_in_the_history_log() {
    let app = TestApp::new().await;
    let service = app.state.equipment_service();
    let id = create_test_equipment(&app).await;

    service
        .change_status(id, EquipmentStatus::Maintenance, Some("250h service".to_string()), None)
        .await
        .unwrap();
    service
        .change_status(id, EquipmentStatus::Active, None, None)
        .await
        .unwrap();

    let history = service.status_history(id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].from_status, EquipmentStatus::Active);
    assert_eq!(history[0].to_status, EquipmentStatus::Maintenance);
    assert_eq!(history[0].reason.as_deref(), Some("250h service"));
    assert_eq!(history[1].to_status, EquipmentStatus::Active);
}
