use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted by the maintenance core.
///
/// Events are emitted after the owning transaction commits, so subscribers
/// never observe state that later rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Work order events
    WorkOrderCreated(Uuid),
    WorkOrderStatusChanged {
        work_order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    WorkOrderCompleted(Uuid),
    WorkOrderPartsUpdated {
        work_order_id: Uuid,
        parts_cost: f64,
    },

    // Schedule events
    ScheduleCreated(Uuid),
    ScheduleFulfilled {
        schedule_id: Uuid,
        completed_at: DateTime<Utc>,
    },

    // Equipment events
    EquipmentCreated(Uuid),
    EquipmentStatusChanged {
        equipment_id: Uuid,
        old_status: String,
        new_status: String,
    },
    EquipmentOperatorAssigned {
        equipment_id: Uuid,
        operator_id: Uuid,
    },
    EquipmentOperatorUnassigned {
        equipment_id: Uuid,
    },
    EquipmentUsageRecorded {
        equipment_id: Uuid,
        operating_hours: f64,
        distance_km: f64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel with the conventional sender wrapper.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains events and logs them. Downstream consumers (notifications,
/// projections) subscribe here; the core itself only observes via logs.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "domain event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (sender, mut rx) = channel(4);
        sender
            .send(Event::WorkOrderCreated(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(matches!(rx.recv().await, Some(Event::WorkOrderCreated(_))));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (sender, rx) = channel(1);
        drop(rx);
        let result = sender.send(Event::EquipmentCreated(Uuid::new_v4())).await;
        assert!(result.is_err());
    }
}
