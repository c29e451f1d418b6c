// libs/appointment-cell/src/events.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, BookingOrigin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventKind {
    /// Payment collaborator creates a payment link for `amount`.
    Created,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

/// Signal for the payment and notification collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentEvent {
    pub kind: AppointmentEventKind,
    pub appointment_id: Uuid,
    pub guardian_id: Uuid,
    pub amount: i64,
    /// Caller reference echoed back by the payment collaborator.
    pub reference: String,
    pub origin: BookingOrigin,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AppointmentEvent {
    pub fn for_appointment(kind: AppointmentEventKind, appointment: &Appointment) -> Self {
        Self {
            kind,
            appointment_id: appointment.id,
            guardian_id: appointment.guardian_id,
            amount: appointment.final_price,
            reference: format!("appointment-{}", appointment.id),
            origin: appointment.origin,
            reason: appointment.cancellation_reason.clone(),
            occurred_at: Utc::now(),
        }
    }
}

/// Fire-and-forget sink. Implementations must not block or fail the caller.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: AppointmentEvent);
}

pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<AppointmentEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppointmentEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastEventPublisher {
    fn publish(&self, event: AppointmentEvent) {
        let kind = event.kind;
        let appointment_id = event.appointment_id;
        match self.sender.send(event) {
            Ok(receivers) => debug!("Published {:?} for {} to {} subscriber(s)", kind, appointment_id, receivers),
            Err(_) => warn!("No subscribers for {:?} event of appointment {}", kind, appointment_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::NaiveDate;

    fn sample_appointment() -> Appointment {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(11, 0, 0).unwrap();
        Appointment {
            id: Uuid::new_v4(),
            start_time: start,
            end_time: start + chrono::Duration::minutes(30),
            status: AppointmentStatus::PendingPayment,
            final_price: 20000,
            service_id: Uuid::new_v4(),
            pet_id: Uuid::new_v4(),
            guardian_id: Uuid::new_v4(),
            origin: BookingOrigin::WhatsApp,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = BroadcastEventPublisher::default();
        let mut receiver = publisher.subscribe();
        let appointment = sample_appointment();

        publisher.publish(AppointmentEvent::for_appointment(AppointmentEventKind::Created, &appointment));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.kind, AppointmentEventKind::Created);
        assert_eq!(event.amount, 20000);
        assert_eq!(event.guardian_id, appointment.guardian_id);
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let publisher = BroadcastEventPublisher::new(4);
        publisher.publish(AppointmentEvent::for_appointment(
            AppointmentEventKind::Cancelled,
            &sample_appointment(),
        ));
    }
}
