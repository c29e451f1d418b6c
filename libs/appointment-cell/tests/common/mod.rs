#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use uuid::Uuid;

use appointment_cell::events::BroadcastEventPublisher;
use appointment_cell::models::*;
use appointment_cell::services::{
    AppointmentBookingService, AvailabilityService, ClinicCalendar, ExpirationSweeper,
};
use appointment_cell::store::InMemoryStore;

/// 2025-03-03 is a Monday; 2025-03-09 is a Sunday.
pub fn monday_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

pub fn sunday_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
}

pub fn monday(h: u32, m: u32) -> NaiveDateTime {
    monday_date().and_hms_opt(h, m, 0).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Monday 11:00-13:00, Tuesday 09:00-18:00, everything else closed.
pub fn test_calendar() -> ClinicCalendar {
    ClinicCalendar::closed()
        .with_hours(Weekday::Mon, time(11, 0), time(13, 0))
        .unwrap()
        .with_hours(Weekday::Tue, time(9, 0), time(18, 0))
        .unwrap()
}

pub struct Clinic {
    pub store: Arc<InMemoryStore>,
    pub publisher: Arc<BroadcastEventPublisher>,
    pub calendar: ClinicCalendar,
    /// 30 min, flat 10000.
    pub consult: MedicalService,
    /// 60 min, bands [0,10] -> 20000 and [10.1,20] -> 30000.
    pub surgery: MedicalService,
    pub guardian: Guardian,
    /// Belongs to `guardian`, 8.5 kg on record.
    pub pet: Pet,
    pub other_guardian: Guardian,
    /// Belongs to `other_guardian`, no recorded weight.
    pub other_pet: Pet,
}

impl Clinic {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());

        let consult = MedicalService {
            id: Uuid::new_v4(),
            name: "Consulta general".to_string(),
            base_price: 10000,
            requires_weight: false,
            duration_minutes: 30,
            price_rules: vec![],
        };
        let surgery = MedicalService {
            id: Uuid::new_v4(),
            name: "Esterilización".to_string(),
            base_price: 0,
            requires_weight: true,
            duration_minutes: 60,
            price_rules: vec![
                PriceRule { min_weight: 0.0, max_weight: 10.0, price: 20000 },
                PriceRule { min_weight: 10.1, max_weight: 20.0, price: 30000 },
            ],
        };
        let guardian = Guardian { id: Uuid::new_v4(), full_name: "Ana Torres".to_string() };
        let other_guardian = Guardian { id: Uuid::new_v4(), full_name: "Luis Pérez".to_string() };
        let pet = Pet {
            id: Uuid::new_v4(),
            guardian_id: guardian.id,
            name: "Luna".to_string(),
            current_weight: Some(8.5),
        };
        let other_pet = Pet {
            id: Uuid::new_v4(),
            guardian_id: other_guardian.id,
            name: "Rocco".to_string(),
            current_weight: None,
        };

        store.add_service(consult.clone()).await;
        store.add_service(surgery.clone()).await;
        store.add_guardian(guardian.clone()).await;
        store.add_guardian(other_guardian.clone()).await;
        store.add_pet(pet.clone()).await;
        store.add_pet(other_pet.clone()).await;

        Self {
            store,
            publisher: Arc::new(BroadcastEventPublisher::default()),
            calendar: test_calendar(),
            consult,
            surgery,
            guardian,
            pet,
            other_guardian,
            other_pet,
        }
    }

    pub fn booking(&self) -> AppointmentBookingService {
        AppointmentBookingService::new(
            self.store.clone(),
            self.store.clone(),
            self.calendar.clone(),
            self.publisher.clone(),
        )
    }

    pub fn availability(&self) -> AvailabilityService {
        AvailabilityService::new(self.store.clone(), self.store.clone(), self.calendar.clone())
    }

    pub fn sweeper(&self) -> ExpirationSweeper {
        ExpirationSweeper::new(self.store.clone(), self.calendar.clone(), self.publisher.clone())
    }

    /// Consult for `pet` at `start`, booked over the web.
    pub fn consult_request(&self, start: NaiveDateTime) -> BookAppointmentRequest {
        BookAppointmentRequest {
            service_id: self.consult.id,
            pet_id: self.pet.id,
            guardian_id: self.guardian.id,
            start_time: start,
            origin: BookingOrigin::Web,
            pet_weight: None,
        }
    }

    pub fn surgery_request(&self, start: NaiveDateTime, pet_weight: Option<f64>) -> BookAppointmentRequest {
        BookAppointmentRequest {
            service_id: self.surgery.id,
            pet_weight,
            ..self.consult_request(start)
        }
    }

    /// Insert an appointment directly in `status`, bypassing booking rules.
    pub async fn seed(&self, start: NaiveDateTime, minutes: i64, status: AppointmentStatus) -> Appointment {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            status,
            final_price: self.consult.base_price,
            service_id: self.consult.id,
            pet_id: self.pet.id,
            guardian_id: self.guardian.id,
            origin: BookingOrigin::Reception,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store.seed_appointment(appointment.clone()).await;
        appointment
    }
}
