use chrono::NaiveDateTime;

use crate::models::Appointment;

/// Half-open overlap: `[start1, end1)` and `[start2, end2)` share at least one instant.
/// Touching intervals (`end1 == start2`) do not overlap.
pub fn intervals_overlap(
    start1: NaiveDateTime,
    end1: NaiveDateTime,
    start2: NaiveDateTime,
    end2: NaiveDateTime,
) -> bool {
    start1 < end2 && end1 > start2
}

/// Active appointments from `existing` that overlap `[start, end)`.
pub fn find_conflicts<'a, I>(start: NaiveDateTime, end: NaiveDateTime, existing: I) -> Vec<&'a Appointment>
where
    I: IntoIterator<Item = &'a Appointment>,
{
    existing
        .into_iter()
        .filter(|apt| apt.is_active())
        .filter(|apt| intervals_overlap(start, end, apt.start_time, apt.end_time))
        .collect()
}

pub fn is_slot_free(start: NaiveDateTime, end: NaiveDateTime, existing: &[Appointment]) -> bool {
    find_conflicts(start, end, existing).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, BookingOrigin};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn appointment(start: NaiveDateTime, end: NaiveDateTime, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
            status,
            final_price: 10000,
            service_id: Uuid::new_v4(),
            pet_id: Uuid::new_v4(),
            guardian_id: Uuid::new_v4(),
            origin: BookingOrigin::Web,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(at(11, 0), at(11, 30), at(11, 30), at(12, 0)));
        assert!(!intervals_overlap(at(12, 0), at(12, 30), at(11, 30), at(12, 0)));
    }

    #[test]
    fn test_partial_and_containing_overlap() {
        assert!(intervals_overlap(at(11, 15), at(11, 45), at(11, 30), at(12, 0)));
        assert!(intervals_overlap(at(11, 0), at(13, 0), at(11, 30), at(12, 0)));
        assert!(intervals_overlap(at(11, 35), at(11, 40), at(11, 30), at(12, 0)));
    }

    #[test]
    fn test_cancelled_appointments_never_conflict() {
        let existing = vec![
            appointment(at(11, 30), at(12, 0), AppointmentStatus::Cancelled),
            appointment(at(12, 0), at(12, 30), AppointmentStatus::Confirmed),
        ];

        assert!(is_slot_free(at(11, 30), at(12, 0), &existing));
        let conflicts = find_conflicts(at(11, 45), at(12, 15), &existing);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn test_conflicts_over_map_values() {
        let existing: std::collections::HashMap<Uuid, Appointment> = [
            appointment(at(11, 0), at(11, 30), AppointmentStatus::Confirmed),
            appointment(at(11, 30), at(12, 0), AppointmentStatus::Cancelled),
        ]
        .into_iter()
        .map(|apt| (apt.id, apt))
        .collect();

        assert_eq!(find_conflicts(at(11, 15), at(11, 45), existing.values()).len(), 1);
        assert!(find_conflicts(at(11, 30), at(12, 0), existing.values()).is_empty());
    }

    #[test]
    fn test_terminal_but_not_cancelled_still_blocks() {
        let existing = vec![appointment(at(9, 0), at(9, 30), AppointmentStatus::NoShow)];
        assert!(!is_slot_free(at(9, 15), at(9, 45), &existing));
    }
}
