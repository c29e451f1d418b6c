pub mod availability;
pub mod booking;
pub mod calendar;
pub mod conflict;
pub mod lifecycle;
pub mod pricing;
pub mod sweeper;

pub use availability::AvailabilityService;
pub use booking::AppointmentBookingService;
pub use calendar::ClinicCalendar;
pub use lifecycle::{AppointmentLifecycleService, TransitionTrigger};
pub use pricing::PricingService;
pub use sweeper::{ExpirationSweeper, SweeperHandle};
