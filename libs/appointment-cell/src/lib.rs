pub mod events;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

// Re-export models and services for external use
pub use models::*;
pub use services::*;

pub use events::{AppointmentEvent, AppointmentEventKind, BroadcastEventPublisher, EventPublisher};
pub use handlers::AppointmentState;
pub use router::appointment_routes;
pub use store::{
    AppointmentStore, CatalogStore, InMemoryStore, StatusChange, StoreError,
    SupabaseAppointmentStore, SupabaseCatalogStore,
};
