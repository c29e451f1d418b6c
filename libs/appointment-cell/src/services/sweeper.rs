// libs/appointment-cell/src/services/sweeper.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::events::{AppointmentEvent, EventPublisher};
use crate::models::{Appointment, AppointmentError, AppointmentStatus, SweepReport};
use crate::services::calendar::ClinicCalendar;
use crate::services::lifecycle::{AppointmentLifecycleService, TransitionTrigger};
use crate::store::{AppointmentStore, StatusChange};

pub const DEFAULT_GRACE_MINUTES: i64 = 120;
pub const DEFAULT_SWEEP_INTERVAL_MINUTES: u64 = 30;

/// Periodic job that marks confirmed appointments as no-show once their end
/// time plus the grace period has passed. Each appointment is its own
/// compare-and-set, so one failure never blocks the rest.
pub struct ExpirationSweeper {
    store: Arc<dyn AppointmentStore>,
    calendar: ClinicCalendar,
    lifecycle: AppointmentLifecycleService,
    events: Arc<dyn EventPublisher>,
    grace: Duration,
    every: std::time::Duration,
}

impl ExpirationSweeper {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        calendar: ClinicCalendar,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            calendar,
            lifecycle: AppointmentLifecycleService::new(),
            events,
            grace: Duration::minutes(DEFAULT_GRACE_MINUTES),
            every: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_MINUTES * 60),
        }
    }

    pub fn with_grace_minutes(mut self, minutes: i64) -> Self {
        self.grace = Duration::minutes(minutes.max(0));
        self
    }

    /// Zero keeps the current interval.
    pub fn with_interval(mut self, every: std::time::Duration) -> Self {
        if !every.is_zero() {
            self.every = every;
        }
        self
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// One pass at clinic wall-clock `now`. Only the initial lookup can fail
    /// the pass; per-appointment failures are logged and counted.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: NaiveDateTime) -> Result<SweepReport, AppointmentError> {
        let cutoff = now - self.grace;
        let expired = self.store.find_confirmed_ended_before(cutoff).await?;

        let mut report = SweepReport {
            examined: expired.len(),
            ..SweepReport::default()
        };

        for appointment in expired {
            if !self.lifecycle.should_mark_no_show(appointment.status, appointment.end_time, now, self.grace) {
                continue;
            }

            match self.mark_no_show(&appointment).await {
                Ok(_) => report.marked_no_show += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Could not mark appointment {} as no-show: {}", appointment.id, e);
                }
            }
        }

        if report.examined > 0 {
            info!(
                "No-show sweep: examined {}, marked {}, failed {}",
                report.examined, report.marked_no_show, report.failed
            );
        } else {
            debug!("No-show sweep found nothing before {}", cutoff);
        }

        Ok(report)
    }

    /// Sweep at the clinic's current wall-clock time.
    pub async fn run_once(&self) -> Result<SweepReport, AppointmentError> {
        self.sweep(self.calendar.now_local()).await
    }

    async fn mark_no_show(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let event_kind = self.lifecycle.validate_status_transition(
            appointment.status,
            AppointmentStatus::NoShow,
            TransitionTrigger::Sweeper,
        )?;

        let updated = self
            .store
            .transition_status(StatusChange {
                appointment_id: appointment.id,
                from: appointment.status,
                to: AppointmentStatus::NoShow,
                cancellation_reason: None,
                at: Utc::now(),
            })
            .await?;

        self.events.publish(AppointmentEvent::for_appointment(event_kind, &updated));
        Ok(updated)
    }

    /// Spawn the periodic loop. The first pass runs immediately.
    pub fn start(self: Arc<Self>) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let every = self.every;

        info!("Starting no-show sweeper every {:?} with {} min grace", every, self.grace.num_minutes());

        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            error!("No-show sweep failed: {}", e);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("No-show sweeper stopped");
        });

        SweeperHandle { shutdown: shutdown_tx, task }
    }
}

/// Owner of a running sweeper loop.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop and wait for the in-flight pass to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("No-show sweeper task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
