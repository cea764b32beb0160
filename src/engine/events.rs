//! Scheduled world events. The manager only does window bookkeeping; the
//! modifier aggregator decides what an active event contributes.

use std::time::{Duration, Instant};

use log::info;

use crate::content::EventSpec;

#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    pub spec: EventSpec,
    pub starts_at: Instant,
    pub ends_at: Instant,
}

impl ScheduledEvent {
    pub fn is_active(&self, now: Instant) -> bool {
        now >= self.starts_at && now < self.ends_at
    }

    pub fn time_left(&self, now: Instant) -> Duration {
        self.ends_at.saturating_duration_since(now)
    }
}

#[derive(Debug, Default)]
pub struct EventManager {
    scheduled: Vec<ScheduledEvent>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, spec: EventSpec, starts_at: Instant, duration: Duration) {
        info!("event scheduled: {} ({:.0?})", spec.name, duration);
        self.scheduled.push(ScheduledEvent {
            spec,
            starts_at,
            ends_at: starts_at + duration,
        });
    }

    /// Every scheduled entry, expired ones included. The aggregator filters by
    /// window itself so that expiry is decided exactly once, at attempt time.
    pub fn scheduled(&self) -> &[ScheduledEvent] {
        &self.scheduled
    }

    pub fn active_at(&self, now: Instant) -> impl Iterator<Item = &ScheduledEvent> {
        self.scheduled.iter().filter(move |e| e.is_active(now))
    }

    /// Drop entries whose window has fully passed.
    pub fn prune(&mut self, now: Instant) {
        self.scheduled.retain(|e| e.ends_at > now);
    }
}
