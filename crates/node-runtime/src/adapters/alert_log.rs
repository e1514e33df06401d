//! # Operator Alert Sink
//!
//! Forwards alert events from the bus to the log, where operators pick them
//! up. Critical alerts log at `error`, the rest at `warn`.

use shared_bus::{AlertSeverity, EventFilter, EventSubscriber, LedgerEvent, Subscription};
use tokio::sync::watch;
use tracing::{error, info, warn};

pub struct AlertLogger {
    alerts: Subscription,
    reported_missed: u64,
}

impl AlertLogger {
    pub fn subscribe(bus: &dyn EventSubscriber) -> Self {
        Self {
            alerts: bus.subscribe(EventFilter::alerts()),
            reported_missed: 0,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                event = self.alerts.recv() => match event {
                    Some(event) => self.log(&event),
                    None => break,
                },
                _ = shutdown.changed() => {
                    // Alerts published during the final flush.
                    self.drain();
                    break;
                }
            }
        }
        info!("[node] Alert logger stopped");
    }

    /// Log everything already queued. Returns how many alerts were logged.
    pub fn drain(&mut self) -> usize {
        let mut logged = 0;
        while let Ok(Some(event)) = self.alerts.try_recv() {
            self.log(&event);
            logged += 1;
        }
        logged
    }

    fn log(&mut self, event: &LedgerEvent) {
        let missed = self.alerts.missed();
        if missed > self.reported_missed {
            error!(
                missed = missed - self.reported_missed,
                "[node] Alert sink fell behind; some alerts were not logged"
            );
            self.reported_missed = missed;
        }
        match event.severity() {
            Some(AlertSeverity::Critical) => error!(alert = ?event, "[node] ALERT"),
            Some(AlertSeverity::Warning) => warn!(alert = ?event, "[node] ALERT"),
            None => {}
        }
    }
}
