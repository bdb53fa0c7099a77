use chrono::{DateTime, Local};
use cron::Schedule;
use log::{error, info, trace, warn};
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use super::service::BackupService;

const TICK: Duration = Duration::from_secs(60);

/// Polls the clinic settings and fires scheduled backups.
#[derive(Debug)]
pub struct BackupScheduler {
    service: Arc<BackupService>,
    schedule: Option<Schedule>,
    next_run: Option<DateTime<Local>>,
}

impl BackupScheduler {
    #[must_use]
    pub fn new(service: Arc<BackupService>) -> Self {
        Self {
            service,
            schedule: None,
            next_run: None,
        }
    }

    pub fn next_run(&self) -> Option<DateTime<Local>> {
        self.next_run
    }

    pub async fn spawn(mut self) {
        let mut ticker = interval(TICK);
        loop {
            ticker.tick().await;
            self.tick(Local::now()).await;
        }
    }

    /// Replaces the active schedule; `None` disables automatic backups.
    pub fn apply(&mut self, expression: Option<&str>, now: DateTime<Local>) {
        self.schedule = expression.and_then(|expr| match Schedule::from_str(expr) {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                warn!("Ignoring invalid backup schedule '{expr}': {e}");
                None
            }
        });
        self.next_run = self
            .schedule
            .as_ref()
            .and_then(|s| s.after(&now).next());
        match (expression, self.next_run) {
            (Some(expr), Some(next)) => info!("Backup scheduled ({expr}), next run at {next}"),
            _ => info!("Backup schedule: manual"),
        }
    }

    /// True when the next fire time has passed; advances to the following one.
    pub fn due(&mut self, now: DateTime<Local>) -> bool {
        match self.next_run {
            Some(next) if next <= now => {
                self.next_run = self.schedule.as_ref().and_then(|s| s.after(&now).next());
                true
            }
            _ => false,
        }
    }

    async fn tick(&mut self, now: DateTime<Local>) {
        if self.service.take_schedule_change() {
            let service = Arc::clone(&self.service);
            match tokio::task::spawn_blocking(move || service.current_schedule()).await {
                Ok(Ok(expression)) => self.apply(expression.as_deref(), now),
                Ok(Err(e)) => {
                    error!("Failed to load backup schedule: {e}");
                    self.service.reschedule();
                }
                Err(e) => error!("Backup schedule task failed: {e}"),
            }
        }

        if !self.due(now) {
            trace!("No backup due at {now}");
            return;
        }

        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || service.perform_backup()).await {
            Ok(Ok(filename)) => info!("Scheduled backup finished: {filename}"),
            Ok(Err(e)) => error!("Scheduled backup failed: {e:#}"),
            Err(e) => error!("Scheduled backup task panicked: {e}"),
        }
    }
}
