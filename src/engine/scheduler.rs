// src/engine/scheduler.rs
//
// Exam status is derived from the clock on demand: every path that cares
// about availability sweeps first. There is no background timer; staleness
// is bounded by the next request that looks.

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, WindowState},
    models::exam::{ExamSettings, ExamStatus},
    store::ExamStore,
};

/// Next status for a definition at `now`. `draft` and `completed` never move.
pub fn advance_status(status: ExamStatus, settings: &ExamSettings, now: DateTime<Utc>) -> ExamStatus {
    match status {
        ExamStatus::Scheduled | ExamStatus::Active if settings.end_time <= now => {
            ExamStatus::Completed
        }
        ExamStatus::Scheduled if settings.start_time <= now => ExamStatus::Active,
        other => other,
    }
}

/// Where `now` falls relative to the half-open window `[start_time, end_time)`.
pub fn check_window(settings: &ExamSettings, now: DateTime<Utc>) -> Result<(), WindowState> {
    if now < settings.start_time {
        Err(WindowState::NotYetOpen)
    } else if now >= settings.end_time {
        Err(WindowState::Closed)
    } else {
        Ok(())
    }
}

/// Sweeps all definitions. Safe to call any number of times.
pub async fn refresh_statuses(store: &dyn ExamStore, now: DateTime<Utc>) -> Result<(), AppError> {
    let changed = store.refresh_statuses(now).await?;
    if changed > 0 {
        tracing::info!("Exam status sweep updated {} exam(s)", changed);
    }
    Ok(())
}
