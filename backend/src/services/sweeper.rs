//! Due-date sweeper
//!
//! Flags unpaid customer and vendor invoices whose due date has passed.
//! Runs once a day on a background task and on demand; both paths share one
//! mutex so two sweeps never overlap.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;

use super::today;
use crate::error::AppResult;

/// Rows flagged overdue by one sweep, per invoice type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub customer_invoices: u64,
    pub vendor_invoices: u64,
}

#[derive(Clone)]
pub struct DueDateSweeper {
    db: PgPool,
    guard: Arc<Mutex<()>>,
}

impl DueDateSweeper {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            guard: Arc::new(Mutex::new(())),
        }
    }

    /// Sweep now; re-running on the same day changes nothing
    pub async fn run_now(&self, today: NaiveDate) -> AppResult<SweepReport> {
        let _running = self.guard.lock().await;

        let mut tx = self.db.begin().await?;
        let mut report = SweepReport::default();
        for (table, count) in [
            ("customer_invoices", &mut report.customer_invoices),
            ("vendor_invoices", &mut report.vendor_invoices),
        ] {
            let result = sqlx::query(&format!(
                r#"
                UPDATE {table}
                SET status = 'overdue', updated_at = NOW()
                WHERE remaining_amount > 0
                  AND due_date IS NOT NULL
                  AND due_date < $1
                  AND status <> 'overdue'
                "#
            ))
            .bind(today)
            .execute(&mut *tx)
            .await?;
            *count = result.rows_affected();
        }
        tx.commit().await?;

        tracing::info!(
            date = %today,
            customer_invoices = report.customer_invoices,
            vendor_invoices = report.vendor_invoices,
            "Overdue sweep finished"
        );
        Ok(report)
    }

    /// Run the sweep every day at `run_at` (UTC) until the process exits
    pub fn spawn_daily(self, run_at: NaiveTime) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(run_at = %run_at, "Starting due-date sweeper");
            loop {
                let now = Utc::now();
                let next = next_run_after(now, run_at);
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::debug!(next_run = %next, "Sweeper sleeping");
                tokio::time::sleep(wait).await;

                if let Err(e) = self.run_now(today()).await {
                    tracing::error!("Scheduled overdue sweep failed: {}", e);
                }
            }
        })
    }
}

/// First instant strictly after `now` whose wall-clock time is `run_at`
pub fn next_run_after(now: DateTime<Utc>, run_at: NaiveTime) -> DateTime<Utc> {
    let candidate = now.date_naive().and_time(run_at).and_utc();
    if candidate > now {
        candidate
    } else {
        (now.date_naive() + Days::new(1)).and_time(run_at).and_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 1, 0).unwrap();
        assert_eq!(
            next_run_after(now, at(0, 5)),
            Utc.with_ymd_and_hms(2024, 6, 15, 0, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 9, 30, 0).unwrap();
        assert_eq!(
            next_run_after(now, at(0, 5)),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_at_exact_time_waits_a_day() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 5, 0).unwrap();
        assert_eq!(
            next_run_after(now, at(0, 5)),
            Utc.with_ymd_and_hms(2024, 6, 16, 0, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_wait_never_exceeds_a_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap();
        let wait = next_run_after(now, at(23, 59)) - now;
        assert!(wait > chrono::Duration::zero());
        assert!(wait <= chrono::Duration::days(1));
    }
}
