//! Cron-driven daily runner. Missed ticks are never replayed.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use cron::Schedule;
use std::{future::Future, str::FromStr, time::Duration};

use crate::{config::ScheduleConfig, pipeline::Pipeline};

/// Parse a cron expression. Standard 5-field expressions get a `0` seconds field.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let normalized = normalize_cron_expr(expr);
    Schedule::from_str(&normalized)
        .with_context(|| format!("Invalid schedule expression '{expr}'"))
}

fn normalize_cron_expr(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// First tick strictly after `after` that does not fall before `start_date` (midnight UTC).
pub fn next_run_after(
    schedule: &Schedule,
    after: DateTime<Utc>,
    start_date: Option<NaiveDate>,
) -> Option<DateTime<Utc>> {
    let floor = start_date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc() - TimeDelta::seconds(1))
        .filter(|start| *start > after)
        .unwrap_or(after);

    schedule.after(&floor).next()
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    schedule: Schedule,
    start_date: Option<NaiveDate>,
}

impl Scheduler {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        if config.email_on_failure {
            tracing::warn!(
                "email_on_failure is set but notifications are not supported; \
                 failures are only logged"
            );
        }

        Ok(Self {
            schedule: parse_schedule(&config.schedule)?,
            start_date: config.start_date,
        })
    }

    pub fn next_run(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        next_run_after(&self.schedule, after, self.start_date)
    }

    /// Run `pipeline` on every tick until `shutdown` resolves.
    ///
    /// Shutdown is only observed while waiting; a run in progress completes first.
    pub async fn run<F>(&self, pipeline: &Pipeline, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = Utc::now();
            let next = self
                .next_run(now)
                .ok_or_else(|| anyhow!("Schedule has no upcoming runs"))?;
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tracing::info!(
                next_run = %next,
                wait_secs = wait.as_secs(),
                "waiting for next scheduled run"
            );

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, scheduler stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            match pipeline.run_once().await {
                Ok(report) => tracing::info!(key = %report.key, "scheduled run succeeded"),
                Err(e) => tracing::error!(
                    task = %e.task,
                    attempts = e.attempts,
                    error = %e.source,
                    "scheduled run failed"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn daily_runs_at_next_midnight() {
        let schedule = parse_schedule("@daily").unwrap();
        let after = utc(2024, 5, 20, 10, 30, 0);

        let next = next_run_after(&schedule, after, None).unwrap();
        assert_eq!(next, utc(2024, 5, 21, 0, 0, 0));
    }

    #[test]
    fn next_run_is_strictly_after() {
        let schedule = parse_schedule("@daily").unwrap();
        let after = utc(2024, 5, 21, 0, 0, 0);

        let next = next_run_after(&schedule, after, None).unwrap();
        assert_eq!(next, utc(2024, 5, 22, 0, 0, 0));
    }

    #[test]
    fn start_date_in_future_delays_first_run() {
        let schedule = parse_schedule("@daily").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 6, 1);
        let after = utc(2024, 5, 20, 10, 0, 0);

        let next = next_run_after(&schedule, after, start).unwrap();
        assert_eq!(next, utc(2024, 6, 1, 0, 0, 0));
    }

    #[test]
    fn start_date_in_past_is_ignored() {
        let schedule = parse_schedule("@daily").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 5, 1);
        let after = utc(2024, 5, 20, 10, 0, 0);

        let next = next_run_after(&schedule, after, start).unwrap();
        assert_eq!(next, utc(2024, 5, 21, 0, 0, 0));
    }

    #[test]
    fn five_field_expressions_are_accepted() {
        let schedule = parse_schedule("30 6 * * *").unwrap();
        let after = utc(2024, 5, 20, 10, 0, 0);

        let next = next_run_after(&schedule, after, None).unwrap();
        assert_eq!(next, utc(2024, 5, 21, 6, 30, 0));
    }

    #[test]
    fn invalid_expression_is_rejected() {
        let err = parse_schedule("whenever").unwrap_err();
        assert!(err.to_string().contains("Invalid schedule expression"));
    }

    #[test]
    fn scheduler_uses_config_start_date() {
        let config = ScheduleConfig {
            start_date: NaiveDate::from_ymd_opt(2030, 1, 1),
            ..ScheduleConfig::default()
        };
        let scheduler = Scheduler::from_config(&config).unwrap();

        assert_eq!(
            scheduler.next_run(utc(2024, 5, 20, 0, 0, 0)),
            Some(utc(2030, 1, 1, 0, 0, 0))
        );
    }
}
