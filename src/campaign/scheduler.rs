//! Cron scheduling for campaign runs.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::runner::CampaignRunner;
use crate::error::{Error, Result};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Parsed campaign schedule, evaluated in local time.
#[derive(Debug, Clone)]
pub struct CampaignSchedule {
    /// Expression as handed to the cron parser.
    pub expression: String,
    schedule: Schedule,
}

impl CampaignSchedule {
    /// Parse a 5-field (minute first) or 6/7-field (seconds first) expression.
    pub fn parse(expression: &str) -> Result<Self> {
        let normalized = normalize_expression(expression);
        let schedule = Schedule::from_str(&normalized).map_err(|e| {
            Error::Config(format!("Invalid cron expression '{}': {}", expression, e))
        })?;
        Ok(Self {
            expression: normalized,
            schedule,
        })
    }

    pub fn next_after(&self, after: &DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.after(after).next()
    }

    pub fn upcoming(&self, count: usize) -> Vec<DateTime<Local>> {
        self.schedule.upcoming(Local).take(count).collect()
    }
}

/// Turn a classic crontab line into the seconds-first form the parser wants.
///
/// Day-of-week numbers follow crontab (0 and 7 are Sunday); they are
/// rewritten as names so the parser's own numbering never applies.
fn normalize_expression(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return fields.join(" ");
    }

    format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        day_of_week_names(fields[4])
    )
}

fn day_of_week_names(field: &str) -> String {
    field
        .split(',')
        .map(|item| {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (item, None),
            };
            if let Some(days) = expand_sunday_range(range, step) {
                return days;
            }
            let range = range
                .split('-')
                .map(|part| match part.parse::<usize>() {
                    Ok(n) if n <= 7 => WEEKDAYS[n % 7].to_string(),
                    _ => part.to_string(),
                })
                .collect::<Vec<_>>()
                .join("-");
            match step {
                Some(step) => format!("{}/{}", range, step),
                None => range,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Spell out a numeric range that ends on 7 or wraps past Saturday.
///
/// `Fri-Sun` is not a valid name range, so `5-7` becomes `Fri,Sat,Sun`.
fn expand_sunday_range(range: &str, step: Option<&str>) -> Option<String> {
    let (start, end) = range.split_once('-')?;
    let start = start.parse::<usize>().ok().filter(|n| *n <= 7)?;
    let end = end.parse::<usize>().ok().filter(|n| *n <= 7)?;
    if end != 7 && start <= end {
        return None;
    }
    let step = match step {
        Some(step) => step.parse::<usize>().ok().filter(|n| *n > 0)?,
        None => 1,
    };

    let days: Vec<usize> = if start <= end {
        (start..=end).collect()
    } else {
        (start..=6).chain(0..=end).collect()
    };
    let mut names: Vec<&str> = Vec::new();
    for day in days.into_iter().step_by(step) {
        let name = WEEKDAYS[day % 7];
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Some(names.join(","))
}

/// Run the campaign at every schedule tick until the task is aborted.
///
/// Each run executes in its own task so an error or panic ends that run only.
pub fn schedule_recurring(
    runner: Arc<CampaignRunner>,
    schedule: CampaignSchedule,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(cron = %schedule.expression, "Campaign scheduler started");
        loop {
            let now = Local::now();
            let Some(next) = schedule.next_after(&now) else {
                tracing::warn!(cron = %schedule.expression, "Schedule has no upcoming runs");
                break;
            };
            tracing::info!(next_run = %next, "Next campaign run scheduled");

            if let Ok(wait) = (next - now).to_std() {
                sleep(wait).await;
            }

            let runner = runner.clone();
            match tokio::spawn(async move { runner.run_campaign().await }).await {
                Ok(Ok(summary)) => {
                    tracing::info!(
                        run_id = %summary.run_id,
                        sent = summary.sent,
                        errors = summary.errors,
                        "Scheduled campaign run completed"
                    );
                }
                Ok(Err(e)) => tracing::error!("Scheduled campaign run failed: {}", e),
                Err(e) => tracing::error!("Scheduled campaign run panicked: {}", e),
            }
        }
    })
}
