use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use clap::Args;
use ivi_alerts::cancellation::CancellationToken;
use ivi_alerts::clock::{Clock, SystemClock};
use ivi_alerts::config::AppConfig;
use ivi_alerts::error::AppError;
use ivi_alerts::risk::{RecomputeOutcome, ScoreReplay};
use ivi_alerts::scheduler::{compute_next_run, ScheduledTime, SchedulerSettings};
use ivi_alerts::telemetry;

use crate::infra::{parse_timestamp, AlertServices};

#[derive(Args, Debug)]
pub(crate) struct ReplayArgs {
    /// CSV with contract_number, company_name, health, experience, utilization columns
    pub(crate) path: PathBuf,
    /// Deliver the resulting alerts through the logging channel after the replay
    #[arg(long)]
    pub(crate) send: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScheduleNextArgs {
    /// Delivery time in 24-hour HH:MM
    #[arg(long)]
    pub(crate) time: ScheduledTime,
    /// Comma-separated weekdays, 0 = Sunday through 6 = Saturday
    #[arg(
        long,
        value_delimiter = ',',
        required = true,
        value_parser = clap::value_parser!(u8).range(0..=6)
    )]
    pub(crate) days: Vec<u8>,
    /// Evaluate from this local time instead of now (YYYY-MM-DDTHH:MM)
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) now: Option<NaiveDateTime>,
}

pub(crate) async fn run_replay(args: ReplayArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let services = AlertServices::in_memory(&config.alerts, clock);
    let outcomes = ScoreReplay::from_path(&services.alerts.recompute, &args.path)?;
    render_replay(&outcomes);

    if args.send {
        match services
            .alerts
            .dispatcher
            .send_all_unsent(&CancellationToken::new())
            .await
        {
            Ok(summary) => println!(
                "\nDelivery: {} sent, {} skipped, {} failed",
                summary.sent, summary.skipped, summary.failed
            ),
            Err(err) => println!("\nDelivery aborted: {err}"),
        }
    }

    Ok(())
}

fn render_replay(outcomes: &[RecomputeOutcome]) {
    println!("Score replay ({} rows)", outcomes.len());
    let mut transitions = 0;
    for outcome in outcomes {
        let score = &outcome.score;
        match &outcome.alert {
            Some(alert) => {
                transitions += 1;
                println!(
                    "  #{:<4} {:<14} {:>5.1}  {:?} -> {:?} ({:?})",
                    alert.id.0,
                    score.contract_number.0,
                    score.composite,
                    alert.previous_risk,
                    alert.new_risk,
                    alert.transition()
                );
            }
            None => println!(
                "  {:<5} {:<14} {:>5.1}  {:?}",
                "",
                score.contract_number.0,
                score.composite,
                score.risk
            ),
        }
    }
    println!("{transitions} risk transition(s) recorded");
}

pub(crate) fn run_schedule_next(args: ScheduleNextArgs) {
    let now = args
        .now
        .unwrap_or_else(|| Local::now().naive_local());
    let settings = SchedulerSettings {
        is_enabled: true,
        scheduled_time: args.time,
        days_of_week: args.days.into_iter().collect(),
    };

    match compute_next_run(&settings, now, None) {
        Some(next) => println!("Next run: {}", next.format("%A %Y-%m-%d %H:%M")),
        None => println!("No run scheduled"),
    }
}
