use std::{io::Write, process::ExitCode, sync::Arc};

use chrono_tz::Tz;
use serde::Serialize;
use tandem::{
    application::{
        availability::{AvailabilityAggregator, AvailabilityService},
        error::AppError,
        notify::{
            DispatchSettings, NotificationChannels, NotificationDispatcher, ThresholdDetector,
            TransitionBuffer, TransitionCheck, TransitionHandler, TransitionPublisher,
            WorkerSettings, spawn_worker,
        },
        repos::{AvailabilityRepo, CalendarsRepo, ParticipantsRepo, RecurrenceRepo},
    },
    config,
    domain::{
        clock::{format_date, parse_date},
        entities::CalendarRecord,
        error::DomainError,
        holidays::{HolidayCalendar, RuleHolidayCalendar, country_for_timezone},
    },
    infra::{
        channels::{EmailRelaySettings, HttpChatSender, HttpEmailSender},
        db::PostgresRepositories,
        error::InfraError,
        telemetry,
    },
};
use tandem_api_types::RangeSummaryResponse;
use time::Date;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_application_error(&error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn report_application_error(error: &AppError) {
    let messages = error.messages();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?messages, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        config::Command::Migrate(_) => run_migrate(&settings).await,
        config::Command::Summary(args) => run_summary(&settings, args).await,
        config::Command::Recheck(args) => run_recheck(&settings, args).await,
        config::Command::Holidays(args) => run_holidays(args),
    }
}

async fn connect(settings: &config::Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(InfraError::from)?;

    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(InfraError::from)?;
    Ok(Arc::new(repositories))
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let repositories = connect(settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;
    info!("Database migrations applied");
    Ok(())
}

async fn run_summary(
    settings: &config::Settings,
    args: config::SummaryArgs,
) -> Result<(), AppError> {
    let repositories = connect(settings).await?;
    let service = availability_service(&repositories);

    let summary = service
        .range_summary(&args.token, &args.from, &args.to, args.participant)
        .await?;
    print_json(&RangeSummaryResponse::from(&summary))
}

async fn run_recheck(
    settings: &config::Settings,
    args: config::RecheckArgs,
) -> Result<(), AppError> {
    let date = parse_date(&args.date)?;
    let until = args.until.as_deref().map(parse_date).transpose()?;
    let repositories = connect(settings).await?;

    let calendars: Arc<dyn CalendarsRepo> = repositories.clone();
    let calendar = calendars
        .find_by_token(&args.token)
        .await?
        .ok_or(DomainError::CalendarNotFound)?;

    let handler = transition_handler(&repositories, settings)?;
    if let Some(until) = until {
        return recheck_range(settings, handler, &calendar, date, until).await;
    }

    let check = TransitionCheck::new(calendar.id, date, None);
    let outcome = handler.handle_for(&calendar, &check).await?;

    info!(
        calendar_id = %calendar.id,
        date = %format_date(date),
        kind = %outcome.transition.kind,
        new_count = outcome.transition.new_count,
        sent = outcome.report.sent,
        skipped = outcome.report.skipped,
        failed = outcome.report.failed,
        "Recheck finished"
    );

    print_json(&RecheckOutput {
        date: format_date(date),
        kind: outcome.transition.kind.as_str(),
        count: outcome.transition.new_count,
        threshold: outcome.transition.threshold,
        sent: outcome.report.sent,
        skipped: outcome.report.skipped,
        failed: outcome.report.failed,
    })
}

async fn recheck_range(
    settings: &config::Settings,
    handler: TransitionHandler,
    calendar: &CalendarRecord,
    from: Date,
    to: Date,
) -> Result<(), AppError> {
    if to < from {
        return Err(DomainError::invalid_date("--until is before --date").into());
    }
    let days = (to - from).whole_days() + 1;
    let capacity = settings.notify.queue_capacity.get();
    if !usize::try_from(days).is_ok_and(|days| days <= capacity) {
        return Err(AppError::validation(format!(
            "{days} dates exceed notify.queue_capacity ({capacity})"
        )));
    }

    let (queue, worker) = spawn_worker(
        WorkerSettings {
            queue_capacity: settings.notify.queue_capacity,
            max_concurrent_dispatches: settings.notify.max_concurrent_dispatches,
        },
        handler,
    );

    let mut queued = 0u32;
    let mut next = Some(from);
    while let Some(date) = next.filter(|date| *date <= to) {
        queue.publish(TransitionCheck::new(calendar.id, date, None));
        queued += 1;
        next = date.next_day();
    }
    drop(queue);
    worker
        .await
        .map_err(|err| AppError::unexpected(format!("notification worker failed: {err}")))?;

    info!(
        calendar_id = %calendar.id,
        from = %format_date(from),
        to = %format_date(to),
        queued,
        "Range recheck finished"
    );

    print_json(&RecheckRangeOutput {
        from: format_date(from),
        to: format_date(to),
        queued,
    })
}

fn run_holidays(args: config::HolidaysArgs) -> Result<(), AppError> {
    let timezone: Tz = args
        .timezone
        .trim()
        .parse()
        .map_err(|err| {
            AppError::validation(format!("unknown timezone `{}`: {err}", args.timezone))
        })?;
    let country = country_for_timezone(timezone).ok_or_else(|| {
        AppError::validation(format!("no holiday table for timezone `{}`", timezone.name()))
    })?;

    let holidays: Vec<HolidayOutput> = RuleHolidayCalendar
        .holidays_in_year(country, args.year)
        .into_iter()
        .map(|(date, name)| HolidayOutput {
            date: format_date(date),
            name,
        })
        .collect();

    print_json(&holidays)
}

fn availability_service(repositories: &Arc<PostgresRepositories>) -> AvailabilityService {
    AvailabilityService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        Arc::new(TransitionBuffer::new()),
    )
}

fn transition_handler(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<TransitionHandler, AppError> {
    let calendars: Arc<dyn CalendarsRepo> = repositories.clone();
    let participants: Arc<dyn ParticipantsRepo> = repositories.clone();
    let availabilities: Arc<dyn AvailabilityRepo> = repositories.clone();
    let recurrences: Arc<dyn RecurrenceRepo> = repositories.clone();

    let aggregator = AvailabilityAggregator::new(participants.clone(), availabilities, recurrences);
    let timeout = settings.notify.outbound_timeout;

    let email = HttpEmailSender::new(
        EmailRelaySettings {
            api_url: settings.email.api_url.clone(),
            api_key: settings.email.api_key.clone(),
            from_address: settings.email.from_address.clone(),
        },
        timeout,
    )
    .map_err(|err| InfraError::channel(err.to_string()))?;
    let chat = HttpChatSender::new(timeout).map_err(|err| InfraError::channel(err.to_string()))?;

    let dispatcher = NotificationDispatcher::new(
        calendars.clone(),
        participants,
        aggregator.clone(),
        repositories.clone(),
        NotificationChannels {
            email: Arc::new(email),
            chat: Arc::new(chat),
        },
        DispatchSettings {
            public_base_url: settings.notify.public_base_url.clone(),
            dedup_window: settings.notify.dedup_window,
            outbound_timeout: timeout,
        },
    );

    Ok(TransitionHandler::new(
        calendars,
        ThresholdDetector::new(aggregator),
        dispatcher,
    ))
}

#[derive(Serialize)]
struct RecheckRangeOutput {
    from: String,
    to: String,
    queued: u32,
}

#[derive(Serialize)]
struct RecheckOutput {
    date: String,
    kind: &'static str,
    count: u32,
    threshold: u32,
    sent: u32,
    skipped: u32,
    failed: u32,
}

#[derive(Serialize)]
struct HolidayOutput {
    date: String,
    name: String,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(InfraError::from)?;
    Ok(())
}
