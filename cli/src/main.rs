pub mod cli;
mod render;

use anyhow::Context;
use chrono::TimeDelta;
use clap::Parser;
use tracing::{Instrument, Span, info};

use common::{TraceId, child_span, init_logger, root_span};
use courtbook::{Engine, EngineConfig, NewBooking, NewTrainingSession, TimeRange};

use cli::*;
use render::Output;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("courtbook");
    let cli = Cli::parse();

    let mut config = EngineConfig::from_env();
    if let Some(url) = &cli.database {
        config.database_url = url.clone();
    }

    let trace_id = TraceId::new();
    let span = root_span("courtbook", &trace_id);
    run(cli, config).instrument(span).await
}

async fn run(cli: Cli, config: EngineConfig) -> anyhow::Result<()> {
    let engine = Engine::open(config)
        .instrument(child_span("open"))
        .await
        .context("failed to open the booking database")?;

    let out = Output::new(cli.json);
    info!(command = cli.command.name(), "running");
    let res = dispatch(&engine, &out, cli.command).await;

    engine.close().await;
    res
}

async fn dispatch(engine: &Engine, out: &Output, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Migrate => {
            // Engine::open already applied the schema.
            info!(url = %engine.config().database_url, "schema up to date");
            out.message("schema up to date")
        }

        Command::Court(cmd) => court(engine, out, cmd).await,

        Command::Book {
            court,
            user,
            start,
            minutes,
        } => {
            Span::current().record("court_id", court.get());
            let range = TimeRange::starting_at(start, TimeDelta::minutes(i64::from(minutes)))?;
            let booking = engine
                .bookings()
                .create(NewBooking::regular(court, user, range))
                .await?;
            out.booking(&booking)
        }

        Command::Cancel { booking, user } => {
            let booking = engine.bookings().cancel(booking, user).await?;
            out.booking(&booking)
        }

        Command::SetStatus { booking, status } => {
            let booking = engine.bookings().set_status(booking, status).await?;
            out.booking(&booking)
        }

        Command::Bookings { user, court, limit } => {
            let mut bookings = match (user, court) {
                (Some(user), _) => engine.bookings().list_for_user(user).await?,
                (None, Some(court)) => engine.bookings().list_for_court(court).await?,
                (None, None) => engine.bookings().list_recent(limit).await?,
            };
            bookings.truncate(limit as usize);
            out.bookings(&bookings)
        }

        Command::Session(cmd) => session(engine, out, cmd).await,

        Command::Enroll { session, user } => {
            Span::current().record("session_id", session.get());
            let enrollment = engine.enrollments().enroll(user, session).await?;
            out.enrollment(&enrollment)
        }

        Command::Unenroll { session, user } => {
            Span::current().record("session_id", session.get());
            engine.enrollments().cancel_enrollment(user, session).await?;
            out.message(&format!("user {user} removed from session {session}"))
        }

        Command::Availability { date } => {
            let grid = engine.conflicts().day_availability(date).await?;
            out.availability(&grid)
        }
    }
}

async fn court(engine: &Engine, out: &Output, cmd: CourtCommand) -> anyhow::Result<()> {
    match cmd {
        CourtCommand::Add {
            name,
            description,
            status,
        } => {
            let court = engine.courts().create(&name, &description, status).await?;
            out.court(&court)
        }
        CourtCommand::List => out.courts(&engine.courts().list().await?),
        CourtCommand::Status { court, status } => {
            Span::current().record("court_id", court.get());
            engine.courts().set_status(court, status).await?;
            out.court(&engine.courts().get(court).await?)
        }
        CourtCommand::Remove { court } => {
            engine.courts().delete(court).await?;
            out.message(&format!("court {court} removed"))
        }
    }
}

async fn session(engine: &Engine, out: &Output, cmd: SessionCommand) -> anyhow::Result<()> {
    match cmd {
        SessionCommand::Create {
            coach,
            court,
            start,
            minutes,
            title,
            description,
            max,
        } => {
            Span::current().record("court_id", court.get());
            let range = TimeRange::starting_at(start, TimeDelta::minutes(i64::from(minutes)))?;
            let session = engine
                .sessions()
                .create_training_session(NewTrainingSession {
                    coach_id: coach,
                    court_id: court,
                    title,
                    description,
                    range,
                    max_participants: max,
                })
                .await?;
            out.session(&session)
        }
        SessionCommand::List { coach: Some(coach) } => {
            out.sessions(&engine.sessions().list_by_coach(coach).await?)
        }
        SessionCommand::List { coach: None } => {
            out.summaries(&engine.sessions().list_upcoming().await?)
        }
        SessionCommand::Roster { session } => {
            Span::current().record("session_id", session.get());
            out.roster(&engine.enrollments().participants(session).await?)
        }
        SessionCommand::Delete { session } => {
            Span::current().record("session_id", session.get());
            engine.sessions().delete_training_session(session).await?;
            out.message(&format!("training session {session} deleted"))
        }
    }
}
