use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};

use courtbook::{BookingId, BookingStatus, CourtId, CourtStatus, SessionId, UserId};

#[derive(Debug, Parser)]
#[clap(name = "courtbook", version, about = "Operator tool for the court booking engine")]
pub struct Cli {
    /// SQLite database url; overrides DATABASE_URL
    #[clap(long, global = true)]
    pub database: Option<String>,

    /// Print results as JSON instead of text
    #[clap(long, global = true)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the schema if it does not exist yet
    Migrate,

    /// Manage courts
    #[clap(subcommand)]
    Court(CourtCommand),

    /// Book a court for a player
    Book {
        #[clap(long)]
        court: CourtId,
        #[clap(long)]
        user: UserId,
        /// Start time in UTC, e.g. "2030-06-01 10:00"
        #[clap(long, value_parser = parse_start)]
        start: DateTime<Utc>,
        #[clap(long, default_value_t = 60)]
        minutes: u32,
    },

    /// Cancel a regular booking
    Cancel {
        booking: BookingId,
        /// Who is cancelling, for the log
        #[clap(long)]
        user: UserId,
    },

    /// Override a booking's status
    SetStatus {
        booking: BookingId,
        status: BookingStatus,
    },

    /// List bookings, newest first
    Bookings {
        #[clap(long, conflicts_with = "court")]
        user: Option<UserId>,
        #[clap(long)]
        court: Option<CourtId>,
        #[clap(long, default_value_t = 20)]
        limit: u32,
    },

    /// Manage training sessions
    #[clap(subcommand)]
    Session(SessionCommand),

    /// Enroll a user in a training session
    Enroll { session: SessionId, user: UserId },

    /// Remove a user from a training session
    Unenroll { session: SessionId, user: UserId },

    /// Show the slot grid of every court for one day
    Availability {
        /// Day in UTC, e.g. 2030-06-01
        date: NaiveDate,
    },
}

#[derive(Debug, Subcommand)]
pub enum CourtCommand {
    Add {
        name: String,
        #[clap(long, default_value = "")]
        description: String,
        #[clap(long, default_value = "available")]
        status: CourtStatus,
    },
    List,
    Status {
        court: CourtId,
        status: CourtStatus,
    },
    Remove {
        court: CourtId,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    Create {
        #[clap(long)]
        coach: UserId,
        #[clap(long)]
        court: CourtId,
        #[clap(long, value_parser = parse_start)]
        start: DateTime<Utc>,
        #[clap(long, default_value_t = 60)]
        minutes: u32,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        description: String,
        #[clap(long)]
        max: u32,
    },
    /// Upcoming sessions, or every session of one coach
    List {
        #[clap(long)]
        coach: Option<UserId>,
    },
    Roster {
        session: SessionId,
    },
    Delete {
        session: SessionId,
    },
}

impl Command {
    /// Short name used for the per-command span.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Migrate => "migrate",
            Command::Court(_) => "court",
            Command::Book { .. } => "book",
            Command::Cancel { .. } => "cancel",
            Command::SetStatus { .. } => "set_status",
            Command::Bookings { .. } => "bookings",
            Command::Session(_) => "session",
            Command::Enroll { .. } => "enroll",
            Command::Unenroll { .. } => "unenroll",
            Command::Availability { .. } => "availability",
        }
    }
}

pub(crate) fn parse_start(s: &str) -> Result<DateTime<Utc>, String> {
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("expected \"YYYY-MM-DD HH:MM\" (UTC), got {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_start_times() {
        let expected = NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc();
        assert_eq!(parse_start("2030-06-01 10:00").unwrap(), expected);
        assert_eq!(parse_start("2030-06-01T10:00:00").unwrap(), expected);
        assert!(parse_start("tomorrow").is_err());
    }

    #[test]
    fn parses_a_booking_command() {
        let cli = Cli::try_parse_from([
            "courtbook",
            "--json",
            "book",
            "--court",
            "3",
            "--user",
            "7",
            "--start",
            "2030-06-01 10:00",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Book { court, user, minutes, .. } => {
                assert_eq!(court.get(), 3);
                assert_eq!(user.get(), 7);
                assert_eq!(minutes, 60);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_positive_ids() {
        assert!(Cli::try_parse_from(["courtbook", "cancel", "0", "--user", "1"]).is_err());
    }
}
