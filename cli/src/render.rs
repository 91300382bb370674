use serde::Serialize;

use courtbook::{
    Booking, Court, CourtAvailability, Enrollment, SessionSummary, TrainingSession,
};

/// Writes command results to stdout, as text or JSON. Logs go to stderr.
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit<T>(&self, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()>
    where
        T: Serialize + ?Sized,
    {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }

    pub fn message(&self, msg: &str) -> anyhow::Result<()> {
        self.emit(&serde_json::json!({ "message": msg }), || msg.to_string())
    }

    pub fn court(&self, court: &Court) -> anyhow::Result<()> {
        self.emit(court, || court_line(court))
    }

    pub fn courts(&self, courts: &[Court]) -> anyhow::Result<()> {
        self.emit(courts, || lines(courts.iter().map(court_line), "no courts"))
    }

    pub fn booking(&self, booking: &Booking) -> anyhow::Result<()> {
        self.emit(booking, || booking_line(booking))
    }

    pub fn bookings(&self, bookings: &[Booking]) -> anyhow::Result<()> {
        self.emit(bookings, || lines(bookings.iter().map(booking_line), "no bookings"))
    }

    pub fn session(&self, session: &TrainingSession) -> anyhow::Result<()> {
        self.emit(session, || session_line(session))
    }

    pub fn sessions(&self, sessions: &[TrainingSession]) -> anyhow::Result<()> {
        self.emit(sessions, || lines(sessions.iter().map(session_line), "no sessions"))
    }

    pub fn summaries(&self, summaries: &[SessionSummary]) -> anyhow::Result<()> {
        self.emit(summaries, || {
            lines(
                summaries.iter().map(|s| {
                    format!(
                        "{}  {}/{} enrolled",
                        session_line(&s.session),
                        s.participants,
                        s.session.max_participants
                    )
                }),
                "no upcoming sessions",
            )
        })
    }

    pub fn enrollment(&self, e: &Enrollment) -> anyhow::Result<()> {
        self.emit(e, || format!("user {} enrolled in session {}", e.user_id, e.session_id))
    }

    pub fn roster(&self, roster: &[Enrollment]) -> anyhow::Result<()> {
        self.emit(roster, || {
            let entries = roster.iter().map(|e| {
                format!("user {:<6} since {}", e.user_id, e.enrolled_at.format("%Y-%m-%d %H:%M"))
            });
            lines(entries, "nobody enrolled")
        })
    }

    pub fn availability(&self, grid: &[CourtAvailability]) -> anyhow::Result<()> {
        self.emit(grid, || {
            let mut out = String::new();
            for day in grid {
                out.push_str(&format!("{} ({})\n", day.court.name, day.court.status));
                for slot in &day.slots {
                    out.push_str(&format!(
                        "  {}-{}  {}\n",
                        slot.range.start().format("%H:%M"),
                        slot.range.end().format("%H:%M"),
                        if slot.available { "free" } else { "taken" }
                    ));
                }
            }
            if out.is_empty() {
                out.push_str("no courts");
            }
            out.trim_end().to_string()
        })
    }
}

fn lines(items: impl Iterator<Item = String>, empty: &str) -> String {
    let joined = items.collect::<Vec<_>>().join("\n");
    if joined.is_empty() { empty.to_string() } else { joined }
}

fn court_line(c: &Court) -> String {
    format!("#{:<4} {:<20} {:<12} {}", c.id, c.name, c.status, c.description)
}

fn booking_line(b: &Booking) -> String {
    format!(
        "#{:<5} court {:<4} user {:<6} {} {:<9} {}",
        b.id, b.court_id, b.user_id, b.range, b.status, b.kind
    )
}

fn session_line(s: &TrainingSession) -> String {
    format!(
        "#{:<4} {:<24} coach {:<6} court {:<4} {} max {}",
        s.id, s.title, s.coach_id, s.court_id, s.range, s.max_participants
    )
}
