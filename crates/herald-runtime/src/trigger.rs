//! # Triggers
//!
//! A trigger is an unbounded source of stimulus messages. The subscription
//! runner pulls from it with [`Trigger::next`] and feeds each message to the
//! subscribed role.
//!
//! - [`CronTrigger`] fires on a cron schedule, in UTC, local time, a named
//!   IANA zone, or a fixed offset.
//! - [`IntervalTrigger`] fires on a fixed period.
//! - [`ChannelTrigger`] yields whatever is pushed through its sender.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use herald_core::{HeraldError, Message, Result};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

#[async_trait]
pub trait Trigger: Send {
    /// Short human-readable description, used in logs and events.
    fn describe(&self) -> String;

    /// Wait for the next event. Cancel-safe: dropping the future before it
    /// resolves leaves the trigger as it was.
    async fn next(&mut self) -> Result<Message>;
}

// ── Cron ───────────────────────────────────────────────────────

/// The timezone a cron schedule is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleTz {
    #[default]
    Utc,
    Local,
    /// An IANA zone such as `Asia/Shanghai`, with its daylight-saving rules.
    Named(Tz),
    Fixed(FixedOffset),
}

impl fmt::Display for ScheduleTz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleTz::Utc => f.write_str("UTC"),
            ScheduleTz::Local => f.write_str("local"),
            ScheduleTz::Named(tz) => f.write_str(tz.name()),
            ScheduleTz::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl FromStr for ScheduleTz {
    type Err = HeraldError;

    /// Accepts `UTC`, `Z`, `local`, an IANA zone name such as `Europe/Berlin`,
    /// or an offset such as `+08:00`, `-0530`, `+9`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "utc" | "z" => return Ok(ScheduleTz::Utc),
            "local" => return Ok(ScheduleTz::Local),
            _ => {}
        }
        let invalid = |reason: &str| HeraldError::InvalidSchedule {
            expression: s.to_string(),
            reason: reason.to_string(),
        };

        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => {
                return trimmed.parse::<Tz>().map(ScheduleTz::Named).map_err(|_| {
                    invalid("timezone must be UTC, local, an IANA zone name, or an offset like +08:00")
                });
            }
        };
        let (hours, minutes) = match rest.split_once(':') {
            Some((h, m)) => (h, m),
            None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
            None => (rest, "0"),
        };
        let hours: i32 = hours.parse::<u8>().map(i32::from).map_err(|_| invalid("bad offset hours"))?;
        let minutes: i32 = minutes.parse::<u8>().map(i32::from).map_err(|_| invalid("bad offset minutes"))?;
        if hours > 23 || minutes > 59 {
            return Err(invalid("offset out of range"));
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(ScheduleTz::Fixed)
            .ok_or_else(|| invalid("offset out of range"))
    }
}

/// Fires on a cron schedule.
///
/// Five-field expressions (`min hour day-of-month month day-of-week`) use the
/// usual crontab numbering, where 0 and 7 are both Sunday. Six- and
/// seven-field expressions (seconds first, optional trailing year) are handed
/// to the `cron` crate as they are, in its own numbering (1 = Sunday).
///
/// Instants missed while nobody was waiting are skipped, not replayed.
pub struct CronTrigger {
    expression: String,
    schedule: Schedule,
    tz: ScheduleTz,
    last_fired: Option<DateTime<Utc>>,
}

impl CronTrigger {
    pub fn new(expression: &str) -> Result<Self> {
        Self::with_timezone(expression, ScheduleTz::Utc)
    }

    pub fn with_timezone(expression: &str, tz: ScheduleTz) -> Result<Self> {
        let normalized = normalize_expression(expression)?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| HeraldError::InvalidSchedule {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
            tz,
            last_fired: None,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> ScheduleTz {
        self.tz
    }

    pub fn last_fired(&self) -> Option<DateTime<Utc>> {
        self.last_fired
    }

    /// First schedule instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.tz {
            ScheduleTz::Utc => first_after(&self.schedule, after),
            ScheduleTz::Local => first_after(&self.schedule, after.with_timezone(&Local)),
            ScheduleTz::Named(tz) => first_after(&self.schedule, after.with_timezone(&tz)),
            ScheduleTz::Fixed(offset) => first_after(&self.schedule, after.with_timezone(&offset)),
        }
    }

    /// Up to `n` consecutive schedule instants after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
        let mut instants = Vec::new();
        let mut cursor = after;
        while instants.len() < n {
            match self.next_after(cursor) {
                Some(t) => {
                    instants.push(t);
                    cursor = t;
                }
                None => break,
            }
        }
        instants
    }
}

fn first_after<Z: TimeZone>(schedule: &Schedule, after: DateTime<Z>) -> Option<DateTime<Utc>> {
    schedule
        .after(&after)
        .find(|t| *t > after)
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl Trigger for CronTrigger {
    fn describe(&self) -> String {
        format!("cron '{}' ({})", self.expression, self.tz)
    }

    async fn next(&mut self) -> Result<Message> {
        let now = Utc::now();
        let base = self.last_fired.map_or(now, |last| last.max(now));
        let target = self.next_after(base).ok_or_else(|| {
            HeraldError::Trigger(format!("cron '{}' has no upcoming instant", self.expression))
        })?;
        debug!(cron = %self.expression, fire_at = %target, "waiting for cron instant");

        // Sleep can wake a little early relative to the wall clock.
        loop {
            let now = Utc::now();
            if now >= target {
                break;
            }
            let wait = (target - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }

        self.last_fired = Some(target);
        Ok(Message::new(""))
    }
}

fn normalize_expression(expression: &str) -> Result<String> {
    let invalid = |reason: String| HeraldError::InvalidSchedule {
        expression: expression.to_string(),
        reason,
    };
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let dow = convert_weekday_field(fields[4]).map_err(invalid)?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], dow
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(invalid(format!("expected 5, 6 or 7 fields, got {n}"))),
    }
}

/// Map crontab day-of-week numbers (0-7, Sunday = 0 or 7) onto the `cron`
/// crate's 1-7 (Sunday = 1). Names pass through untouched.
fn convert_weekday_field(field: &str) -> std::result::Result<String, String> {
    let parts = field
        .split(',')
        .map(convert_weekday_part)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(parts.join(","))
}

fn convert_weekday_part(part: &str) -> std::result::Result<String, String> {
    if part == "*" || part == "?" || part.chars().any(|c| c.is_ascii_alphabetic()) {
        return Ok(part.to_string());
    }

    let (base, step) = match part.split_once('/') {
        Some((base, step)) => {
            let step: usize = step
                .parse()
                .map_err(|_| format!("bad day-of-week step in '{part}'"))?;
            if step == 0 {
                return Err(format!("zero step in '{part}'"));
            }
            (base, Some(step))
        }
        None => (part, None),
    };

    let day = |s: &str| -> std::result::Result<u8, String> {
        match s.parse::<u8>() {
            Ok(d) if d <= 7 => Ok(d),
            _ => Err(format!("bad day of week '{s}'")),
        }
    };
    let (lo, hi) = if base == "*" {
        (0, 6)
    } else if let Some((a, b)) = base.split_once('-') {
        (day(a)?, day(b)?)
    } else {
        let d = day(base)?;
        (d, if step.is_some() { 6 } else { d })
    };
    if lo > hi {
        return Err(format!("day-of-week range '{base}' runs backwards"));
    }

    let days: BTreeSet<u8> = (lo..=hi)
        .step_by(step.unwrap_or(1))
        .map(|d| d % 7 + 1)
        .collect();
    Ok(days
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(","))
}

// ── Interval ───────────────────────────────────────────────────

/// Fires every `period`, first after one full period. Ticks missed while the
/// role was busy are skipped.
pub struct IntervalTrigger {
    period: Duration,
    interval: Option<Interval>,
}

impl IntervalTrigger {
    pub fn new(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(HeraldError::InvalidSchedule {
                expression: "0s".into(),
                reason: "interval period must be positive".into(),
            });
        }
        Ok(Self {
            period,
            interval: None,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait]
impl Trigger for IntervalTrigger {
    fn describe(&self) -> String {
        format!("every {:?}", self.period)
    }

    async fn next(&mut self) -> Result<Message> {
        // Built on first use so the trigger can be constructed outside a runtime.
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        interval.tick().await;
        Ok(Message::new(""))
    }
}

// ── Channel ────────────────────────────────────────────────────

/// Yields messages pushed through the paired sender. Once every sender is
/// dropped, `next` fails and the subscription is torn down.
pub struct ChannelTrigger {
    rx: mpsc::Receiver<Message>,
}

impl ChannelTrigger {
    pub fn new(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<Message>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl Trigger for ChannelTrigger {
    fn describe(&self) -> String {
        "channel".into()
    }

    async fn next(&mut self) -> Result<Message> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| HeraldError::Trigger("trigger channel closed".into()))
    }
}
