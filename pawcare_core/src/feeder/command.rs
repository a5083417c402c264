//! Plaintext feeder commands parsed into a closed set of variants.
//!
//! Grammar (whitespace separated, case-sensitive keywords):
//!
//! ```text
//! start | stop | feed | status | open_gate | close_gate | cancel_schedule
//! feed_until <grams>
//! schedule_feed <YYYY-MM-DD> <HH:MM[:SS]> <grams>
//! ```
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::FeederError;

/// Accepted gram range for closed-loop and scheduled feeds.
pub const GRAMS_RANGE: std::ops::RangeInclusive<f32> = 0.1..=5000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedingCommand {
    Start,
    Stop,
    Status,
    Once,
    UntilTarget(f32),
    Schedule(NaiveDateTime, f32),
    Cancel,
    OpenGate,
    CloseGate,
}

impl FeedingCommand {
    /// Suffix of the response topic under the feeder prefix.
    pub fn response_suffix(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Status => "status",
            Self::Once => "feeding",
            Self::UntilTarget(_) => "feed_until",
            Self::Schedule(..) | Self::Cancel => "schedule",
            Self::OpenGate => "open_gate",
            Self::CloseGate => "close_gate",
        }
    }

    /// Whether the command is refused while the feeder is idle.
    pub fn requires_active(&self) -> bool {
        matches!(self, Self::Once | Self::UntilTarget(_) | Self::Status)
    }
}

impl fmt::Display for FeedingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
            Self::Status => f.write_str("status"),
            Self::Once => f.write_str("feed"),
            Self::UntilTarget(g) => write!(f, "feed_until {g}"),
            Self::Schedule(at, g) => write!(f, "schedule_feed {} {g}", at.format("%Y-%m-%d %H:%M:%S")),
            Self::Cancel => f.write_str("cancel_schedule"),
            Self::OpenGate => f.write_str("open_gate"),
            Self::CloseGate => f.write_str("close_gate"),
        }
    }
}

const FEED_UNTIL_USAGE: &str = "Invalid command. Usage: feed_until 25";
const SCHEDULE_USAGE: &str = "Invalid command. Usage: schedule_feed 2025-01-31 18:30 25";

fn parse_grams(raw: &str, usage: &str) -> Result<f32, FeederError> {
    let grams: f32 = raw
        .parse()
        .map_err(|_| FeederError::InvalidCommand(usage.to_string()))?;
    if !grams.is_finite() || !GRAMS_RANGE.contains(&grams) {
        return Err(FeederError::InvalidCommand(format!(
            "grams must be between {} and {}",
            GRAMS_RANGE.start(),
            GRAMS_RANGE.end()
        )));
    }
    Ok(grams)
}

fn parse_datetime(date: &str, time: &str) -> Result<NaiveDateTime, FeederError> {
    let bad = || FeederError::InvalidCommand(SCHEDULE_USAGE.to_string());
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| bad())?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map_err(|_| bad())?;
    Ok(date.and_time(time))
}

impl FromStr for FeedingCommand {
    type Err = FeederError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Err(FeederError::InvalidCommand("empty command".into()));
        };
        let args: Vec<&str> = parts.collect();

        let bare = |cmd: Self| {
            if args.is_empty() {
                Ok(cmd)
            } else {
                Err(FeederError::InvalidCommand(format!(
                    "'{keyword}' takes no arguments"
                )))
            }
        };

        match keyword {
            "start" => bare(Self::Start),
            "stop" => bare(Self::Stop),
            "status" => bare(Self::Status),
            "feed" => bare(Self::Once),
            "cancel_schedule" => bare(Self::Cancel),
            "open_gate" => bare(Self::OpenGate),
            "close_gate" => bare(Self::CloseGate),
            "feed_until" => match args.as_slice() {
                [grams] => Ok(Self::UntilTarget(parse_grams(grams, FEED_UNTIL_USAGE)?)),
                _ => Err(FeederError::InvalidCommand(FEED_UNTIL_USAGE.into())),
            },
            "schedule_feed" => match args.as_slice() {
                [date, time, grams] => Ok(Self::Schedule(
                    parse_datetime(date, time)?,
                    parse_grams(grams, SCHEDULE_USAGE)?,
                )),
                _ => Err(FeederError::InvalidCommand(SCHEDULE_USAGE.into())),
            },
            _ => Err(FeederError::InvalidCommand(format!(
                "Unknown command: {}",
                s.trim()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("start", FeedingCommand::Start)]
    #[case("  stop\n", FeedingCommand::Stop)]
    #[case("feed", FeedingCommand::Once)]
    #[case("status", FeedingCommand::Status)]
    #[case("open_gate", FeedingCommand::OpenGate)]
    #[case("close_gate", FeedingCommand::CloseGate)]
    #[case("cancel_schedule", FeedingCommand::Cancel)]
    #[case("feed_until 25", FeedingCommand::UntilTarget(25.0))]
    #[case("feed_until   12.5", FeedingCommand::UntilTarget(12.5))]
    fn parses_commands(#[case] input: &str, #[case] expected: FeedingCommand) {
        assert_eq!(input.parse::<FeedingCommand>().unwrap(), expected);
    }

    #[test]
    fn parses_schedule_with_and_without_seconds() {
        let at = NaiveDate::from_ymd_opt(2025, 1, 31)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap();
        assert_eq!(
            "schedule_feed 2025-01-31 18:30 40".parse::<FeedingCommand>().unwrap(),
            FeedingCommand::Schedule(at, 40.0)
        );
        assert_eq!(
            "schedule_feed 2025-01-31 18:30:00 40".parse::<FeedingCommand>().unwrap(),
            FeedingCommand::Schedule(at, 40.0)
        );
    }

    #[rstest]
    #[case("feed_until")]
    #[case("feed_until abc")]
    #[case("feed_until 10 20")]
    fn feed_until_usage(#[case] input: &str) {
        assert_eq!(
            input.parse::<FeedingCommand>().unwrap_err(),
            FeederError::InvalidCommand(FEED_UNTIL_USAGE.into())
        );
    }

    #[rstest]
    #[case("feed_until 0")]
    #[case("feed_until -5")]
    #[case("feed_until NaN")]
    #[case("feed_until inf")]
    #[case("feed_until 9000")]
    fn grams_out_of_range(#[case] input: &str) {
        let err = input.parse::<FeedingCommand>().unwrap_err();
        assert!(matches!(err, FeederError::InvalidCommand(m) if m.starts_with("grams must be")));
    }

    #[rstest]
    #[case("schedule_feed 2025-13-01 10:00 5")]
    #[case("schedule_feed 2025-01-01 25:00 5")]
    #[case("schedule_feed 2025-01-01 10:00")]
    fn schedule_usage(#[case] input: &str) {
        assert_eq!(
            input.parse::<FeedingCommand>().unwrap_err(),
            FeederError::InvalidCommand(SCHEDULE_USAGE.into())
        );
    }

    #[test]
    fn unknown_and_trailing_arguments() {
        assert_eq!(
            "dance now".parse::<FeedingCommand>().unwrap_err(),
            FeederError::InvalidCommand("Unknown command: dance now".into())
        );
        assert!(matches!(
            "start please".parse::<FeedingCommand>(),
            Err(FeederError::InvalidCommand(m)) if m.contains("no arguments")
        ));
        assert!("".parse::<FeedingCommand>().is_err());
        assert!("START".parse::<FeedingCommand>().is_err());
    }

    #[test]
    fn display_parses_back() {
        for cmd in [
            FeedingCommand::UntilTarget(12.5),
            FeedingCommand::Cancel,
            FeedingCommand::Schedule(
                NaiveDate::from_ymd_opt(2030, 6, 1)
                    .unwrap()
                    .and_hms_opt(7, 5, 9)
                    .unwrap(),
                3.0,
            ),
        ] {
            assert_eq!(cmd.to_string().parse::<FeedingCommand>().unwrap(), cmd);
        }
    }

    #[test]
    fn idle_gating() {
        assert!(FeedingCommand::Once.requires_active());
        assert!(FeedingCommand::Status.requires_active());
        assert!(!FeedingCommand::OpenGate.requires_active());
        assert!(!FeedingCommand::Cancel.requires_active());
        assert_eq!(FeedingCommand::Cancel.response_suffix(), "schedule");
    }
}
