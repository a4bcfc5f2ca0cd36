//! Season assignment: a pure mapping from timestamp to season label.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How timestamps are partitioned into seasons.
///
/// The label set of every scheme is finite and fixed before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonScheme {
    /// Calendar month, labels 1–12.
    #[default]
    Month,
    /// Calendar quarter, labels 1–4.
    Quarter,
    /// ISO week number, labels 1–53.
    Week,
    /// A single season covering the whole year, label 1.
    None,
}

impl SeasonScheme {
    /// All supported tags, in the order shown to users.
    pub const TAGS: &[&str] = &["month", "quarter", "week", "none"];

    /// Season label of `timestamp`.
    pub fn label(&self, timestamp: NaiveDateTime) -> u32 {
        match self {
            Self::Month => timestamp.month(),
            Self::Quarter => (timestamp.month() - 1) / 3 + 1,
            Self::Week => timestamp.iso_week().week(),
            Self::None => 1,
        }
    }

    /// Every label the scheme can produce.
    pub fn labels(&self) -> Vec<u32> {
        let max = match self {
            Self::Month => 12,
            Self::Quarter => 4,
            Self::Week => 53,
            Self::None => 1,
        };
        (1..=max).collect()
    }

    /// Configuration tag of the scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Week => "week",
            Self::None => "none",
        }
    }
}

impl FromStr for SeasonScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "month" | "monthly" => Ok(Self::Month),
            "quarter" | "quarterly" => Ok(Self::Quarter),
            "week" | "weekly" => Ok(Self::Week),
            "none" => Ok(Self::None),
            _ => Err(Error::UnsupportedSeasonScheme(s.to_string())),
        }
    }
}

impl fmt::Display for SeasonScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn month_labels_follow_calendar() {
        assert_eq!(SeasonScheme::Month.label(ts(2021, 1, 31)), 1);
        assert_eq!(SeasonScheme::Month.label(ts(2021, 11, 1)), 11);
        assert_eq!(SeasonScheme::Month.label(ts(2021, 12, 31)), 12);
    }

    #[test]
    fn quarter_labels() {
        assert_eq!(SeasonScheme::Quarter.label(ts(2021, 3, 31)), 1);
        assert_eq!(SeasonScheme::Quarter.label(ts(2021, 4, 1)), 2);
        assert_eq!(SeasonScheme::Quarter.label(ts(2021, 12, 1)), 4);
    }

    #[test]
    fn week_labels_use_iso_weeks() {
        // 2021-01-01 is a Friday in ISO week 53 of 2020.
        assert_eq!(SeasonScheme::Week.label(ts(2021, 1, 1)), 53);
        assert_eq!(SeasonScheme::Week.label(ts(2021, 1, 4)), 1);
    }

    #[test]
    fn every_label_is_in_the_label_set() {
        for scheme in [
            SeasonScheme::Month,
            SeasonScheme::Quarter,
            SeasonScheme::Week,
            SeasonScheme::None,
        ] {
            let labels = scheme.labels();
            let mut day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            while day.year() < 2022 {
                let label = scheme.label(day.and_hms_opt(0, 0, 0).unwrap());
                assert!(labels.contains(&label), "{scheme}: {label}");
                day = day.succ_opt().unwrap();
            }
        }
    }

    #[test]
    fn parses_tags() {
        assert_eq!("month".parse::<SeasonScheme>(), Ok(SeasonScheme::Month));
        assert_eq!("Quarterly".parse::<SeasonScheme>(), Ok(SeasonScheme::Quarter));
        assert_eq!(
            "decade".parse::<SeasonScheme>(),
            Err(Error::UnsupportedSeasonScheme("decade".to_string()))
        );
    }
}
