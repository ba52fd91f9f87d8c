use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Hydrogen storage season: summer fills, winter drains.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum Season {
    /// May 1st to October 31st.
    #[display("summer")]
    Summer,

    /// November 1st to April 30th.
    #[display("winter")]
    Winter,
}

impl Season {
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        if (5..=10).contains(&date.month()) { Self::Summer } else { Self::Winter }
    }

    /// End of the summer containing the timestamp.
    #[must_use]
    pub fn summer_end(timestamp: NaiveDateTime) -> Option<NaiveDateTime> {
        match Self::of(timestamp.date()) {
            Self::Summer => NaiveDate::from_ymd_opt(timestamp.year(), 11, 1)
                .map(|date| date.and_time(NaiveTime::MIN)),
            Self::Winter => None,
        }
    }
}

/// Position of a day within its winter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WinterDay {
    /// Days since the most recent November 1st.
    pub index: u32,

    /// Days from that November 1st to the following May 1st.
    pub length: u32,
}

impl WinterDay {
    #[must_use]
    pub fn of(date: NaiveDate) -> Option<Self> {
        let (start_year, end_year) = match date.month() {
            11 | 12 => (date.year(), date.year() + 1),
            1..=4 => (date.year() - 1, date.year()),
            _ => return None,
        };
        let start = NaiveDate::from_ymd_opt(start_year, 11, 1)?;
        let end = NaiveDate::from_ymd_opt(end_year, 5, 1)?;
        Some(Self {
            index: u32::try_from((date - start).num_days()).ok()?,
            length: u32::try_from((end - start).num_days()).ok()?,
        })
    }

    #[must_use]
    pub const fn remaining(self) -> u32 {
        self.length - self.index
    }
}
