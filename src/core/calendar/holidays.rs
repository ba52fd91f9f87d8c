use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Source of public holidays.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HolidayCalendar {
    /// Only Sundays are holidays.
    None,

    /// Nationwide German public holidays.
    #[default]
    GermanNational,

    /// Explicit list of dates, other years are ignored.
    Custom(BTreeSet<NaiveDate>),
}

impl HolidayCalendar {
    pub fn dates(&self, year: i32) -> Result<BTreeSet<NaiveDate>> {
        match self {
            Self::None => Ok(BTreeSet::new()),
            Self::GermanNational => german_national(year),
            Self::Custom(dates) => {
                Ok(dates.iter().copied().filter(|date| date.year() == year).collect())
            }
        }
    }
}

fn german_national(year: i32) -> Result<BTreeSet<NaiveDate>> {
    let fixed = [(1, 1), (5, 1), (10, 3), (12, 25), (12, 26)]
        .into_iter()
        .map(|(month, day)| date(year, month, day));
    let easter = easter_sunday(year)?;
    let moveable = [
        easter.checked_sub_days(Days::new(2)),
        easter.checked_add_days(Days::new(1)),
        easter.checked_add_days(Days::new(39)),
        easter.checked_add_days(Days::new(50)),
    ]
    .into_iter()
    .map(|date| date.ok_or_else(|| Error::InvalidParameter(format!("no Easter dates in {year}"))));
    fixed.chain(moveable).collect()
}

/// Easter Sunday by the anonymous Gregorian algorithm.
pub fn easter_sunday(year: i32) -> Result<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    #[expect(clippy::cast_sign_loss)]
    let (month, day) = (month as u32, day as u32);
    date(year, month, day)
}

pub(super) fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::InvalidParameter(format!("{year}-{month:02}-{day:02} is not a date")))
}
