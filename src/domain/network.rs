use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Market network code
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    /// National Electricity Market (eastern states)
    Nem,
    /// Wholesale Electricity Market (Western Australia)
    Wem,
}

impl Network {
    /// Network code as stored in `network_id` columns
    pub fn code(&self) -> &'static str {
        match self {
            Network::Nem => "NEM",
            Network::Wem => "WEM",
        }
    }

    /// Timezone the market trades in. Neither observes daylight saving.
    pub fn timezone(&self) -> Tz {
        match self {
            Network::Nem => chrono_tz::Australia::Brisbane,
            Network::Wem => chrono_tz::Australia::Perth,
        }
    }

    /// Fixed UTC offset of the trading timezone
    pub fn fixed_offset(&self) -> FixedOffset {
        self.timezone()
            .offset_from_utc_datetime(&Utc::now().naive_utc())
            .fix()
    }

    /// Dispatch interval length in minutes
    pub fn interval_minutes(&self) -> i64 {
        5
    }

    pub fn intervals_per_hour(&self) -> f64 {
        60.0 / self.interval_minutes() as f64
    }

    pub fn intervals_per_day(&self) -> usize {
        (24 * 60 / self.interval_minutes()) as usize
    }

    /// Start of a local trading day
    pub fn day_start(&self, day: NaiveDate) -> DateTime<FixedOffset> {
        let offset = self.fixed_offset();
        let midnight = day.and_time(NaiveTime::default());
        offset.from_utc_datetime(&(midnight - Duration::seconds(offset.local_minus_utc() as i64)))
    }

    /// Half-open `[start, end)` window covering one local trading day
    pub fn day_window(&self, day: NaiveDate) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        let start = self.day_start(day);
        (start, start + Duration::days(1))
    }

    /// Last local calendar day that has fully elapsed at `now`
    pub fn last_complete_day(&self, now: DateTime<Utc>) -> NaiveDate {
        let local_today = now.with_timezone(&self.fixed_offset()).date_naive();
        local_today - Duration::days(1)
    }
}
