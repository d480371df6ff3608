use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::{Asia::Seoul, Tz};

/// Current wall-clock time in Korea Standard Time.
pub fn now_kst() -> DateTime<Tz> {
    Utc::now().with_timezone(&Seoul)
}

pub fn to_kst(ts: DateTime<Utc>) -> DateTime<Tz> {
    ts.with_timezone(&Seoul)
}

/// Calendar date in KST for a UTC instant.
pub fn kst_date(ts: DateTime<Utc>) -> NaiveDate {
    to_kst(ts).date_naive()
}

pub fn today_kst() -> NaiveDate {
    kst_date(Utc::now())
}

/// `2024-05-01 09:30 KST` style stamp for the update-time header.
pub fn format_kst(ts: DateTime<Tz>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S KST").to_string()
}
