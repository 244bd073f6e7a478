//! Reconstruction of calendar time from raw numeric offsets.
//!
//! CF time coordinates are decoded in the calendar named by their `calendar`
//! attribute. Dates from model calendars (`noleap`, `all_leap`, `360_day`) keep
//! their year/month/day labels; a label with no Gregorian equivalent, such as
//! 30 February, is an error. The CryoSat-2 and PIOMAS axes are proleptic Gregorian.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::error::DataError;

/// Day number of `0001-01-01` in the CryoSat-2 `Time` field.
const CRYOSAT2_DAY_ONE: f64 = 366.0;

/// Reference of the synthetic PIOMAS time axis.
pub const PIOMAS_UNITS: &str = "days since 2010-01-01";

const MILLIS_PER_DAY: i64 = 86_400_000;

fn invalid(reason: String) -> DataError {
    DataError::InvalidTime { reason }
}

/// A CF `calendar` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Calendar {
    /// `standard` / `gregorian`, the CF default. Only reference dates on or
    /// after 1582-10-15 are supported, where it agrees with proleptic Gregorian.
    #[default]
    Standard,
    ProlepticGregorian,
    /// `noleap` / `365_day`.
    NoLeap,
    /// `all_leap` / `366_day`.
    AllLeap,
    Day360,
}

impl Calendar {
    pub fn from_cf(name: &str) -> Result<Self, DataError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Self::Standard),
            "proleptic_gregorian" => Ok(Self::ProlepticGregorian),
            "noleap" | "365_day" => Ok(Self::NoLeap),
            "all_leap" | "366_day" => Ok(Self::AllLeap),
            "360_day" => Ok(Self::Day360),
            other => Err(invalid(format!("unsupported calendar '{other}'"))),
        }
    }

    /// Month lengths of the fixed-length-year calendars.
    fn month_lengths(self) -> Option<[u32; 12]> {
        match self {
            Self::NoLeap => Some([31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]),
            Self::AllLeap => Some([31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]),
            Self::Day360 => Some([30; 12]),
            Self::Standard | Self::ProlepticGregorian => None,
        }
    }
}

/// Adds each (possibly fractional) day offset to `epoch`, to the millisecond.
pub fn days_since(epoch: NaiveDateTime, offsets: &[f64]) -> Result<Vec<NaiveDateTime>, DataError> {
    offsets_since(epoch, offsets, 86_400_000.0)
}

fn offsets_since(
    epoch: NaiveDateTime,
    offsets: &[f64],
    millis_per_unit: f64,
) -> Result<Vec<NaiveDateTime>, DataError> {
    offsets
        .iter()
        .map(|&offset| -> Result<NaiveDateTime, DataError> {
            TimeDelta::try_milliseconds(offset_millis(offset, millis_per_unit)?)
                .and_then(|d| epoch.checked_add_signed(d))
                .ok_or_else(|| invalid(format!("date overflow adding {offset} to {epoch}")))
        })
        .collect()
}

fn offset_millis(offset: f64, millis_per_unit: f64) -> Result<i64, DataError> {
    if !offset.is_finite() {
        return Err(invalid(format!("non-finite time offset {offset}")));
    }
    let millis = (offset * millis_per_unit).round();
    if millis.abs() > i64::MAX as f64 {
        return Err(invalid(format!("time offset {offset} out of range")));
    }
    Ok(millis as i64)
}

/// Day arithmetic for calendars whose years all have the same length.
fn fixed_year_offsets(
    epoch: NaiveDateTime,
    offsets: &[f64],
    millis_per_unit: f64,
    months: &[u32; 12],
) -> Result<Vec<NaiveDateTime>, DataError> {
    let year_len: i64 = months.iter().map(|&m| i64::from(m)).sum();
    let month = epoch.month0() as usize;
    if epoch.day() > months[month] {
        return Err(invalid(format!(
            "reference date {} does not exist in this calendar",
            epoch.date()
        )));
    }
    let month_start: i64 = months[..month].iter().map(|&m| i64::from(m)).sum();
    let epoch_day = i64::from(epoch.year()) * year_len + month_start + i64::from(epoch.day0());
    let epoch_ms = epoch_day * MILLIS_PER_DAY + (epoch.time() - NaiveTime::MIN).num_milliseconds();

    offsets
        .iter()
        .map(|&offset| -> Result<NaiveDateTime, DataError> {
            let total = epoch_ms
                .checked_add(offset_millis(offset, millis_per_unit)?)
                .ok_or_else(|| invalid(format!("time offset {offset} out of range")))?;
            let day = total.div_euclid(MILLIS_PER_DAY);
            let year = i32::try_from(day.div_euclid(year_len))
                .map_err(|_| invalid(format!("time offset {offset} out of range")))?;
            let mut day_of_year = day.rem_euclid(year_len);
            let mut month = 0;
            while day_of_year >= i64::from(months[month]) {
                day_of_year -= i64::from(months[month]);
                month += 1;
            }
            let (month, day) = (month as u32 + 1, day_of_year as u32 + 1);
            let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
                invalid(format!("{year:04}-{month:02}-{day:02} has no Gregorian equivalent"))
            })?;
            let time = NaiveTime::MIN + TimeDelta::milliseconds(total.rem_euclid(MILLIS_PER_DAY));
            Ok(date.and_time(time))
        })
        .collect()
}

/// Decodes CF-style values such as `"days since 2010-01-01"` or
/// `"hours since 1850-01-01 00:00:00"` in the proleptic Gregorian calendar.
pub fn decode_cf(units: &str, values: &[f64]) -> Result<Vec<NaiveDateTime>, DataError> {
    decode_cf_calendar(units, Calendar::ProlepticGregorian, values)
}

/// Decodes CF-style values in `calendar`.
pub fn decode_cf_calendar(
    units: &str,
    calendar: Calendar,
    values: &[f64],
) -> Result<Vec<NaiveDateTime>, DataError> {
    let (unit, epoch) = parse_cf_units(units)?;
    let millis_per_unit = match unit.to_ascii_lowercase().as_str() {
        "days" | "day" | "d" => 86_400_000.0,
        "hours" | "hour" | "h" => 3_600_000.0,
        "minutes" | "minute" | "min" => 60_000.0,
        "seconds" | "second" | "s" => 1_000.0,
        other => return Err(invalid(format!("unsupported time unit '{other}'"))),
    };
    if let Some(months) = calendar.month_lengths() {
        return fixed_year_offsets(epoch, values, millis_per_unit, &months);
    }
    if calendar == Calendar::Standard {
        let reform = NaiveDate::from_ymd_opt(1582, 10, 15)
            .ok_or_else(|| invalid("1582-10-15 is not representable".to_string()))?;
        if epoch.date() < reform {
            return Err(invalid(format!(
                "reference date {} predates the Gregorian reform; mixed Julian/Gregorian \
                 decoding is not supported",
                epoch.date()
            )));
        }
    }
    offsets_since(epoch, values, millis_per_unit)
}

fn parse_cf_units(units: &str) -> Result<(&str, NaiveDateTime), DataError> {
    let mut parts = units.trim().splitn(3, char::is_whitespace);
    let unit = parts.next().unwrap_or("");
    let since = parts.next().unwrap_or("");
    let reference = parts.next().unwrap_or("").trim();
    if unit.is_empty() || since != "since" || reference.is_empty() {
        return Err(invalid(format!("unexpected time units format: '{units}'")));
    }

    let (date_str, time_str) = match reference.split_once([' ', 'T']) {
        Some((d, t)) => (d, Some(t.trim())),
        None => (reference, None),
    };

    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| invalid(format!("failed to parse reference date '{date_str}': {e}")))?;

    let time = match time_str {
        None | Some("") => NaiveTime::MIN,
        Some(t) => {
            // Trailing zone designators ("Z", "UTC") are ignored; everything is naive.
            let t = t.split_whitespace().next().unwrap_or(t).trim_end_matches('Z');
            NaiveTime::parse_from_str(t, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
                .map_err(|e| invalid(format!("failed to parse reference time '{t}': {e}")))?
        }
    };

    Ok((unit, date.and_time(time)))
}

/// Converts the CryoSat-2 `Time` field (day 366 is the day before `0001-01-01`)
/// into timestamps.
pub fn cryosat2_dates(raw: &[f64]) -> Result<Vec<NaiveDateTime>, DataError> {
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1)
        .ok_or_else(|| invalid("year 1 is not representable".to_string()))?
        .and_time(NaiveTime::MIN);
    let offsets: Vec<f64> = raw.iter().map(|t| t - CRYOSAT2_DAY_ONE - 1.0).collect();
    days_since(epoch, &offsets)
}

/// Day offsets `0..n` from the PIOMAS reference date.
pub fn piomas_dates(n: usize) -> Result<Vec<NaiveDateTime>, DataError> {
    let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
    decode_cf(PIOMAS_UNITS, &values)
}
