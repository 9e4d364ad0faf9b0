//! Date parsing, comparison, and zone-aware formatting (§4.10, §6 "Canonical
//! date"). Canonical archive dates are `YYYY.MM.DD.hh.mm.ss`; pre-v5 archives
//! write the year without its leading `19`, which this module restores on
//! read so every comparison sees a four-digit year.
use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed date {0:?}")]
    Malformed(Vec<u8>),

    #[error("malformed time zone {0:?}")]
    Zone(String),
}

/// Display zone for formatting a delta's date back into working-file text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Utc,
    Offset(FixedOffset),
    /// The sentinel meaning "whatever this process's local zone is".
    Local,
}

impl Zone {
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "" | "UTC" | "Z" => Ok(Zone::Utc),
            "local" => Ok(Zone::Local),
            _ => {
                let (sign, rest) = match s.as_bytes().first() {
                    Some(b'+') => (1, &s[1..]),
                    Some(b'-') => (-1, &s[1..]),
                    _ => return Err(Error::Zone(s.to_string())),
                };
                let (h, m) = rest.split_once(':').unwrap_or((rest, "0"));
                let hours: i32 = h.parse().map_err(|_| Error::Zone(s.to_string()))?;
                let minutes: i32 = m.parse().map_err(|_| Error::Zone(s.to_string()))?;
                let secs = sign * (hours * 3600 + minutes * 60);
                FixedOffset::east_opt(secs)
                    .map(Zone::Offset)
                    .ok_or_else(|| Error::Zone(s.to_string()))
            }
        }
    }
}

/// Normalizes a canonical date's year field, prepending `19` when the
/// archive was written pre-v5 and stored only two digits.
fn normalize_year(year: &[u8]) -> Vec<u8> {
    if year.len() <= 2 {
        let mut out = b"19".to_vec();
        out.extend_from_slice(year);
        out
    } else {
        year.to_vec()
    }
}

pub fn parse_canonical(bytes: &[u8]) -> Result<NaiveDateTime, Error> {
    let fields: Vec<&[u8]> = bytes.split(|&b| b == b'.').collect();
    if fields.len() != 6 {
        return Err(Error::Malformed(bytes.to_vec()));
    }

    let year = normalize_year(fields[0]);
    let canonical = format!(
        "{}.{}.{}.{}.{}.{}",
        String::from_utf8_lossy(&year),
        String::from_utf8_lossy(fields[1]),
        String::from_utf8_lossy(fields[2]),
        String::from_utf8_lossy(fields[3]),
        String::from_utf8_lossy(fields[4]),
        String::from_utf8_lossy(fields[5]),
    );

    NaiveDateTime::parse_from_str(&canonical, "%Y.%m.%d.%H.%M.%S")
        .map_err(|_| Error::Malformed(bytes.to_vec()))
}

/// Compares two canonical date strings, normalizing two-digit legacy years
/// first.
pub fn cmp_date(a: &[u8], b: &[u8]) -> Result<Ordering, Error> {
    Ok(parse_canonical(a)?.cmp(&parse_canonical(b)?))
}

/// Formats a canonical date for display under the given zone.
pub fn format(bytes: &[u8], zone: Zone) -> Result<String, Error> {
    let naive = parse_canonical(bytes)?;
    let utc = DateTime::<Utc>::from_utc(naive, Utc);

    Ok(match zone {
        Zone::Utc => utc.format("%Y.%m.%d.%H.%M.%S").to_string(),
        Zone::Local => DateTime::<chrono::Local>::from(utc)
            .format("%Y.%m.%d.%H.%M.%S")
            .to_string(),
        Zone::Offset(offset) => offset
            .from_utc_datetime(&naive)
            .format("%Y.%m.%d.%H.%M.%S")
            .to_string(),
    })
}

/// Stamps the current time into canonical form; used by deposit to record a
/// new delta's date.
pub fn now_canonical() -> String {
    Utc::now().format("%Y.%m.%d.%H.%M.%S").to_string()
}

/// Permissive free-form date parser, the target-language analogue of
/// `str2time`: tries a handful of common orderings before giving up.
pub fn str2time(s: &str) -> Option<DateTime<Utc>> {
    const FORMATS: &[&str] = &[
        "%Y.%m.%d.%H.%M.%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d %b %Y %H:%M:%S",
        "%b %d %Y %H:%M:%S",
        "%Y-%m-%d",
    ];

    for fmt in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::<Utc>::from_utc(naive, Utc));
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(s, fmt) {
            return Some(DateTime::<Utc>::from_utc(date.and_hms(0, 0, 0), Utc));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical() {
        let dt = parse_canonical(b"2024.01.02.03.04.05").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-02 03:04:05");
    }

    #[test]
    fn test_parse_canonical_two_digit_year() {
        let dt = parse_canonical(b"98.01.02.03.04.05").unwrap();
        assert_eq!(dt.format("%Y").to_string(), "1998");
    }

    #[test]
    fn test_cmp_date() {
        assert_eq!(
            cmp_date(b"2024.01.01.00.00.00", b"2024.01.02.00.00.00").unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_zone_parse_local_sentinel() {
        assert_eq!(Zone::parse("local").unwrap(), Zone::Local);
        assert_eq!(Zone::parse("Z").unwrap(), Zone::Utc);
    }

    #[test]
    fn test_zone_parse_rejects_lt() {
        assert!(matches!(Zone::parse("LT"), Err(Error::Zone(_))));
    }

    #[test]
    fn test_format_utc() {
        let s = format(b"2024.01.02.03.04.05", Zone::Utc).unwrap();
        assert_eq!(s, "2024.01.02.03.04.05");
    }
}
