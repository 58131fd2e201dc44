//! Reference-time layouts (`2006-01-02T15:04:05Z07:00`) on top of chrono.
//!
//! A layout is tokenised once into [`Chunk`]s. Formatting renders each chunk
//! with chrono, parsing converts the chunks to a strftime pattern. Layouts
//! that are valid strftime patterns containing `%` are used as such; any
//! other `%` is literal text.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
enum OffsetStyle {
    Colon,
    NoColon,
    HoursOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Literal(String),
    Spec(&'static str),
    Offset { style: OffsetStyle, zulu: bool },
    Fraction { sep: char, digits: usize, trim: bool },
}

// Longest tokens first within each leading character.
const TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Jan", "%b"),
    ("Monday", "%A"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("2006", "%Y"),
    ("002", "%j"),
    ("01", "%m"),
    ("02", "%d"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("__2", "%j"),
    ("_2", "%e"),
    ("1", "%-m"),
    ("2", "%-d"),
    ("3", "%-I"),
    ("4", "%-M"),
    ("5", "%-S"),
    ("PM", "%p"),
    ("pm", "%P"),
];

const OFFSETS: &[(&str, OffsetStyle, bool)] = &[
    ("Z07:00", OffsetStyle::Colon, true),
    ("Z0700", OffsetStyle::NoColon, true),
    ("Z07", OffsetStyle::HoursOnly, true),
    ("-07:00", OffsetStyle::Colon, false),
    ("-0700", OffsetStyle::NoColon, false),
    ("-07", OffsetStyle::HoursOnly, false),
];

fn fraction_at(rest: &str) -> Option<(Chunk, usize)> {
    let mut chars = rest.chars();
    let sep = chars.next().filter(|c| *c == '.' || *c == ',')?;
    let digit = chars.next().filter(|c| *c == '0' || *c == '9')?;
    let digits = 1 + rest[2..].chars().take_while(|c| *c == digit).count();
    let after = rest[1 + digits..].chars().next();
    if after.is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((
        Chunk::Fraction {
            sep,
            digits,
            trim: digit == '9',
        },
        1 + digits,
    ))
}

fn chunks(layout: &str) -> Vec<Chunk> {
    let mut out = Vec::new();
    let mut literal = String::new();
    let mut idx = 0;

    'outer: while idx < layout.len() {
        let rest = &layout[idx..];

        // "_2006" is a literal underscore followed by the year.
        if rest.starts_with("_2006") {
            literal.push('_');
            idx += 1;
            continue;
        }

        for (token, style, zulu) in OFFSETS {
            if rest.starts_with(token) {
                flush(&mut out, &mut literal);
                out.push(Chunk::Offset {
                    style: style.clone(),
                    zulu: *zulu,
                });
                idx += token.len();
                continue 'outer;
            }
        }

        for (token, spec) in TOKENS {
            if rest.starts_with(token) {
                flush(&mut out, &mut literal);
                out.push(Chunk::Spec(spec));
                idx += token.len();
                continue 'outer;
            }
        }

        if let Some((chunk, len)) = fraction_at(rest) {
            flush(&mut out, &mut literal);
            out.push(chunk);
            idx += len;
            continue;
        }

        let Some(c) = rest.chars().next() else { break };
        literal.push(c);
        idx += c.len_utf8();
    }
    flush(&mut out, &mut literal);
    out
}

fn flush(out: &mut Vec<Chunk>, literal: &mut String) {
    if !literal.is_empty() {
        out.push(Chunk::Literal(std::mem::take(literal)));
    }
}

fn render_offset(seconds: i32, style: &OffsetStyle, zulu: bool) -> String {
    if zulu && seconds == 0 {
        return "Z".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    let (hours, minutes) = (abs / 3600, (abs % 3600) / 60);
    match style {
        OffsetStyle::Colon => format!("{sign}{hours:02}:{minutes:02}"),
        OffsetStyle::NoColon => format!("{sign}{hours:02}{minutes:02}"),
        OffsetStyle::HoursOnly => format!("{sign}{hours:02}"),
    }
}

fn render_fraction(nanos: u32, sep: char, digits: usize, trim: bool) -> String {
    let full = format!("{:09}", nanos % 1_000_000_000);
    let mut frac = full[..digits.min(9)].to_string();
    if trim {
        frac = frac.trim_end_matches('0').to_string();
        if frac.is_empty() {
            return String::new();
        }
    }
    format!("{sep}{frac}")
}

fn is_strftime(layout: &str) -> bool {
    layout.contains('%') && !StrftimeItems::new(layout).any(|item| matches!(item, Item::Error))
}

fn strftime<Tz>(time: &DateTime<Tz>, pattern: &str) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    write!(out, "{}", time.format(pattern)).ok()?;
    Some(out)
}

/// Render `time` with a reference-time layout (or a strftime pattern when
/// the layout is one).
pub fn format<Tz>(time: &DateTime<Tz>, layout: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if is_strftime(layout) {
        if let Some(out) = strftime(time, layout) {
            return out;
        }
    }

    let offset = time.offset().fix().local_minus_utc();
    chunks(layout)
        .iter()
        .map(|chunk| match chunk {
            Chunk::Literal(text) => text.clone(),
            Chunk::Spec(spec) => strftime(time, spec).unwrap_or_default(),
            Chunk::Offset { style, zulu } => render_offset(offset, style, *zulu),
            Chunk::Fraction { sep, digits, trim } => {
                render_fraction(time.nanosecond(), *sep, *digits, *trim)
            }
        })
        .collect()
}

/// The strftime pattern equivalent to `layout`, for parsing.
pub fn to_strftime(layout: &str) -> String {
    if is_strftime(layout) {
        return layout.to_string();
    }
    chunks(layout)
        .into_iter()
        .map(|chunk| match chunk {
            Chunk::Literal(text) => text.replace('%', "%%"),
            Chunk::Spec(spec) => spec.to_string(),
            Chunk::Offset { style, zulu } => match (style, zulu) {
                (OffsetStyle::Colon, false) => "%:z".to_string(),
                (OffsetStyle::NoColon, false) => "%z".to_string(),
                _ => "%#z".to_string(),
            },
            Chunk::Fraction { .. } => "%.f".to_string(),
        })
        .collect()
}

/// Parse `value` with a reference-time layout. Values without an offset are
/// taken as UTC; date-only values as midnight UTC.
pub fn parse(value: &str, layout: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let pattern = to_strftime(layout);
    let utc = Utc.fix();

    match DateTime::parse_from_str(value, &pattern) {
        Ok(parsed) => Ok(parsed),
        Err(with_offset) => {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, &pattern) {
                return Ok(utc.from_utc_datetime(&naive));
            }
            if let Ok(date) = NaiveDate::parse_from_str(value, &pattern) {
                let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
                return Ok(utc.from_utc_datetime(&midnight));
            }
            Err(with_offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 5, 19, 7, 4, 9).unwrap()
            + chrono::Duration::milliseconds(26)
    }

    #[test]
    fn test_rfc3339_layout() {
        assert_eq!(format(&fixed(), "2006-01-02T15:04:05Z07:00"), "2022-05-19T07:04:09Z");
        let plus7 = fixed().with_timezone(&FixedOffset::east_opt(7 * 3600).unwrap());
        assert_eq!(
            format(&plus7, "2006-01-02T15:04:05Z07:00"),
            "2022-05-19T14:04:09+07:00"
        );
        assert_eq!(format(&plus7, "2006-01-02 15:04:05 -0700"), "2022-05-19 14:04:09 +0700");
    }

    #[test]
    fn test_names_and_fractions() {
        assert_eq!(format(&fixed(), "Mon, 02 Jan 2006"), "Thu, 19 May 2022");
        assert_eq!(format(&fixed(), "20060102150405.000"), "20220519070409.026");
        assert_eq!(format(&fixed(), "15:04:05.999999"), "07:04:09.026");
        assert_eq!(format(&fixed(), "3:04PM"), "7:04AM");
    }

    #[test]
    fn test_strftime_passthrough() {
        assert_eq!(format(&fixed(), "%Y/%m/%d"), "2022/05/19");
        assert_eq!(to_strftime("%s"), "%s");
    }

    #[test]
    fn test_stray_percent_is_literal() {
        assert_eq!(format(&fixed(), "2006%"), "2022%");
        assert_eq!(format(&fixed(), "%Q 15:04"), "%Q 07:04");
        assert_eq!(to_strftime("2006-01-02%"), "%Y-%m-%d%%");

        let parsed = parse("2022-05-19%", "2006-01-02%").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2022-05-19T00:00:00+00:00");
    }

    #[test]
    fn test_parse_with_and_without_offset() {
        let parsed = parse("2022-05-19T14:04:09+07:00", "2006-01-02T15:04:05Z07:00").unwrap();
        assert_eq!(parsed.with_timezone(&Utc), Utc.with_ymd_and_hms(2022, 5, 19, 7, 4, 9).unwrap());

        let zulu = parse("2022-05-19T07:04:09Z", "2006-01-02T15:04:05Z07:00").unwrap();
        assert_eq!(zulu.offset().local_minus_utc(), 0);

        let naive = parse("19/05/2022 07:04", "02/01/2006 15:04").unwrap();
        assert_eq!(naive.to_rfc3339(), "2022-05-19T07:04:00+00:00");

        let date = parse("2022-05-19", "2006-01-02").unwrap();
        assert_eq!(date.to_rfc3339(), "2022-05-19T00:00:00+00:00");

        assert!(parse("yesterday", "2006-01-02").is_err());
    }
}
