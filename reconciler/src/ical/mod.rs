//! Event normalizer for iCalendar booking feeds.
//!
//! Only VEVENT components are kept. Booking feeds publish stays as all-day
//! events whose dates shift when rendered, so every event is corrected by a
//! fixed offset: start +11h, end +24h.

mod error;
mod lexer;

pub use error::{ParseError, ParseErrorKind, ParseResult};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use shared::models::{CalendarSource, NormalizedEvent};

use lexer::{parse_content_line, split_lines, unescape_text, ContentLine};

pub const START_CORRECTION_HOURS: i64 = 11;
pub const END_CORRECTION_HOURS: i64 = 24;

/// A DTSTART/DTEND value resolved to an instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EventTime {
    instant: DateTime<Utc>,
    date_only: bool,
}

#[derive(Debug, Default)]
struct RawEvent {
    line: usize,
    uid: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
}

/// Parses a feed payload into corrected events attributed to `source`.
///
/// ## Errors
///
/// Returns a [`ParseError`] when the payload is not a well-formed calendar.
/// Individual events lacking a UID or DTSTART are dropped with a warning.
#[tracing::instrument(skip(raw, source), fields(source = %source.name, len = raw.len()))]
pub fn normalize(raw: &[u8], source: &CalendarSource) -> ParseResult<Vec<NormalizedEvent>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| ParseError::new(ParseErrorKind::InvalidEncoding, 1).with_context(e.to_string()))?;
    let text = text.trim_start_matches('\u{feff}');

    let raw_events = parse_events(text)?;
    tracing::debug!(count = raw_events.len(), "Parsed VEVENT components");

    let events = raw_events
        .into_iter()
        .filter_map(|raw| into_event(raw, source))
        .collect();

    Ok(events)
}

fn parse_events(text: &str) -> ParseResult<Vec<RawEvent>> {
    let lines = split_lines(text);
    if lines.is_empty() {
        return Err(ParseError::new(ParseErrorKind::MissingBegin, 1).with_context("empty feed"));
    }

    let mut stack: Vec<String> = Vec::new();
    let mut events = Vec::new();
    let mut current: Option<RawEvent> = None;
    let mut last_line = 1;

    for (line_num, line) in lines {
        last_line = line_num;
        let cl = parse_content_line(&line, line_num)?;

        match cl.name.as_str() {
            "BEGIN" => {
                let component = cl.value.trim().to_ascii_uppercase();
                if stack.is_empty() && component != "VCALENDAR" {
                    return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num)
                        .with_context(format!("expected VCALENDAR, got {component}")));
                }
                if component == "VEVENT" && stack.last().map(String::as_str) == Some("VCALENDAR") {
                    current = Some(RawEvent {
                        line: line_num,
                        ..RawEvent::default()
                    });
                }
                stack.push(component);
            }
            "END" => {
                let component = cl.value.trim().to_ascii_uppercase();
                match stack.pop() {
                    Some(open) if open == component => {}
                    Some(open) => {
                        return Err(ParseError::new(ParseErrorKind::MismatchedComponent, line_num)
                            .with_context(format!("expected END:{open}, got END:{component}")));
                    }
                    None => {
                        return Err(ParseError::new(ParseErrorKind::MismatchedComponent, line_num)
                            .with_context(format!("END:{component} without BEGIN")));
                    }
                }
                if component == "VEVENT" && stack.len() == 1 {
                    if let Some(event) = current.take() {
                        events.push(event);
                    }
                }
            }
            _ => {
                if stack.is_empty() {
                    return Err(ParseError::new(ParseErrorKind::StrayProperty, line_num)
                        .with_context(cl.name));
                }
                // Properties of nested components (VALARM) are not the event's.
                if stack.len() == 2 {
                    if let Some(event) = current.as_mut() {
                        apply_property(event, &cl, line_num)?;
                    }
                }
            }
        }
    }

    if let Some(open) = stack.pop() {
        return Err(ParseError::new(ParseErrorKind::MissingEnd, last_line)
            .with_context(format!("missing END:{open}")));
    }

    Ok(events)
}

fn apply_property(event: &mut RawEvent, cl: &ContentLine, line_num: usize) -> ParseResult<()> {
    match cl.name.as_str() {
        "UID" => event.uid = Some(cl.value.trim().to_string()),
        "SUMMARY" => event.summary = Some(unescape_text(&cl.value)),
        "DESCRIPTION" => event.description = Some(unescape_text(&cl.value)),
        "DTSTART" => event.start = Some(parse_event_time(cl, line_num)?),
        "DTEND" => event.end = Some(parse_event_time(cl, line_num)?),
        _ => {}
    }
    Ok(())
}

fn parse_event_time(cl: &ContentLine, line_num: usize) -> ParseResult<EventTime> {
    let value = cl.value.trim();
    let date_only = cl.param("VALUE") == Some("DATE") || (value.len() == 8 && !value.contains('T'));

    if date_only {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|e| {
            ParseError::new(ParseErrorKind::InvalidDate, line_num)
                .with_context(format!("{}: {e}", cl.name))
        })?;
        return Ok(EventTime {
            instant: date.and_time(chrono::NaiveTime::MIN).and_utc(),
            date_only: true,
        });
    }

    let invalid = |e: chrono::ParseError| {
        ParseError::new(ParseErrorKind::InvalidDateTime, line_num)
            .with_context(format!("{}: {e}", cl.name))
    };

    let instant = if let Some(utc) = value.strip_suffix('Z') {
        NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .map_err(invalid)?
            .and_utc()
    } else {
        let local = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(invalid)?;
        resolve_local(local, cl.param("TZID"))
    };

    Ok(EventTime {
        instant,
        date_only: false,
    })
}

/// Floating times and unknown zones are read as UTC.
fn resolve_local(local: NaiveDateTime, tzid: Option<&str>) -> DateTime<Utc> {
    let Some(tzid) = tzid else {
        return local.and_utc();
    };

    match tzid.parse::<Tz>() {
        Ok(tz) => match tz.from_local_datetime(&local).earliest() {
            Some(dt) => dt.with_timezone(&Utc),
            None => {
                // Inside a DST gap: use the offset in force just before it.
                tracing::warn!(tzid, %local, "Local time falls in a DST gap");
                tz.from_local_datetime(&(local - Duration::hours(1)))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc) + Duration::hours(1))
                    .unwrap_or_else(|| local.and_utc())
            }
        },
        Err(_) => {
            tracing::warn!(tzid, "Unknown TZID, reading time as UTC");
            local.and_utc()
        }
    }
}

fn into_event(raw: RawEvent, source: &CalendarSource) -> Option<NormalizedEvent> {
    let Some(uid) = raw.uid.filter(|u| !u.is_empty()) else {
        tracing::warn!(line = raw.line, "Dropping VEVENT without UID");
        return None;
    };
    let Some(start) = raw.start else {
        tracing::warn!(line = raw.line, uid = %uid, "Dropping VEVENT without DTSTART");
        return None;
    };

    let end = raw.end.map(|e| e.instant).unwrap_or_else(|| {
        if start.date_only {
            start.instant + Duration::days(1)
        } else {
            start.instant
        }
    });

    let start = start.instant + Duration::hours(START_CORRECTION_HOURS);
    let mut end = end + Duration::hours(END_CORRECTION_HOURS);
    if end < start {
        tracing::warn!(uid = %uid, %start, %end, "Event ends before it starts, clamping end");
        end = start;
    }

    Some(NormalizedEvent {
        id: uid,
        title: raw.summary.unwrap_or_default(),
        start,
        end,
        source: source.name.clone(),
        description: raw.description.filter(|d| !d.is_empty()),
        background_color: source.color.clone(),
        all_day: true,
    })
}
