//! Parser for pasted `/who` output from the game client.
//!
//! Best-effort extraction: a malformed timestamp or level degrades the
//! sighting rather than dropping the line. Only an unextractable character
//! name is fatal to a line. Lines for players with no guild tag and no
//! ANONYMOUS marker are noise and skipped entirely.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Timestamp format the game client prefixes each line with,
/// e.g. `Thu May 25 22:10:50 2023`.
const WHO_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Status annotations that can appear anywhere on a line. Stripped before
/// parsing so they are never mistaken for guild tags or name content.
const STATUS_TAGS: &[&str] = &[" AFK ", " LFG", " <LINKDEAD>"];

/// One player observed in a who log, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    pub timestamp: DateTime<Utc>,
    pub level: Option<i64>,
    pub class_name: Option<String>,
    pub name: String,
    pub guild: Option<String>,
}

/// Parses a raw multi-line who log into sightings, preserving input order
/// and duplicates.
pub fn parse_who_log(raw: &str) -> Vec<Sighting> {
    raw.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Sighting> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    // Unguilded, non-anonymous players are not attendance evidence.
    let has_guild_tag = line.contains('<') && line.contains('>');
    if !has_guild_tag && !line.contains("ANONYMOUS") {
        return None;
    }

    let mut line = line.to_string();
    for tag in STATUS_TAGS {
        line = line.replace(tag, "");
    }

    // Leading bracket is the timestamp. Without it there is no `] ` anchor
    // for the name, so the line is unusable.
    let (timestamp_raw, rest) = take_bracket(&line)?;
    let timestamp = parse_timestamp(timestamp_raw);

    let (level, class_name, rest) = match take_bracket(rest) {
        Some((details, tail)) => {
            let (level, class_name) = parse_level_class(details);
            (level, class_name, tail)
        }
        None => (None, None, rest),
    };

    let name = extract_name(rest)?;
    let guild = extract_guild(rest);

    Some(Sighting {
        timestamp,
        level,
        class_name,
        name,
        guild,
    })
}

/// Splits a leading `[...]` group off `s`, returning its contents and the
/// remainder after the closing bracket.
fn take_bracket(s: &str) -> Option<(&str, &str)> {
    let inner = s.trim_start().strip_prefix('[')?;
    let end = inner.find(']')?;
    Some((&inner[..end], &inner[end + 1..]))
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    // The client space-pads single-digit days; collapse runs of whitespace
    // before parsing.
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, WHO_TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(|_| Utc::now())
}

/// Parses the second bracket group: `[level class]` or `[ANONYMOUS]`.
fn parse_level_class(details: &str) -> (Option<i64>, Option<String>) {
    let details = details.trim();
    if details == "ANONYMOUS" || details.is_empty() {
        return (None, None);
    }

    let mut tokens = details.split_whitespace();
    let first = tokens.next().unwrap_or_default();
    match first.parse::<i64>() {
        Ok(level) => {
            let class_name = tokens.collect::<Vec<_>>().join(" ");
            let class_name = (!class_name.is_empty()).then_some(class_name);
            (Some(level), class_name)
        }
        // No leading level; the whole bracket is the class.
        Err(_) => (None, Some(details.to_string())),
    }
}

/// The character name is the run of non-bracket characters after the last
/// bracket group, up to the next `[`, `<`, or `(`.
fn extract_name(rest: &str) -> Option<String> {
    let end = rest
        .find(|c| matches!(c, '[' | '<' | '('))
        .unwrap_or(rest.len());
    let name = rest[..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn extract_guild(rest: &str) -> Option<String> {
    let start = rest.find('<')?;
    let end = rest[start + 1..].find('>')?;
    let guild = rest[start + 1..start + 1 + end].trim();
    (!guild.is_empty()).then(|| guild.to_string())
}
