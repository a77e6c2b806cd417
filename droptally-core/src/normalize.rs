//! Pure normalization and formatting helpers shared by auth, dedup, the
//! entity resolver, and the external clients.

use chrono::{Datelike, NaiveDateTime};

/// Normalizes a player display name for equivalence comparison. The external
/// metadata service replaces hyphens/underscores with spaces, so `-` and `_`
/// become a single space, whitespace collapses, and the result lowercases.
pub fn normalize_display_equivalence(name: &str) -> String {
    name.replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn display_names_equivalent(a: &str, b: &str) -> bool {
    normalize_display_equivalence(a) == normalize_display_equivalence(b)
}

/// Compacts an NPC name to its underscore form for cache/metric keys.
pub fn normalize_npc_name(npc_name: &str) -> String {
    npc_name.trim().replace(' ', "_")
}

/// Parses a kill time from the plugin: `MM:SS.t`, `HH:MM:SS.t`, or a plain
/// integer millisecond count. Trailing `.t` digits are hundredths of a
/// second. Returns None for anything unparseable.
pub fn parse_time_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.contains(':') {
        return raw.parse::<i64>().ok();
    }

    let mut parts = raw.split(':').collect::<Vec<_>>();
    let seconds_part = parts.pop()?;
    let (seconds, ticks) = match seconds_part.split_once('.') {
        Some((s, t)) => (s.parse::<i64>().ok()?, t.parse::<i64>().ok()?),
        None => (seconds_part.parse::<i64>().ok()?, 0),
    };

    let total_seconds = match parts.as_slice() {
        [minutes] => minutes.parse::<i64>().ok()? * 60 + seconds,
        [hours, minutes] => {
            hours.parse::<i64>().ok()? * 3600 + minutes.parse::<i64>().ok()? * 60 + seconds
        }
        _ => return None,
    };

    Some(total_seconds * 1000 + ticks * 10)
}

/// Formats milliseconds back to `M:SS.t` (or `H:MM:SS.t` past an hour).
pub fn format_time_ms(ms: i64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let ticks = (ms % 1000) / 100;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}.{ticks}")
    } else {
        format!("{minutes}:{seconds:02}.{ticks}")
    }
}

/// Monthly partition label: `year * 100 + month`.
pub fn monthly_partition(at: NaiveDateTime) -> i32 {
    at.year() * 100 + at.month() as i32
}

/// Daily partition label: `YYYYMMDD`.
pub fn daily_partition(at: NaiveDateTime) -> String {
    format!("{:04}{:02}{:02}", at.year(), at.month(), at.day())
}

/// The timestamp format stored inside Redis item CSVs and recent-item
/// entries. Lexicographic order matches chronological order.
pub fn redis_timestamp(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Maps an upload's declared content type to a normalized image extension.
pub fn extension_from_content_type(content_type: Option<&str>) -> &'static str {
    let Some(content_type) = content_type else {
        return "jpg";
    };
    let lower = content_type.to_lowercase();
    if lower.contains("png") {
        "png"
    } else if lower.contains("gif") {
        "gif"
    } else if lower.contains("webp") {
        "webp"
    } else {
        "jpg"
    }
}

/// Strips filesystem-hostile characters, collapses whitespace to `_`, and
/// trims leading/trailing dots and spaces.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    cleaned.trim_matches(['.', ' ', '_'].as_slice()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn display_equivalence_treats_separators_as_spaces() {
        assert!(display_names_equivalent("Iron-Bru", "iron bru"));
        assert!(display_names_equivalent("Iron_Bru", "Iron-Bru"));
        assert!(display_names_equivalent("  Iron   Bru ", "iron bru"));
        assert!(!display_names_equivalent("IronBru", "Iron Bru"));
    }

    #[test]
    fn parses_plugin_time_formats() {
        assert_eq!(parse_time_ms("1:33.00"), Some(93_000));
        assert_eq!(parse_time_ms("0:50.40"), Some(50_400));
        assert_eq!(parse_time_ms("1:02:03.5"), Some(3_723_050));
        assert_eq!(parse_time_ms("45000"), Some(45_000));
        assert_eq!(parse_time_ms("garbage"), None);
        assert_eq!(parse_time_ms(""), None);
    }

    #[test]
    fn formats_round_trip_to_tenths() {
        assert_eq!(format_time_ms(93_000), "1:33.0");
        assert_eq!(format_time_ms(50_400), "0:50.4");
        assert_eq!(format_time_ms(3_723_050), "1:02:03.0");
    }

    #[test]
    fn partition_labels() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(monthly_partition(at), 202503);
        assert_eq!(daily_partition(at), "20250307");
    }

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(sanitize_filename("King Black Dragon"), "King_Black_Dragon");
        assert_eq!(sanitize_filename("a<b>c:d"), "a_b_c_d");
        assert_eq!(sanitize_filename(".hidden. "), "hidden");
    }

    #[test]
    fn content_types_normalize_to_known_extensions() {
        assert_eq!(extension_from_content_type(Some("image/png")), "png");
        assert_eq!(extension_from_content_type(Some("image/jpeg")), "jpg");
        assert_eq!(extension_from_content_type(Some("image/webp")), "webp");
        assert_eq!(extension_from_content_type(Some("application/pdf")), "jpg");
        assert_eq!(extension_from_content_type(None), "jpg");
    }
}
