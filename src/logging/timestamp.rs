//! Collision-resistant timestamp identifiers
//!
//! Session ids carry second resolution, iteration ids microsecond
//! resolution. Every call reads the clock fresh; distinctness across
//! iterations depends on call-time resolution, and no disambiguating
//! counter is appended — a same-microsecond collision surfaces later as a
//! directory-creation error, never a silent overwrite.

use chrono::{Local, SecondsFormat};

/// Session identifier: `YYYY-MM-DD-HH-MM-SS` (6 hyphen-separated fields).
pub fn session_id() -> String {
    Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// Iteration identifier: `YYYY-MM-DD-HH-MM-SS-ffffff` (7 fields, the last
/// exactly 6 zero-padded microsecond digits).
pub fn iteration_id() -> String {
    Local::now().format("%Y-%m-%d-%H-%M-%S-%6f").to_string()
}

/// Current local time as an ISO-8601 / RFC 3339 string for metadata.
pub fn iso_now() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDateTime};

    #[test]
    fn test_session_id_has_six_fields() {
        let id = session_id();
        assert_eq!(id.split('-').count(), 6);

        NaiveDateTime::parse_from_str(&id, "%Y-%m-%d-%H-%M-%S")
            .expect("session id should parse back as a timestamp");
    }

    #[test]
    fn test_iteration_id_has_seven_fields_with_micros_tail() {
        let id = iteration_id();
        let parts: Vec<&str> = id.split('-').collect();

        assert_eq!(parts.len(), 7);
        assert_eq!(parts[6].len(), 6);
        assert!(parts[6].chars().all(|c| c.is_ascii_digit()));

        let without_micros = parts[..6].join("-");
        NaiveDateTime::parse_from_str(&without_micros, "%Y-%m-%d-%H-%M-%S")
            .expect("iteration id prefix should parse back as a timestamp");
    }

    #[test]
    fn test_iteration_ids_are_fresh_per_call() {
        let ids: Vec<String> = (0..5).map(|_| iteration_id()).collect();
        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_iso_now_round_trips() {
        let stamp = iso_now();
        DateTime::parse_from_rfc3339(&stamp).expect("iso_now should emit RFC 3339");
    }
}
