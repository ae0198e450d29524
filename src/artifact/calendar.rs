// Certvault — Calendar reminders
//
// iCalendar VEVENT lines reminding the user that an artifact expires.

use chrono::{DateTime, Utc};
use uuid::Uuid;

const ICS_TIME: &str = "%Y%m%dT%H%M%SZ";

/// Escape text values per RFC 5545 §3.3.11.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Build one VEVENT for `expires`, with an alarm one week ahead.
pub fn ics_vevent(expires: DateTime<Utc>, summary: &str, description: &str) -> Vec<String> {
    let stamp = Utc::now().format(ICS_TIME).to_string();
    let when = expires.format(ICS_TIME).to_string();
    vec![
        "BEGIN:VEVENT".to_string(),
        format!("DTSTAMP:{}", stamp),
        format!("UID:{}@certvault", Uuid::new_v4()),
        format!("DTSTART:{}", when),
        format!("DTEND:{}", when),
        format!("SUMMARY:{}", escape(summary)),
        format!("DESCRIPTION:{}", escape(description)),
        "BEGIN:VALARM".to_string(),
        "ACTION:DISPLAY".to_string(),
        format!("DESCRIPTION:{}", escape(summary)),
        "TRIGGER:-P7D".to_string(),
        "END:VALARM".to_string(),
        "END:VEVENT".to_string(),
    ]
}

// ─── Tests ───────────────────────────────────────────────────────────────────
