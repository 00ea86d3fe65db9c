//! Display formatting
//!
//! Russian-locale text for prices, areas, counts and dates, matching what
//! the mobile app shows on its record cards.

use crate::database::{Currency, Record};
use chrono::{Datelike, Duration, NaiveDate};

/// Digit group separator used by the ru-RU locale (no-break space)
const GROUP_SEPARATOR: char = '\u{a0}';

const MONTHS_GENITIVE: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Round to a whole number and group digits by thousands
pub fn format_number(value: f64) -> String {
    let rounded = value.round();
    if !rounded.is_finite() {
        return "0".to_string();
    }

    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(GROUP_SEPARATOR);
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

pub fn format_money(amount: f64, currency: Currency) -> String {
    format!("{}{}", currency.symbol(), format_number(amount))
}

pub fn format_area(area: f64) -> String {
    format!("{:.1} м²", area)
}

/// "1 ковер", "3 ковра", "5 ковров"
pub fn carpet_count_text(count: usize) -> String {
    let word = match (count % 10, count % 100) {
        (1, n) if n != 11 => "ковер",
        (2..=4, n) if !(12..=14).contains(&n) => "ковра",
        _ => "ковров",
    };
    format!("{} {}", count, word)
}

/// Day and genitive month, e.g. "15 января"
pub fn format_deadline(date: NaiveDate) -> String {
    format!("{} {}", date.day(), MONTHS_GENITIVE[date.month0() as usize])
}

pub fn status_text(is_done: bool) -> &'static str {
    if is_done {
        "Выполнено"
    } else {
        "В работе"
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// Move `date` by `days`, saturating at the calendar limits
pub fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Multi-line summary of a record, as shown on its card
pub fn record_card(record: &Record, currency: Currency) -> String {
    let mut lines = vec![format!(
        "{}  {}  {}",
        record.address,
        format_money(record.total_price, currency),
        format_area(record.total_area)
    )];
    if let Some(deadline) = record.deadline {
        lines.push(format!("Дедлайн: {}", format_deadline(deadline)));
    }
    lines.push(format!(
        "{} · {}",
        carpet_count_text(record.carpets.len()),
        status_text(record.is_done)
    ));
    lines.join("\n")
}
