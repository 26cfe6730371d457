use chrono::{Local, NaiveDate};

/// Canonical attendance date format: `dd-MM-yyyy`.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Strict: no surrounding whitespace, zero-padded fields.
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    // chrono also accepts unpadded or space-padded fields.
    let fixed_width = date.len() == 10
        && date.bytes().enumerate().all(|(i, b)| match i {
            2 | 5 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !fixed_width {
        return None;
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

pub fn is_valid_date(date: &str) -> bool {
    parse_date(date).is_some()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn today() -> String {
    format_date(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_dates_only() {
        assert!(is_valid_date("01-09-2025"));
        assert!(is_valid_date("29-02-2024"));
        assert!(!is_valid_date("29-02-2025"));
        assert!(!is_valid_date("2025-09-01"));
        assert!(!is_valid_date("1-9-2025"));
        assert!(!is_valid_date("32-01-2025"));
        assert!(!is_valid_date(""));
    }

    #[test]
    fn surrounding_whitespace_is_invalid() {
        assert!(!is_valid_date(" 01-09-2025 "));
        assert!(!is_valid_date("01-09-2025\n"));
        assert!(!is_valid_date(" 1-09-2025"));
    }

    #[test]
    fn today_is_valid() {
        assert!(is_valid_date(&today()));
    }

    #[test]
    fn format_round_trips() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).expect("date");
        assert_eq!(format_date(d), "07-03-2025");
        assert_eq!(parse_date("07-03-2025"), Some(d));
    }
}
