//! Calendar context for recommendations: season and nearby Chinese holidays.

use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Mar–May spring, Jun–Aug summer, Sep–Nov autumn, else winter.
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

pub fn season_label(season: Season) -> &'static str {
    match season {
        Season::Spring => "春季",
        Season::Summer => "夏季",
        Season::Autumn => "秋季",
        Season::Winter => "冬季",
    }
}

/// Holidays near `date`, used to flavor the generated packages.
///
/// Lunar festivals are approximated by Gregorian windows; good enough for
/// prompt context, not for calendars.
pub fn nearby_holidays(date: NaiveDate) -> Vec<&'static str> {
    let month = date.month();
    let day = date.day();

    let mut holidays = Vec::new();

    if (month == 1 && day >= 20) || (month == 2 && day <= 20) {
        holidays.push("春节");
    }
    if month == 2 {
        holidays.push("元宵节");
    }
    if month == 4 && (4..=6).contains(&day) {
        holidays.push("清明节");
    }
    if month == 5 || month == 6 {
        holidays.push("端午节");
    }
    if month == 9 {
        holidays.push("中秋节");
    }
    if month == 10 && (1..=7).contains(&day) {
        holidays.push("国庆节");
    }
    if month == 12 && (20..=31).contains(&day) {
        holidays.push("圣诞节");
    }

    holidays
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn months_map_to_seasons() {
        assert_eq!(Season::from_month(3), Season::Spring);
        assert_eq!(Season::from_month(5), Season::Spring);
        assert_eq!(Season::from_month(6), Season::Summer);
        assert_eq!(Season::from_month(8), Season::Summer);
        assert_eq!(Season::from_month(9), Season::Autumn);
        assert_eq!(Season::from_month(11), Season::Autumn);
        assert_eq!(Season::from_month(12), Season::Winter);
        assert_eq!(Season::from_month(1), Season::Winter);
        assert_eq!(Season::from_month(2), Season::Winter);
    }

    #[test]
    fn mid_autumn_window() {
        assert!(nearby_holidays(day("2025-09-15")).contains(&"中秋节"));
        assert!(!nearby_holidays(day("2025-08-15")).contains(&"中秋节"));
    }

    #[test]
    fn spring_festival_window_spans_two_months() {
        assert!(nearby_holidays(day("2026-01-25")).contains(&"春节"));
        assert!(nearby_holidays(day("2026-02-10")).contains(&"春节"));
        assert!(!nearby_holidays(day("2026-01-10")).contains(&"春节"));
    }

    #[test]
    fn national_day_week_only() {
        assert!(nearby_holidays(day("2025-10-03")).contains(&"国庆节"));
        assert!(nearby_holidays(day("2025-10-08")).is_empty());
    }
}
