//! Weekly calendar alignment.
//!
//! Lessons are stored with a concrete date, but they repeat every week. For
//! display they are moved onto the Monday-based week that contains `today`.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use entity::lesson;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleSlot {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl From<&lesson::Model> for ScheduleSlot {
    fn from(lesson: &lesson::Model) -> Self {
        Self {
            title: lesson.name.clone(),
            start: lesson.start_time.naive_local(),
            end: lesson.end_time.naive_local(),
        }
    }
}

/// Monday of the week containing `day`. Sunday belongs to the week that
/// started six days earlier.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

/// Moves every slot onto the week of `today`, keeping its weekday, its
/// hour and minute, and its duration.
pub fn align_to_week(slots: &[ScheduleSlot], today: NaiveDate) -> Vec<ScheduleSlot> {
    let monday = week_start(today);
    slots
        .iter()
        .map(|slot| {
            let offset = slot.start.weekday().num_days_from_monday();
            let day = monday + Duration::days(i64::from(offset));
            let time = NaiveTime::from_hms_opt(slot.start.hour(), slot.start.minute(), 0)
                .unwrap_or(NaiveTime::MIN);
            let start = day.and_time(time);
            ScheduleSlot {
                title: slot.title.clone(),
                start,
                end: start + (slot.end - slot.start),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot(title: &str, start: &str, end: &str) -> ScheduleSlot {
        ScheduleSlot {
            title: title.into(),
            start: NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M:%S").unwrap(),
            end: NaiveDateTime::parse_from_str(end, "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    #[test]
    fn sunday_closes_the_week() {
        // 2024-09-08 is a Sunday.
        assert_eq!(week_start(date(2024, 9, 8)), date(2024, 9, 2));
        assert_eq!(week_start(date(2024, 9, 2)), date(2024, 9, 2));
        assert_eq!(week_start(date(2024, 9, 4)), date(2024, 9, 2));
    }

    #[test]
    fn lessons_keep_weekday_time_and_duration() {
        // Wednesday lesson from an older term.
        let slots = [slot("Biology", "2023-01-11 10:15:42", "2023-01-11 11:00:42")];
        let aligned = align_to_week(&slots, date(2024, 9, 6));
        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].title, "Biology");
        assert_eq!(
            aligned[0].start,
            NaiveDateTime::parse_from_str("2024-09-04 10:15:00", "%Y-%m-%d %H:%M:%S").unwrap()
        );
        assert_eq!(aligned[0].end - aligned[0].start, Duration::minutes(45));
    }

    #[test]
    fn sunday_lessons_land_at_the_end_of_the_week() {
        let slots = [slot("Choir", "2024-01-07 18:00:00", "2024-01-07 19:30:00")];
        let aligned = align_to_week(&slots, date(2024, 9, 3));
        assert_eq!(aligned[0].start.date(), date(2024, 9, 8));
    }
}
