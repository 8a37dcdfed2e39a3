//! Domain values produced by portal fetches
//!
//! Plain immutable data, serialized directly to the wire.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schedule for a run of consecutive days
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeTable {
    pub days: Vec<DayTimeTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayTimeTable {
    pub date: NaiveDate,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub begin: String,
    pub end: String,
    pub name: String,
    pub classroom: String,
}

/// Marks and homework for one school week
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekSchoolMarks {
    pub days: Vec<DaySchoolMarks>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchoolMarks {
    pub date: NaiveDate,
    pub lessons: Vec<SchoolMark>,
}

/// One assignment with its mark, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolMark {
    pub assignment_id: i64,
    pub class_meeting_id: i64,
    pub type_id: i32,
    pub subject: String,
    pub title: String,
    pub mark: Option<String>,
    pub weight: Option<i32>,
    /// Handed in on time
    pub in_time: bool,
    /// Marked as done by the user; filled from the store, never by a portal
    #[serde(default)]
    pub done: bool,
}

impl WeekSchoolMarks {
    /// Set the `done` flag of every assignment from a predicate
    pub fn apply_done<F>(&mut self, is_done: F)
    where
        F: Fn(i64) -> bool,
    {
        for mark in self.days.iter_mut().flat_map(|d| d.lessons.iter_mut()) {
            mark.done = is_done(mark.assignment_id);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonDescription {
    pub assignment_id: i64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub attachments: Vec<String>,
}

/// Marks per subject for the whole year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalMarkReport {
    pub subjects: BTreeMap<String, Vec<i32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMarkReport {
    pub rows: Vec<AverageMarkRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMarkRow {
    pub subject: String,
    pub student: Option<f64>,
    pub class: Option<f64>,
}

/// Average mark over time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMarkDynReport {
    pub points: Vec<AverageMarkDynPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMarkDynPoint {
    pub period: String,
    pub student: Option<f64>,
    pub class: Option<f64>,
}

/// Subjects a student's grades report can be built for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonsMap {
    pub lessons: Vec<LessonRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRef {
    pub id: String,
    pub name: String,
}

/// Marks and attendance per subject over a date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentTotalReport {
    pub rows: Vec<StudentTotalRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentTotalRow {
    pub subject: String,
    pub marks: Vec<i32>,
    pub average: Option<f64>,
    /// Lessons missed in the range
    #[serde(default)]
    pub absences: u32,
}

/// Template of the periodic information letter to parents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentInfoLetterReport {
    pub student: String,
    pub period: String,
    pub rows: Vec<ParentInfoLetterRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentInfoLetterRow {
    pub subject: String,
    pub marks: Vec<i32>,
    pub average: Option<f64>,
    pub period_mark: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailsList {
    pub letters: Vec<Letter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Letter {
    pub id: String,
    pub date: String,
    pub author: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Posts {
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub author: String,
    pub title: String,
    pub date: String,
    pub message: String,
}

/// Inclusive date range of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportRange {
    pub fn is_valid(&self) -> bool {
        self.from <= self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(assignment_id: i64) -> SchoolMark {
        SchoolMark {
            assignment_id,
            class_meeting_id: 1,
            type_id: 3,
            subject: "Algebra".to_string(),
            title: "Exercises 1-5".to_string(),
            mark: None,
            weight: None,
            in_time: true,
            done: false,
        }
    }

    #[test]
    fn test_apply_done() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let mut week = WeekSchoolMarks {
            days: vec![DaySchoolMarks { date, lessons: vec![mark(1), mark(2)] }],
        };

        week.apply_done(|id| id == 2);

        let done: Vec<bool> = week.days[0].lessons.iter().map(|m| m.done).collect();
        assert_eq!(done, vec![false, true]);
    }

    #[test]
    fn test_date_serialization() {
        let day = DayTimeTable {
            date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            lessons: vec![],
        };
        let json = serde_json::to_value(&day).unwrap();
        assert_eq!(json["date"], "2024-09-02");
    }

    #[test]
    fn test_report_range() {
        let from = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert!(ReportRange { from, to }.is_valid());
        assert!(!ReportRange { from: to, to: from }.is_valid());
    }
}
