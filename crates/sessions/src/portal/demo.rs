//! Demo portal with canned data
//!
//! Accepts any login whose password equals the school's `demo_password`
//! auth parameter (`demo` when unset). Data is deterministic.

use super::Portal;
use crate::error::PortalError;
use crate::model::*;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use schoolbridge_common::{AuthData, ChildrenMap, PortalKind, Student};

const DEFAULT_PASSWORD: &str = "demo";
const MAIL_BOX: &str = "inbox";

const SUBJECTS: [(&str, &str); 5] = [
    ("Mathematics", "101"),
    ("Russian", "204"),
    ("Physics", "305"),
    ("History", "112"),
    ("English", "210"),
];

const BELLS: [(&str, &str); 4] = [
    ("08:30", "09:15"),
    ("09:25", "10:10"),
    ("10:30", "11:15"),
    ("11:35", "12:20"),
];

pub struct DemoPortal {
    auth: AuthData,
    logged_in: bool,
    letters: Vec<Letter>,
}

impl DemoPortal {
    pub fn new(auth: AuthData) -> Self {
        let letters = (1..=3)
            .map(|n| Letter {
                id: n.to_string(),
                date: format!("2024-09-0{}", n),
                author: "Class teacher".to_string(),
                title: format!("Notice #{}", n),
            })
            .collect();

        Self {
            auth,
            logged_in: false,
            letters,
        }
    }

    fn ensure_logged_in(&self) -> Result<(), PortalError> {
        if self.logged_in {
            Ok(())
        } else {
            Err(PortalError::LoggedOut)
        }
    }

    fn lessons(date: NaiveDate) -> Vec<(usize, &'static str, &'static str)> {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Vec::new();
        }
        let shift = date.weekday().num_days_from_monday() as usize;
        BELLS
            .iter()
            .enumerate()
            .map(|(slot, _)| {
                let (subject, room) = SUBJECTS[(slot + shift) % SUBJECTS.len()];
                (slot, subject, room)
            })
            .collect()
    }
}

fn assignment_id(date: NaiveDate, slot: usize) -> i64 {
    i64::from(date.num_days_from_ce()) * 10 + slot as i64
}

#[async_trait]
impl Portal for DemoPortal {
    fn kind(&self) -> PortalKind {
        PortalKind::Demo
    }

    async fn login(&mut self) -> Result<(), PortalError> {
        let expected = self.auth.school.auth_param("demo_password").unwrap_or(DEFAULT_PASSWORD);
        if self.auth.credentials.password != expected {
            self.logged_in = false;
            return Err(PortalError::auth("invalid demo password"));
        }
        self.logged_in = true;
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), PortalError> {
        self.logged_in = false;
        Ok(())
    }

    async fn children_map(&mut self) -> Result<ChildrenMap, PortalError> {
        self.ensure_logged_in()?;
        let mut children = ChildrenMap::new();
        children.insert(
            "Demo Student".to_string(),
            Student {
                sid: "1001".to_string(),
                clid: "501".to_string(),
            },
        );
        Ok(children)
    }

    async fn time_table(
        &mut self,
        _student_id: &str,
        from: NaiveDate,
        days: u32,
    ) -> Result<TimeTable, PortalError> {
        self.ensure_logged_in()?;
        let days = (0..days.max(1))
            .map(|offset| {
                let date = from + Duration::days(i64::from(offset));
                let lessons = Self::lessons(date)
                    .into_iter()
                    .map(|(slot, subject, room)| Lesson {
                        begin: BELLS[slot].0.to_string(),
                        end: BELLS[slot].1.to_string(),
                        name: subject.to_string(),
                        classroom: room.to_string(),
                    })
                    .collect();
                DayTimeTable { date, lessons }
            })
            .collect();
        Ok(TimeTable { days })
    }

    async fn week_marks(
        &mut self,
        _student_id: &str,
        week: NaiveDate,
    ) -> Result<WeekSchoolMarks, PortalError> {
        self.ensure_logged_in()?;
        let monday = week - Duration::days(i64::from(week.weekday().num_days_from_monday()));

        let days = (0..5)
            .map(|offset| {
                let date = monday + Duration::days(offset);
                let lessons = Self::lessons(date)
                    .into_iter()
                    .map(|(slot, subject, _)| {
                        let id = assignment_id(date, slot);
                        SchoolMark {
                            assignment_id: id,
                            class_meeting_id: id / 10,
                            type_id: 3,
                            subject: subject.to_string(),
                            title: format!("{} homework", subject),
                            mark: (slot % 2 == 0).then(|| (3 + id % 3).to_string()),
                            weight: Some(1),
                            in_time: true,
                            done: false,
                        }
                    })
                    .collect();
                DaySchoolMarks { date, lessons }
            })
            .collect();
        Ok(WeekSchoolMarks { days })
    }

    async fn lesson_description(
        &mut self,
        _student_id: &str,
        assignment_id: i64,
    ) -> Result<LessonDescription, PortalError> {
        self.ensure_logged_in()?;
        Ok(LessonDescription {
            assignment_id,
            title: format!("Assignment {}", assignment_id),
            description: "Solve the exercises at the end of the chapter.".to_string(),
            author: "Demo Teacher".to_string(),
            attachments: Vec::new(),
        })
    }

    async fn total_marks_report(&mut self, _student_id: &str) -> Result<TotalMarkReport, PortalError> {
        self.ensure_logged_in()?;
        Ok(TotalMarkReport {
            subjects: SUBJECTS
                .iter()
                .enumerate()
                .map(|(i, (subject, _))| (subject.to_string(), vec![5, 4, 3 + (i as i32 % 3)]))
                .collect(),
        })
    }

    async fn average_mark_report(
        &mut self,
        _student_id: &str,
        _range: ReportRange,
    ) -> Result<AverageMarkReport, PortalError> {
        self.ensure_logged_in()?;
        Ok(AverageMarkReport {
            rows: SUBJECTS
                .iter()
                .enumerate()
                .map(|(i, (subject, _))| AverageMarkRow {
                    subject: subject.to_string(),
                    student: Some(4.0 + i as f64 / 10.0),
                    class: Some(3.9),
                })
                .collect(),
        })
    }

    async fn average_mark_dyn_report(
        &mut self,
        _student_id: &str,
        range: ReportRange,
    ) -> Result<AverageMarkDynReport, PortalError> {
        self.ensure_logged_in()?;
        Ok(AverageMarkDynReport {
            points: vec![
                AverageMarkDynPoint {
                    period: range.from.to_string(),
                    student: Some(4.1),
                    class: Some(3.8),
                },
                AverageMarkDynPoint {
                    period: range.to.to_string(),
                    student: Some(4.3),
                    class: Some(3.9),
                },
            ],
        })
    }

    async fn lessons_map(&mut self, _student_id: &str) -> Result<LessonsMap, PortalError> {
        self.ensure_logged_in()?;
        Ok(LessonsMap {
            lessons: SUBJECTS
                .iter()
                .map(|(subject, room)| LessonRef {
                    id: room.to_string(),
                    name: subject.to_string(),
                })
                .collect(),
        })
    }

    async fn student_total_report(
        &mut self,
        _student_id: &str,
        range: ReportRange,
    ) -> Result<StudentTotalReport, PortalError> {
        self.ensure_logged_in()?;
        let weeks = ((range.to - range.from).num_days().max(0) / 7 + 1) as u32;
        Ok(StudentTotalReport {
            rows: SUBJECTS
                .iter()
                .enumerate()
                .map(|(i, (subject, _))| StudentTotalRow {
                    subject: subject.to_string(),
                    marks: vec![5, 4, 3 + (i as i32 % 3)],
                    average: Some(4.0 + (i % 3) as f64 / 3.0),
                    absences: weeks / (i as u32 + 2),
                })
                .collect(),
        })
    }

    async fn parent_info_letter_report(
        &mut self,
        _student_id: &str,
        report_type_id: &str,
        period_id: &str,
    ) -> Result<ParentInfoLetterReport, PortalError> {
        self.ensure_logged_in()?;
        let period = match period_id {
            "1" => "1st term",
            "2" => "2nd term",
            "3" => "3rd term",
            "4" => "4th term",
            other => return Err(PortalError::remote(format!("unknown period {}", other))),
        };
        let with_period_marks = report_type_id == "2";

        Ok(ParentInfoLetterReport {
            student: "Demo Student".to_string(),
            period: period.to_string(),
            rows: SUBJECTS
                .iter()
                .map(|(subject, _)| ParentInfoLetterRow {
                    subject: subject.to_string(),
                    marks: vec![5, 4, 4],
                    average: Some(4.33),
                    period_mark: with_period_marks.then(|| "4".to_string()),
                })
                .collect(),
        })
    }

    async fn mail(&mut self) -> Result<EmailsList, PortalError> {
        self.ensure_logged_in()?;
        Ok(EmailsList {
            letters: self.letters.clone(),
        })
    }

    async fn delete_mail(&mut self, box_id: &str, message_ids: &[String]) -> Result<(), PortalError> {
        self.ensure_logged_in()?;
        if box_id != MAIL_BOX {
            return Err(PortalError::remote(format!("unknown mail box {}", box_id)));
        }
        self.letters.retain(|letter| !message_ids.contains(&letter.id));
        Ok(())
    }

    async fn posts(&mut self) -> Result<Posts, PortalError> {
        self.ensure_logged_in()?;
        Ok(Posts {
            posts: vec![Post {
                author: "Administration".to_string(),
                title: "Parent meeting".to_string(),
                date: "2024-09-10".to_string(),
                message: "The autumn parent meeting starts at 18:00 in the assembly hall.".to_string(),
            }],
        })
    }
}
