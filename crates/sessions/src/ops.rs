//! Portal operations
//!
//! Each operation owns its parameters, so a single value can be run twice
//! (once more after a relogin) without borrowing from the caller's request.

use crate::error::PortalError;
use crate::model::*;
use crate::portal::Portal;
use async_trait::async_trait;
use chrono::NaiveDate;
use schoolbridge_common::ChildrenMap;

/// One typed fetch against a portal
#[async_trait]
pub trait PortalOperation: Send + Sync {
    type Output: Send;

    /// Stable name used in logs and metrics
    fn name(&self) -> &'static str;

    async fn run(&self, portal: &mut dyn Portal) -> Result<Self::Output, PortalError>;
}

#[derive(Debug, Clone, Default)]
pub struct FetchChildren;

#[async_trait]
impl PortalOperation for FetchChildren {
    type Output = ChildrenMap;

    fn name(&self) -> &'static str {
        "children_map"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<ChildrenMap, PortalError> {
        portal.children_map().await
    }
}

#[derive(Debug, Clone)]
pub struct FetchTimeTable {
    pub student_id: String,
    pub from: NaiveDate,
    pub days: u32,
}

#[async_trait]
impl PortalOperation for FetchTimeTable {
    type Output = TimeTable;

    fn name(&self) -> &'static str {
        "time_table"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<TimeTable, PortalError> {
        portal.time_table(&self.student_id, self.from, self.days).await
    }
}

#[derive(Debug, Clone)]
pub struct FetchWeekMarks {
    pub student_id: String,
    pub week: NaiveDate,
}

#[async_trait]
impl PortalOperation for FetchWeekMarks {
    type Output = WeekSchoolMarks;

    fn name(&self) -> &'static str {
        "week_marks"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<WeekSchoolMarks, PortalError> {
        portal.week_marks(&self.student_id, self.week).await
    }
}

#[derive(Debug, Clone)]
pub struct FetchLessonDescription {
    pub student_id: String,
    pub assignment_id: i64,
}

#[async_trait]
impl PortalOperation for FetchLessonDescription {
    type Output = LessonDescription;

    fn name(&self) -> &'static str {
        "lesson_description"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<LessonDescription, PortalError> {
        portal.lesson_description(&self.student_id, self.assignment_id).await
    }
}

#[derive(Debug, Clone)]
pub struct FetchTotalMarks {
    pub student_id: String,
}

#[async_trait]
impl PortalOperation for FetchTotalMarks {
    type Output = TotalMarkReport;

    fn name(&self) -> &'static str {
        "total_marks_report"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<TotalMarkReport, PortalError> {
        portal.total_marks_report(&self.student_id).await
    }
}

#[derive(Debug, Clone)]
pub struct FetchAverageMark {
    pub student_id: String,
    pub range: ReportRange,
}

#[async_trait]
impl PortalOperation for FetchAverageMark {
    type Output = AverageMarkReport;

    fn name(&self) -> &'static str {
        "average_mark_report"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<AverageMarkReport, PortalError> {
        portal.average_mark_report(&self.student_id, self.range).await
    }
}

#[derive(Debug, Clone)]
pub struct FetchAverageMarkDyn {
    pub student_id: String,
    pub range: ReportRange,
}

#[async_trait]
impl PortalOperation for FetchAverageMarkDyn {
    type Output = AverageMarkDynReport;

    fn name(&self) -> &'static str {
        "average_mark_dyn_report"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<AverageMarkDynReport, PortalError> {
        portal.average_mark_dyn_report(&self.student_id, self.range).await
    }
}

#[derive(Debug, Clone)]
pub struct FetchLessonsMap {
    pub student_id: String,
}

#[async_trait]
impl PortalOperation for FetchLessonsMap {
    type Output = LessonsMap;

    fn name(&self) -> &'static str {
        "lessons_map"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<LessonsMap, PortalError> {
        portal.lessons_map(&self.student_id).await
    }
}

#[derive(Debug, Clone)]
pub struct FetchStudentTotal {
    pub student_id: String,
    pub range: ReportRange,
}

#[async_trait]
impl PortalOperation for FetchStudentTotal {
    type Output = StudentTotalReport;

    fn name(&self) -> &'static str {
        "student_total_report"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<StudentTotalReport, PortalError> {
        portal.student_total_report(&self.student_id, self.range).await
    }
}

#[derive(Debug, Clone)]
pub struct FetchParentInfoLetter {
    pub student_id: String,
    pub report_type_id: String,
    pub period_id: String,
}

#[async_trait]
impl PortalOperation for FetchParentInfoLetter {
    type Output = ParentInfoLetterReport;

    fn name(&self) -> &'static str {
        "parent_info_letter_report"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<ParentInfoLetterReport, PortalError> {
        portal
            .parent_info_letter_report(&self.student_id, &self.report_type_id, &self.period_id)
            .await
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchMail;

#[async_trait]
impl PortalOperation for FetchMail {
    type Output = EmailsList;

    fn name(&self) -> &'static str {
        "mail"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<EmailsList, PortalError> {
        portal.mail().await
    }
}

#[derive(Debug, Clone)]
pub struct DeleteMail {
    pub box_id: String,
    pub message_ids: Vec<String>,
}

#[async_trait]
impl PortalOperation for DeleteMail {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_mail"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<(), PortalError> {
        portal.delete_mail(&self.box_id, &self.message_ids).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchPosts;

#[async_trait]
impl PortalOperation for FetchPosts {
    type Output = Posts;

    fn name(&self) -> &'static str {
        "posts"
    }

    async fn run(&self, portal: &mut dyn Portal) -> Result<Posts, PortalError> {
        portal.posts().await
    }
}
