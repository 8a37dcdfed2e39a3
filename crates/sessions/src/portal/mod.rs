//! Portal adapters
//!
//! One adapter per portal dialect, selected by the school's type tag. An
//! adapter owns the authenticated client state of exactly one user, so every
//! method takes `&mut self`: callers must hold the session guard to use it.

mod demo;
mod netschool;

pub use demo::DemoPortal;
pub use netschool::NetSchoolPortal;

use crate::error::PortalError;
use crate::model::*;
use async_trait::async_trait;
use chrono::NaiveDate;
use schoolbridge_common::config::PortalConfig;
use schoolbridge_common::{AuthData, ChildrenMap, PortalKind};
use std::time::Duration;

/// Login, fetch and logout against one school portal
#[async_trait]
pub trait Portal: Send + Sync {
    /// Dialect of this adapter
    fn kind(&self) -> PortalKind;

    /// Authenticate and store whatever the portal hands back. Safe to call
    /// again after a failure or after the portal dropped the session.
    async fn login(&mut self) -> Result<(), PortalError>;

    /// Best-effort remote logout; clears local auth state either way
    async fn logout(&mut self) -> Result<(), PortalError>;

    async fn children_map(&mut self) -> Result<ChildrenMap, PortalError>;

    /// Schedule for `days` consecutive days starting at `from`
    async fn time_table(
        &mut self,
        student_id: &str,
        from: NaiveDate,
        days: u32,
    ) -> Result<TimeTable, PortalError>;

    /// Marks for the school week containing `week`
    async fn week_marks(
        &mut self,
        student_id: &str,
        week: NaiveDate,
    ) -> Result<WeekSchoolMarks, PortalError>;

    async fn lesson_description(
        &mut self,
        student_id: &str,
        assignment_id: i64,
    ) -> Result<LessonDescription, PortalError>;

    async fn total_marks_report(&mut self, student_id: &str) -> Result<TotalMarkReport, PortalError>;

    async fn average_mark_report(
        &mut self,
        student_id: &str,
        range: ReportRange,
    ) -> Result<AverageMarkReport, PortalError>;

    async fn average_mark_dyn_report(
        &mut self,
        student_id: &str,
        range: ReportRange,
    ) -> Result<AverageMarkDynReport, PortalError>;

    /// Subjects available to the grades report
    async fn lessons_map(&mut self, student_id: &str) -> Result<LessonsMap, PortalError>;

    async fn student_total_report(
        &mut self,
        student_id: &str,
        range: ReportRange,
    ) -> Result<StudentTotalReport, PortalError>;

    async fn parent_info_letter_report(
        &mut self,
        student_id: &str,
        report_type_id: &str,
        period_id: &str,
    ) -> Result<ParentInfoLetterReport, PortalError>;

    async fn mail(&mut self) -> Result<EmailsList, PortalError>;

    async fn delete_mail(&mut self, box_id: &str, message_ids: &[String]) -> Result<(), PortalError>;

    async fn posts(&mut self) -> Result<Posts, PortalError>;
}

/// Builds an unauthenticated adapter for a user
pub trait PortalFactory: Send + Sync {
    fn create(&self, auth: &AuthData) -> Result<Box<dyn Portal>, PortalError>;
}

/// Factory dispatching on the school's portal type
pub struct HttpPortalFactory {
    timeout: Duration,
    user_agent: String,
}

impl HttpPortalFactory {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            timeout,
            user_agent: user_agent.into(),
        }
    }

    pub fn from_config(config: &PortalConfig) -> Self {
        Self::new(
            Duration::from_secs(config.request_timeout_secs),
            config.user_agent.clone(),
        )
    }
}

impl PortalFactory for HttpPortalFactory {
    fn create(&self, auth: &AuthData) -> Result<Box<dyn Portal>, PortalError> {
        match auth.school.kind {
            PortalKind::NetSchool => Ok(Box::new(NetSchoolPortal::new(
                auth.clone(),
                self.timeout,
                &self.user_agent,
            )?)),
            PortalKind::Demo => Ok(Box::new(DemoPortal::new(auth.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schoolbridge_common::{Credentials, School};
    use std::collections::BTreeMap;

    fn auth(kind: PortalKind) -> AuthData {
        AuthData {
            school: School {
                id: 1,
                name: "School 1".to_string(),
                url: "http://127.0.0.1:9".to_string(),
                kind,
                auth: BTreeMap::new(),
                permission: true,
            },
            credentials: Credentials::new("parent", "demo"),
        }
    }

    #[test]
    fn test_factory_dispatches_on_type() {
        let factory = HttpPortalFactory::new(Duration::from_secs(1), "test");
        assert_eq!(factory.create(&auth(PortalKind::Demo)).unwrap().kind(), PortalKind::Demo);
        assert_eq!(
            factory.create(&auth(PortalKind::NetSchool)).unwrap().kind(),
            PortalKind::NetSchool
        );
    }
}
