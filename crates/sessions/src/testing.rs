//! Scripted, instrumented portal for tests

use crate::error::PortalError;
use crate::model::*;
use crate::portal::{Portal, PortalFactory};
use async_trait::async_trait;
use chrono::NaiveDate;
use schoolbridge_common::{AuthData, ChildrenMap, Credentials, PortalKind, School, Student};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted result of one portal call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Ok,
    LoggedOut,
    Remote,
    Auth,
}

impl Step {
    fn into_result(self) -> Result<(), PortalError> {
        match self {
            Step::Ok => Ok(()),
            Step::LoggedOut => Err(PortalError::LoggedOut),
            Step::Remote => Err(PortalError::remote("scripted failure")),
            Step::Auth => Err(PortalError::auth("scripted rejection")),
        }
    }
}

/// Something a scripted portal instance did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Login(usize),
    FetchStart(usize),
    FetchEnd(usize),
    Logout(usize),
}

/// Shared script and call log for every portal a factory creates
#[derive(Debug)]
pub struct Script {
    logins: Mutex<VecDeque<Step>>,
    fetches: Mutex<VecDeque<Step>>,
    login_delays: Mutex<VecDeque<Duration>>,
    fallback: Step,
    delay: Duration,
    events: Mutex<Vec<Event>>,
    instances: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Script {
    /// Fetch results in order; `fallback` once the list runs out. Logins succeed.
    pub fn new(fetches: Vec<Step>, fallback: Step) -> Arc<Self> {
        Self::build(Vec::new(), fetches, fallback, Duration::ZERO)
    }

    pub fn build(logins: Vec<Step>, fetches: Vec<Step>, fallback: Step, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            logins: Mutex::new(logins.into_iter().collect()),
            fetches: Mutex::new(fetches.into_iter().collect()),
            login_delays: Mutex::new(VecDeque::new()),
            fallback,
            delay,
            events: Mutex::new(Vec::new()),
            instances: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Logins succeed, the n-th one only after the n-th delay
    pub fn slow_logins(delays: Vec<Duration>) -> Arc<Self> {
        let script = Self::build(Vec::new(), Vec::new(), Step::Ok, Duration::ZERO);
        script.login_delays.lock().unwrap().extend(delays);
        script
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }

    pub fn logins(&self) -> usize {
        self.count(|e| matches!(e, Event::Login(_)))
    }

    pub fn fetches(&self) -> usize {
        self.count(|e| matches!(e, Event::FetchStart(_)))
    }

    pub fn logouts(&self) -> usize {
        self.count(|e| matches!(e, Event::Logout(_)))
    }

    /// Highest number of fetches observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct ScriptedPortal {
    id: usize,
    script: Arc<Script>,
}

impl ScriptedPortal {
    async fn step(&mut self) -> Result<(), PortalError> {
        let script = &self.script;
        script.record(Event::FetchStart(self.id));

        let running = script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        script.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        script.in_flight.fetch_sub(1, Ordering::SeqCst);

        let step = script.fetches.lock().unwrap().pop_front().unwrap_or(script.fallback);
        script.record(Event::FetchEnd(self.id));
        step.into_result()
    }
}

#[async_trait]
impl Portal for ScriptedPortal {
    fn kind(&self) -> PortalKind {
        PortalKind::Demo
    }

    async fn login(&mut self) -> Result<(), PortalError> {
        self.script.record(Event::Login(self.id));
        let delay = self.script.login_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let step = self.script.logins.lock().unwrap().pop_front().unwrap_or(Step::Ok);
        step.into_result()
    }

    async fn logout(&mut self) -> Result<(), PortalError> {
        self.script.record(Event::Logout(self.id));
        Ok(())
    }

    async fn children_map(&mut self) -> Result<ChildrenMap, PortalError> {
        self.step().await?;
        let mut children = ChildrenMap::new();
        children.insert(
            "Anna".to_string(),
            Student {
                sid: "11".to_string(),
                clid: "5".to_string(),
            },
        );
        Ok(children)
    }

    async fn time_table(&mut self, _: &str, _: NaiveDate, _: u32) -> Result<TimeTable, PortalError> {
        self.step().await.map(|_| TimeTable::default())
    }

    async fn week_marks(&mut self, _: &str, _: NaiveDate) -> Result<WeekSchoolMarks, PortalError> {
        self.step().await.map(|_| WeekSchoolMarks::default())
    }

    async fn lesson_description(&mut self, _: &str, _: i64) -> Result<LessonDescription, PortalError> {
        self.step().await.map(|_| LessonDescription::default())
    }

    async fn total_marks_report(&mut self, _: &str) -> Result<TotalMarkReport, PortalError> {
        self.step().await.map(|_| TotalMarkReport::default())
    }

    async fn average_mark_report(&mut self, _: &str, _: ReportRange) -> Result<AverageMarkReport, PortalError> {
        self.step().await.map(|_| AverageMarkReport::default())
    }

    async fn average_mark_dyn_report(
        &mut self,
        _: &str,
        _: ReportRange,
    ) -> Result<AverageMarkDynReport, PortalError> {
        self.step().await.map(|_| AverageMarkDynReport::default())
    }

    async fn lessons_map(&mut self, _: &str) -> Result<LessonsMap, PortalError> {
        self.step().await.map(|_| LessonsMap::default())
    }

    async fn student_total_report(&mut self, _: &str, _: ReportRange) -> Result<StudentTotalReport, PortalError> {
        self.step().await.map(|_| StudentTotalReport::default())
    }

    async fn parent_info_letter_report(
        &mut self,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<ParentInfoLetterReport, PortalError> {
        self.step().await.map(|_| ParentInfoLetterReport::default())
    }

    async fn mail(&mut self) -> Result<EmailsList, PortalError> {
        self.step().await.map(|_| EmailsList::default())
    }

    async fn delete_mail(&mut self, _: &str, _: &[String]) -> Result<(), PortalError> {
        self.step().await
    }

    async fn posts(&mut self) -> Result<Posts, PortalError> {
        self.step().await.map(|_| Posts::default())
    }
}

/// Factory handing out scripted portals that share one script
pub struct ScriptedFactory {
    pub script: Arc<Script>,
}

impl PortalFactory for ScriptedFactory {
    fn create(&self, _auth: &AuthData) -> Result<Box<dyn Portal>, PortalError> {
        let id = self.script.instances.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPortal {
            id,
            script: Arc::clone(&self.script),
        }))
    }
}

pub fn auth_data() -> AuthData {
    AuthData {
        school: School {
            id: 1,
            name: "School 1".to_string(),
            url: "http://localhost".to_string(),
            kind: PortalKind::Demo,
            auth: BTreeMap::new(),
            permission: true,
        },
        credentials: Credentials::new("parent", "secret"),
    }
}
