//! NetSchool web API adapter
//!
//! Login is a salted MD5 challenge; the portal answers with an access token
//! (`at`) that must accompany every later request. A 401, or an HTML page
//! where JSON was expected, means the portal dropped the session.

use super::Portal;
use crate::error::PortalError;
use crate::model::*;
use async_trait::async_trait;
use chrono::{Datelike, Duration as DateDuration, NaiveDate, NaiveDateTime};
use md5::{Digest, Md5};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use schoolbridge_common::{AuthData, ChildrenMap, PortalKind, Student};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Auth state handed out by a successful login
#[derive(Debug, Clone)]
struct AuthState {
    at: String,
    ver: String,
    year_id: i64,
}

/// Adapter for schools running NetSchool
pub struct NetSchoolPortal {
    client: Client,
    base_url: String,
    auth: AuthData,
    state: Option<AuthState>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct LoginData {
    lt: String,
    ver: String,
    salt: String,
}

#[derive(Deserialize)]
struct LoginReply {
    #[serde(default)]
    at: Option<String>,
}

#[derive(Deserialize)]
struct CurrentYear {
    id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiaryInit {
    students: Vec<InitStudent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitStudent {
    student_id: i64,
    nick_name: String,
    class_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Diary {
    #[serde(default)]
    week_days: Vec<DiaryDay>,
}

#[derive(Deserialize)]
struct DiaryDay {
    date: NaiveDateTime,
    #[serde(default)]
    lessons: Vec<DiaryLesson>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiaryLesson {
    class_meeting_id: i64,
    start_time: String,
    end_time: String,
    subject_name: String,
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    assignments: Vec<DiaryAssignment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiaryAssignment {
    id: i64,
    type_id: i32,
    assignment_name: String,
    #[serde(default)]
    mark: Option<DiaryMark>,
    #[serde(default)]
    weight: Option<i32>,
    /// Overdue
    #[serde(default)]
    dot: bool,
}

#[derive(Deserialize)]
struct DiaryMark {
    mark: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignDetails {
    id: i64,
    assignment_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    teacher: Option<Person>,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

#[derive(Deserialize)]
struct Person {
    name: String,
}

#[derive(Deserialize)]
struct Attachment {
    name: String,
}

#[derive(Deserialize)]
struct TotalMarks {
    subjects: Vec<SubjectMarks>,
}

#[derive(Deserialize)]
struct SubjectMarks {
    name: String,
    marks: Vec<i32>,
}

#[derive(Deserialize)]
struct SubjectRef {
    id: i64,
    name: String,
}

#[derive(Deserialize)]
struct MailRegistry {
    rows: Vec<MailRow>,
}

#[derive(Deserialize)]
struct MailRow {
    id: i64,
    sent: String,
    author: String,
    subject: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteMessages<'a> {
    box_id: &'a str,
    message_ids: &'a [String],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Announcement {
    #[serde(default)]
    author: Option<AnnouncementAuthor>,
    name: String,
    post_date: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct AnnouncementAuthor {
    fio: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// Challenge response for a login: `(pw2, pw)` where
/// `pw2 = md5(salt + md5(password))` and `pw` is its prefix of password length
pub(crate) fn login_hash(salt: &str, password: &str) -> (String, String) {
    let password_md5 = hex::encode(Md5::digest(password.as_bytes()));
    let pw2 = hex::encode(Md5::digest(format!("{}{}", salt, password_md5).as_bytes()));
    let pw = pw2.chars().take(password.chars().count()).collect();
    (pw2, pw)
}

/// Body of a successful response; 401 and login pages mean logged out
async fn read_body(response: Response) -> Result<String, PortalError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(PortalError::LoggedOut);
    }
    if !status.is_success() {
        return Err(PortalError::remote(format!("HTTP {}", status)));
    }

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));
    let body = response.text().await?;

    if is_html || body.trim_start().starts_with('<') {
        return Err(PortalError::LoggedOut);
    }
    Ok(body)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, PortalError> {
    let body = read_body(response).await?;
    serde_json::from_str(&body)
        .map_err(|e| PortalError::remote(format!("unexpected portal response: {}", e)))
}

/// There is no session to lose while logging in
fn during_login(err: PortalError) -> PortalError {
    match err {
        PortalError::LoggedOut => PortalError::remote("portal served a login page during login"),
        other => other,
    }
}

fn week_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = day - DateDuration::days(i64::from(day.weekday().num_days_from_monday()));
    (monday, monday + DateDuration::days(6))
}

impl NetSchoolPortal {
    pub fn new(auth: AuthData, timeout: Duration, user_agent: &str) -> Result<Self, PortalError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: auth.school.base_url().to_string(),
            auth,
            state: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn state(&self) -> Result<&AuthState, PortalError> {
        self.state.as_ref().ok_or(PortalError::LoggedOut)
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, PortalError> {
        let state = self.state()?;
        Ok(self.client.get(self.url(path)).header("at", &state.at))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, PortalError> {
        let state = self.state()?;
        Ok(self.client.post(self.url(path)).header("at", &state.at))
    }

    async fn diary(&self, student_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Diary, PortalError> {
        let year_id = self.state()?.year_id.to_string();
        let start = start.to_string();
        let end = end.to_string();

        let request = self.get("/webapi/student/diary")?.query(&[
            ("studentId", student_id),
            ("weekStart", start.as_str()),
            ("weekEnd", end.as_str()),
            ("yearId", year_id.as_str()),
        ]);
        read_json(request.send().await?).await
    }

    async fn report<T: DeserializeOwned>(
        &self,
        path: &str,
        student_id: &str,
        range: Option<ReportRange>,
    ) -> Result<T, PortalError> {
        let mut request = self.get(path)?.query(&[("studentId", student_id)]);
        if let Some(range) = range {
            request = request.query(&[("from", range.from.to_string()), ("to", range.to.to_string())]);
        }
        read_json(request.send().await?).await
    }
}

#[async_trait]
impl Portal for NetSchoolPortal {
    fn kind(&self) -> PortalKind {
        PortalKind::NetSchool
    }

    async fn login(&mut self) -> Result<(), PortalError> {
        self.state = None;

        // Primes the portal's own cookies
        let response = self.client.get(self.url("/webapi/logindata")).send().await?;
        read_body(response).await.map_err(during_login)?;

        let response = self.client.post(self.url("/webapi/auth/getdata")).send().await?;
        let data: LoginData = read_json(response).await.map_err(during_login)?;

        let credentials = &self.auth.credentials;
        let (pw2, pw) = login_hash(&data.salt, &credentials.password);

        let mut form: Vec<(&str, &str)> = vec![("LoginType", "1")];
        form.extend(self.auth.school.auth.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        form.extend([
            ("UN", credentials.login.as_str()),
            ("PW", pw.as_str()),
            ("lt", data.lt.as_str()),
            ("pw2", pw2.as_str()),
            ("ver", data.ver.as_str()),
        ]);

        let response = self.client.post(self.url("/webapi/login")).form(&form).send().await?;
        let status = response.status();
        if status.is_client_error() {
            return Err(PortalError::auth(format!("login rejected with HTTP {}", status)));
        }
        let reply: LoginReply = read_json(response).await.map_err(during_login)?;
        let at = reply
            .at
            .filter(|at| !at.is_empty())
            .ok_or_else(|| PortalError::auth("login reply carries no access token"))?;

        let response = self
            .client
            .get(self.url("/webapi/years/current"))
            .header("at", &at)
            .send()
            .await?;
        let year: CurrentYear = read_json(response).await.map_err(during_login)?;

        tracing::debug!(school_id = self.auth.school.id, year_id = year.id, "NetSchool login complete");

        self.state = Some(AuthState {
            at,
            ver: data.ver,
            year_id: year.id,
        });
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), PortalError> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.url("/asp/logout.asp"))
            .header("at", &state.at)
            .form(&[("at", state.at.as_str()), ("VER", state.ver.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PortalError::remote(format!("logout returned HTTP {}", response.status())));
        }
        Ok(())
    }

    async fn children_map(&mut self) -> Result<ChildrenMap, PortalError> {
        let init: DiaryInit = read_json(self.get("/webapi/student/diary/init")?.send().await?).await?;

        Ok(init
            .students
            .into_iter()
            .map(|s| {
                let student = Student {
                    sid: s.student_id.to_string(),
                    clid: s.class_id.to_string(),
                };
                (s.nick_name, student)
            })
            .collect())
    }

    async fn time_table(
        &mut self,
        student_id: &str,
        from: NaiveDate,
        days: u32,
    ) -> Result<TimeTable, PortalError> {
        let days = days.max(1);
        let end = from + DateDuration::days(i64::from(days) - 1);
        let diary = self.diary(student_id, from, end).await?;

        let mut by_date: BTreeMap<NaiveDate, Vec<Lesson>> = diary
            .week_days
            .into_iter()
            .map(|day| {
                let lessons = day
                    .lessons
                    .into_iter()
                    .map(|l| Lesson {
                        begin: l.start_time,
                        end: l.end_time,
                        name: l.subject_name,
                        classroom: l.room.unwrap_or_default(),
                    })
                    .collect();
                (day.date.date(), lessons)
            })
            .collect();

        let days = (0..days)
            .map(|offset| {
                let date = from + DateDuration::days(i64::from(offset));
                DayTimeTable {
                    date,
                    lessons: by_date.remove(&date).unwrap_or_default(),
                }
            })
            .collect();

        Ok(TimeTable { days })
    }

    async fn week_marks(
        &mut self,
        student_id: &str,
        week: NaiveDate,
    ) -> Result<WeekSchoolMarks, PortalError> {
        let (monday, sunday) = week_bounds(week);
        let diary = self.diary(student_id, monday, sunday).await?;

        let days = diary
            .week_days
            .into_iter()
            .map(|day| {
                let lessons = day
                    .lessons
                    .into_iter()
                    .flat_map(|lesson| {
                        let subject = lesson.subject_name;
                        let class_meeting_id = lesson.class_meeting_id;
                        lesson.assignments.into_iter().map(move |a| SchoolMark {
                            assignment_id: a.id,
                            class_meeting_id,
                            type_id: a.type_id,
                            subject: subject.clone(),
                            title: a.assignment_name,
                            mark: a.mark.and_then(|m| m.mark).map(|m| m.to_string()),
                            weight: a.weight,
                            in_time: !a.dot,
                            done: false,
                        })
                    })
                    .collect();
                DaySchoolMarks {
                    date: day.date.date(),
                    lessons,
                }
            })
            .collect();

        Ok(WeekSchoolMarks { days })
    }

    async fn lesson_description(
        &mut self,
        student_id: &str,
        assignment_id: i64,
    ) -> Result<LessonDescription, PortalError> {
        let path = format!("/webapi/student/diary/assigns/{}", assignment_id);
        let request = self.get(&path)?.query(&[("studentId", student_id)]);
        let details: AssignDetails = read_json(request.send().await?).await?;

        Ok(LessonDescription {
            assignment_id: details.id,
            title: details.assignment_name,
            description: details.description.unwrap_or_default(),
            author: details.teacher.map(|t| t.name).unwrap_or_default(),
            attachments: details.attachments.into_iter().map(|a| a.name).collect(),
        })
    }

    async fn total_marks_report(&mut self, student_id: &str) -> Result<TotalMarkReport, PortalError> {
        let report: TotalMarks = self
            .report("/webapi/reports/studenttotalmarks", student_id, None)
            .await?;

        Ok(TotalMarkReport {
            subjects: report.subjects.into_iter().map(|s| (s.name, s.marks)).collect(),
        })
    }

    async fn average_mark_report(
        &mut self,
        student_id: &str,
        range: ReportRange,
    ) -> Result<AverageMarkReport, PortalError> {
        self.report("/webapi/reports/studentaveragemark", student_id, Some(range))
            .await
    }

    async fn average_mark_dyn_report(
        &mut self,
        student_id: &str,
        range: ReportRange,
    ) -> Result<AverageMarkDynReport, PortalError> {
        self.report("/webapi/reports/studentaveragemarkdyn", student_id, Some(range))
            .await
    }

    async fn lessons_map(&mut self, student_id: &str) -> Result<LessonsMap, PortalError> {
        let subjects: Vec<SubjectRef> = self
            .report("/webapi/reports/studentgrades/subjects", student_id, None)
            .await?;

        Ok(LessonsMap {
            lessons: subjects
                .into_iter()
                .map(|s| LessonRef {
                    id: s.id.to_string(),
                    name: s.name,
                })
                .collect(),
        })
    }

    async fn student_total_report(
        &mut self,
        student_id: &str,
        range: ReportRange,
    ) -> Result<StudentTotalReport, PortalError> {
        self.report("/webapi/reports/studenttotal", student_id, Some(range))
            .await
    }

    async fn parent_info_letter_report(
        &mut self,
        student_id: &str,
        report_type_id: &str,
        period_id: &str,
    ) -> Result<ParentInfoLetterReport, PortalError> {
        let request = self.get("/webapi/reports/parentinfoletter")?.query(&[
            ("studentId", student_id),
            ("reportTypeId", report_type_id),
            ("periodId", period_id),
        ]);
        read_json(request.send().await?).await
    }

    async fn mail(&mut self) -> Result<EmailsList, PortalError> {
        let request = self.get("/webapi/mail/registry")?.query(&[("folderId", "1")]);
        let registry: MailRegistry = read_json(request.send().await?).await?;

        Ok(EmailsList {
            letters: registry
                .rows
                .into_iter()
                .map(|row| Letter {
                    id: row.id.to_string(),
                    date: row.sent,
                    author: row.author,
                    title: row.subject,
                })
                .collect(),
        })
    }

    async fn delete_mail(&mut self, box_id: &str, message_ids: &[String]) -> Result<(), PortalError> {
        let body = DeleteMessages { box_id, message_ids };
        let response = self.post("/webapi/mail/messages/delete")?.json(&body).send().await?;
        read_body(response).await.map(|_| ())
    }

    async fn posts(&mut self) -> Result<Posts, PortalError> {
        let announcements: Vec<Announcement> =
            read_json(self.get("/webapi/announcements")?.send().await?).await?;

        Ok(Posts {
            posts: announcements
                .into_iter()
                .map(|a| Post {
                    author: a.author.map(|p| p.fio).unwrap_or_default(),
                    title: a.name,
                    date: a.post_date,
                    message: a.description,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Query, State},
        http::HeaderMap,
        response::{Html, IntoResponse},
        routing::{get, post},
        Form, Json, Router,
    };
    use schoolbridge_common::{Credentials, School};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const SALT: &str = "303";

    /// In-process stand-in for a NetSchool server
    #[derive(Clone, Default)]
    struct FakePortal {
        token: Arc<Mutex<Option<String>>>,
        logins: Arc<AtomicUsize>,
        logouts: Arc<AtomicUsize>,
    }

    impl FakePortal {
        fn authorized(&self, headers: &HeaderMap) -> bool {
            let token = self.token.lock().unwrap();
            match (token.as_deref(), headers.get("at").and_then(|v| v.to_str().ok())) {
                (Some(expected), Some(got)) => expected == got,
                _ => false,
            }
        }

        /// Simulate the portal dropping the session on its side
        fn expire(&self) {
            *self.token.lock().unwrap() = None;
        }
    }

    async fn login(State(fake): State<FakePortal>, Form(form): Form<HashMap<String, String>>) -> axum::response::Response {
        let (pw2, _) = login_hash(SALT, "secret");
        let accepted = form.get("UN").map(String::as_str) == Some("parent")
            && form.get("pw2") == Some(&pw2)
            && form.get("scid").map(String::as_str) == Some("17");

        if !accepted {
            return (axum::http::StatusCode::BAD_REQUEST, Json(json!({"message": "wrong password"}))).into_response();
        }

        let n = fake.logins.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("token-{}", n);
        *fake.token.lock().unwrap() = Some(token.clone());
        Json(json!({ "at": token })).into_response()
    }

    async fn current_year(State(fake): State<FakePortal>, headers: HeaderMap) -> axum::response::Response {
        if !fake.authorized(&headers) {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
        Json(json!({ "id": 7 })).into_response()
    }

    async fn diary_init(State(fake): State<FakePortal>, headers: HeaderMap) -> axum::response::Response {
        if !fake.authorized(&headers) {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
        Json(json!({
            "students": [
                { "studentId": 11, "nickName": "Anna", "classId": 5 },
                { "studentId": 12, "nickName": "Boris", "classId": 8 }
            ]
        }))
        .into_response()
    }

    async fn diary(
        State(fake): State<FakePortal>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        if !fake.authorized(&headers) {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
        if query.get("yearId").map(String::as_str) != Some("7") {
            return axum::http::StatusCode::BAD_REQUEST.into_response();
        }
        let start = query.get("weekStart").cloned().unwrap_or_default();
        Json(json!({
            "weekDays": [{
                "date": format!("{}T00:00:00", start),
                "lessons": [{
                    "classMeetingId": 9,
                    "startTime": "08:30",
                    "endTime": "09:15",
                    "subjectName": "Physics",
                    "room": "204",
                    "assignments": [{
                        "id": 55,
                        "typeId": 3,
                        "assignmentName": "Read chapter 4",
                        "mark": { "mark": 5 },
                        "weight": 2,
                        "dot": false
                    }]
                }]
            }]
        }))
        .into_response()
    }

    async fn grades_subjects(State(fake): State<FakePortal>, headers: HeaderMap) -> axum::response::Response {
        if !fake.authorized(&headers) {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
        Json(json!([{ "id": 31, "name": "Physics" }, { "id": 32, "name": "Chemistry" }])).into_response()
    }

    async fn parent_info_letter(
        State(fake): State<FakePortal>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        if !fake.authorized(&headers) {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
        let period = format!("period {}", query.get("periodId").cloned().unwrap_or_default());
        Json(json!({
            "student": query.get("studentId"),
            "period": period,
            "rows": [{ "subject": "Physics", "marks": [5, 4], "average": 4.5, "period_mark": null }]
        }))
        .into_response()
    }

    async fn slow_mail() -> axum::response::Response {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Json(json!({ "rows": [] })).into_response()
    }

    async fn logout(State(fake): State<FakePortal>) -> axum::http::StatusCode {
        fake.logouts.fetch_add(1, Ordering::SeqCst);
        fake.expire();
        axum::http::StatusCode::OK
    }

    async fn spawn_fake() -> (String, FakePortal) {
        let fake = FakePortal::default();
        let app = Router::new()
            .route("/webapi/logindata", get(|| async { Json(json!({})) }))
            .route(
                "/webapi/auth/getdata",
                post(|| async { Json(json!({ "lt": "101", "ver": "202", "salt": SALT })) }),
            )
            .route("/webapi/login", post(login))
            .route("/webapi/years/current", get(current_year))
            .route("/webapi/student/diary/init", get(diary_init))
            .route("/webapi/student/diary", get(diary))
            .route(
                "/webapi/announcements",
                get(|| async { Html("<html><body>Please sign in</body></html>") }),
            )
            .route("/webapi/mail/registry", get(slow_mail))
            .route("/webapi/reports/studentgrades/subjects", get(grades_subjects))
            .route("/webapi/reports/parentinfoletter", get(parent_info_letter))
            .route("/asp/logout.asp", post(logout))
            .with_state(fake.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/", addr), fake)
    }

    fn portal(base_url: &str, password: &str) -> NetSchoolPortal {
        let auth = AuthData {
            school: School {
                id: 1,
                name: "Lyceum 2".to_string(),
                url: base_url.to_string(),
                kind: PortalKind::NetSchool,
                auth: [("cid", "2"), ("scid", "17")]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                permission: true,
            },
            credentials: Credentials::new("parent", password),
        };
        NetSchoolPortal::new(auth, Duration::from_millis(500), "schoolbridge-test").unwrap()
    }

    #[test]
    fn test_login_hash_prefix_matches_password_length() {
        let (pw2, pw) = login_hash("12345", "secret");
        assert_eq!(pw2.len(), 32);
        assert_eq!(pw.len(), 6);
        assert!(pw2.starts_with(&pw));
    }

    #[test]
    fn test_week_bounds() {
        let wednesday = NaiveDate::from_ymd_opt(2024, 9, 4).unwrap();
        let (monday, sunday) = week_bounds(wednesday);
        assert_eq!(monday, NaiveDate::from_ymd_opt(2024, 9, 2).unwrap());
        assert_eq!(sunday, NaiveDate::from_ymd_opt(2024, 9, 8).unwrap());
    }

    #[tokio::test]
    async fn test_login_and_children_map() {
        let (url, fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");

        portal.login().await.unwrap();
        let children = portal.children_map().await.unwrap();

        assert_eq!(fake.logins.load(Ordering::SeqCst), 1);
        assert_eq!(children.len(), 2);
        assert_eq!(children["Anna"].sid, "11");
        assert_eq!(children["Boris"].clid, "8");
    }

    #[tokio::test]
    async fn test_wrong_password_is_auth_error() {
        let (url, _fake) = spawn_fake().await;
        let mut portal = portal(&url, "wrong");

        let err = portal.login().await.unwrap_err();
        assert!(matches!(err, PortalError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_fetch_before_login_is_logged_out() {
        let (url, _fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        assert_eq!(portal.children_map().await.unwrap_err(), PortalError::LoggedOut);
    }

    #[tokio::test]
    async fn test_expired_token_is_logged_out_and_relogin_recovers() {
        let (url, fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        portal.login().await.unwrap();

        fake.expire();
        assert_eq!(portal.children_map().await.unwrap_err(), PortalError::LoggedOut);

        portal.login().await.unwrap();
        assert_eq!(portal.children_map().await.unwrap().len(), 2);
        assert_eq!(fake.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_login_page_is_logged_out() {
        let (url, _fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        portal.login().await.unwrap();

        assert_eq!(portal.posts().await.unwrap_err(), PortalError::LoggedOut);
    }

    #[tokio::test]
    async fn test_timeout_is_remote_error() {
        let (url, _fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        portal.login().await.unwrap();

        let err = portal.mail().await.unwrap_err();
        assert!(matches!(err, PortalError::Remote { .. }));
    }

    #[tokio::test]
    async fn test_unknown_endpoint_is_remote_error() {
        let (url, _fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        portal.login().await.unwrap();

        let err = portal.total_marks_report("11").await.unwrap_err();
        assert!(matches!(err, PortalError::Remote { .. }));
    }

    #[tokio::test]
    async fn test_time_table_fills_every_requested_day() {
        let (url, _fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        portal.login().await.unwrap();

        let from = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let table = portal.time_table("11", from, 3).await.unwrap();

        assert_eq!(table.days.len(), 3);
        assert_eq!(table.days[0].date, from);
        assert_eq!(table.days[0].lessons[0].name, "Physics");
        assert_eq!(table.days[0].lessons[0].classroom, "204");
        assert!(table.days[2].lessons.is_empty());
    }

    #[tokio::test]
    async fn test_week_marks_start_on_monday() {
        let (url, _fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        portal.login().await.unwrap();

        let wednesday = NaiveDate::from_ymd_opt(2024, 9, 4).unwrap();
        let week = portal.week_marks("11", wednesday).await.unwrap();

        assert_eq!(week.days[0].date, NaiveDate::from_ymd_opt(2024, 9, 2).unwrap());
        let mark = &week.days[0].lessons[0];
        assert_eq!(mark.assignment_id, 55);
        assert_eq!(mark.mark.as_deref(), Some("5"));
        assert!(mark.in_time);
        assert!(!mark.done);
    }

    #[tokio::test]
    async fn test_lessons_map() {
        let (url, _fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        portal.login().await.unwrap();

        let lessons = portal.lessons_map("11").await.unwrap();
        let names: Vec<&str> = lessons.lessons.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Physics", "Chemistry"]);
        assert_eq!(lessons.lessons[0].id, "31");
    }

    #[tokio::test]
    async fn test_parent_info_letter_passes_ids() {
        let (url, fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        portal.login().await.unwrap();

        let letter = portal.parent_info_letter_report("11", "1", "3").await.unwrap();
        assert_eq!(letter.student, "11");
        assert_eq!(letter.period, "period 3");
        assert_eq!(letter.rows[0].average, Some(4.5));
        assert_eq!(letter.rows[0].period_mark, None);

        fake.expire();
        let err = portal.parent_info_letter_report("11", "1", "3").await.unwrap_err();
        assert_eq!(err, PortalError::LoggedOut);
    }

    #[tokio::test]
    async fn test_logout_clears_state() {
        let (url, fake) = spawn_fake().await;
        let mut portal = portal(&url, "secret");
        portal.login().await.unwrap();

        portal.logout().await.unwrap();
        assert_eq!(fake.logouts.load(Ordering::SeqCst), 1);
        assert_eq!(portal.children_map().await.unwrap_err(), PortalError::LoggedOut);

        // Nothing to log out from
        portal.logout().await.unwrap();
        assert_eq!(fake.logouts.load(Ordering::SeqCst), 1);
    }
}
