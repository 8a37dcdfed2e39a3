//! Student report handlers

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::extract::{ApiJson, SignedIn};
use crate::handlers::parse_date;
use crate::AppState;
use schoolbridge_common::errors::{AppError, Result};
use schoolbridge_sessions::model::{
    AverageMarkDynReport, AverageMarkReport, LessonsMap, ParentInfoLetterReport, ReportRange, StudentTotalReport,
    TotalMarkReport,
};
use schoolbridge_sessions::ops::{
    FetchAverageMark, FetchAverageMarkDyn, FetchLessonsMap, FetchParentInfoLetter, FetchStudentTotal, FetchTotalMarks,
};

#[derive(Debug, Deserialize)]
pub struct TotalMarksRequest {
    /// Student id
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RangeReportRequest {
    /// Student id
    pub id: i64,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct ParentInfoLetterRequest {
    pub student_id: i64,
    pub report_type_id: i64,
    pub period_id: i64,
}

impl RangeReportRequest {
    fn range(&self) -> Result<ReportRange> {
        let range = ReportRange {
            from: parse_date("from", Some(&self.from))?,
            to: parse_date("to", Some(&self.to))?,
        };
        if !range.is_valid() {
            return Err(AppError::Validation {
                message: "from must not be after to".to_string(),
                field: Some("from".to_string()),
            });
        }
        Ok(range)
    }
}

pub async fn total_marks(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<TotalMarksRequest>,
) -> Result<Json<TotalMarkReport>> {
    let op = FetchTotalMarks {
        student_id: request.id.to_string(),
    };
    Ok(Json(state.fetch(&session, op).await?))
}

pub async fn average_mark(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<RangeReportRequest>,
) -> Result<Json<AverageMarkReport>> {
    let op = FetchAverageMark {
        range: request.range()?,
        student_id: request.id.to_string(),
    };
    Ok(Json(state.fetch(&session, op).await?))
}

pub async fn average_mark_dyn(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<RangeReportRequest>,
) -> Result<Json<AverageMarkDynReport>> {
    let op = FetchAverageMarkDyn {
        range: request.range()?,
        student_id: request.id.to_string(),
    };
    Ok(Json(state.fetch(&session, op).await?))
}

/// Subjects the grades report can be requested for
pub async fn grades_lesson_list(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<TotalMarksRequest>,
) -> Result<Json<LessonsMap>> {
    let op = FetchLessonsMap {
        student_id: request.id.to_string(),
    };
    Ok(Json(state.fetch(&session, op).await?))
}

/// Marks and attendance over a date range
pub async fn student_total(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<RangeReportRequest>,
) -> Result<Json<StudentTotalReport>> {
    let op = FetchStudentTotal {
        range: request.range()?,
        student_id: request.id.to_string(),
    };
    Ok(Json(state.fetch(&session, op).await?))
}

pub async fn parent_info_letter(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<ParentInfoLetterRequest>,
) -> Result<Json<ParentInfoLetterReport>> {
    let op = FetchParentInfoLetter {
        student_id: request.student_id.to_string(),
        report_type_id: request.report_type_id.to_string(),
        period_id: request.period_id.to_string(),
    };
    Ok(Json(state.fetch(&session, op).await?))
}
