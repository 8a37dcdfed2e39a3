//! API handlers module

pub mod auth;
pub mod diary;
pub mod health;
pub mod mail;
pub mod reports;
pub mod schools;

use chrono::NaiveDate;
use schoolbridge_common::errors::{AppError, Result};
use validator::Validate;

/// Dates are accepted as `dd.mm.yyyy` (what the mobile clients send) or ISO
const DATE_FORMATS: [&str; 2] = ["%d.%m.%Y", "%Y-%m-%d"];

/// Parse an optional request date, defaulting to today
pub fn parse_date(field: &str, value: Option<&str>) -> Result<NaiveDate> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(chrono::Local::now().date_naive());
    };

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| AppError::InvalidFormat {
            message: format!("{} must be a date like 01.09.2024, got {:?}", field, value),
        })
}

pub fn validate<T: Validate>(request: &T) -> Result<()> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })
}
