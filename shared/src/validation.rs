use std::borrow::Cow;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

use crate::constants::{INVALID_DATE_ERROR, INVALID_IMAGE_ERROR, INVALID_NAME_ERROR, MAX_NAME_LENGTH};

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static DATA_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/[a-z0-9.+-]+;base64,[A-Za-z0-9+/]+=*$").unwrap());

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Accepts only real calendar days in `YYYY-MM-DD` form.
pub fn validate_record_date(date: &str) -> Result<(), ValidationError> {
    if !DATE_PATTERN.is_match(date) || NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(error("invalid_date", INVALID_DATE_ERROR));
    }
    Ok(())
}

pub fn validate_label(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(error("invalid_name", INVALID_NAME_ERROR));
    }
    Ok(())
}

pub fn validate_image_data_url(image: &str) -> Result<(), ValidationError> {
    // An empty string clears the image on patch
    if image.is_empty() {
        return Ok(());
    }
    if !DATA_URL_PATTERN.is_match(image) {
        return Err(error("invalid_image", INVALID_IMAGE_ERROR));
    }
    Ok(())
}
