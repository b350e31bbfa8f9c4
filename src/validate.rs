use crate::codec::contains_delimiter;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be digits only")]
    RollNo { field: &'static str },
    #[error("{field} may only contain letters, spaces and '.'")]
    Name { field: &'static str },
    #[error("{field} is not a valid email address")]
    Email { field: &'static str },
    #[error("{field} must be a positive integer")]
    Semester { field: &'static str },
    #[error("{field} must be a YYYY-MM-DD date")]
    Date { field: &'static str },
    #[error("{field} must be a YYYY-MM month")]
    Month { field: &'static str },
    #[error("{field} must be P or A")]
    Status { field: &'static str },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must not contain '|' or line breaks")]
    Delimiter { field: &'static str },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::RollNo { field }
            | ValidationError::Name { field }
            | ValidationError::Email { field }
            | ValidationError::Semester { field }
            | ValidationError::Date { field }
            | ValidationError::Month { field }
            | ValidationError::Status { field }
            | ValidationError::Empty { field }
            | ValidationError::Delimiter { field } => field,
        }
    }
}

/// Values stored in a record line may not break the line layout.
pub fn storable(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if contains_delimiter(value) || value.contains('\n') || value.contains('\r') {
        return Err(ValidationError::Delimiter { field });
    }
    Ok(())
}

pub fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    storable(field, value)
}

pub fn roll_no(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::RollNo { field });
    }
    Ok(())
}

pub fn name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '.')
    {
        return Err(ValidationError::Name { field });
    }
    Ok(())
}

/// Optional field: empty passes.
pub fn email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    storable(field, value)?;
    if !value.contains('@') || !value.contains('.') {
        return Err(ValidationError::Email { field });
    }
    Ok(())
}

pub fn semester(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or(ValidationError::Semester { field })
}

pub fn date(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.len() != 10 || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        return Err(ValidationError::Date { field });
    }
    Ok(())
}

pub fn month(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.len() != 7 {
        return Err(ValidationError::Month { field });
    }
    date(field, &format!("{value}-01")).map_err(|_| ValidationError::Month { field })
}
