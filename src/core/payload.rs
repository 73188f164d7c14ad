//! Wire payloads and their shape validation
//!
//! Request fields are optional on the wire so a missing field and an
//! invalid one both surface as a `ValidationError` naming the field.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::user::Role;
use crate::constants::VISIT_DATE_FORMAT;
use crate::error::{Result, VetClinicError};
use crate::storage::{
    CascadeSummary, Cat, CatHistory, EntityId, NewCat, NewTreatment, NewVisit, Treatment,
    UserRecord, VisitFilter, VisitRecord,
};

fn invalid(msg: impl Into<String>) -> VetClinicError {
    VetClinicError::ValidationError(msg.into())
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(invalid(format!("{} is empty", field))),
    }
}

fn positive_u32(value: Option<i64>, field: &str) -> Result<u32> {
    value
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| invalid(format!("{} must be a positive integer", field)))
}

fn positive_id(value: Option<i64>, field: &str) -> Result<EntityId> {
    value
        .filter(|v| *v > 0)
        .and_then(|v| EntityId::try_from(v).ok())
        .ok_or_else(|| invalid(format!("{} must be a positive integer", field)))
}

fn normalize_email(value: Option<String>) -> Result<String> {
    let email = required_text(value, "user_email")?.to_lowercase();
    if !email.contains('@') {
        return Err(invalid("user_email is not a valid email address"));
    }
    Ok(email)
}

/// Parses a `YYYY-MM-DD` visit date
pub fn parse_visit_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), VISIT_DATE_FORMAT)
        .map_err(|_| invalid("visit_date wrong format, expected YYYY-MM-DD"))
}

#[derive(Debug, Default, Deserialize)]
pub struct CatRequest {
    pub cat_name: Option<String>,
    pub cat_age: Option<i64>,
    pub cat_breed: Option<String>,
    pub cat_weight: Option<i64>,
}

impl CatRequest {
    pub fn validate(self) -> Result<NewCat> {
        Ok(NewCat {
            name: required_text(self.cat_name, "cat_name")?,
            age: positive_u32(self.cat_age, "cat_age")?,
            breed: required_text(self.cat_breed, "cat_breed")?,
            weight: positive_u32(self.cat_weight, "cat_weight")?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VisitRequest {
    pub visit_cat_id: Option<i64>,
    pub visit_date: Option<String>,
    pub visit_reason: Option<String>,
    pub visit_vet: Option<String>,
}

impl VisitRequest {
    pub fn validate(self) -> Result<NewVisit> {
        let cat_id = positive_id(self.visit_cat_id, "visit_cat_id")?;
        let date = required_text(self.visit_date, "visit_date")?;
        Ok(NewVisit {
            cat_id,
            date: parse_visit_date(&date)?,
            reason: required_text(self.visit_reason, "visit_reason")?,
            vet: required_text(self.visit_vet, "visit_vet")?,
        })
    }
}

/// Query string of the visit listing
#[derive(Debug, Default, Deserialize)]
pub struct VisitQuery {
    pub vet: Option<String>,
    pub reason: Option<String>,
    pub date: Option<String>,
}

impl VisitQuery {
    /// First non-empty filter wins, in the order vet, reason, date
    pub fn into_filter(self) -> Result<VisitFilter> {
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        if let Some(vet) = non_empty(self.vet) {
            return Ok(VisitFilter::Vet(vet));
        }
        if let Some(reason) = non_empty(self.reason) {
            return Ok(VisitFilter::Reason(reason));
        }
        match non_empty(self.date) {
            Some(date) => Ok(VisitFilter::Date(parse_visit_date(&date)?)),
            None => Ok(VisitFilter::All),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TreatmentRequest {
    pub treatment_name: Option<String>,
    pub treatment_visit_id: Option<i64>,
}

impl TreatmentRequest {
    pub fn validate(self) -> Result<NewTreatment> {
        Ok(NewTreatment {
            name: required_text(self.treatment_name, "treatment_name")?,
            visit_id: positive_id(self.treatment_visit_id, "treatment_visit_id")?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserRequest {
    pub user_email: Option<String>,
    pub user_password: Option<String>,
    pub user_role: Option<String>,
}

/// Validated account fields; the password is still plaintext here
pub struct UserDraft {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

impl UserRequest {
    /// Creation requires a role
    pub fn validate_new(self) -> Result<UserDraft> {
        let email = normalize_email(self.user_email)?;
        let password = required_password(self.user_password)?;
        let role = required_text(self.user_role, "user_role")?.parse::<Role>()?;
        Ok(UserDraft {
            email,
            password,
            role: Some(role),
        })
    }

    /// Updates change email and password only; any role sent is ignored
    pub fn validate_update(self) -> Result<UserDraft> {
        Ok(UserDraft {
            email: normalize_email(self.user_email)?,
            password: required_password(self.user_password)?,
            role: None,
        })
    }
}

// Passwords are taken verbatim: no trimming, only a non-empty check
fn required_password(value: Option<String>) -> Result<String> {
    value
        .filter(|p| !p.is_empty())
        .ok_or_else(|| invalid("user_password is empty"))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub user_email: Option<String>,
    pub user_password: Option<String>,
}

/// Validated login credentials
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(self) -> Result<Credentials> {
        Ok(Credentials {
            email: normalize_email(self.user_email)?,
            password: required_password(self.user_password)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

impl RefreshTokenRequest {
    pub fn validate(self) -> Result<String> {
        required_text(self.refresh_token, "refresh_token")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatResponse {
    pub id: EntityId,
    pub cat_name: String,
    pub cat_age: u32,
    pub cat_breed: String,
    pub cat_weight: u32,
}

impl From<Cat> for CatResponse {
    fn from(cat: Cat) -> Self {
        Self {
            id: cat.id,
            cat_name: cat.name,
            cat_age: cat.age,
            cat_breed: cat.breed,
            cat_weight: cat.weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatHistoryResponse {
    pub id: EntityId,
    pub cat_name: String,
    pub cat_age: u32,
    pub cat_breed: String,
    pub cat_weight: u32,
    pub cat_visits: Vec<VisitHistoryResponse>,
}

impl From<CatHistory> for CatHistoryResponse {
    fn from(history: CatHistory) -> Self {
        let cat = history.cat;
        Self {
            id: cat.id,
            cat_name: cat.name,
            cat_age: cat.age,
            cat_breed: cat.breed,
            cat_weight: cat.weight,
            cat_visits: history.visits.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentResponse {
    pub id: EntityId,
    pub treatment_name: String,
    pub treatment_visit_id: EntityId,
}

impl From<Treatment> for TreatmentResponse {
    fn from(treatment: Treatment) -> Self {
        Self {
            id: treatment.id,
            treatment_name: treatment.name,
            treatment_visit_id: treatment.visit_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentHistoryResponse {
    pub id: EntityId,
    pub treatment_name: String,
}

impl From<Treatment> for TreatmentHistoryResponse {
    fn from(treatment: Treatment) -> Self {
        Self {
            id: treatment.id,
            treatment_name: treatment.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitResponse {
    pub id: EntityId,
    pub visit_cat_id: EntityId,
    pub visit_date: String,
    pub visit_reason: String,
    pub visit_vet: String,
    pub visit_treatments: Vec<TreatmentResponse>,
}

impl From<VisitRecord> for VisitResponse {
    fn from(record: VisitRecord) -> Self {
        let visit = record.visit;
        Self {
            id: visit.id,
            visit_cat_id: visit.cat_id,
            visit_date: visit.date.format(VISIT_DATE_FORMAT).to_string(),
            visit_reason: visit.reason,
            visit_vet: visit.vet,
            visit_treatments: record.treatments.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitHistoryResponse {
    pub id: EntityId,
    pub visit_date: String,
    pub visit_reason: String,
    pub visit_vet: String,
    pub visit_treatments: Vec<TreatmentHistoryResponse>,
}

impl From<VisitRecord> for VisitHistoryResponse {
    fn from(record: VisitRecord) -> Self {
        let visit = record.visit;
        Self {
            id: visit.id,
            visit_date: visit.date.format(VISIT_DATE_FORMAT).to_string(),
            visit_reason: visit.reason,
            visit_vet: visit.vet,
            visit_treatments: record.treatments.into_iter().map(Into::into).collect(),
        }
    }
}

/// Account view; the password hash never leaves the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: EntityId,
    pub user_email: String,
    pub user_role: Option<Role>,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            user_email: user.email,
            user_role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visits_removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatments_removed: Option<usize>,
}

impl DeleteResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            visits_removed: None,
            treatments_removed: None,
        }
    }

    pub fn cascade(message: impl Into<String>, summary: CascadeSummary) -> Self {
        Self {
            message: message.into(),
            visits_removed: Some(summary.visits_removed),
            treatments_removed: Some(summary.treatments_removed),
        }
    }
}
