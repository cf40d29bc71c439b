use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{ClientError, FieldErrors};

/// Backend role. Roles this client does not know are kept verbatim in
/// [`Role::Other`] so they round-trip through the cached `user_role` slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    GeneralUser,
    Volunteer,
    Donor,
    Manager,
    Admin,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::GeneralUser => "general_user",
            Role::Volunteer => "volunteer",
            Role::Donor => "donor",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Other(raw) => raw.as_str(),
        }
    }

    /// Managers and admins see the management endpoints.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "general_user" => Role::GeneralUser,
            "volunteer" => Role::Volunteer,
            "donor" => Role::Donor,
            "manager" => Role::Manager,
            "admin" => Role::Admin,
            _ => Role::Other(raw),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Strict parse for user input; unknown names are rejected.
impl FromStr for Role {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Role::from(s.to_string()) {
            Role::Other(other) => Err(ClientError::Validation(
                FieldErrors::new().with_field("role", format!("unknown role '{}'", other)),
            )),
            known => Ok(known),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// Stand-in identity rebuilt from the cached email and role slots.
    pub fn cached(email: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id: None,
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            role: role.unwrap_or_default(),
            is_active: None,
            extra: Map::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegistrationResult {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VerificationResult {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Generic `{ "message": ... }` / `{ "detail": ... }` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Acknowledgement {
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Active,
    Planned,
    Completed,
    OnHold,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Planned => "PLANNED",
            CampaignStatus::Completed => "COMPLETED",
            CampaignStatus::OnHold => "ON_HOLD",
        }
    }
}

impl FromStr for CampaignStatus {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(CampaignStatus::Active),
            "PLANNED" => Ok(CampaignStatus::Planned),
            "COMPLETED" => Ok(CampaignStatus::Completed),
            "ON_HOLD" => Ok(CampaignStatus::OnHold),
            other => Err(ClientError::Validation(
                FieldErrors::new().with_field("status", format!("unknown campaign status '{}'", other)),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Campaign {
    #[serde(default)]
    pub id: Option<i64>,
    pub slug: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub status: Option<CampaignStatus>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub goal_amount: Option<String>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub budget_allocated: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for campaign create (POST) and update (PUT).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignDraft {
    pub title: String,
    pub description: String,
    pub goal_amount: String,
    pub budget_allocated: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Donation {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub campaign_title: Option<String>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub amount: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Donation {
    pub fn campaign_label(&self) -> &str {
        self.campaign_title.as_deref().unwrap_or("General Donation")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ApplicationStatus::Pending),
            "APPROVED" => Ok(ApplicationStatus::Approved),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            other => Err(ClientError::Validation(FieldErrors::new().with_field(
                "application_status",
                format!("unknown application status '{}'", other),
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolunteerApplication {
    pub skills: String,
    pub availability: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VolunteerProfile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub availability: String,
    #[serde(default)]
    pub application_status: ApplicationStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolunteerProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeLog {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub task: Option<Value>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTimeLog {
    pub task: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl NewTimeLog {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.end_time < self.start_time {
            return Err(ClientError::Validation(
                FieldErrors::new().with_field("end_time", "End time must not be before start time"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManagedUser {
    pub id: i64,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordReset {
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordReset {
    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = FieldErrors::new();
        if self.new_password.is_empty() {
            errors = errors.with_field("new_password", "This field is required.");
        }
        if self.confirm_password.is_empty() {
            errors = errors.with_field("confirm_password", "This field is required.");
        }
        if errors.is_empty() && self.new_password != self.confirm_password {
            errors = errors.with_field("confirm_password", "Passwords do not match");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(errors))
        }
    }
}

/// A list endpoint's payload: either a bare array or a paginated
/// `{ "results": [...] }` object.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T>(pub Vec<T>);

#[derive(Deserialize)]
#[serde(untagged)]
enum ListingRepr<T> {
    Plain(Vec<T>),
    Paged { results: Vec<T> },
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Listing<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ListingRepr::deserialize(deserializer)? {
            ListingRepr::Plain(items) | ListingRepr::Paged { results: items } => Ok(Listing(items)),
        }
    }
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

fn active_by_default() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decimal fields arrive as strings (`"1500.00"`) or bare numbers.
fn opt_decimal<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a decimal string or number, got {}",
            other
        ))),
    }
}
