//! Session identity types.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use matchdesk_core::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};

use crate::PermissionSet;

/// Closed set of console roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full administrative access; bypasses route guards.
    Admin,
    /// Reviews matching results.
    Reviewer,
    /// Operates day-to-day product and matching work.
    Operator,
    /// Read-only access.
    Viewer,
}

impl UserRole {
    /// Returns the stable wire value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Reviewer => "reviewer",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
        }
    }

    /// Returns all known roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[UserRole] = &[
            UserRole::Admin,
            UserRole::Reviewer,
            UserRole::Operator,
            UserRole::Viewer,
        ];

        ALL
    }
}

impl Display for UserRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "reviewer" => Ok(Self::Reviewer),
            "operator" => Ok(Self::Operator),
            "viewer" => Ok(Self::Viewer),
            _ => Err(AppError::Validation(format!("unknown role value '{value}'"))),
        }
    }
}

/// Authenticated identity held by the session.
///
/// Values are replaced wholesale on login, refresh and profile sync. The only
/// derived change is [`SessionUser::with_permissions`], which produces a new
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(deserialize_with = "deserialize_user_id")]
    id: String,
    username: String,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    role: UserRole,
    #[serde(default, deserialize_with = "deserialize_permissions")]
    permissions: PermissionSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    updated_at: Option<DateTime<Utc>>,
}

impl SessionUser {
    /// Creates an identity without permissions or contact details.
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        role: UserRole,
    ) -> AppResult<Self> {
        let id = id.into();
        let username = username.into();
        if id.trim().is_empty() {
            return Err(AppError::Validation("user id must not be empty".to_owned()));
        }
        if username.trim().is_empty() {
            return Err(AppError::Validation(
                "username must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            id,
            username,
            display_name: None,
            role,
            permissions: PermissionSet::default(),
            email: None,
            phone: None,
            created_at: None,
            updated_at: None,
        })
    }

    /// Returns a copy carrying the given permission set.
    #[must_use]
    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    /// Returns a copy carrying the given display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        self.display_name = (!display_name.trim().is_empty()).then_some(display_name);
        self
    }

    /// Returns a copy carrying the given email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Returns the stable backend identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the display name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.username.as_str())
    }

    /// Returns the assigned role.
    #[must_use]
    pub fn role(&self) -> UserRole {
        self.role
    }

    /// Returns the effective permission set.
    #[must_use]
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Returns the email, if known.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the phone number, if known.
    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    /// Returns the account creation timestamp, if known.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns the last profile update timestamp, if known.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireUserId {
    Text(String),
    Number(i64),
}

fn deserialize_user_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match WireUserId::deserialize(deserializer)? {
        WireUserId::Text(value) => value,
        WireUserId::Number(value) => value.to_string(),
    })
}

fn deserialize_permissions<'de, D>(deserializer: D) -> Result<PermissionSet, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(values.map(PermissionSet::from_iter).unwrap_or_default())
}

/// Timestamps are informational, so a value that is not RFC 3339 is dropped
/// instead of failing the whole profile.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        .map(|timestamp| timestamp.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{SessionUser, UserRole};

    #[test]
    fn role_roundtrip_wire_value() {
        for role in UserRole::all() {
            let restored = UserRole::from_str(role.as_str());
            assert!(matches!(restored, Ok(value) if value == *role));
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(UserRole::from_str("superuser").is_err());
    }

    #[test]
    fn user_accepts_numeric_id_and_null_permissions() {
        let user: SessionUser = serde_json::from_value(serde_json::json!({
            "id": 42,
            "username": "mei",
            "role": "reviewer",
            "permissions": null,
            "createdAt": "2024-05-01T08:00:00Z"
        }))
        .unwrap_or_else(|error| panic!("user should decode: {error}"));

        assert_eq!(user.id(), "42");
        assert_eq!(user.role(), UserRole::Reviewer);
        assert!(user.permissions().is_empty());
        assert!(user.created_at().is_some());
    }

    #[test]
    fn malformed_timestamps_do_not_reject_the_profile() {
        let user: SessionUser = serde_json::from_value(serde_json::json!({
            "id": "9",
            "username": "ari",
            "role": "operator",
            "createdAt": "05/01/2024 08:00",
            "updatedAt": 1714550400
        }))
        .unwrap_or_else(|error| panic!("user should decode: {error}"));

        assert_eq!(user.id(), "9");
        assert!(user.created_at().is_none());
        assert!(user.updated_at().is_none());
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let user = SessionUser::new("u-1", "mei", UserRole::Viewer)
            .unwrap_or_else(|error| panic!("{error}"));
        assert_eq!(user.display_name(), "mei");
        assert_eq!(user.with_display_name("Mei Chen").display_name(), "Mei Chen");
    }

    #[test]
    fn empty_username_is_rejected() {
        assert!(SessionUser::new("u-1", " ", UserRole::Viewer).is_err());
    }
}
