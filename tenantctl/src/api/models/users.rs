//! API request/response models for users.

use crate::db::models::users::UserDBResponse;
use crate::types::{RoleId, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The user resource as it travels on the wire.
///
/// Every field is optional on input. `localPasswd` is accepted on create and
/// update but never serialized back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub active: Option<bool>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub company: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub gid: Option<i32>,
    pub id: Option<UserId>,
    /// Assigned by storage; ignored on input
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub local_passwd: Option<String>,
    pub new_user: Option<bool>,
    pub phone_number: Option<String>,
    pub postal_code: Option<String>,
    pub public_ssh_key: Option<String>,
    pub registration_sent: Option<DateTime<Utc>>,
    pub role: Option<RoleId>,
    /// Joined from the role table; read-only
    pub rolename: Option<String>,
    pub state_or_province: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub token: Option<String>,
    pub uid: Option<i32>,
    pub username: Option<String>,
}

impl From<UserDBResponse> for User {
    fn from(db: UserDBResponse) -> Self {
        Self {
            active: Some(db.active),
            address_line1: db.address_line1,
            address_line2: db.address_line2,
            city: db.city,
            company: db.company,
            country: db.country,
            email: db.email,
            full_name: db.full_name,
            gid: db.gid,
            id: Some(db.id),
            last_updated: Some(db.last_updated),
            // The stored hash never leaves the database layer
            local_passwd: None,
            new_user: Some(db.new_user),
            phone_number: db.phone_number,
            postal_code: db.postal_code,
            public_ssh_key: db.public_ssh_key,
            registration_sent: db.registration_sent,
            role: Some(db.role),
            rolename: db.rolename,
            state_or_province: db.state_or_province,
            tenant_id: db.tenant_id,
            token: db.token,
            uid: db.uid,
            username: Some(db.username),
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub tenant_id: Option<TenantId>,
    pub role: RoleId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub level: AlertLevel,
    pub text: String,
}

impl Alert {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Success,
            text: text.into(),
        }
    }
}

/// `{"response": [..]}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    pub response: Vec<T>,
}

/// `{"alerts": [..], "response": ..}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertsResponse<T> {
    pub alerts: Vec<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<T>,
}

impl<T> AlertsResponse<T> {
    pub fn new(alert: Alert, response: Option<T>) -> Self {
        Self {
            alerts: vec![alert],
            response,
        }
    }
}
