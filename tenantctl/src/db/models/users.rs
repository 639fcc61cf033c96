//! Database models for users.

use crate::api::models::users::User;
use crate::types::{RoleId, TenantId, UserId};
use chrono::{DateTime, Utc};

/// Column values written by insert and update. `local_passwd` is already hashed.
#[derive(Debug, Clone)]
pub struct UserWriteDBRequest {
    pub active: Option<bool>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub company: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub gid: Option<i32>,
    pub local_passwd: Option<String>,
    pub new_user: Option<bool>,
    pub phone_number: Option<String>,
    pub postal_code: Option<String>,
    pub public_ssh_key: Option<String>,
    pub registration_sent: Option<DateTime<Utc>>,
    pub role: Option<RoleId>,
    pub state_or_province: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub token: Option<String>,
    pub uid: Option<i32>,
    pub username: Option<String>,
}

impl UserWriteDBRequest {
    /// Take every settable column from `user`, with `password_hash` replacing the plaintext.
    pub fn new(user: &User, password_hash: Option<String>) -> Self {
        Self {
            active: user.active,
            address_line1: user.address_line1.clone(),
            address_line2: user.address_line2.clone(),
            city: user.city.clone(),
            company: user.company.clone(),
            country: user.country.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            gid: user.gid,
            local_passwd: password_hash,
            new_user: user.new_user,
            phone_number: user.phone_number.clone(),
            postal_code: user.postal_code.clone(),
            public_ssh_key: user.public_ssh_key.clone(),
            registration_sent: user.registration_sent,
            role: user.role,
            state_or_province: user.state_or_province.clone(),
            tenant_id: user.tenant_id,
            token: user.token.clone(),
            uid: user.uid,
            username: user.username.clone(),
        }
    }
}

/// A `tm_user` row joined with its role name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub active: bool,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub company: Option<String>,
    pub country: Option<String>,
    pub full_name: Option<String>,
    pub gid: Option<i32>,
    pub local_passwd: Option<String>,
    pub new_user: bool,
    pub phone_number: Option<String>,
    pub postal_code: Option<String>,
    pub public_ssh_key: Option<String>,
    pub registration_sent: Option<DateTime<Utc>>,
    pub role: RoleId,
    pub rolename: Option<String>,
    pub state_or_province: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub token: Option<String>,
    pub uid: Option<i32>,
    pub last_updated: DateTime<Utc>,
}

