// src/db/models/user.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Staff and parent roles as issued by the identity service.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Parent,
    Accountant,
    Warden,
    Hm,
    GateStaff,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Parent => "PARENT",
            Role::Accountant => "ACCOUNTANT",
            Role::Warden => "WARDEN",
            Role::Hm => "HM",
            Role::GateStaff => "GATE_STAFF",
            Role::Admin => "ADMIN",
        };
        f.write_str(name)
    }
}

/// Per-caller access context resolved from the database and cached by the
/// access middleware. Wardens carry their hostel scope here.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct UserAccess {
    #[sqlx(rename = "id")]
    pub user_id: i32,
    pub username: String,
    pub role: Role,
    pub assigned_hostel: Option<Uuid>,
}
