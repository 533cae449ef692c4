//! Identity types shared by the token, directory and API layers

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Role
// ============================================================================

/// Application role carried in access tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Parse from string representation (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Some(Self::User),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Authentication origin of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    /// Email and password
    Local,
    Kakao,
    Naver,
}

impl Provider {
    /// Parse from string representation (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOCAL" => Some(Self::Local),
            "KAKAO" => Some(Self::Kakao),
            "NAVER" => Some(Self::Naver),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Kakao => "KAKAO",
            Self::Naver => "NAVER",
        }
    }

    /// Whether identities of this provider are verified by an external federator
    pub fn is_federated(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Identity record
// ============================================================================

/// Stored identity, unique by (email, provider)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    /// Subject of every token issued for this identity
    pub email: String,
    pub provider: Provider,
    pub role: Role,
    pub nickname: String,
    pub avatar_url: Option<String>,
    /// bcrypt hash, LOCAL identities only
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields accepted when registering an identity
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub provider: Provider,
    pub role: Role,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub password_hash: Option<String>,
}

impl NewIdentity {
    /// Local part of the email, used when no nickname is supplied
    pub fn default_nickname(email: &str) -> String {
        email.split('@').next().unwrap_or(email).to_string()
    }
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct IdentityUpdate {
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<Role>,
}
