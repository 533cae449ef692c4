//! User API DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::data::{IdentityRecord, Provider, Role};

/// Identity as exposed over the API (never includes the password hash)
#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityDto {
    pub id: String,
    pub email: String,
    pub nickname: String,
    pub provider: Provider,
    pub role: Role,
    pub avatar_url: Option<String>,
    /// Unix seconds
    pub created_at: i64,
}

impl From<IdentityRecord> for IdentityDto {
    fn from(record: IdentityRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            nickname: record.nickname,
            provider: record.provider,
            role: record.role,
            avatar_url: record.avatar_url,
            created_at: record.created_at,
        }
    }
}

/// Profile fields the caller may change; fields left out are unchanged
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50, message = "Nickname must be 1-50 characters"))]
    pub nickname: Option<String>,
    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar_url: Option<String>,
    /// Accepted only when it matches the current address
    pub email: Option<String>,
}
