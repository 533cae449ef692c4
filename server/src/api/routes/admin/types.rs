//! Admin API DTOs

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::data::Role;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateIdentityRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 72, message = "Password must be 1-72 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 50, message = "Nickname must be 1-50 characters"))]
    pub nickname: String,
    pub role: Role,
}

/// Fields left out are unchanged
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateIdentityRequest {
    #[validate(length(min = 1, max = 50, message = "Nickname must be 1-50 characters"))]
    pub nickname: Option<String>,
    pub role: Option<Role>,
}
