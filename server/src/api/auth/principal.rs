//! Resolved request identity

use serde::Serialize;

use crate::data::identity::{Provider, Role};

/// Identity attached to a request by the authentication gate
///
/// Derived from a valid access token for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: String,
    pub provider: Provider,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
