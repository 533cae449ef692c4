//! Authentication and authorization
//!
//! Request path: [`authenticate`] resolves an optional [`Principal`], then
//! [`authorize`] allows or denies using the shared [`RouteTable`]. The session
//! endpoints drive [`AuthManager`] directly.

mod cookies;
mod error;
mod extractors;
mod gate;
pub mod jwt;
mod manager;
mod policy;
mod principal;

pub use cookies::{CookieSet, CookieTransport};
pub use error::AuthFailure;
pub use extractors::{Admin, CurrentUser};
pub use gate::{AuthenticationGate, authenticate, bearer_token, presented_access_token};
pub use jwt::{IssuedToken, TokenClaims, TokenCodec, TokenError, TokenKind};
pub use manager::{AuthManager, LogoutOutcome, RefreshState, RefreshedAccess, SessionTokens};
pub use policy::{
    AuthorizationPolicy, PathPattern, RouteClass, RouteRule, RouteTable, authorize,
};
pub use principal::Principal;
