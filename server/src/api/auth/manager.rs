//! Session orchestration
//!
//! Ties the token codec, the session store, the revocation list and the
//! identity collaborators together for the login, refresh and logout flows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use super::error::AuthFailure;
use super::jwt::{IssuedToken, TokenCodec, TokenKind};
use super::principal::Principal;
use crate::core::config::BootstrapAdmin;
use crate::data::identity::{IdentityRecord, IdentityUpdate, NewIdentity, Provider, Role};
use crate::data::{
    DirectoryError, IdentityDirectory, IdentityFederation, RevocationList, SessionStore,
};
use crate::utils::crypto;

/// Tokens issued by a successful login
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub role: Role,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// A new access token issued from a current refresh token
#[derive(Debug, Clone)]
pub struct RefreshedAccess {
    pub role: Role,
    pub access: IssuedToken,
}

/// Where a presented refresh token stands
#[derive(Debug)]
pub enum RefreshState {
    NoToken,
    InvalidOrExpired(AuthFailure),
    /// Correctly signed and unexpired, but not the session's current token
    ValidButSuperseded { subject: String, provider: Provider },
    ValidAndCurrent { subject: String, provider: Provider },
}

/// What a logout actually invalidated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub access_revoked: bool,
    pub session_removed: bool,
}

pub struct AuthManager {
    codec: Arc<TokenCodec>,
    sessions: SessionStore,
    revocations: RevocationList,
    directory: Arc<dyn IdentityDirectory>,
    federation: Arc<dyn IdentityFederation>,
    password_cost: u32,
    /// Verified against when the identity is unknown so both paths cost one bcrypt run
    dummy_hash: OnceCell<String>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("codec", &self.codec)
            .field("password_cost", &self.password_cost)
            .finish_non_exhaustive()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

const DUMMY_PASSWORD: &str = "logolab-timing-equalizer";

impl AuthManager {
    pub fn new(
        codec: Arc<TokenCodec>,
        sessions: SessionStore,
        revocations: RevocationList,
        directory: Arc<dyn IdentityDirectory>,
        federation: Arc<dyn IdentityFederation>,
        password_cost: u32,
    ) -> Self {
        Self {
            codec,
            sessions,
            revocations,
            directory,
            federation,
            password_cost,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn directory(&self) -> &dyn IdentityDirectory {
        self.directory.as_ref()
    }

    /// Reachability of the session store
    pub async fn store_health(&self) -> Result<(), AuthFailure> {
        Ok(self.sessions.health_check().await?)
    }

    /// Register a LOCAL identity with the USER role
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        nickname: Option<&str>,
    ) -> Result<IdentityRecord, AuthFailure> {
        self.create_local_identity(email, password, nickname, Role::User)
            .await
    }

    /// Register a LOCAL identity with an explicit role
    pub async fn create_local_identity(
        &self,
        email: &str,
        password: &str,
        nickname: Option<&str>,
        role: Role,
    ) -> Result<IdentityRecord, AuthFailure> {
        let email = normalize_email(email);
        let password_hash = crypto::hash_password(password, self.password_cost)
            .await
            .map_err(|e| AuthFailure::Internal(e.to_string()))?;
        let record = self
            .directory
            .create(NewIdentity {
                nickname: nickname
                    .map(str::to_string)
                    .unwrap_or_else(|| NewIdentity::default_nickname(&email)),
                email,
                provider: Provider::Local,
                role,
                avatar_url: None,
                password_hash: Some(password_hash),
            })
            .await?;
        tracing::info!(id = %record.id, role = %record.role, "Local identity registered");
        Ok(record)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, AuthFailure> {
        let email = normalize_email(email);
        let record = self.directory.find(&email, Provider::Local).await?;
        let stored_hash = record.as_ref().and_then(|r| r.password_hash.as_deref());
        let has_password = stored_hash.is_some();
        let hash = match stored_hash {
            Some(hash) => hash,
            None => self.dummy_hash().await?,
        };
        let verified = crypto::verify_password(password, hash)
            .await
            .map_err(|e| AuthFailure::Internal(e.to_string()))?;
        match record {
            Some(record) if has_password && verified => self.start_session(&record).await,
            Some(record) => {
                tracing::debug!(id = %record.id, "Login with wrong password");
                Err(AuthFailure::InvalidCredentials)
            }
            None => {
                tracing::debug!("Login for unknown identity");
                Err(AuthFailure::InvalidCredentials)
            }
        }
    }

    async fn dummy_hash(&self) -> Result<&str, AuthFailure> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| crypto::hash_password(DUMMY_PASSWORD, self.password_cost))
            .await
            .map_err(|e| AuthFailure::Internal(e.to_string()))?;
        Ok(hash.as_str())
    }

    /// Log in through an external identity provider, registering the identity on first use
    pub async fn social_login(
        &self,
        provider: &str,
        code: &str,
        state: Option<&str>,
    ) -> Result<SessionTokens, AuthFailure> {
        let provider = Provider::parse(provider)
            .filter(Provider::is_federated)
            .ok_or_else(|| AuthFailure::UnsupportedProvider(provider.to_string()))?;
        let identity = self.federation.exchange(provider, code, state).await?;

        let record = match self.directory.find(&identity.email, provider).await? {
            Some(record) => record,
            None => {
                let created = self
                    .directory
                    .create(NewIdentity {
                        email: identity.email.clone(),
                        provider,
                        role: Role::User,
                        nickname: identity.nickname,
                        avatar_url: identity.avatar_url,
                        password_hash: None,
                    })
                    .await;
                match created {
                    Ok(record) => {
                        tracing::info!(id = %record.id, provider = %provider, "Federated identity registered");
                        record
                    }
                    // Lost a race with a concurrent first login
                    Err(DirectoryError::Duplicate { .. }) => self
                        .directory
                        .find(&identity.email, provider)
                        .await?
                        .ok_or(AuthFailure::UnknownIdentity)?,
                    Err(e) => return Err(e.into()),
                }
            }
        };
        self.start_session(&record).await
    }

    /// Issue both tokens and make the refresh token the session's current one
    async fn start_session(&self, record: &IdentityRecord) -> Result<SessionTokens, AuthFailure> {
        let access = self
            .codec
            .create_access_token(&record.email, record.provider, record.role)?;
        let refresh = self
            .codec
            .create_refresh_token(&record.email, record.provider)?;
        self.sessions
            .put(&record.email, record.provider, &refresh.value, refresh.ttl)
            .await?;
        tracing::info!(id = %record.id, provider = %record.provider, "Session started");
        Ok(SessionTokens {
            role: record.role,
            access,
            refresh,
        })
    }

    pub async fn refresh_state_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RefreshState, AuthFailure> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(RefreshState::NoToken);
        };
        let claims = match self.codec.decode_at(token, now) {
            Ok(claims) => claims,
            Err(e) => return Ok(RefreshState::InvalidOrExpired(e.into())),
        };
        let (Some(TokenKind::Refresh), Some(provider)) = (claims.kind, claims.provider) else {
            return Ok(RefreshState::InvalidOrExpired(AuthFailure::MalformedToken));
        };

        let current = self.sessions.get(&claims.subject, provider).await?;
        let subject = claims.subject;
        Ok(match current {
            Some(current) if crypto::constant_time_eq(&current, token) => {
                RefreshState::ValidAndCurrent { subject, provider }
            }
            _ => RefreshState::ValidButSuperseded { subject, provider },
        })
    }

    /// Exchange the session's current refresh token for a new access token
    ///
    /// The role is read from the directory, so role changes apply here. The
    /// refresh token itself is not rotated.
    pub async fn refresh(&self, token: Option<&str>) -> Result<RefreshedAccess, AuthFailure> {
        self.refresh_at(token, Utc::now()).await
    }

    pub async fn refresh_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RefreshedAccess, AuthFailure> {
        let (subject, provider) = match self.refresh_state_at(token, now).await? {
            RefreshState::NoToken => return Err(AuthFailure::MissingToken),
            RefreshState::InvalidOrExpired(failure) => return Err(failure),
            RefreshState::ValidButSuperseded { subject, provider } => {
                tracing::warn!(subject = %subject, provider = %provider, "Superseded refresh token presented, possible token theft");
                return Err(AuthFailure::SupersededRefreshToken);
            }
            RefreshState::ValidAndCurrent { subject, provider } => (subject, provider),
        };

        let record = self
            .directory
            .find(&subject, provider)
            .await?
            .ok_or(AuthFailure::UnknownIdentity)?;
        let access = self
            .codec
            .create_access_token_at(&subject, provider, record.role, now)?;
        tracing::debug!(subject = %subject, provider = %provider, "Access token refreshed");
        Ok(RefreshedAccess {
            role: record.role,
            access,
        })
    }

    /// Revoke a still-valid access token and end the session of a valid refresh token
    pub async fn logout(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<LogoutOutcome, AuthFailure> {
        self.logout_at(access, refresh, Utc::now()).await
    }

    pub async fn logout_at(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<LogoutOutcome, AuthFailure> {
        let mut outcome = LogoutOutcome {
            access_revoked: self.revoke_access_at(access, now).await?,
            ..Default::default()
        };

        if let Some(token) = refresh {
            match self.codec.decode_at(token, now) {
                Ok(claims) if claims.kind == Some(TokenKind::Refresh) => {
                    if let Some(provider) = claims.provider {
                        outcome.session_removed =
                            self.sessions.remove(&claims.subject, provider).await?;
                    }
                }
                Ok(_) => tracing::debug!("Logout presented a non-refresh token as refresh"),
                Err(e) => tracing::debug!(error = %e, "Logout refresh token not usable"),
            }
        }
        Ok(outcome)
    }

    /// Revoke `token` for the rest of its lifetime if it is a valid access token
    async fn revoke_access_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthFailure> {
        let Some(token) = token else {
            return Ok(false);
        };
        match self.codec.decode_at(token, now) {
            Ok(claims) if claims.kind == Some(TokenKind::Access) => {
                self.revocations
                    .add_until(token, claims.expires_at, now)
                    .await?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) => {
                tracing::debug!(error = %e, "Access token not revoked");
                Ok(false)
            }
        }
    }

    /// Remove the caller's identity, end its session and revoke the presented access token
    pub async fn delete_account(
        &self,
        principal: &Principal,
        access: Option<&str>,
    ) -> Result<IdentityRecord, AuthFailure> {
        let record = self
            .directory
            .find(&principal.subject, principal.provider)
            .await?
            .ok_or(AuthFailure::UnknownIdentity)?;
        let removed = self.delete_identity(&record.id).await?;
        self.revoke_access_at(access, Utc::now()).await?;
        Ok(removed)
    }

    /// Remove an identity and its session record
    pub async fn delete_identity(&self, id: &str) -> Result<IdentityRecord, AuthFailure> {
        let record = self.directory.delete(id).await?;
        self.sessions.remove(&record.email, record.provider).await?;
        tracing::info!(id = %record.id, provider = %record.provider, "Identity deleted");
        Ok(record)
    }

    /// Change nickname or role; a role change reaches tokens at the next refresh
    pub async fn update_identity(
        &self,
        id: &str,
        update: IdentityUpdate,
    ) -> Result<IdentityRecord, AuthFailure> {
        let record = self.directory.update(id, update).await?;
        tracing::info!(id = %record.id, role = %record.role, "Identity updated");
        Ok(record)
    }

    /// Make sure the configured administrator exists with the ADMIN role
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> Result<IdentityRecord, AuthFailure> {
        let email = normalize_email(&admin.email);
        match self.directory.find(&email, Provider::Local).await? {
            Some(record) if record.role == Role::Admin => Ok(record),
            Some(record) => {
                tracing::info!(id = %record.id, "Promoting bootstrap account to admin");
                self.update_identity(
                    &record.id,
                    IdentityUpdate {
                        role: Some(Role::Admin),
                        ..Default::default()
                    },
                )
                .await
            }
            None => {
                self.create_local_identity(&email, &admin.password, None, Role::Admin)
                    .await
            }
        }
    }
}
