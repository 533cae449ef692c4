//! Signed access and refresh tokens (HS256)

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::data::identity::{Provider, Role};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Which of the two token kinds a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "access" => Some(Self::Access),
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Claims as they appear in the token payload
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

/// Decoded claims; optional or unrecognised values are `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: String,
    pub provider: Option<Provider>,
    pub role: Option<Role>,
    pub kind: Option<TokenKind>,
    pub token_id: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    fn from_wire(wire: WireClaims) -> Result<Self, TokenError> {
        let expires_at = Utc
            .timestamp_opt(wire.exp, 0)
            .single()
            .ok_or_else(|| TokenError::Malformed("exp out of range".to_string()))?;
        Ok(Self {
            subject: wire.sub,
            provider: wire.provider.as_deref().and_then(Provider::parse),
            role: wire.role.as_deref().and_then(Role::parse),
            kind: wire.typ.as_deref().and_then(TokenKind::parse),
            token_id: wire.jti,
            issued_at: wire.iat.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            expires_at,
        })
    }

    /// Lifetime left at `now`, zero once expired
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// A freshly signed token with the lifetime callers size cookies and records by
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub ttl: Duration,
}

/// Creates and validates access and refresh tokens with a shared secret
///
/// Stateless and immutable once built. Every operation has an `_at` variant
/// taking the current time so expiry can be tested without sleeping.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        // Expiry is checked by hand against an injectable clock with zero leeway
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn create_access_token(
        &self,
        subject: &str,
        provider: Provider,
        role: Role,
    ) -> Result<IssuedToken, TokenError> {
        self.create_access_token_at(subject, provider, role, Utc::now())
    }

    pub fn create_access_token_at(
        &self,
        subject: &str,
        provider: Provider,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        self.sign(
            subject,
            provider,
            Some(role),
            TokenKind::Access,
            self.access_ttl,
            now,
        )
    }

    /// Refresh tokens carry no role; it is re-read from the directory on refresh
    pub fn create_refresh_token(
        &self,
        subject: &str,
        provider: Provider,
    ) -> Result<IssuedToken, TokenError> {
        self.create_refresh_token_at(subject, provider, Utc::now())
    }

    pub fn create_refresh_token_at(
        &self,
        subject: &str,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        self.sign(
            subject,
            provider,
            None,
            TokenKind::Refresh,
            self.refresh_ttl,
            now,
        )
    }

    fn sign(
        &self,
        subject: &str,
        provider: Provider,
        role: Option<Role>,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let lifetime =
            chrono::Duration::from_std(ttl).map_err(|e| TokenError::Signing(e.to_string()))?;
        // Whole seconds, matching what the payload can carry
        let exp = (now + lifetime).timestamp();
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| TokenError::Signing("expiry out of range".to_string()))?;
        let claims = WireClaims {
            sub: subject.to_string(),
            exp,
            iat: Some(now.timestamp()),
            jti: Some(Uuid::new_v4().to_string()),
            typ: Some(kind.as_str().to_string()),
            provider: Some(provider.as_str().to_string()),
            role: role.map(|r| r.as_str().to_string()),
        };
        let value = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(IssuedToken {
            value,
            expires_at,
            ttl,
        })
    }

    /// Whether the token is well-formed, correctly signed and unexpired
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.decode_at(token, now).is_ok()
    }

    /// Verify signature and expiry, then return the claims
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.decode_at(token, Utc::now())
    }

    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let claims = self.extract_claims(token)?;
        if now >= claims.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Verify the signature only and return the claims, expired or not
    pub fn extract_claims(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<WireClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            },
        )?;
        TokenClaims::from_wire(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, Duration::from_secs(1800), Duration::from_secs(86400))
    }

    fn raw_token(claims: &WireClaims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[test]
    fn test_access_token_claims() {
        let codec = codec();
        for (provider, role) in [
            (Provider::Local, Role::User),
            (Provider::Kakao, Role::Admin),
            (Provider::Naver, Role::User),
        ] {
            let token = codec
                .create_access_token("a@b.com", provider, role)
                .unwrap();
            let claims = codec.extract_claims(&token.value).unwrap();
            assert_eq!(claims.subject, "a@b.com");
            assert_eq!(claims.provider, Some(provider));
            assert_eq!(claims.role, Some(role));
            assert_eq!(claims.kind, Some(TokenKind::Access));
            assert_eq!(claims.expires_at, token.expires_at);
        }
    }

    #[test]
    fn test_refresh_token_has_no_role() {
        let codec = codec();
        let token = codec.create_refresh_token("a@b.com", Provider::Local).unwrap();

        let claims = codec.decode(&token.value).unwrap();
        assert_eq!(claims.role, None);
        assert_eq!(claims.kind, Some(TokenKind::Refresh));
        assert_eq!(token.ttl, Duration::from_secs(86400));
    }

    #[test]
    fn test_validate_until_expiry() {
        let codec = codec();
        let issued_at = Utc::now();
        let token = codec
            .create_access_token_at("a@b.com", Provider::Local, Role::User, issued_at)
            .unwrap();

        assert!(codec.validate_at(&token.value, issued_at));
        assert!(codec.validate_at(
            &token.value,
            issued_at + chrono::Duration::seconds(1799)
        ));
        assert!(!codec.validate_at(&token.value, token.expires_at));
        assert_eq!(
            codec.decode_at(&token.value, token.expires_at + chrono::Duration::seconds(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_signature_mismatch() {
        let other = TokenCodec::new(
            b"ffffffffffffffffffffffffffffffff",
            Duration::from_secs(60),
            Duration::from_secs(120),
        );
        let token = other
            .create_access_token("a@b.com", Provider::Local, Role::User)
            .unwrap();

        assert!(!codec().validate(&token.value));
        assert_eq!(
            codec().extract_claims(&token.value),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_is_rejected_without_panic() {
        let codec = codec();
        for input in ["", "abc", "a.b.c", "Bearer x", "....", "\u{0}\u{1}"] {
            assert!(!codec.validate(input));
            assert!(matches!(
                codec.extract_claims(input),
                Err(TokenError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_unknown_enum_values_are_absent() {
        let token = raw_token(&WireClaims {
            sub: "a@b.com".to_string(),
            exp: Utc::now().timestamp() + 60,
            iat: None,
            jti: None,
            typ: Some("session".to_string()),
            provider: Some("GOOGLE".to_string()),
            role: Some("ROOT".to_string()),
        });

        let claims = codec().decode(&token).unwrap();
        assert_eq!(claims.subject, "a@b.com");
        assert_eq!(claims.provider, None);
        assert_eq!(claims.role, None);
        assert_eq!(claims.kind, None);
        assert_eq!(claims.issued_at, None);
    }

    #[test]
    fn test_tokens_issued_together_differ() {
        let codec = codec();
        let now = Utc::now();
        let a = codec
            .create_access_token_at("a@b.com", Provider::Local, Role::User, now)
            .unwrap();
        let b = codec
            .create_access_token_at("a@b.com", Provider::Local, Role::User, now)
            .unwrap();
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn test_remaining_lifetime() {
        let codec = codec();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = codec
            .create_access_token_at("a@b.com", Provider::Local, Role::User, now)
            .unwrap();
        let claims = codec.extract_claims(&token.value).unwrap();

        assert_eq!(
            claims.remaining_at(now + chrono::Duration::seconds(800)),
            Duration::from_secs(1000)
        );
        assert_eq!(
            claims.remaining_at(now + chrono::Duration::seconds(4000)),
            Duration::ZERO
        );
    }
}
