//! OAuth 2.0 authorization-code exchange against provider HTTP endpoints

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{FederatedIdentity, FederationError, IdentityFederation};
use crate::core::config::{FederationConfig, OAuthClientConfig};
use crate::core::constants::FEDERATION_TIMEOUT_SECS;
use crate::data::identity::{NewIdentity, Provider};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

// Kakao: GET /v2/user/me
#[derive(Debug, Deserialize)]
struct KakaoProfile {
    kakao_account: Option<KakaoAccount>,
}

#[derive(Debug, Deserialize)]
struct KakaoAccount {
    email: Option<String>,
    profile: Option<KakaoProfileDetails>,
}

#[derive(Debug, Deserialize)]
struct KakaoProfileDetails {
    nickname: Option<String>,
    profile_image_url: Option<String>,
}

// Naver: GET /v1/nid/me
#[derive(Debug, Deserialize)]
struct NaverProfile {
    resultcode: String,
    message: Option<String>,
    response: Option<NaverAccount>,
}

#[derive(Debug, Deserialize)]
struct NaverAccount {
    email: Option<String>,
    nickname: Option<String>,
    profile_image: Option<String>,
}

#[derive(Debug)]
pub struct HttpFederation {
    client: reqwest::Client,
    config: FederationConfig,
}

impl HttpFederation {
    pub fn new(config: FederationConfig) -> Result<Self, FederationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FEDERATION_TIMEOUT_SECS))
            .build()?;

        tracing::debug!(
            kakao = config.kakao.is_some(),
            naver = config.naver.is_some(),
            "Identity federation initialized"
        );
        Ok(Self { client, config })
    }

    fn client_config(&self, provider: Provider) -> Result<&OAuthClientConfig, FederationError> {
        let client = match provider {
            Provider::Kakao => self.config.kakao.as_ref(),
            Provider::Naver => self.config.naver.as_ref(),
            Provider::Local => return Err(FederationError::Unsupported(provider)),
        };
        client.ok_or(FederationError::NotConfigured(provider))
    }

    async fn request_access_token(
        &self,
        provider: Provider,
        client: &OAuthClientConfig,
        code: &str,
        state: Option<&str>,
    ) -> Result<String, FederationError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("client_id", client.client_id.as_str()),
            ("code", code),
        ];
        if let Some(secret) = client.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        if let Some(redirect_uri) = client.redirect_uri.as_deref() {
            form.push(("redirect_uri", redirect_uri));
        }
        if let Some(state) = state {
            form.push(("state", state));
        }

        let resp = self
            .client
            .post(&client.token_url)
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        let body: TokenResponse = resp.json().await?;

        match body.access_token {
            Some(token) if status.is_success() => Ok(token),
            _ => Err(FederationError::Rejected {
                provider,
                message: body
                    .error_description
                    .or(body.error)
                    .unwrap_or_else(|| format!("token endpoint returned {}", status)),
            }),
        }
    }

    async fn fetch_profile(
        &self,
        provider: Provider,
        client: &OAuthClientConfig,
        access_token: &str,
    ) -> Result<FederatedIdentity, FederationError> {
        let resp = self
            .client
            .get(&client.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FederationError::Rejected {
                provider,
                message: format!("profile endpoint returned {}", resp.status()),
            });
        }

        match provider {
            Provider::Kakao => kakao_identity(resp.json().await?),
            Provider::Naver => naver_identity(resp.json().await?),
            Provider::Local => Err(FederationError::Unsupported(provider)),
        }
    }
}

fn kakao_identity(profile: KakaoProfile) -> Result<FederatedIdentity, FederationError> {
    let account = profile
        .kakao_account
        .ok_or_else(|| FederationError::InvalidProfile {
            provider: Provider::Kakao,
            message: "missing kakao_account".to_string(),
        })?;
    let email = non_empty_email(Provider::Kakao, account.email)?;
    let (nickname, avatar_url) = match account.profile {
        Some(p) => (p.nickname, p.profile_image_url),
        None => (None, None),
    };
    Ok(FederatedIdentity {
        provider: Provider::Kakao,
        nickname: nickname.unwrap_or_else(|| NewIdentity::default_nickname(&email)),
        email,
        avatar_url,
    })
}

fn naver_identity(profile: NaverProfile) -> Result<FederatedIdentity, FederationError> {
    // "00" is Naver's success code
    if profile.resultcode != "00" {
        return Err(FederationError::Rejected {
            provider: Provider::Naver,
            message: profile.message.unwrap_or(profile.resultcode),
        });
    }
    let account = profile
        .response
        .ok_or_else(|| FederationError::InvalidProfile {
            provider: Provider::Naver,
            message: "missing response".to_string(),
        })?;
    let email = non_empty_email(Provider::Naver, account.email)?;
    Ok(FederatedIdentity {
        provider: Provider::Naver,
        nickname: account
            .nickname
            .unwrap_or_else(|| NewIdentity::default_nickname(&email)),
        email,
        avatar_url: account.profile_image,
    })
}

fn non_empty_email(provider: Provider, email: Option<String>) -> Result<String, FederationError> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| FederationError::InvalidProfile {
            provider,
            message: "email consent missing".to_string(),
        })
}

#[async_trait]
impl IdentityFederation for HttpFederation {
    async fn exchange(
        &self,
        provider: Provider,
        code: &str,
        state: Option<&str>,
    ) -> Result<FederatedIdentity, FederationError> {
        let client = self.client_config(provider)?;
        let access_token = self
            .request_access_token(provider, client, code, state)
            .await?;
        let identity = self.fetch_profile(provider, client, &access_token).await?;
        tracing::debug!(provider = %provider, email = %identity.email, "Federated identity verified");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kakao_profile() {
        let profile: KakaoProfile = serde_json::from_str(
            r#"{
                "id": 12345,
                "kakao_account": {
                    "email": "User@Example.com",
                    "profile": { "nickname": "kim", "profile_image_url": "https://img/k.png" }
                }
            }"#,
        )
        .unwrap();

        let identity = kakao_identity(profile).unwrap();
        assert_eq!(identity.email, "user@example.com");
        assert_eq!(identity.nickname, "kim");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://img/k.png"));
    }

    #[test]
    fn test_kakao_profile_without_email() {
        let profile: KakaoProfile =
            serde_json::from_str(r#"{ "id": 1, "kakao_account": { "profile": {} } }"#).unwrap();
        assert!(matches!(
            kakao_identity(profile),
            Err(FederationError::InvalidProfile { .. })
        ));
    }

    #[test]
    fn test_naver_profile() {
        let profile: NaverProfile = serde_json::from_str(
            r#"{
                "resultcode": "00",
                "message": "success",
                "response": { "id": "abc", "email": "lee@naver.com" }
            }"#,
        )
        .unwrap();

        let identity = naver_identity(profile).unwrap();
        assert_eq!(identity.provider, Provider::Naver);
        assert_eq!(identity.email, "lee@naver.com");
        assert_eq!(identity.nickname, "lee");
        assert!(identity.avatar_url.is_none());
    }

    #[test]
    fn test_naver_error_result() {
        let profile: NaverProfile = serde_json::from_str(
            r#"{ "resultcode": "024", "message": "Authentication failed" }"#,
        )
        .unwrap();
        match naver_identity(profile) {
            Err(FederationError::Rejected { message, .. }) => {
                assert_eq!(message, "Authentication failed")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let federation = HttpFederation::new(FederationConfig::default()).unwrap();

        assert!(matches!(
            federation.exchange(Provider::Kakao, "code", None).await,
            Err(FederationError::NotConfigured(Provider::Kakao))
        ));
        assert!(matches!(
            federation.exchange(Provider::Local, "code", None).await,
            Err(FederationError::Unsupported(Provider::Local))
        ));
    }
}
