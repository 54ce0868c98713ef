//! Delegated identity: service-account assertion signing and the JWT-bearer
//! token exchange.
//!
//! Tokens are not cached. Every call to [`TokenMinter::mint`] signs a fresh
//! assertion and performs a fresh exchange.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, Instrument};

use crate::error::{ProviderError, ProviderResult};

/// OAuth2 grant type for signed assertions.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime in seconds.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account credential document we use.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PKCS#8 PEM
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(document: &str) -> ProviderResult<Self> {
        let key: Self = serde_json::from_str(document)
            .map_err(|e| ProviderError::auth(format!("Invalid service account document: {}", e)))?;

        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(ProviderError::auth(
                "Service account document is missing client_email or private_key",
            ));
        }
        Ok(key)
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionHeader {
    pub alg: String,
    pub typ: String,
}

impl Default for AssertionHeader {
    fn default() -> Self {
        Self {
            alg: "RS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        scope: impl Into<String>,
        issued_at: i64,
    ) -> Self {
        let issuer = issuer.into();
        Self {
            sub: issuer.clone(),
            iss: issuer,
            aud: audience.into(),
            scope: scope.into(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        }
    }
}

/// Produce `b64url(header).b64url(claims).b64url(signature)`.
///
/// The signature is RSASSA-PKCS1-v1_5 over SHA-256 of the first two segments.
pub fn sign_assertion(
    header: &AssertionHeader,
    claims: &AssertionClaims,
    private_key_pem: &str,
) -> ProviderResult<String> {
    let header_json = serde_json::to_vec(header)
        .map_err(|e| ProviderError::auth(format!("Failed to encode assertion header: {}", e)))?;
    let claims_json = serde_json::to_vec(claims)
        .map_err(|e| ProviderError::auth(format!("Failed to encode assertion claims: {}", e)))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );

    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| ProviderError::auth(format!("Invalid service account private key: {}", e)))?;

    // Already base64url without padding
    let signature = jsonwebtoken::crypto::sign(signing_input.as_bytes(), &key, Algorithm::RS256)
        .map_err(|e| ProviderError::auth(format!("Failed to sign assertion: {}", e)))?;

    Ok(format!("{}.{}", signing_input, signature))
}

/// Bearer token returned by the token endpoint.
#[derive(Clone, Deserialize)]
pub struct BearerToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Exchanges signed assertions for bearer tokens.
#[derive(Clone)]
pub struct TokenMinter {
    http: Client,
    token_endpoint: String,
    scope: String,
}

impl TokenMinter {
    pub fn new(http: Client, token_endpoint: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            http,
            token_endpoint: token_endpoint.into(),
            scope: scope.into(),
        }
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Signed assertion for `key` issued at `issued_at` (unix seconds).
    pub fn build_assertion(&self, key: &ServiceAccountKey, issued_at: i64) -> ProviderResult<String> {
        let claims = AssertionClaims::new(
            key.client_email.clone(),
            self.token_endpoint.clone(),
            self.scope.clone(),
            issued_at,
        );
        sign_assertion(&AssertionHeader::default(), &claims, &key.private_key)
    }

    /// Sign a fresh assertion and exchange it for a bearer token.
    pub async fn mint(&self, key: &ServiceAccountKey) -> ProviderResult<BearerToken> {
        let span = info_span!("mint_token", issuer = %key.client_email);

        async {
            let assertion = self.build_assertion(key, chrono::Utc::now().timestamp())?;

            let response = self
                .http
                .post(&self.token_endpoint)
                .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                .send()
                .await
                .map_err(|e| ProviderError::auth(format!("Token exchange request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::auth(format!(
                    "Token endpoint returned {}: {}",
                    status.as_u16(),
                    body
                )));
            }

            let token: BearerToken = response
                .json()
                .await
                .map_err(|e| ProviderError::auth(format!("Invalid token response: {}", e)))?;

            if token.access_token.is_empty() {
                return Err(ProviderError::auth("Token endpoint returned an empty access_token"));
            }

            debug!(expires_in = ?token.expires_in, "Minted bearer token");
            Ok(token)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::DecodingKey;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/test_private_key.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/test_public_key.pem");
    const SERVICE_ACCOUNT: &str = include_str!("../tests/fixtures/service_account.json");

    fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> T {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
    }

    #[test]
    fn test_assertion_segments_decode_to_inputs() {
        let header = AssertionHeader::default();
        let claims = AssertionClaims::new(
            "bot@test-project.iam.gserviceaccount.com",
            "https://oauth2.googleapis.com/token",
            "https://www.googleapis.com/auth/cloud-platform",
            1_700_000_000,
        );

        let assertion = sign_assertion(&header, &claims, PRIVATE_KEY).unwrap();
        let segments: Vec<&str> = assertion.split('.').collect();
        assert_eq!(segments.len(), 3);

        assert_eq!(decode_segment::<AssertionHeader>(segments[0]), header);
        assert_eq!(decode_segment::<AssertionClaims>(segments[1]), claims);
        assert!(!segments.iter().any(|s| s.contains('=')));
    }

    #[test]
    fn test_assertion_signature_verifies_with_public_key() {
        let claims = AssertionClaims::new("a@b.c", "https://token", "scope", 1_700_000_000);
        let assertion = sign_assertion(&AssertionHeader::default(), &claims, PRIVATE_KEY).unwrap();

        let (message, signature) = assertion.rsplit_once('.').unwrap();
        let public = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap();
        assert!(jsonwebtoken::crypto::verify(signature, message.as_bytes(), &public, Algorithm::RS256).unwrap());

        let tampered = message.replacen('e', "f", 1);
        assert!(!jsonwebtoken::crypto::verify(signature, tampered.as_bytes(), &public, Algorithm::RS256).unwrap_or(false));
    }

    #[test]
    fn test_claims_expire_one_hour_after_issue() {
        let claims = AssertionClaims::new("svc@x", "aud", "scope", 100);
        assert_eq!(claims.sub, "svc@x");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_invalid_private_key_is_auth_error() {
        let claims = AssertionClaims::new("svc@x", "aud", "scope", 100);
        let err = sign_assertion(&AssertionHeader::default(), &claims, "not a key").unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
    }

    #[test]
    fn test_service_account_document_parses() {
        let key = ServiceAccountKey::from_json(SERVICE_ACCOUNT).unwrap();
        assert_eq!(key.client_email, "video-bot@test-project.iam.gserviceaccount.com");
        assert!(!format!("{:?}", key).contains("PRIVATE KEY"));

        assert!(matches!(
            ServiceAccountKey::from_json("{}").unwrap_err(),
            ProviderError::Auth(_)
        ));
    }

    #[tokio::test]
    async fn test_mint_exchanges_assertion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
            ))
            .and(body_string_contains("assertion=ey"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.test",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let minter = TokenMinter::new(Client::new(), format!("{}/token", server.uri()), "scope");
        let key = ServiceAccountKey::from_json(SERVICE_ACCOUNT).unwrap();

        let token = minter.mint(&key).await.unwrap();
        assert_eq!(token.access_token, "ya29.test");
        assert_eq!(token.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_mint_rejection_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let minter = TokenMinter::new(Client::new(), format!("{}/token", server.uri()), "scope");
        let key = ServiceAccountKey::from_json(SERVICE_ACCOUNT).unwrap();

        let err = minter.mint(&key).await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth(ref msg) if msg.contains("invalid_grant")));
    }
}
