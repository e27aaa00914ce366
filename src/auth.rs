// Bearer-token verification for review mutations

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{MapperError, MapperResult};
use crate::util::env::env_opt;

/// Identity a token resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: String,
    pub email: Option<String>,
}

/// Turns a bearer token into a [`Principal`].
///
/// `Unauthorized` means the token itself is bad; `AuthUnavailable` means the
/// verifier could not decide.
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> MapperResult<Principal>;
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Asks a remote auth service who owns the token (`GET <url>` with the
/// token forwarded, e.g. a Supabase `/auth/v1/user` endpoint).
pub struct IntrospectionVerifier {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl IntrospectionVerifier {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl TokenVerifier for IntrospectionVerifier {
    async fn verify(&self, token: &str) -> MapperResult<Principal> {
        let mut req = self.client.get(&self.url).bearer_auth(token);
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| MapperError::AuthUnavailable { cause: e.into() })?;

        match resp.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(MapperError::Unauthorized("token rejected".into()));
            }
            s => {
                warn!(status = %s, "token introspection failed");
                return Err(MapperError::AuthUnavailable {
                    cause: anyhow::anyhow!("introspection returned {s}"),
                });
            }
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| MapperError::AuthUnavailable { cause: e.into() })?;
        principal_from_body(&body)
            .ok_or_else(|| MapperError::Unauthorized("token has no subject".into()))
    }
}

fn principal_from_body(body: &Value) -> Option<Principal> {
    let text = |k: &str| {
        body.get(k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let email = text("email");
    let subject = text("id").or_else(|| text("sub")).or_else(|| email.clone())?;
    Some(Principal { subject, email })
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Verifies HS256 tokens locally against a shared secret. `exp` is required.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

#[async_trait::async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> MapperResult<Principal> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            MapperError::Unauthorized(format!("invalid token: {e}"))
        })?;
        if data.claims.sub.trim().is_empty() {
            return Err(MapperError::Unauthorized("token has no subject".into()));
        }
        Ok(Principal {
            subject: data.claims.sub,
            email: data.claims.email,
        })
    }
}

/// `AUTH_INTROSPECTION_URL` (+ optional `AUTH_API_KEY`) wins over
/// `AUTH_JWT_SECRET`. Neither set is a startup error.
pub fn verifier_from_env() -> anyhow::Result<Arc<dyn TokenVerifier>> {
    if let Some(url) = env_opt("AUTH_INTROSPECTION_URL") {
        return Ok(Arc::new(IntrospectionVerifier::new(
            url,
            env_opt("AUTH_API_KEY"),
        )));
    }
    if let Some(secret) = env_opt("AUTH_JWT_SECRET") {
        return Ok(Arc::new(JwtVerifier::new(secret.as_bytes())));
    }
    Err(anyhow::anyhow!(
        "no token verifier configured (AUTH_INTROSPECTION_URL or AUTH_JWT_SECRET)"
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    pub(crate) const TEST_SECRET: &[u8] = b"review-test-secret";

    pub(crate) fn make_jwt(sub: &str, exp_offset_secs: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + exp_offset_secs;
        encode(
            &Header::default(),
            &json!({ "sub": sub, "email": "reviewer@example.com", "exp": exp }),
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap()
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   tok "), Some("tok"));
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("token"), None);
    }

    #[tokio::test]
    async fn jwt_verifier_accepts_valid_and_rejects_bad_tokens() {
        let verifier = JwtVerifier::new(TEST_SECRET);

        let principal = verifier.verify(&make_jwt("user-7", 600)).await.unwrap();
        assert_eq!(principal.subject, "user-7");
        assert_eq!(principal.email.as_deref(), Some("reviewer@example.com"));

        let expired = verifier.verify(&make_jwt("user-7", -3600)).await;
        assert!(matches!(expired, Err(MapperError::Unauthorized(_))));

        let other = JwtVerifier::new(b"another-secret");
        let forged = other.verify(&make_jwt("user-7", 600)).await;
        assert!(matches!(forged, Err(MapperError::Unauthorized(_))));

        assert!(verifier.verify("not-a-jwt").await.is_err());
    }

    #[test]
    fn introspection_body_prefers_id_then_sub_then_email() {
        let p = principal_from_body(&json!({"id": "u1", "email": "a@b.c"})).unwrap();
        assert_eq!(p.subject, "u1");
        let p = principal_from_body(&json!({"sub": "u2"})).unwrap();
        assert_eq!(p.subject, "u2");
        assert_eq!(p.email, None);
        let p = principal_from_body(&json!({"email": "a@b.c"})).unwrap();
        assert_eq!(p.subject, "a@b.c");
        assert!(principal_from_body(&json!({"id": "  "})).is_none());
    }
}
