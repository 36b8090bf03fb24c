use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::ApiError;

/// Roles allowed to create, update, or delete records.
pub const MUTATE_ROLES: &[&str] = &["moderator", "admin"];

/// Any recognized role; used by the token smoke-test endpoint.
pub const ANY_ROLES: &[&str] = &["user", "moderator", "admin"];

/// Claim set carried by a signed bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub roles: Vec<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("not authorized for this endpoint")]
    RoleMismatch,
}

static DECODING_KEY: OnceCell<DecodingKey> = OnceCell::new();

/// Install the RS256 verification key. Called once at startup.
pub fn init(public_key_pem: &str) -> Result<(), jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;
    let _ = DECODING_KEY.set(key);
    Ok(())
}

pub fn decode_token(token: &str) -> Result<Claims, AuthError> {
    let key = DECODING_KEY
        .get()
        .ok_or_else(|| AuthError::InvalidToken("verification key not initialized".to_string()))?;

    let validation = Validation::new(Algorithm::RS256);
    let data = decode::<Claims>(token, key, &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    Ok(data.claims)
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn body_token(body: Option<&Value>) -> Option<&str> {
    body.and_then(|v| v.get("token")).and_then(Value::as_str)
}

/// Authorize a request against a required role set.
///
/// The credential comes from the `Token` header, or, when that is absent or
/// fails to decode, from a `token` field in the JSON body. A body token's
/// decode failure is what gets reported; without one the header error stands.
/// Decode failures and role mismatches both map to 401, with distinct
/// messages.
pub fn authorize(
    headers: &HeaderMap,
    body: Option<&Value>,
    required_roles: &[&str],
) -> Result<Claims, ApiError> {
    let header_result = match header_token(headers) {
        Some(token) => decode_token(&token),
        None => Err(AuthError::MissingToken),
    };

    let claims = match header_result {
        Ok(claims) => claims,
        Err(header_err) => match body_token(body) {
            Some(token) => decode_token(token)?,
            None => return Err(header_err.into()),
        },
    };

    let permitted = required_roles
        .iter()
        .any(|required| claims.roles.iter().any(|claimed| claimed == required));
    if permitted {
        Ok(claims)
    } else {
        Err(AuthError::RoleMismatch.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{HeaderName, HeaderValue};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const TEST_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/jwt_test_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/jwt_test_key.pub.pem");

    fn setup() {
        init(TEST_PUBLIC_KEY).expect("test public key");
    }

    fn mint(roles: &[&str], exp_offset_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            roles: roles.iter().map(|s| s.to_string()).collect(),
            exp: now + exp_offset_secs,
            iat: now,
        };
        let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY.as_bytes()).expect("test private key");
        encode(&Header::new(Algorithm::RS256), &claims, &key).expect("encode token")
    }

    fn headers_with_token(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("token"),
            HeaderValue::from_str(token).expect("header value"),
        );
        headers
    }

    #[test]
    fn decodes_valid_token() {
        setup();
        let claims = decode_token(&mint(&["moderator"], 3600)).expect("decode");
        assert_eq!(claims.roles, vec!["moderator"]);
    }

    #[test]
    fn rejects_expired_token() {
        setup();
        let err = decode_token(&mint(&["admin"], -3600)).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn rejects_malformed_token() {
        setup();
        let err = decode_token("not-a-token").unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn authorizes_on_role_intersection() {
        setup();
        let headers = headers_with_token(&mint(&["admin", "user"], 3600));
        assert!(authorize(&headers, None, MUTATE_ROLES).is_ok());
    }

    #[test]
    fn role_mismatch_has_distinct_message() {
        setup();
        let headers = headers_with_token(&mint(&["user"], 3600));
        let err = authorize(&headers, None, MUTATE_ROLES).unwrap_err();
        assert_eq!(err.message(), "not authorized for this endpoint");
    }

    #[test]
    fn decode_failure_has_distinct_message() {
        setup();
        let headers = headers_with_token("garbage");
        let err = authorize(&headers, None, MUTATE_ROLES).unwrap_err();
        assert!(err.message().starts_with("invalid token"));
    }

    #[test]
    fn falls_back_to_body_token() {
        setup();
        let body = json!({ "token": mint(&["moderator"], 3600) });
        assert!(authorize(&HeaderMap::new(), Some(&body), MUTATE_ROLES).is_ok());
    }

    #[test]
    fn body_token_decode_failure_is_reported() {
        setup();
        let body = json!({ "token": "garbage" });
        let err = authorize(&HeaderMap::new(), Some(&body), MUTATE_ROLES).unwrap_err();
        assert!(err.message().starts_with("invalid token"));
    }

    #[test]
    fn missing_token_everywhere_is_unauthorized() {
        setup();
        let err = authorize(&HeaderMap::new(), None, MUTATE_ROLES).unwrap_err();
        assert_eq!(err.message(), "missing token");
    }

    #[test]
    fn bad_header_token_with_valid_body_token_succeeds() {
        setup();
        let headers = headers_with_token("garbage");
        let body = json!({ "token": mint(&["admin"], 3600) });
        assert!(authorize(&headers, Some(&body), MUTATE_ROLES).is_ok());
    }
}
