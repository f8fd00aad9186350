//! Bearer authentication and scope checks for the web API.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use common::{AppError, AppResult, CallContext};
use domain::{AuthUser, AUTHENTICATED_GROUP};

// =============================================================================
// Backends
// =============================================================================

/// Resolves the caller from an `Authorization: <prefix> <token>` header.
pub trait BearerAuthenticationBackend: Send + Sync {
    fn prefix(&self) -> &str {
        "Bearer"
    }

    /// Token part of the header, checked against [`prefix`](Self::prefix).
    fn get_token_from_header<'a>(&self, authorization: &'a str) -> AppResult<&'a str> {
        let parts: Vec<&str> = authorization.split_whitespace().collect();
        let [scheme, token] = parts.as_slice() else {
            return Err(AppError::authentication(
                "Could not separate Authorization scheme and token",
            ));
        };
        if !scheme.eq_ignore_ascii_case(self.prefix()) {
            return Err(AppError::authentication(format!(
                "Authorization scheme is not supported: {scheme}"
            )));
        }
        Ok(*token)
    }

    /// Decode the token into a user.
    fn get_payload_data(&self, token: &str) -> AppResult<AuthUser>;

    /// `Ok(None)` when the request carries no `Authorization` header.
    fn authenticate(&self, headers: &HeaderMap) -> AppResult<Option<AuthUser>> {
        let Some(header) = headers.get(AUTHORIZATION) else {
            return Ok(None);
        };

        let result = header
            .to_str()
            .map_err(|_| AppError::authentication("Could not separate Authorization scheme and token"))
            .and_then(|value| self.get_token_from_header(value))
            .and_then(|token| self.get_payload_data(token));

        match result {
            Ok(mut user) => {
                user.grant(AUTHENTICATED_GROUP);
                Ok(Some(user))
            }
            Err(AppError::Authentication(msg)) => {
                tracing::warn!(error = %msg, "Error while authentication");
                Err(AppError::Authentication(msg))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Unexpected error while authentication");
                Err(AppError::Authentication(err.detail()))
            }
        }
    }
}

/// Claims read from an HS256 token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    pub exp: i64,
}

/// Bearer backend validating HS256 tokens signed with a shared secret.
pub struct JwtAuthenticationBackend {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticationBackend {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl BearerAuthenticationBackend for JwtAuthenticationBackend {
    fn get_payload_data(&self, token: &str) -> AppResult<AuthUser> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AppError::authentication(format!("Invalid token: {e}")))?;

        let claims = data.claims;
        Ok(AuthUser {
            user_id: claims.sub,
            device_id: claims.device_id,
            account_groups: claims.groups,
        })
    }
}

// =============================================================================
// Middleware & extractor
// =============================================================================

/// User resolved by [`authentication`], if any.
#[derive(Debug, Clone, Default)]
pub struct RequestUser(pub Option<AuthUser>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<RequestUser>().cloned().unwrap_or_default())
    }
}

/// Run the backend on every request; failures answer 401.
pub async fn authentication(
    State(backend): State<Arc<dyn BearerAuthenticationBackend>>,
    mut request: Request,
    next: Next,
) -> Response {
    match backend.authenticate(request.headers()) {
        Ok(user) => {
            request.extensions_mut().insert(RequestUser(user));
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Require a user holding every group of at least one scope list.
///
/// The user is stored in the call context before the scopes are checked.
pub fn authorize(user: &RequestUser, scopes: &[&[&str]]) -> AppResult<AuthUser> {
    let user = user.0.clone().ok_or(AppError::Unauthorized)?;
    CallContext::set_authenticated_user(Some(user.clone()));

    let allowed = scopes
        .iter()
        .any(|required| required.iter().all(|group| user.has_group(group)));
    if allowed {
        Ok(user)
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use domain::{ADMIN_GROUP, USER_GROUP};
    use jsonwebtoken::{encode, EncodingKey, Header};

    struct Plain;

    impl BearerAuthenticationBackend for Plain {
        fn get_payload_data(&self, token: &str) -> AppResult<AuthUser> {
            match token {
                "boom" => Err(AppError::internal("decoder crashed")),
                _ => Ok(AuthUser::new(token, vec![USER_GROUP.to_string()])),
            }
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn message(err: AppError) -> String {
        match err {
            AppError::Authentication(msg) => msg,
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[test]
    fn test_no_header_is_anonymous() {
        assert_eq!(Plain.authenticate(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn test_valid_header_adds_authenticated_group() {
        let user = Plain.authenticate(&headers("bearer u1")).unwrap().unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.account_groups, vec![USER_GROUP, AUTHENTICATED_GROUP]);
    }

    #[test]
    fn test_header_errors() {
        let err = Plain.authenticate(&headers("Bearer")).unwrap_err();
        assert_eq!(message(err), "Could not separate Authorization scheme and token");

        let err = Plain.authenticate(&headers("Basic abc")).unwrap_err();
        assert_eq!(message(err), "Authorization scheme is not supported: Basic");

        let err = Plain.authenticate(&headers("Bearer boom")).unwrap_err();
        assert_eq!(message(err), "decoder crashed");
    }

    #[test]
    fn test_jwt_backend() {
        let claims = Claims {
            sub: "user-1".into(),
            device_id: Some("dev-1".into()),
            groups: vec![ADMIN_GROUP.into()],
            exp: 4_102_444_800,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();

        let backend = JwtAuthenticationBackend::new("secret");
        let user = backend
            .authenticate(&headers(&format!("Bearer {token}")))
            .unwrap()
            .unwrap();
        assert_eq!(user.device_identification(), Some("dev-1"));
        assert!(user.is_admin());

        let other = JwtAuthenticationBackend::new("other");
        let err = other.authenticate(&headers(&format!("Bearer {token}"))).unwrap_err();
        assert!(message(err).starts_with("Invalid token: "));
    }

    #[tokio::test]
    async fn test_authorize() {
        let user = RequestUser(Some(AuthUser::new("u1", vec![USER_GROUP.to_string()])));

        CallContext::scope(async {
            assert!(authorize(&user, &[&[USER_GROUP]]).is_ok());
            assert_eq!(
                CallContext::get_authenticated_user().map(|u| u.user_id),
                Some("u1".to_string())
            );

            assert!(authorize(&user, &[&[ADMIN_GROUP], &[USER_GROUP, "authenticated"], &[USER_GROUP]]).is_ok());
            assert!(matches!(
                authorize(&user, &[&[USER_GROUP, ADMIN_GROUP]]),
                Err(AppError::Forbidden)
            ));
            assert!(matches!(
                authorize(&RequestUser(None), &[&[USER_GROUP]]),
                Err(AppError::Unauthorized)
            ));
        })
        .await;
    }
}
