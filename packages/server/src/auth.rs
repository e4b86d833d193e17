//! Caller identity from `Authorization: Bearer <jwt>` headers.
//!
//! Tokens are Cognito ID tokens. With `JWT_SECRET` set, tokens must be
//! HS256-signed with that secret. Signature checks are skipped only when
//! `TRUST_UPSTREAM_AUTH=true` says a gateway authorizer has already
//! verified them; then only the claims and expiry are checked. With
//! neither set the server refuses to start.

use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::ApiError;

/// Token verification settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    secret: Option<String>,
}

impl AuthConfig {
    /// Verifies HS256 signatures with `secret`.
    #[must_use]
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
        }
    }

    /// Trusts token signatures checked upstream.
    #[must_use]
    pub const fn trust_upstream() -> Self {
        Self { secret: None }
    }

    /// Reads `JWT_SECRET` and `TRUST_UPSTREAM_AUTH` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError`] if no secret is set and upstream trust
    /// wasn't enabled.
    pub fn from_env() -> Result<Self, AuthConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthConfigError> {
        if let Some(secret) = lookup("JWT_SECRET").filter(|s| !s.trim().is_empty()) {
            return Ok(Self::with_secret(secret));
        }

        match lookup("TRUST_UPSTREAM_AUTH").as_deref().map(str::trim) {
            Some(flag) if flag.eq_ignore_ascii_case("true") || flag == "1" => {
                log::warn!("TRUST_UPSTREAM_AUTH is set; token signatures are not verified");
                Ok(Self::trust_upstream())
            }
            _ => Err(AuthConfigError::MissingSecret),
        }
    }

    /// Whether signatures are verified locally.
    #[must_use]
    pub const fn verifies_signatures(&self) -> bool {
        self.secret.is_some()
    }

    /// Decodes and validates a token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] if the token is malformed,
    /// expired, wrongly signed, or carries no usable identity.
    pub fn authenticate(&self, token: &str) -> Result<Identity, ApiError> {
        let claims = match &self.secret {
            Some(secret) => jsonwebtoken::decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &Validation::new(Algorithm::HS256),
            ),
            None => {
                let mut validation = Validation::default();
                validation.insecure_disable_signature_validation();
                jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            }
        }
        .map_err(|e| {
            log::debug!("Rejected token: {e}");
            ApiError::Unauthenticated("Invalid or expired token".to_string())
        })?
        .claims;

        Identity::from_claims(claims)
    }
}

/// Invalid token verification settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthConfigError {
    /// Neither a signing secret nor upstream trust was configured.
    #[error(
        "JWT_SECRET is not set. Set it, or set TRUST_UPSTREAM_AUTH=true if a gateway authorizer verifies tokens."
    )]
    MissingSecret,
}

/// Token claims used to identify the caller.
#[derive(Debug, Clone, Deserialize)]
struct Claims {
    email: Option<String>,
    #[serde(rename = "cognito:username")]
    username: Option<String>,
    name: Option<String>,
    given_name: Option<String>,
    sub: Option<String>,
}

/// The authenticated caller.
///
/// Used as a handler argument; extraction fails with 401 when the request
/// has no valid bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Caller email (or Cognito username when no email claim is present).
    pub email: String,
    /// Display name, defaulting to the email.
    pub name: String,
    /// Subject claim.
    pub sub: Option<String>,
}

impl Identity {
    fn from_claims(claims: Claims) -> Result<Self, ApiError> {
        let email = claims
            .email
            .or(claims.username)
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ApiError::Unauthenticated("Token has no email claim".to_string()))?;

        Ok(Self {
            name: claims.name.or(claims.given_name).unwrap_or_else(|| email.clone()),
            email,
            sub: claims.sub,
        })
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

impl FromRequest for Identity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(token) = bearer_token(req) else {
            return ready(Err(ApiError::Unauthenticated(
                "Authentication required".to_string(),
            )));
        };

        let result = match req.app_data::<web::Data<AuthConfig>>() {
            Some(auth) => auth.authenticate(token),
            None => Err(ApiError::internal("AuthConfig missing from app data")),
        };

        ready(result)
    }
}
