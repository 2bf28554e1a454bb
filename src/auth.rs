use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::Id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id as string (JWT subjects are strings)
    pub exp: usize,
    pub role: Role,
}

/// Validate a JWT and return its claims.
fn decode_jwt(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = env::var("JWT_SECRET").expect("JWT_SECRET not set");
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Extractor yielding validated `Claims`.
pub struct Auth(pub Claims);

impl Auth {
    pub fn user_id(&self) -> Option<Id> {
        self.0.sub.parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.0.role, Role::Admin)
    }
}

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            match decode_jwt(bearer.token()) {
                Ok(claims) => return ready(Ok(Auth(claims))),
                Err(_) => return ready(Err(actix_web::error::ErrorUnauthorized("Invalid JWT"))),
            }
        }
        ready(Err(actix_web::error::ErrorUnauthorized(
            "Authorization required",
        )))
    }
}

/// Ownership guard: admins may mutate anything, users only entities whose
/// `creator_id` is their own id. Entities without a creator are admin-only.
pub fn ensure_owner_or_admin(auth: &Auth, creator_id: Option<Id>) -> Result<(), ApiError> {
    if auth.is_admin() {
        return Ok(());
    }
    match (creator_id, auth.user_id()) {
        (Some(creator), Some(me)) if creator == me => Ok(()),
        _ => Err(ApiError::Forbidden),
    }
}

/// Create a JWT for a user. Expiry is long-lived: this is an internal tool
/// and sessions are not expected to force re-login within a month.
pub fn create_jwt(user_id: Id, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = env::var("JWT_SECRET").expect("JWT_SECRET not set");
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(30))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
        role,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Password check with the passwordless-account rule: an account whose stored
/// hash is absent (or empty) accepts ANY submitted password, including none.
/// Deliberate low-security convenience for an internal tool; see DESIGN.md.
pub fn verify_password(submitted: Option<&str>, stored_hash: Option<&str>) -> bool {
    match stored_hash {
        None => true,
        Some(h) if h.is_empty() => true,
        Some(h) => submitted.map(|p| hash_password(p) == h).unwrap_or(false),
    }
}
