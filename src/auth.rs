use actix_web::http::header::HeaderValue;
use actix_web::{dev::Payload, post, web, FromRequest, HttpRequest, HttpResponse};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bson::{doc, oid::ObjectId};
use chrono::{Duration, Utc};
use futures::future::{ready, Ready};
use hmac::{Hmac, Mac};
use mongodb::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::schemas::User;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_TTL_DAYS: i64 = 30;

/// Signed bearer-token claims. The token is `base64url(claims json)` dot
/// `base64url(hmac-sha256 over the encoded claims)`, keyed by the server's
/// `TOKEN_SECRET`, so no session state is kept between requests.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub exp: i64,
}

pub fn issue_token(user: &User, secret: &str) -> ApiResult<String> {
    let claims = Claims {
        sub: user.id.to_hex(),
        name: user.name.clone(),
        email: user.email.clone(),
        exp: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };
    sign_claims(&claims, secret)
}

fn sign_claims(claims: &Claims, secret: &str) -> ApiResult<String> {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signature = URL_SAFE_NO_PAD.encode(compute_signature(&payload, secret));
    Ok(format!("{payload}.{signature}"))
}

pub fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    let (payload, signature) = token.split_once('.')?;
    let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature).ok()?;

    let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
    if claims.exp < Utc::now().timestamp() {
        return None;
    }
    Some(claims)
}

fn compute_signature(payload: &str, secret: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::BadRequest(format!("could not hash password: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// The authenticated caller, extracted from the `Authorization: Bearer`
/// header. Claims are trusted once the signature checks out; no database
/// round trip per request.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_user(req))
    }
}

fn extract_user(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| ApiError::Unauthorized("server configuration missing".to_string()))?;
    let token = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)
        .and_then(Result::ok)
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
    let claims = verify_token(token, &config.token_secret)
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".to_string()))?;
    Ok(AuthUser {
        id: claims.sub,
        name: claims.name,
        email: claims.email,
    })
}

#[derive(Deserialize)]
struct RegisterJson {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginJson {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct AuthResponse {
    id: String,
    name: String,
    email: String,
    token: String,
}

impl AuthResponse {
    fn for_user(user: &User, token: String) -> Self {
        Self {
            id: user.id.to_hex(),
            name: user.name.clone(),
            email: user.email.clone(),
            token,
        }
    }
}

#[post("/auth/register")]
pub(crate) async fn register(
    client: web::Data<Client>,
    config: web::Data<Config>,
    json: web::Json<RegisterJson>,
) -> ApiResult<HttpResponse> {
    let json = json.into_inner();
    if json.email.is_empty() || json.password.is_empty() {
        return Err(ApiError::BadRequest("email and password are required".to_string()));
    }

    let users = client.database(crate::DB_NAME).collection::<User>("Users");
    if users.find_one(doc! { "email": &json.email }, None).await?.is_some() {
        return Err(ApiError::BadRequest("email already registered".to_string()));
    }

    let user = User {
        id: ObjectId::new(),
        name: json.name,
        email: json.email,
        password_hash: hash_password(&json.password)?,
        created_at: bson::DateTime::now(),
    };
    users.insert_one(&user, None).await?;
    tracing::info!(user = %user.id, "registered");

    let token = issue_token(&user, &config.token_secret)?;
    Ok(HttpResponse::Created().json(AuthResponse::for_user(&user, token)))
}

#[post("/auth/login")]
pub(crate) async fn login(
    client: web::Data<Client>,
    config: web::Data<Config>,
    json: web::Json<LoginJson>,
) -> ApiResult<HttpResponse> {
    let users = client.database(crate::DB_NAME).collection::<User>("Users");
    let user = users
        .find_one(doc! { "email": &json.email }, None)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid email or password".to_string()))?;

    if !verify_password(&json.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("invalid email or password".to_string()));
    }

    let token = issue_token(&user, &config.token_secret)?;
    Ok(HttpResponse::Ok().json(AuthResponse::for_user(&user, token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: "651f1f77bcf86cd799439011".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            exp,
        }
    }

    #[test]
    fn token_round_trips() {
        let signed = sign_claims(&claims(Utc::now().timestamp() + 60), "secret").unwrap();
        let verified = verify_token(&signed, "secret").unwrap();
        assert_eq!(verified.sub, "651f1f77bcf86cd799439011");
        assert_eq!(verified.email, "alice@example.com");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let signed = sign_claims(&claims(Utc::now().timestamp() + 60), "secret").unwrap();
        let mut tampered = signed.clone();
        tampered.replace_range(0..1, "x");
        assert!(verify_token(&tampered, "secret").is_none());
        assert!(verify_token(&signed, "other-secret").is_none());
        assert!(verify_token("not-a-token", "secret").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let signed = sign_claims(&claims(Utc::now().timestamp() - 1), "secret").unwrap();
        assert!(verify_token(&signed, "secret").is_none());
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }
}
