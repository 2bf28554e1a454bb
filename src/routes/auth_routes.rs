use actix_web::{web, HttpResponse};

use crate::auth::{self, Auth, Role};
use crate::error::ApiError;
use crate::models::{LoginRequest, NewUser, TokenResponse, UserInfo};
use crate::repo::RepoError;
use crate::routes::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(web::resource("/login").route(web::post().to(login)))
            .service(web::resource("/register").route(web::post().to(register)))
            .service(web::resource("/me").route(web::get().to(me))),
    );
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Bad credentials or disabled account")
    )
)]
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    // Unknown usernames and wrong passwords get the same answer.
    let user = data
        .repo
        .get_user_by_username(&req.username)
        .await
        .map_err(|_| ApiError::Unauthorized)?;
    if !auth::verify_password(req.password.as_deref(), user.password_hash.as_deref()) {
        return Err(ApiError::Unauthorized);
    }
    if !user.is_active {
        return Err(ApiError::Unauthorized);
    }
    let token = auth::create_jwt(user.id, user.role).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token: token,
        token_type: "bearer".into(),
        user: user.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = UserInfo),
        (status = 409, description = "Username taken")
    )
)]
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<NewUser>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    if new.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".into()));
    }
    // Bootstrap admins come from the environment; everyone else registers as
    // a regular user. An empty password creates a passwordless account.
    let bootstrap_admins = std::env::var("ADMIN_USERNAMES").unwrap_or_default();
    let role = if bootstrap_admins
        .split(',')
        .map(str::trim)
        .any(|u| !u.is_empty() && u == new.username)
    {
        Role::Admin
    } else {
        Role::User
    };
    let password_hash = new
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(auth::hash_password);
    let user = data
        .repo
        .create_user(new.username, new.display_name, password_hash, role)
        .await?;
    Ok(HttpResponse::Created().json(UserInfo::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let id = auth.user_id().ok_or(ApiError::Unauthorized)?;
    let user = data.repo.get_user(id).await.map_err(|e| match e {
        RepoError::NotFound => ApiError::Unauthorized,
        other => other.into(),
    })?;
    Ok(HttpResponse::Ok().json(UserInfo::from(user)))
}
