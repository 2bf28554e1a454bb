use actix_web::{web, HttpResponse};

use crate::auth::{ensure_owner_or_admin, Auth};
use crate::error::ApiError;
use crate::models::*;
use crate::routes::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/dictionaries")
            .service(
                web::resource("")
                    .route(web::get().to(list_dictionaries))
                    .route(web::post().to(create_dictionary)),
            )
            .service(web::resource("/code/{code}").route(web::get().to(get_dictionary_by_code)))
            .service(web::resource("/{id}/values").route(web::post().to(add_value)))
            .service(
                web::resource("/{id}/values/{value_id}").route(web::delete().to(delete_value)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_dictionary))
                    .route(web::put().to(update_dictionary))
                    .route(web::delete().to(delete_dictionary)),
            ),
    );
}

#[utoipa::path(
    get,
    path = "/api/dictionaries",
    responses((status = 200, description = "List dictionaries with their values", body = DictionaryListResponse))
)]
pub async fn list_dictionaries(
    _auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<DictionaryQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let (page, page_size) = clamp_page(q.page, q.page_size);
    let (items, total) = data
        .repo
        .list_dictionaries(q.project_id, q.keyword.as_deref(), page, page_size)
        .await?;
    Ok(HttpResponse::Ok().json(DictionaryListResponse { total, page, page_size, items }))
}

#[utoipa::path(
    post,
    path = "/api/dictionaries",
    request_body = NewDictionary,
    responses(
        (status = 201, description = "Dictionary created with its values", body = Dictionary),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Dictionary code already exists")
    )
)]
pub async fn create_dictionary(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewDictionary>,
) -> Result<HttpResponse, ApiError> {
    let dict = data
        .repo
        .create_dictionary(payload.into_inner(), auth.user_id())
        .await?;
    Ok(HttpResponse::Created().json(dict))
}

#[utoipa::path(
    get,
    path = "/api/dictionaries/{id}",
    params(("id" = Id, Path, description = "Dictionary id")),
    responses(
        (status = 200, description = "Dictionary with ordered values", body = Dictionary),
        (status = 404, description = "Dictionary not found")
    )
)]
pub async fn get_dictionary(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let dict = data.repo.get_dictionary(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(dict))
}

pub async fn get_dictionary_by_code(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let dict = data.repo.get_dictionary_by_code(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(dict))
}

#[utoipa::path(
    put,
    path = "/api/dictionaries/{id}",
    request_body = UpdateDictionary,
    params(("id" = Id, Path, description = "Dictionary id")),
    responses(
        (status = 200, description = "Dictionary updated", body = Dictionary),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Dictionary not found"),
        (status = 409, description = "Dictionary code already exists")
    )
)]
pub async fn update_dictionary(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateDictionary>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_dictionary(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let dict = data.repo.update_dictionary(id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(dict))
}

#[utoipa::path(
    delete,
    path = "/api/dictionaries/{id}",
    params(("id" = Id, Path, description = "Dictionary id")),
    responses(
        (status = 204, description = "Dictionary deleted (values removed, parameter links severed)"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Dictionary not found")
    )
)]
pub async fn delete_dictionary(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_dictionary(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    data.repo.delete_dictionary(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/dictionaries/{id}/values",
    request_body = NewDictionaryValue,
    params(("id" = Id, Path, description = "Dictionary id")),
    responses(
        (status = 201, description = "Value added", body = DictionaryValue),
        (status = 404, description = "Dictionary not found")
    )
)]
pub async fn add_value(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewDictionaryValue>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_dictionary(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let value = data
        .repo
        .add_dictionary_value(id, payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(value))
}

#[utoipa::path(
    delete,
    path = "/api/dictionaries/{id}/values/{value_id}",
    params(
        ("id" = Id, Path, description = "Dictionary id"),
        ("value_id" = Id, Path, description = "Value id")
    ),
    responses(
        (status = 204, description = "Value deleted"),
        (status = 404, description = "Dictionary or value not found")
    )
)]
pub async fn delete_value(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (id, value_id) = path.into_inner();
    let existing = data.repo.get_dictionary(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    data.repo.delete_dictionary_value(id, value_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
