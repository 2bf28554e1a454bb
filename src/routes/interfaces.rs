use actix_web::{web, HttpResponse};

use crate::auth::{ensure_owner_or_admin, Auth};
use crate::error::ApiError;
use crate::models::*;
use crate::routes::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/interfaces")
            .service(
                web::resource("")
                    .route(web::get().to(list_interfaces))
                    .route(web::post().to(create_interface)),
            )
            .service(web::resource("/search").route(web::post().to(search_interfaces)))
            .service(web::resource("/code/{code}").route(web::get().to(get_interface_by_code)))
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_interface))
                    .route(web::put().to(update_interface))
                    .route(web::delete().to(delete_interface)),
            ),
    );
}

#[utoipa::path(
    get,
    path = "/api/interfaces",
    responses((status = 200, description = "List interfaces", body = InterfaceListResponse))
)]
pub async fn list_interfaces(
    _auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<InterfaceSearch>,
) -> Result<HttpResponse, ApiError> {
    let search = query.into_inner();
    let (items, total) = data.repo.search_interfaces(&search).await?;
    let (page, page_size) = clamp_page(search.page, search.page_size);
    Ok(HttpResponse::Ok().json(InterfaceListResponse { total, page, page_size, items }))
}

#[utoipa::path(
    post,
    path = "/api/interfaces",
    request_body = NewInterface,
    responses(
        (status = 201, description = "Interface created, inline parameters included", body = Interface),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Interface code already exists")
    )
)]
pub async fn create_interface(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewInterface>,
) -> Result<HttpResponse, ApiError> {
    let iface = data
        .repo
        .create_interface(payload.into_inner(), auth.user_id())
        .await?;
    Ok(HttpResponse::Created().json(iface))
}

#[utoipa::path(
    post,
    path = "/api/interfaces/search",
    request_body = InterfaceSearch,
    responses((status = 200, description = "Filtered, paginated interfaces", body = InterfaceListResponse))
)]
pub async fn search_interfaces(
    _auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<InterfaceSearch>,
) -> Result<HttpResponse, ApiError> {
    let search = payload.into_inner();
    let (items, total) = data.repo.search_interfaces(&search).await?;
    let (page, page_size) = clamp_page(search.page, search.page_size);
    Ok(HttpResponse::Ok().json(InterfaceListResponse { total, page, page_size, items }))
}

#[utoipa::path(
    get,
    path = "/api/interfaces/{id}",
    params(("id" = Id, Path, description = "Interface id")),
    responses(
        (status = 200, description = "Interface with parameters", body = Interface),
        (status = 404, description = "Interface not found")
    )
)]
pub async fn get_interface(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let iface = data.repo.get_interface(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(iface))
}

#[utoipa::path(
    get,
    path = "/api/interfaces/code/{code}",
    params(("code" = String, Path, description = "Unique interface code")),
    responses(
        (status = 200, description = "Interface with parameters", body = Interface),
        (status = 404, description = "Interface not found")
    )
)]
pub async fn get_interface_by_code(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let iface = data.repo.get_interface_by_code(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(iface))
}

#[utoipa::path(
    put,
    path = "/api/interfaces/{id}",
    request_body = UpdateInterface,
    params(("id" = Id, Path, description = "Interface id")),
    responses(
        (status = 200, description = "Interface updated", body = Interface),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Interface not found"),
        (status = 409, description = "Interface code already exists")
    )
)]
pub async fn update_interface(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateInterface>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_interface(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let iface = data.repo.update_interface(id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(iface))
}

#[utoipa::path(
    delete,
    path = "/api/interfaces/{id}",
    params(("id" = Id, Path, description = "Interface id")),
    responses(
        (status = 204, description = "Interface deleted (cascades to parameters)"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Interface not found")
    )
)]
pub async fn delete_interface(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_interface(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    data.repo.delete_interface(id).await?;
    Ok(HttpResponse::NoContent().finish())
}
