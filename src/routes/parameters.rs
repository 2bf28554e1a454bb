use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::{ensure_owner_or_admin, Auth};
use crate::error::ApiError;
use crate::import::{parse_parameter_block, ParsedParameter};
use crate::models::*;
use crate::routes::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/parameters")
            .service(
                web::resource("/interface/{interface_id}")
                    .route(web::get().to(list_parameters))
                    .route(web::post().to(create_parameter)),
            )
            .service(
                web::resource("/interface/{interface_id}/batch-parse")
                    .route(web::post().to(batch_parse)),
            )
            .service(
                web::resource("/interface/{interface_id}/batch-import")
                    .route(web::post().to(batch_import)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_parameter))
                    .route(web::put().to(update_parameter))
                    .route(web::delete().to(delete_parameter)),
            ),
    );
}

#[derive(Debug, Deserialize)]
pub struct ParamTypeQuery {
    pub param_type: Option<ParamType>,
}

async fn interface_guard(
    auth: &Auth,
    data: &AppState,
    interface_id: Id,
) -> Result<Interface, ApiError> {
    let iface = data.repo.get_interface(interface_id).await?;
    ensure_owner_or_admin(auth, iface.creator_id)?;
    Ok(iface)
}

#[utoipa::path(
    get,
    path = "/api/parameters/interface/{interface_id}",
    params(
        ("interface_id" = Id, Path, description = "Interface id"),
        ("param_type" = Option<ParamType>, Query, description = "input or output")
    ),
    responses(
        (status = 200, description = "Parameters ordered by order_index", body = [Parameter]),
        (status = 404, description = "Interface not found")
    )
)]
pub async fn list_parameters(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    query: web::Query<ParamTypeQuery>,
) -> Result<HttpResponse, ApiError> {
    let params = data
        .repo
        .list_parameters(path.into_inner(), query.param_type)
        .await?;
    Ok(HttpResponse::Ok().json(params))
}

#[utoipa::path(
    post,
    path = "/api/parameters/interface/{interface_id}",
    request_body = NewParameter,
    params(("interface_id" = Id, Path, description = "Interface id")),
    responses(
        (status = 201, description = "Parameter created", body = Parameter),
        (status = 404, description = "Interface not found")
    )
)]
pub async fn create_parameter(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewParameter>,
) -> Result<HttpResponse, ApiError> {
    let interface_id = path.into_inner();
    interface_guard(&auth, &data, interface_id).await?;
    let param = data
        .repo
        .create_parameter(interface_id, payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(param))
}

#[utoipa::path(
    get,
    path = "/api/parameters/{id}",
    params(("id" = Id, Path, description = "Parameter id")),
    responses(
        (status = 200, description = "Parameter", body = Parameter),
        (status = 404, description = "Parameter not found")
    )
)]
pub async fn get_parameter(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let param = data.repo.get_parameter(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(param))
}

#[utoipa::path(
    put,
    path = "/api/parameters/{id}",
    request_body = UpdateParameter,
    params(("id" = Id, Path, description = "Parameter id")),
    responses(
        (status = 200, description = "Parameter updated", body = Parameter),
        (status = 404, description = "Parameter not found")
    )
)]
pub async fn update_parameter(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateParameter>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let param = data.repo.get_parameter(id).await?;
    interface_guard(&auth, &data, param.interface_id).await?;
    let updated = data.repo.update_parameter(id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/parameters/{id}",
    params(("id" = Id, Path, description = "Parameter id")),
    responses(
        (status = 204, description = "Parameter deleted"),
        (status = 404, description = "Parameter not found")
    )
)]
pub async fn delete_parameter(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let param = data.repo.get_parameter(id).await?;
    interface_guard(&auth, &data, param.interface_id).await?;
    data.repo.delete_parameter(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchParseRequest {
    /// Free-form pasted text (spreadsheet rows, delimited file contents).
    pub text: String,
    pub param_type: ParamType,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchImportRequest {
    /// The reviewed rows from a batch-parse preview.
    pub parameters: Vec<NewParameter>,
}

#[utoipa::path(
    post,
    path = "/api/parameters/interface/{interface_id}/batch-parse",
    request_body = BatchParseRequest,
    params(("interface_id" = Id, Path, description = "Interface id")),
    responses(
        (status = 200, description = "Parsed preview; nothing is persisted", body = [ParsedParameter]),
        (status = 404, description = "Interface not found")
    )
)]
pub async fn batch_parse(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<BatchParseRequest>,
) -> Result<HttpResponse, ApiError> {
    let interface_id = path.into_inner();
    let req = payload.into_inner();
    // order_index continues from the current parameter count
    let existing = data.repo.list_parameters(interface_id, None).await?;
    let rows = parse_parameter_block(&req.text, req.param_type, existing.len() as i32);
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    post,
    path = "/api/parameters/interface/{interface_id}/batch-import",
    request_body = BatchImportRequest,
    params(("interface_id" = Id, Path, description = "Interface id")),
    responses(
        (status = 201, description = "Rows appended; full renumbered list returned", body = [Parameter]),
        (status = 404, description = "Interface not found")
    )
)]
pub async fn batch_import(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<BatchImportRequest>,
) -> Result<HttpResponse, ApiError> {
    let interface_id = path.into_inner();
    interface_guard(&auth, &data, interface_id).await?;
    let req = payload.into_inner();
    if req.parameters.is_empty() {
        return Err(ApiError::BadRequest("no parameters to import".into()));
    }
    let params = data
        .repo
        .append_parameters(interface_id, req.parameters)
        .await?;
    Ok(HttpResponse::Created().json(params))
}
