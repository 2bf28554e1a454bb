use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::{ensure_owner_or_admin, Auth};
use crate::error::ApiError;
use crate::models::*;
use crate::routes::{read_multipart, AppState};
use crate::storage::{delete_quietly, FileKind};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/projects")
            .service(
                web::resource("")
                    .route(web::get().to(list_projects))
                    .route(web::post().to(create_project)),
            )
            .service(web::resource("/{id}/interfaces").route(web::get().to(project_interfaces)))
            .service(web::resource("/{id}/dictionaries").route(web::get().to(project_dictionaries)))
            .service(web::resource("/{id}/attachments").route(web::post().to(upload_attachment)))
            .service(
                web::resource("/{id}/attachments/{stored_filename}")
                    .route(web::delete().to(delete_attachment)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_project))
                    .route(web::put().to(update_project))
                    .route(web::delete().to(delete_project)),
            ),
    );
}

#[utoipa::path(
    get,
    path = "/api/projects",
    params(
        ("keyword" = Option<String>, Query, description = "Matches name, manager, description"),
        ("page" = Option<i64>, Query, description = "1-based page"),
        ("page_size" = Option<i64>, Query, description = "Items per page, max 100")
    ),
    responses((status = 200, description = "List projects", body = ProjectListResponse))
)]
pub async fn list_projects(
    _auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<ProjectQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let (page, page_size) = clamp_page(q.page, q.page_size);
    let (items, total) = data
        .repo
        .list_projects(q.keyword.as_deref(), page, page_size)
        .await?;
    Ok(HttpResponse::Ok().json(ProjectListResponse { total, page, page_size, items }))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = NewProject,
    responses((status = 201, description = "Project created", body = Project))
)]
pub async fn create_project(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewProject>,
) -> Result<HttpResponse, ApiError> {
    let project = data
        .repo
        .create_project(payload.into_inner(), auth.user_id())
        .await?;
    Ok(HttpResponse::Created().json(project))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(("id" = Id, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail with child counts", body = ProjectDetail),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let project = data.repo.get_project(id).await?;
    let (interfaces_count, dictionaries_count) = data.repo.project_child_counts(id).await?;
    Ok(HttpResponse::Ok().json(ProjectDetail { project, interfaces_count, dictionaries_count }))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    request_body = UpdateProject,
    params(("id" = Id, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn update_project(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateProject>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_project(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let project = data.repo.update_project(id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(project))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(("id" = Id, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project deleted (cascades to interfaces and dictionaries)"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn delete_project(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_project(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let deleted = data.repo.delete_project(id).await?;
    for att in &deleted.attachments {
        delete_quietly(data.files.as_ref(), &att.file_path).await;
    }
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
pub struct ChildQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

pub async fn project_interfaces(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    query: web::Query<ChildQuery>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let _ = data.repo.get_project(id).await?;
    let search = InterfaceSearch {
        keyword: None,
        project_id: Some(id),
        interface_type: None,
        category: None,
        tags: None,
        status: None,
        page: query.page.unwrap_or(1),
        page_size: query.page_size.unwrap_or(100),
    };
    let (items, total) = data.repo.search_interfaces(&search).await?;
    let (page, page_size) = clamp_page(search.page, search.page_size);
    Ok(HttpResponse::Ok().json(InterfaceListResponse { total, page, page_size, items }))
}

pub async fn project_dictionaries(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    query: web::Query<ChildQuery>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let _ = data.repo.get_project(id).await?;
    let (page, page_size) = clamp_page(query.page.unwrap_or(1), query.page_size.unwrap_or(100));
    let (items, total) = data
        .repo
        .list_dictionaries(Some(id), None, page, page_size)
        .await?;
    Ok(HttpResponse::Ok().json(DictionaryListResponse { total, page, page_size, items }))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/attachments",
    params(("id" = Id, Path, description = "Project id")),
    responses(
        (status = 201, description = "Attachment added; full project returned", body = Project),
        (status = 400, description = "Not a PDF"),
        (status = 404, description = "Project not found"),
        (status = 413, description = "File too large")
    )
)]
pub async fn upload_attachment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_project(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;

    let form = read_multipart(payload).await?;
    let (filename, bytes) = form.single_file()?;
    let category = form.field("category").map(str::to_string);
    // project attachments are PDF-only
    let att = data
        .files
        .save("projects", id, filename, FileKind::Pdf, category, bytes)
        .await?;
    let project = data.repo.add_project_attachment(id, att).await?;
    Ok(HttpResponse::Created().json(project))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}/attachments/{stored_filename}",
    params(
        ("id" = Id, Path, description = "Project id"),
        ("stored_filename" = String, Path, description = "Disk-unique stored filename")
    ),
    responses(
        (status = 200, description = "Attachment removed; full project returned", body = Project),
        (status = 404, description = "Project or attachment not found")
    )
)]
pub async fn delete_attachment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, String)>,
) -> Result<HttpResponse, ApiError> {
    let (id, stored_filename) = path.into_inner();
    let existing = data.repo.get_project(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let (project, removed) = data
        .repo
        .remove_project_attachment(id, &stored_filename)
        .await?;
    delete_quietly(data.files.as_ref(), &removed.file_path).await;
    Ok(HttpResponse::Ok().json(project))
}
