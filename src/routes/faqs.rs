use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};

use crate::auth::{ensure_owner_or_admin, Auth};
use crate::error::ApiError;
use crate::models::*;
use crate::routes::documents::kind_for;
use crate::routes::{read_multipart, AppState, UploadForm};
use crate::storage::delete_quietly;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/faqs")
            .service(
                web::resource("")
                    .route(web::get().to(list_faqs))
                    .route(web::post().to(create_faq)),
            )
            .service(web::resource("/{id}/attachments").route(web::post().to(upload_attachment)))
            .service(
                web::resource("/{id}/attachments/{stored_filename}")
                    .route(web::delete().to(delete_attachment)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_faq))
                    .route(web::put().to(update_faq))
                    .route(web::delete().to(delete_faq)),
            ),
    );
}

#[utoipa::path(
    get,
    path = "/api/faqs",
    responses((status = 200, description = "Search FAQs", body = FaqListResponse))
)]
pub async fn list_faqs(
    _auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<FaqSearch>,
) -> Result<HttpResponse, ApiError> {
    let search = query.into_inner();
    let (items, total) = data.repo.search_faqs(&search).await?;
    let (page, page_size) = clamp_page(search.page, search.page_size);
    Ok(HttpResponse::Ok().json(FaqListResponse { total, page, page_size, items }))
}

fn new_faq_from(form: &UploadForm) -> Result<NewFaq, ApiError> {
    let title = form
        .field("title")
        .ok_or_else(|| ApiError::BadRequest("title is required".into()))?
        .to_string();
    let content_type = match form.field("content_type").unwrap_or("attachment") {
        "attachment" => ContentType::Attachment,
        "rich_text" => ContentType::RichText,
        other => {
            return Err(ApiError::BadRequest(format!(
                "invalid content type '{other}', expected 'attachment' or 'rich_text'"
            )))
        }
    };
    Ok(NewFaq {
        title,
        description: form.field("description").map(str::to_string),
        module: form.field("module").map(str::to_string),
        person: form.field("person").map(str::to_string),
        // new FAQs are uniformly pdf-typed; the field survives for old rows
        document_type: DocumentKind::Pdf,
        content_type,
        rich_content: form.field("rich_content").map(str::to_string),
    })
}

#[utoipa::path(
    post,
    path = "/api/faqs",
    responses(
        (status = 201, description = "FAQ created", body = Faq),
        (status = 400, description = "Missing PDF (attachment mode) or empty rich_content (rich_text mode)"),
        (status = 413, description = "File too large")
    )
)]
pub async fn create_faq(
    auth: Auth,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_multipart(payload).await?;
    let new = new_faq_from(&form)?;
    let category = form.field("category").map(str::to_string);

    match new.content_type {
        ContentType::RichText => {
            if new.rich_content.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(ApiError::BadRequest(
                    "rich_text FAQs must provide rich_content".into(),
                ));
            }
            if !form.files.is_empty() {
                return Err(ApiError::BadRequest(
                    "rich_text FAQs do not take file uploads".into(),
                ));
            }
            let faq = data.repo.create_faq(new, auth.user_id()).await?;
            Ok(HttpResponse::Created().json(faq))
        }
        ContentType::Attachment => {
            // attachment mode starts with exactly one PDF; more can be added
            // through the attachments endpoint afterwards
            if form.files.is_empty() {
                return Err(ApiError::BadRequest(
                    "attachment FAQs must upload one PDF file".into(),
                ));
            }
            if form.files.len() > 1 {
                return Err(ApiError::BadRequest(
                    "attachment FAQs take a single PDF on creation".into(),
                ));
            }
            let (filename, bytes) = form.single_file()?;
            let filename = filename.to_string();
            let bytes = bytes.to_vec();
            let kind = kind_for(new.document_type);
            let faq = data.repo.create_faq(new, auth.user_id()).await?;
            let att = match data
                .files
                .save("faqs", faq.id, &filename, kind, category, &bytes)
                .await
            {
                Ok(att) => att,
                Err(e) => {
                    let _ = data.repo.delete_faq(faq.id).await;
                    return Err(e.into());
                }
            };
            let faq = data.repo.add_faq_attachment(faq.id, att).await?;
            Ok(HttpResponse::Created().json(faq))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/faqs/{id}",
    params(("id" = Id, Path, description = "FAQ id")),
    responses(
        (status = 200, description = "FAQ; legacy rows get a synthesized attachment list", body = Faq),
        (status = 404, description = "FAQ not found")
    )
)]
pub async fn get_faq(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let faq = data.repo.get_faq(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(faq))
}

#[utoipa::path(
    put,
    path = "/api/faqs/{id}",
    request_body = UpdateFaq,
    params(("id" = Id, Path, description = "FAQ id")),
    responses(
        (status = 200, description = "FAQ updated", body = Faq),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "FAQ not found")
    )
)]
pub async fn update_faq(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateFaq>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_faq(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let faq = data.repo.update_faq(id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(faq))
}

#[utoipa::path(
    delete,
    path = "/api/faqs/{id}",
    params(("id" = Id, Path, description = "FAQ id")),
    responses(
        (status = 204, description = "FAQ and its files deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "FAQ not found")
    )
)]
pub async fn delete_faq(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_faq(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let deleted = data.repo.delete_faq(id).await?;
    for att in &deleted.attachments {
        delete_quietly(data.files.as_ref(), &att.file_path).await;
    }
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/faqs/{id}/attachments",
    params(("id" = Id, Path, description = "FAQ id")),
    responses(
        (status = 201, description = "Attachment added; full FAQ returned", body = Faq),
        (status = 400, description = "File type does not match the FAQ's document type"),
        (status = 404, description = "FAQ not found"),
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
    let existing = data.repo.get_faq(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;

    let form = read_multipart(payload).await?;
    let (filename, bytes) = form.single_file()?;
    let category = form.field("category").map(str::to_string);
    let att = data
        .files
        .save(
            "faqs",
            id,
            filename,
            kind_for(existing.document_type),
            category,
            bytes,
        )
        .await?;
    let faq = data.repo.add_faq_attachment(id, att).await?;
    Ok(HttpResponse::Created().json(faq))
}

#[utoipa::path(
    delete,
    path = "/api/faqs/{id}/attachments/{stored_filename}",
    params(
        ("id" = Id, Path, description = "FAQ id"),
        ("stored_filename" = String, Path, description = "Disk-unique stored filename")
    ),
    responses(
        (status = 200, description = "Attachment removed; full FAQ returned", body = Faq),
        (status = 404, description = "FAQ or attachment not found"),
        (status = 409, description = "Deleting the last PDF of an attachment FAQ")
    )
)]
pub async fn delete_attachment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, String)>,
) -> Result<HttpResponse, ApiError> {
    let (id, stored_filename) = path.into_inner();
    let existing = data.repo.get_faq(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let (faq, removed) = data.repo.remove_faq_attachment(id, &stored_filename).await?;
    delete_quietly(data.files.as_ref(), &removed.file_path).await;
    Ok(HttpResponse::Ok().json(faq))
}
