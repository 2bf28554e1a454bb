use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use base64::Engine as _;
use chrono::Utc;

use crate::auth::{ensure_owner_or_admin, Auth};
use crate::error::ApiError;
use crate::models::*;
use crate::routes::{read_multipart, AppState, UploadForm};
use crate::storage::{delete_quietly, FileKind, MAX_FILE_SIZE};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/documents")
            .service(
                web::resource("")
                    .route(web::get().to(list_documents))
                    .route(web::post().to(create_document)),
            )
            .service(web::resource("/{id}/attachments").route(web::post().to(upload_attachment)))
            .service(
                web::resource("/{id}/attachments/{stored_filename}")
                    .route(web::delete().to(delete_attachment)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_document))
                    .route(web::put().to(update_document))
                    .route(web::delete().to(delete_document)),
            ),
    );
}

fn parse_document_kind(raw: &str) -> Result<DocumentKind, ApiError> {
    match raw {
        "pdf" => Ok(DocumentKind::Pdf),
        "image" => Ok(DocumentKind::Image),
        other => Err(ApiError::BadRequest(format!(
            "invalid document type '{other}', expected 'pdf' or 'image'"
        ))),
    }
}

pub(crate) fn kind_for(document_type: DocumentKind) -> FileKind {
    match document_type {
        DocumentKind::Pdf => FileKind::Pdf,
        DocumentKind::Image => FileKind::Image,
    }
}

/// Decodes a pasted clipboard image: either a `data:image/...;base64,` URL or
/// bare base64.
fn decode_clipboard(data: &str) -> Result<Vec<u8>, ApiError> {
    let b64 = match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| ApiError::BadRequest("malformed data URL in clipboard_data".into()))?,
        None => data,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ApiError::BadRequest("clipboard_data is not valid base64".into()))?;
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }
    Ok(bytes)
}

#[utoipa::path(
    get,
    path = "/api/documents",
    responses((status = 200, description = "Search documents", body = DocumentListResponse))
)]
pub async fn list_documents(
    _auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<DocumentSearch>,
) -> Result<HttpResponse, ApiError> {
    let search = query.into_inner();
    let (items, total) = data.repo.search_documents(&search).await?;
    let (page, page_size) = clamp_page(search.page, search.page_size);
    Ok(HttpResponse::Ok().json(DocumentListResponse { total, page, page_size, items }))
}

fn new_document_from(form: &UploadForm) -> Result<NewDocument, ApiError> {
    let title = form
        .field("title")
        .ok_or_else(|| ApiError::BadRequest("title is required".into()))?
        .to_string();
    let document_type = parse_document_kind(
        form.field("document_type")
            .ok_or_else(|| ApiError::BadRequest("document_type is required".into()))?,
    )?;
    Ok(NewDocument {
        title,
        description: form.field("description").map(str::to_string),
        region: form.field("region").map(str::to_string),
        person: form.field("person").map(str::to_string),
        document_type,
    })
}

#[utoipa::path(
    post,
    path = "/api/documents",
    responses(
        (status = 201, description = "Document created with its first attachment", body = Document),
        (status = 400, description = "Missing file/clipboard data or wrong file type"),
        (status = 413, description = "File too large")
    )
)]
pub async fn create_document(
    auth: Auth,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_multipart(payload).await?;
    let new = new_document_from(&form)?;
    let category = form.field("category").map(str::to_string);
    let clipboard = form.field("clipboard_data").map(str::to_string);

    // exactly one source: an uploaded file or pasted clipboard image data
    let (filename, bytes) = match (form.files.as_slice(), clipboard) {
        ([(_, f, b)], None) => (f.clone(), b.clone()),
        ([], Some(data_url)) => {
            if new.document_type != DocumentKind::Image {
                return Err(ApiError::BadRequest(
                    "clipboard paste is only supported for image documents".into(),
                ));
            }
            let bytes = decode_clipboard(&data_url)?;
            (format!("clipboard_{}.png", Utc::now().timestamp()), bytes)
        }
        ([], None) => {
            return Err(ApiError::BadRequest(
                "either a file or clipboard_data must be provided".into(),
            ))
        }
        ([_], Some(_)) => {
            return Err(ApiError::BadRequest(
                "a file and clipboard_data cannot both be provided".into(),
            ))
        }
        _ => return Err(ApiError::BadRequest("exactly one file must be uploaded".into())),
    };

    let kind = kind_for(new.document_type);
    let doc = data.repo.create_document(new, auth.user_id()).await?;
    let att = match data
        .files
        .save("documents", doc.id, &filename, kind, category, &bytes)
        .await
    {
        Ok(att) => att,
        Err(e) => {
            // no orphan rows when the file never made it to disk
            let _ = data.repo.delete_document(doc.id).await;
            return Err(e.into());
        }
    };
    let doc = data.repo.add_document_attachment(doc.id, att).await?;
    Ok(HttpResponse::Created().json(doc))
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    params(("id" = Id, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document; legacy rows get a synthesized attachment list", body = Document),
        (status = 404, description = "Document not found")
    )
)]
pub async fn get_document(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let doc = data.repo.get_document(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(doc))
}

#[utoipa::path(
    put,
    path = "/api/documents/{id}",
    request_body = UpdateDocument,
    params(("id" = Id, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document updated", body = Document),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn update_document(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateDocument>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_document(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let doc = data.repo.update_document(id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(doc))
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    params(("id" = Id, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document and its files deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn delete_document(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_document(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let deleted = data.repo.delete_document(id).await?;
    for att in &deleted.attachments {
        delete_quietly(data.files.as_ref(), &att.file_path).await;
    }
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/documents/{id}/attachments",
    params(("id" = Id, Path, description = "Document id")),
    responses(
        (status = 201, description = "Attachment added; full document returned", body = Document),
        (status = 400, description = "File type does not match the document type"),
        (status = 404, description = "Document not found"),
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
    let existing = data.repo.get_document(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;

    let form = read_multipart(payload).await?;
    let (filename, bytes) = form.single_file()?;
    let category = form.field("category").map(str::to_string);
    let att = data
        .files
        .save(
            "documents",
            id,
            filename,
            kind_for(existing.document_type),
            category,
            bytes,
        )
        .await?;
    let doc = data.repo.add_document_attachment(id, att).await?;
    Ok(HttpResponse::Created().json(doc))
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}/attachments/{stored_filename}",
    params(
        ("id" = Id, Path, description = "Document id"),
        ("stored_filename" = String, Path, description = "Disk-unique stored filename")
    ),
    responses(
        (status = 200, description = "Attachment removed; full document returned", body = Document),
        (status = 404, description = "Document or attachment not found"),
        (status = 409, description = "Deleting the last PDF of a pdf document")
    )
)]
pub async fn delete_attachment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, String)>,
) -> Result<HttpResponse, ApiError> {
    let (id, stored_filename) = path.into_inner();
    let existing = data.repo.get_document(id).await?;
    ensure_owner_or_admin(&auth, existing.creator_id)?;
    let (doc, removed) = data
        .repo
        .remove_document_attachment(id, &stored_filename)
        .await?;
    delete_quietly(data.files.as_ref(), &removed.file_path).await;
    Ok(HttpResponse::Ok().json(doc))
}
