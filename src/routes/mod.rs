use std::collections::HashMap;
use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;

use crate::error::ApiError;
use crate::repo::Repo;
use crate::storage::{FileStore, MAX_FILE_SIZE};

pub mod auth_routes;
pub mod dictionaries;
pub mod documents;
pub mod export;
pub mod faqs;
pub mod interfaces;
pub mod parameters;
pub mod projects;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub files: Arc<dyn FileStore>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(auth_routes::config)
            .configure(projects::config)
            .configure(interfaces::config)
            .configure(parameters::config)
            .configure(dictionaries::config)
            .configure(documents::config)
            .configure(faqs::config)
            .configure(export::config),
    );
    cfg.route("/health", web::get().to(health));
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// One parsed multipart request: text fields by name plus uploaded files as
/// (field name, original filename, bytes). Files are size-capped while the
/// stream is read, before anything touches disk.
pub(crate) struct UploadForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<(String, String, Vec<u8>)>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// The single uploaded file, however the client named the field.
    pub fn single_file(&self) -> Result<(&str, &[u8]), ApiError> {
        match self.files.as_slice() {
            [(_, filename, bytes)] => Ok((filename.as_str(), bytes.as_slice())),
            [] => Err(ApiError::BadRequest("a file upload is required".into())),
            _ => Err(ApiError::BadRequest("exactly one file must be uploaded".into())),
        }
    }
}

pub(crate) async fn read_multipart(mut payload: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm { fields: HashMap::new(), files: Vec::new() };
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::error!("multipart error: {e}");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        let (name, filename) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name().unwrap_or_default().to_string(),
                disposition.get_filename().map(str::to_string),
            )
        };
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            log::error!("stream read error: {e}");
            ApiError::Internal
        })? {
            if bytes.len() + chunk.len() > MAX_FILE_SIZE {
                return Err(ApiError::PayloadTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }
        match filename {
            Some(f) if !f.is_empty() => form.files.push((name, f, bytes)),
            _ => {
                form.fields.insert(name, String::from_utf8_lossy(&bytes).into_owned());
            }
        }
    }
    Ok(form)
}
