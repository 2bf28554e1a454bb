use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Always Postgres backed now
pub type Id = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "interface_type", rename_all = "lowercase")]
pub enum InterfaceType {
    View,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "interface_status", rename_all = "lowercase")]
pub enum InterfaceStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "param_type", rename_all = "lowercase")]
pub enum ParamType {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "document_kind", rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_type", rename_all = "snake_case")]
pub enum ContentType {
    Attachment,
    RichText,
}

/// Stored file reference embedded in the owning entity's row (never a table
/// row of its own). `stored_filename` is the sole delete key; the original
/// `filename` may collide or contain unsafe characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Attachment {
    pub filename: String,
    pub stored_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub upload_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>, // previewable vs download-only hint
}

impl Attachment {
    /// PDF check by mime type, falling back to the stored filename extension.
    pub fn is_pdf(&self) -> bool {
        match self.mime_type.as_deref() {
            Some(m) => m == "application/pdf",
            None => self.stored_filename.to_lowercase().ends_with(".pdf"),
        }
    }
}

/// Free-form document note on a project (name/version/date only; uploaded
/// files live in `attachments`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectDoc {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub update_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub manager: String,
    pub contact_info: String,
    pub description: Option<String>,
    #[sqlx(json)]
    #[serde(default)]
    pub documents: Vec<ProjectDoc>,
    #[sqlx(json)]
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub creator_id: Option<Id>,
    #[serde(default, skip_serializing)]
    pub version: i64, // optimistic-concurrency counter for the attachments column
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewProject {
    pub name: String,
    pub manager: String,
    pub contact_info: String,
    pub description: Option<String>,
    #[serde(default)]
    pub documents: Option<Vec<ProjectDoc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub manager: Option<String>,
    pub contact_info: Option<String>,
    pub description: Option<String>,
    pub documents: Option<Vec<ProjectDoc>>,
}

/// Project detail view: the project plus child counts, without inlining the
/// children themselves.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub interfaces_count: i64,
    pub dictionaries_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Interface {
    pub id: Id,
    pub project_id: Id,
    pub name: String,
    pub code: String, // globally unique
    pub description: Option<String>,
    pub interface_type: InterfaceType,
    pub url: Option<String>,    // view name or HTTP address
    pub method: Option<String>, // API interfaces only
    pub category: Option<String>,
    pub tags: Option<String>, // comma separated
    pub status: InterfaceStatus,
    pub input_example: Option<String>,
    pub output_example: Option<String>,
    pub view_definition: Option<String>, // SQL text for view interfaces
    pub notes: Option<String>,           // HTML
    pub creator_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewInterface {
    pub project_id: Id,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub interface_type: InterfaceType,
    pub url: Option<String>,
    pub method: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub status: Option<InterfaceStatus>,
    pub input_example: Option<String>,
    pub output_example: Option<String>,
    pub view_definition: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub parameters: Option<Vec<NewParameter>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateInterface {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub interface_type: Option<InterfaceType>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub status: Option<InterfaceStatus>,
    pub input_example: Option<String>,
    pub output_example: Option<String>,
    pub view_definition: Option<String>,
    pub notes: Option<String>,
    /// When present, replaces the full parameter list of the interface.
    #[serde(default)]
    pub parameters: Option<Vec<NewParameter>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Parameter {
    pub id: Id,
    pub interface_id: Id,
    pub name: String,
    pub field_name: String,
    pub data_type: String,
    pub param_type: ParamType,
    pub required: bool, // meaningful for input parameters only
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub example: Option<String>,
    pub order_index: i32, // display/import order
    pub dictionary_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewParameter {
    pub name: String,
    pub field_name: String,
    pub data_type: String,
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub example: Option<String>,
    #[serde(default)]
    pub order_index: i32,
    pub dictionary_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateParameter {
    pub name: Option<String>,
    pub field_name: Option<String>,
    pub data_type: Option<String>,
    pub required: Option<bool>,
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub example: Option<String>,
    pub order_index: Option<i32>,
    pub dictionary_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Dictionary {
    pub id: Id,
    pub project_id: Id,
    pub name: String,
    pub code: String, // globally unique
    pub description: Option<String>,
    pub interface_id: Option<Id>, // optional association to one interface
    pub creator_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub values: Vec<DictionaryValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewDictionary {
    pub project_id: Id,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub interface_id: Option<Id>,
    #[serde(default)]
    pub values: Option<Vec<NewDictionaryValue>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateDictionary {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub interface_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct DictionaryValue {
    pub id: Id,
    pub dictionary_id: Id,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewDictionaryValue {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    #[serde(default)]
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Document {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub region: Option<String>,
    pub person: Option<String>,
    pub document_type: DocumentKind,
    #[sqlx(json)]
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    // Legacy single-file columns from before multi-attachment support. Read
    // paths synthesize a one-element attachment list from them when the list
    // is empty (synthesize_legacy_attachments).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub creator_id: Option<Id>,
    #[serde(default, skip_serializing)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewDocument {
    pub title: String,
    pub description: Option<String>,
    pub region: Option<String>,
    pub person: Option<String>,
    pub document_type: DocumentKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateDocument {
    pub title: Option<String>,
    pub description: Option<String>,
    pub region: Option<String>,
    pub person: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Faq {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub module: Option<String>,
    pub person: Option<String>,
    pub document_type: DocumentKind, // kept for parity with documents; new rows are pdf
    pub content_type: ContentType,
    pub rich_content: Option<String>, // HTML, rich_text FAQs only
    #[sqlx(json)]
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub creator_id: Option<Id>,
    #[serde(default, skip_serializing)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewFaq {
    pub title: String,
    pub description: Option<String>,
    pub module: Option<String>,
    pub person: Option<String>,
    pub document_type: DocumentKind,
    pub content_type: ContentType,
    pub rich_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateFaq {
    pub title: Option<String>,
    pub description: Option<String>,
    pub module: Option<String>,
    pub person: Option<String>,
    pub rich_content: Option<String>,
}

/// One-element attachment list for rows that predate multi-attachment
/// support. `stored_filename` falls back to the path basename, `upload_time`
/// to the row's creation time.
fn legacy_attachment(
    file_path: &str,
    file_name: Option<&str>,
    file_size: Option<i64>,
    mime_type: Option<&str>,
    created_at: DateTime<Utc>,
) -> Attachment {
    let stored = file_path.rsplit('/').next().unwrap_or(file_path).to_string();
    Attachment {
        filename: file_name.map(str::to_string).unwrap_or_else(|| stored.clone()),
        stored_filename: stored,
        file_path: file_path.to_string(),
        file_size: file_size.unwrap_or(0),
        mime_type: mime_type.map(str::to_string),
        upload_time: created_at,
        category: None,
    }
}

impl Document {
    pub fn synthesize_legacy_attachments(mut self) -> Self {
        if self.attachments.is_empty() {
            if let Some(path) = self.file_path.clone().filter(|p| !p.is_empty()) {
                self.attachments.push(legacy_attachment(
                    &path,
                    self.file_name.as_deref(),
                    self.file_size,
                    self.mime_type.as_deref(),
                    self.created_at,
                ));
            }
        }
        self
    }
}

impl Faq {
    pub fn synthesize_legacy_attachments(mut self) -> Self {
        if self.attachments.is_empty() {
            if let Some(path) = self.file_path.clone().filter(|p| !p.is_empty()) {
                self.attachments.push(legacy_attachment(
                    &path,
                    self.file_name.as_deref(),
                    self.file_size,
                    self.mime_type.as_deref(),
                    self.created_at,
                ));
            }
        }
        self
    }
}

/// Internal user record. API responses use [`UserInfo`] so the password hash
/// never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub username: String, // unique
    pub display_name: Option<String>,
    // Absent hash means a passwordless account (see auth::verify_password).
    #[serde(default)]
    pub password_hash: Option<String>,
    pub role: crate::auth::Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserInfo {
    pub id: Id,
    pub username: String,
    pub display_name: Option<String>,
    pub role: crate::auth::Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(u: User) -> Self {
        UserInfo {
            id: u.id,
            username: u.username,
            display_name: u.display_name,
            role: u.role,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewUser {
    pub username: String,
    pub password: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserInfo,
}

// ---------------- search / pagination ----------------

fn default_page() -> i64 {
    1
}
fn default_page_size() -> i64 {
    20
}

/// Single pagination convention for every list endpoint: `page` is 1-based,
/// `page_size` capped at 100.
pub fn clamp_page(page: i64, page_size: i64) -> (i64, i64) {
    (page.max(1), page_size.clamp(1, 100))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InterfaceSearch {
    pub keyword: Option<String>, // matches name, code, description
    pub project_id: Option<Id>,
    pub interface_type: Option<InterfaceType>,
    pub category: Option<String>,
    pub tags: Option<String>, // comma separated, all must match
    pub status: Option<InterfaceStatus>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DocumentSearch {
    pub keyword: Option<String>, // matches title, description
    pub document_type: Option<DocumentKind>,
    pub region: Option<String>,
    pub person: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FaqSearch {
    pub keyword: Option<String>,
    pub document_type: Option<DocumentKind>,
    pub module: Option<String>,
    pub person: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProjectQuery {
    pub keyword: Option<String>, // matches name, manager, description
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DictionaryQuery {
    pub keyword: Option<String>, // matches name, code, description
    pub project_id: Option<Id>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectListResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<Project>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InterfaceListResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<Interface>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DictionaryListResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<Dictionary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FaqListResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<Faq>,
}
