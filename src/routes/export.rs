use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::routes::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/export/json").route(web::get().to(export_json)));
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportParameter {
    pub name: String,
    pub field_name: String,
    pub data_type: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub example: Option<String>,
    pub order_index: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportInterface {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub interface_type: InterfaceType,
    pub url: Option<String>,
    pub method: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub status: InterfaceStatus,
    pub parameters: Vec<ExportParameter>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportDictionaryValue {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub order_index: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportDictionary {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<ExportDictionaryValue>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportData {
    pub interfaces: Vec<ExportInterface>,
    pub dictionaries: Vec<ExportDictionary>,
    pub export_time: String,
}

// List endpoints cap page_size, so the export walks pages until it has the
// full set.
async fn all_interfaces(data: &AppState) -> Result<Vec<Interface>, ApiError> {
    let mut out = Vec::new();
    let mut page = 1;
    loop {
        let search = InterfaceSearch {
            keyword: None,
            project_id: None,
            interface_type: None,
            category: None,
            tags: None,
            status: None,
            page,
            page_size: 100,
        };
        let (items, total) = data.repo.search_interfaces(&search).await?;
        let done = items.is_empty() || out.len() as i64 + items.len() as i64 >= total;
        out.extend(items);
        if done {
            return Ok(out);
        }
        page += 1;
    }
}

async fn all_dictionaries(data: &AppState) -> Result<Vec<Dictionary>, ApiError> {
    let mut out = Vec::new();
    let mut page = 1;
    loop {
        let (items, total) = data.repo.list_dictionaries(None, None, page, 100).await?;
        let done = items.is_empty() || out.len() as i64 + items.len() as i64 >= total;
        out.extend(items);
        if done {
            return Ok(out);
        }
        page += 1;
    }
}

#[utoipa::path(
    get,
    path = "/api/export/json",
    responses((status = 200, description = "Full catalogue export", body = ExportData))
)]
pub async fn export_json(
    _auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    // search results carry no parameters, so each interface is re-read in full
    let mut interfaces = Vec::new();
    for iface in all_interfaces(&data).await? {
        let i = data.repo.get_interface(iface.id).await?;
        interfaces.push(ExportInterface {
            code: i.code,
            name: i.name,
            description: i.description,
            interface_type: i.interface_type,
            url: i.url,
            method: i.method,
            category: i.category,
            tags: i.tags,
            status: i.status,
            parameters: i
                .parameters
                .into_iter()
                .map(|p| ExportParameter {
                    name: p.name,
                    field_name: p.field_name,
                    data_type: p.data_type,
                    param_type: p.param_type,
                    required: p.required,
                    default_value: p.default_value,
                    description: p.description,
                    example: p.example,
                    order_index: p.order_index,
                })
                .collect(),
        });
    }

    let dictionaries = all_dictionaries(&data)
        .await?
        .into_iter()
        .map(|d| ExportDictionary {
            code: d.code,
            name: d.name,
            description: d.description,
            values: d
                .values
                .into_iter()
                .map(|v| ExportDictionaryValue {
                    key: v.key,
                    value: v.value,
                    description: v.description,
                    order_index: v.order_index,
                })
                .collect(),
        })
        .collect();

    let export = ExportData {
        interfaces,
        dictionaries,
        export_time: Utc::now().to_rfc3339(),
    };
    let filename = format!("his_interfaces_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    Ok(HttpResponse::Ok()
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        ))
        .json(export))
}
