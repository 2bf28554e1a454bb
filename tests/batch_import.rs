#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use hisdoc::auth::{create_jwt, Role};
use hisdoc::repo::inmem::InMemRepo;
use hisdoc::routes::{config, AppState};
use hisdoc::storage::LocalFileStore;
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;

fn setup_env() -> (TempDir, TempDir) {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    let data = tempfile::tempdir().unwrap();
    std::env::set_var("HISDOC_DATA_DIR", data.path().to_str().unwrap());
    let uploads = tempfile::tempdir().unwrap();
    (data, uploads)
}

fn admin_token() -> String {
    create_jwt(1, Role::Admin).unwrap()
}

macro_rules! init_app {
    ($uploads:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState {
                    repo: Arc::new(InMemRepo::new()),
                    files: Arc::new(LocalFileStore::new($uploads.path())),
                }))
                .configure(config),
        )
        .await
    };
}

macro_rules! create_interface {
    ($app:expr, $token:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/projects")
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .set_json(&serde_json::json!({"name":"p","manager":"m","contact_info":"c"}))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), 201);
        let project: serde_json::Value =
            serde_json::from_slice(&test::read_body(resp).await).unwrap();

        let req = test::TestRequest::post()
            .uri("/api/interfaces")
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .set_json(&serde_json::json!({
                "project_id": project["id"],
                "name": "批量导入目标",
                "code": "BATCH_TARGET",
                "interface_type": "api"
            }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), 201);
        let iface: serde_json::Value =
            serde_json::from_slice(&test::read_body(resp).await).unwrap();
        iface["id"].as_i64().unwrap()
    }};
}

#[actix_web::test]
#[serial]
async fn batch_parse_single_tab_row() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();
    let iface_id = create_interface!(app, token);

    let req = test::TestRequest::post()
        .uri(&format!("/api/parameters/interface/{iface_id}/batch-parse"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({
            "text": "id\tName\tvarchar\t50\t是\tdesc\tex1",
            "param_type": "input"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let rows: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["field_name"], "id");
    assert_eq!(rows[0]["name"], "Name");
    assert_eq!(rows[0]["data_type"], "varchar");
    assert_eq!(rows[0]["default_value"], "50");
    assert_eq!(rows[0]["required"], true);
    assert_eq!(rows[0]["description"], "desc");
    assert_eq!(rows[0]["example"], "ex1");
    assert_eq!(rows[0]["order_index"], 0);
}

#[actix_web::test]
#[serial]
async fn batch_parse_skips_header_and_import_commits() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();
    let iface_id = create_interface!(app, token);

    // a manually created parameter already occupies index 0
    let req = test::TestRequest::post()
        .uri(&format!("/api/parameters/interface/{iface_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({
            "name": "卡号", "field_name": "card_no", "data_type": "string",
            "param_type": "input", "required": true, "order_index": 0
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    // parse: header line in the source language is skipped, preview only
    let text = "字段名\t名称\t类型\t默认值\t必填\t说明\t示例\npatient_id\t患者ID\tVARCHAR\t\t是\t患者唯一标识\tP001\nvisit_no\t就诊号\tinteger\t0\t否\t\t";
    let req = test::TestRequest::post()
        .uri(&format!("/api/parameters/interface/{iface_id}/batch-parse"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({"text": text, "param_type": "input"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let rows: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let rows_arr = rows.as_array().unwrap();
    assert_eq!(rows_arr.len(), 2);
    assert_eq!(rows_arr[0]["field_name"], "patient_id");
    assert_eq!(rows_arr[0]["data_type"], "varchar");
    assert_eq!(rows_arr[0]["required"], true);
    assert_eq!(rows_arr[1]["field_name"], "visit_no");
    assert_eq!(rows_arr[1]["data_type"], "int");
    assert_eq!(rows_arr[1]["required"], false);
    // order_index continues after the existing input parameter
    assert_eq!(rows_arr[0]["order_index"], 1);
    assert_eq!(rows_arr[1]["order_index"], 2);

    // nothing persisted by the preview
    let req = test::TestRequest::get()
        .uri(&format!("/api/parameters/interface/{iface_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let params: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(params.as_array().unwrap().len(), 1);

    // commit is the separate explicit action
    let req = test::TestRequest::post()
        .uri(&format!("/api/parameters/interface/{iface_id}/batch-import"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({"parameters": rows}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let all: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 3);
    let indices: Vec<i64> = all.iter().map(|p| p["order_index"].as_i64().unwrap()).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(all[0]["field_name"], "card_no");
    assert_eq!(all[1]["field_name"], "patient_id");
    assert_eq!(all[2]["field_name"], "visit_no");
}

#[actix_web::test]
#[serial]
async fn batch_import_rejects_empty_and_unknown_interface() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();
    let iface_id = create_interface!(app, token);

    let req = test::TestRequest::post()
        .uri(&format!("/api/parameters/interface/{iface_id}/batch-import"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({"parameters": []}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/parameters/interface/424242/batch-parse")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&serde_json::json!({"text": "a\tb", "param_type": "input"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}
