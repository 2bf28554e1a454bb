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
fn user_token() -> String {
    create_jwt(2, Role::User).unwrap()
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

#[actix_web::test]
#[serial]
async fn test_project_interface_dictionary_flow() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = user_token();

    // list projects empty
    let req = test::TestRequest::get()
        .uri("/api/projects")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let v: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(v["total"], 0);
    assert_eq!(v["items"].as_array().unwrap().len(), 0);

    // create project
    let req = test::TestRequest::post()
        .uri("/api/projects")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&serde_json::json!({
            "name": "医保接口",
            "manager": "张三",
            "contact_info": "zhangsan@example.com",
            "description": "Insurance integration",
            "documents": [{"name": "接口文档v1.0", "version": "1.0", "update_date": "2024-01-01"}]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let project: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let project_id = project["id"].as_i64().unwrap();
    assert_eq!(project["documents"][0]["name"], "接口文档v1.0");
    assert_eq!(project["attachments"].as_array().unwrap().len(), 0);

    // create interface with inline parameters
    let req = test::TestRequest::post()
        .uri("/api/interfaces")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&serde_json::json!({
            "project_id": project_id,
            "name": "患者查询接口",
            "code": "PATIENT_QUERY",
            "interface_type": "view",
            "view_definition": "SELECT * FROM v_patient",
            "parameters": [
                {"name": "患者ID", "field_name": "patient_id", "data_type": "string", "param_type": "input", "required": true, "order_index": 0},
                {"name": "患者姓名", "field_name": "patient_name", "data_type": "string", "param_type": "output", "order_index": 0}
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let iface: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let iface_id = iface["id"].as_i64().unwrap();
    assert_eq!(iface["parameters"].as_array().unwrap().len(), 2);
    assert_eq!(iface["status"], "active");

    // duplicate code conflicts
    let req = test::TestRequest::post()
        .uri("/api/interfaces")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&serde_json::json!({
            "project_id": project_id,
            "name": "another",
            "code": "PATIENT_QUERY",
            "interface_type": "api"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);

    // get by code
    let req = test::TestRequest::get()
        .uri("/api/interfaces/code/PATIENT_QUERY")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    // search by keyword
    let req = test::TestRequest::post()
        .uri("/api/interfaces/search")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&serde_json::json!({"keyword": "患者", "page": 1, "page_size": 20}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let found: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(found["total"], 1);

    // search that misses
    let req = test::TestRequest::post()
        .uri("/api/interfaces/search")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&serde_json::json!({"keyword": "不存在", "page": 1, "page_size": 20}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let found: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(found["total"], 0);

    // create dictionary with values
    let req = test::TestRequest::post()
        .uri("/api/dictionaries")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&serde_json::json!({
            "project_id": project_id,
            "name": "性别字典",
            "code": "GENDER",
            "values": [
                {"key": "1", "value": "男", "order_index": 0},
                {"key": "2", "value": "女", "order_index": 1}
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let dict: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let dict_id = dict["id"].as_i64().unwrap();
    assert_eq!(dict["values"].as_array().unwrap().len(), 2);

    // duplicate dictionary code conflicts
    let req = test::TestRequest::post()
        .uri("/api/dictionaries")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&serde_json::json!({"project_id": project_id, "name": "dup", "code": "GENDER"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);

    // add and delete a dictionary value
    let req = test::TestRequest::post()
        .uri(&format!("/api/dictionaries/{dict_id}/values"))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&serde_json::json!({"key": "9", "value": "未知", "order_index": 2}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let value: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let value_id = value["id"].as_i64().unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/dictionaries/{dict_id}/values/{value_id}"))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    // project detail carries child counts
    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{project_id}"))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let detail: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(detail["interfaces_count"], 1);
    assert_eq!(detail["dictionaries_count"], 1);

    // update interface, replacing parameters wholesale
    let req = test::TestRequest::put()
        .uri(&format!("/api/interfaces/{iface_id}"))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&serde_json::json!({
            "status": "inactive",
            "parameters": [
                {"name": "卡号", "field_name": "card_no", "data_type": "string", "param_type": "input", "required": true, "order_index": 0}
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let updated: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(updated["status"], "inactive");
    assert_eq!(updated["parameters"].as_array().unwrap().len(), 1);

    // delete project cascades
    let req = test::TestRequest::delete()
        .uri(&format!("/api/projects/{project_id}"))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    let req = test::TestRequest::get()
        .uri(&format!("/api/interfaces/{iface_id}"))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn test_ownership_rules() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let owner = user_token(); // user id 2
    let stranger = create_jwt(3, Role::User).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .insert_header(("Authorization", format!("Bearer {}", owner)))
        .set_json(&serde_json::json!({"name":"p","manager":"m","contact_info":"c"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let project: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let project_id = project["id"].as_i64().unwrap();

    // another user may read but not delete
    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{project_id}"))
        .insert_header(("Authorization", format!("Bearer {}", stranger)))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/projects/{project_id}"))
        .insert_header(("Authorization", format!("Bearer {}", stranger)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{project_id}"))
        .insert_header(("Authorization", format!("Bearer {}", stranger)))
        .set_json(&serde_json::json!({"name":"hijacked"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    // the owner can update, the admin can delete
    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{project_id}"))
        .insert_header(("Authorization", format!("Bearer {}", owner)))
        .set_json(&serde_json::json!({"name":"renamed"}))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/projects/{project_id}"))
        .insert_header(("Authorization", format!("Bearer {}", admin_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
}

#[actix_web::test]
#[serial]
async fn test_pagination_convention() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();

    for i in 0..5 {
        let req = test::TestRequest::post()
            .uri("/api/projects")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(&serde_json::json!({"name": format!("project-{i}"), "manager": "m", "contact_info": "c"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
    }

    let req = test::TestRequest::get()
        .uri("/api/projects?page=2&page_size=2")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let page: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(page["total"], 5);
    assert_eq!(page["page"], 2);
    assert_eq!(page["page_size"], 2);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], "project-2");

    // keyword search narrows the list
    let req = test::TestRequest::get()
        .uri("/api/projects?keyword=project-4")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let page: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(page["total"], 1);
}
