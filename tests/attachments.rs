#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use hisdoc::auth::{create_jwt, Role};
use hisdoc::repo::inmem::InMemRepo;
use hisdoc::routes::{config, AppState};
use hisdoc::storage::LocalFileStore;
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;

const BOUNDARY: &str = "BOUNDARYHASH";

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

fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj<<>>endobj\ntrailer<<>>\n%%EOF\n".to_vec()
}

fn png_bytes() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A,
        0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
        0x1F, 0x15, 0xC4, 0x89,
        0x00, 0x00, 0x00, 0x0A, b'I', b'D', b'A', b'T', 0x78, 0x9C, 0x63, 0x00, 0x01,
        0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4,
        0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
    ]
}

// build a multipart body with text fields and file fields
fn multipart(texts: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in texts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename, bytes) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
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

macro_rules! create_project {
    ($app:expr, $token:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/projects")
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .set_json(&serde_json::json!({"name":"p","manager":"m","contact_info":"c"}))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        body["id"].as_i64().unwrap()
    }};
}

#[actix_web::test]
#[serial]
async fn project_attachment_upload_and_delete_roundtrip() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();
    let project_id = create_project!(app, token);

    // upload spec.pdf
    let body = multipart(&[], &[("file", "spec.pdf", &pdf_bytes())]);
    let req = test::TestRequest::post()
        .uri(&format!("/api/projects/{project_id}/attachments"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let project: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let attachments = project["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0]["filename"], "spec.pdf");
    assert_eq!(attachments[0]["mime_type"], "application/pdf");
    let stored = attachments[0]["stored_filename"].as_str().unwrap().to_string();
    assert!(stored.ends_with("_spec.pdf"));

    // the file landed under the per-entity directory
    let on_disk = uploads
        .path()
        .join("projects")
        .join(project_id.to_string())
        .join(&stored);
    assert!(on_disk.exists());

    // delete by stored filename restores the empty list
    let req = test::TestRequest::delete()
        .uri(&format!("/api/projects/{project_id}/attachments/{stored}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let project: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(project["attachments"].as_array().unwrap().len(), 0);
    assert!(!on_disk.exists());

    // deleting again is a 404
    let req = test::TestRequest::delete()
        .uri(&format!("/api/projects/{project_id}/attachments/{stored}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn project_attachments_reject_non_pdf_and_unknown_project() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();
    let project_id = create_project!(app, token);

    let body = multipart(&[], &[("file", "notes.txt", b"plain text".as_slice())]);
    let req = test::TestRequest::post()
        .uri(&format!("/api/projects/{project_id}/attachments"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let body = multipart(&[], &[("file", "spec.pdf", &pdf_bytes())]);
    let req = test::TestRequest::post()
        .uri("/api/projects/424242/attachments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn add_then_delete_leaves_other_attachments_untouched() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();
    let project_id = create_project!(app, token);

    let mut stored_names = Vec::new();
    for name in ["first.pdf", "second.pdf"] {
        let body = multipart(&[], &[("file", name, &pdf_bytes())]);
        let req = test::TestRequest::post()
            .uri(&format!("/api/projects/{project_id}/attachments"))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let project: serde_json::Value =
            serde_json::from_slice(&test::read_body(resp).await).unwrap();
        let atts = project["attachments"].as_array().unwrap();
        stored_names.push(atts.last().unwrap()["stored_filename"].as_str().unwrap().to_string());
    }

    // delete the second; the first survives with its metadata intact
    let req = test::TestRequest::delete()
        .uri(&format!("/api/projects/{project_id}/attachments/{}", stored_names[1]))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let project: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let atts = project["attachments"].as_array().unwrap();
    assert_eq!(atts.len(), 1);
    assert_eq!(atts[0]["stored_filename"], stored_names[0].as_str());
    assert_eq!(atts[0]["filename"], "first.pdf");
}

#[actix_web::test]
#[serial]
async fn pdf_document_keeps_its_last_pdf() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();

    // create a pdf document with its first file
    let body = multipart(
        &[("title", "对接手册"), ("document_type", "pdf")],
        &[("file", "manual.pdf", &pdf_bytes())],
    );
    let req = test::TestRequest::post()
        .uri("/api/documents")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let doc: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let doc_id = doc["id"].as_i64().unwrap();
    let first_stored = doc["attachments"][0]["stored_filename"].as_str().unwrap().to_string();

    // deleting the sole PDF is rejected
    let req = test::TestRequest::delete()
        .uri(&format!("/api/documents/{doc_id}/attachments/{first_stored}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);

    // add a second PDF, then deleting one succeeds
    let body = multipart(&[], &[("file", "appendix.pdf", &pdf_bytes())]);
    let req = test::TestRequest::post()
        .uri(&format!("/api/documents/{doc_id}/attachments"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/documents/{doc_id}/attachments/{first_stored}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let doc: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(doc["attachments"].as_array().unwrap().len(), 1);
    assert_eq!(doc["attachments"][0]["filename"], "appendix.pdf");
}

#[actix_web::test]
#[serial]
async fn image_document_from_clipboard_paste() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();

    use base64::Engine as _;
    let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes());
    let data_url = format!("data:image/png;base64,{b64}");
    let body = multipart(
        &[
            ("title", "报错截图"),
            ("document_type", "image"),
            ("clipboard_data", &data_url),
        ],
        &[],
    );
    let req = test::TestRequest::post()
        .uri("/api/documents")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let doc: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(doc["attachments"].as_array().unwrap().len(), 1);
    assert_eq!(doc["attachments"][0]["mime_type"], "image/png");

    // clipboard paste is image-only
    let body = multipart(
        &[
            ("title", "bad"),
            ("document_type", "pdf"),
            ("clipboard_data", &data_url),
        ],
        &[],
    );
    let req = test::TestRequest::post()
        .uri("/api/documents")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
#[serial]
async fn faq_attachment_and_rich_text_modes() {
    let (_data, uploads) = setup_env();
    let app = init_app!(uploads);
    let token = admin_token();

    // attachment mode requires a PDF
    let body = multipart(&[("title", "如何对接"), ("content_type", "attachment")], &[]);
    let req = test::TestRequest::post()
        .uri("/api/faqs")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let body = multipart(
        &[("title", "如何对接"), ("content_type", "attachment")],
        &[("files", "faq.pdf", &pdf_bytes())],
    );
    let req = test::TestRequest::post()
        .uri("/api/faqs")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let faq: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let faq_id = faq["id"].as_i64().unwrap();
    assert_eq!(faq["content_type"], "attachment");
    assert_eq!(faq["attachments"].as_array().unwrap().len(), 1);
    let stored = faq["attachments"][0]["stored_filename"].as_str().unwrap().to_string();

    // the last PDF of an attachment FAQ is protected too
    let req = test::TestRequest::delete()
        .uri(&format!("/api/faqs/{faq_id}/attachments/{stored}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);

    // rich_text mode takes inline HTML and no files
    let body = multipart(
        &[
            ("title", "常见报错"),
            ("content_type", "rich_text"),
            ("rich_content", "<p>先检查<b>授权码</b></p>"),
        ],
        &[],
    );
    let req = test::TestRequest::post()
        .uri("/api/faqs")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let faq: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(faq["content_type"], "rich_text");
    assert_eq!(faq["attachments"].as_array().unwrap().len(), 0);
    assert!(faq["rich_content"].as_str().unwrap().contains("授权码"));

    // empty rich_content is rejected
    let body = multipart(&[("title", "x"), ("content_type", "rich_text")], &[]);
    let req = test::TestRequest::post()
        .uri("/api/faqs")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}
