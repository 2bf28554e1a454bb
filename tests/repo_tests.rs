#![cfg(feature = "inmem-store")]

use hisdoc::models::*;
use hisdoc::repo::inmem::InMemRepo;
use hisdoc::repo::{
    DictionaryRepo, DocumentRepo, InterfaceRepo, ParameterRepo, ProjectRepo, RepoError,
};
use serial_test::serial;

fn setup_env() -> tempfile::TempDir {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    let data = tempfile::tempdir().unwrap();
    std::env::set_var("HISDOC_DATA_DIR", data.path().to_str().unwrap());
    data
}

fn new_project() -> NewProject {
    NewProject {
        name: "p".into(),
        manager: "m".into(),
        contact_info: "c".into(),
        description: None,
        documents: None,
    }
}

fn new_interface(project_id: Id, code: &str) -> NewInterface {
    NewInterface {
        project_id,
        name: "iface".into(),
        code: code.into(),
        description: None,
        interface_type: InterfaceType::Api,
        url: Some("/his/query".into()),
        method: Some("POST".into()),
        category: None,
        tags: None,
        status: None,
        input_example: None,
        output_example: None,
        view_definition: None,
        notes: None,
        parameters: None,
    }
}

fn new_param(field: &str, param_type: ParamType, order_index: i32) -> NewParameter {
    NewParameter {
        name: field.to_uppercase(),
        field_name: field.into(),
        data_type: "string".into(),
        param_type,
        required: false,
        default_value: None,
        description: None,
        example: None,
        order_index,
        dictionary_id: None,
    }
}

#[actix_web::test]
#[serial]
async fn legacy_single_file_rows_synthesize_an_attachment_list() {
    let data = setup_env();

    // snapshot written by a version that predates multi-attachment support
    let snapshot = serde_json::json!({
        "users": {}, "projects": {}, "interfaces": {}, "parameters": {},
        "dictionaries": {}, "dictionary_values": {},
        "documents": {
            "7": {
                "id": 7,
                "title": "旧文档",
                "description": null,
                "region": null,
                "person": null,
                "document_type": "pdf",
                "attachments": [],
                "file_path": "uploads/documents/7/1704067200_旧文档.pdf",
                "file_name": "旧文档.pdf",
                "file_size": 2048,
                "mime_type": "application/pdf",
                "creator_id": null,
                "version": 0,
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }
        },
        "faqs": {},
        "next_id": 100
    });
    std::fs::write(
        data.path().join("state.json"),
        serde_json::to_vec_pretty(&snapshot).unwrap(),
    )
    .unwrap();

    let repo = InMemRepo::new();
    let doc = repo.get_document(7).await.unwrap();
    assert_eq!(doc.attachments.len(), 1);
    let att = &doc.attachments[0];
    assert_eq!(att.filename, "旧文档.pdf");
    assert_eq!(att.stored_filename, "1704067200_旧文档.pdf");
    assert_eq!(att.file_path, "uploads/documents/7/1704067200_旧文档.pdf");
    assert_eq!(att.file_size, 2048);
    assert_eq!(att.mime_type.as_deref(), Some("application/pdf"));
    assert_eq!(att.upload_time, doc.created_at);

    // the sole synthesized PDF is protected like a real one
    let err = repo
        .remove_document_attachment(7, "1704067200_旧文档.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
}

#[actix_web::test]
#[serial]
async fn project_delete_cascades_to_children() {
    let _data = setup_env();
    let repo = InMemRepo::new();

    let project = repo.create_project(new_project(), Some(1)).await.unwrap();
    let iface = repo
        .create_interface(new_interface(project.id, "CASCADE_TEST"), Some(1))
        .await
        .unwrap();
    repo.create_parameter(iface.id, new_param("f1", ParamType::Input, 0))
        .await
        .unwrap();
    let dict = repo
        .create_dictionary(
            NewDictionary {
                project_id: project.id,
                name: "d".into(),
                code: "CASCADE_DICT".into(),
                description: None,
                interface_id: None,
                values: Some(vec![NewDictionaryValue {
                    key: "1".into(),
                    value: "one".into(),
                    description: None,
                    order_index: 0,
                }]),
            },
            Some(1),
        )
        .await
        .unwrap();

    repo.delete_project(project.id).await.unwrap();

    assert!(matches!(repo.get_interface(iface.id).await, Err(RepoError::NotFound)));
    assert!(matches!(repo.get_dictionary(dict.id).await, Err(RepoError::NotFound)));
}

#[actix_web::test]
#[serial]
async fn append_parameters_renumbers_sequentially() {
    let _data = setup_env();
    let repo = InMemRepo::new();

    let project = repo.create_project(new_project(), None).await.unwrap();
    let iface = repo
        .create_interface(new_interface(project.id, "RENUMBER"), None)
        .await
        .unwrap();
    repo.create_parameter(iface.id, new_param("a", ParamType::Input, 5))
        .await
        .unwrap();
    repo.create_parameter(iface.id, new_param("b", ParamType::Input, 9))
        .await
        .unwrap();

    let all = repo
        .append_parameters(
            iface.id,
            vec![
                new_param("c", ParamType::Input, 2),
                new_param("d", ParamType::Output, 3),
            ],
        )
        .await
        .unwrap();

    assert_eq!(all.len(), 4);
    let indices: Vec<i32> = all.iter().map(|p| p.order_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

#[actix_web::test]
#[serial]
async fn interface_code_conflicts_are_reported() {
    let _data = setup_env();
    let repo = InMemRepo::new();

    let project = repo.create_project(new_project(), None).await.unwrap();
    repo.create_interface(new_interface(project.id, "DUP"), None)
        .await
        .unwrap();
    let err = repo
        .create_interface(new_interface(project.id, "DUP"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    // unknown project is a not-found, not a conflict
    let err = repo
        .create_interface(new_interface(999, "OTHER"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}

#[actix_web::test]
#[serial]
async fn attachment_mutations_bump_updated_at() {
    let _data = setup_env();
    let repo = InMemRepo::new();

    let project = repo.create_project(new_project(), None).await.unwrap();
    let before = project.updated_at;
    let att = Attachment {
        filename: "a.pdf".into(),
        stored_filename: "1700000000_a.pdf".into(),
        file_path: format!("uploads/projects/{}/1700000000_a.pdf", project.id),
        file_size: 10,
        mime_type: Some("application/pdf".into()),
        upload_time: chrono::Utc::now(),
        category: None,
    };
    let updated = repo.add_project_attachment(project.id, att).await.unwrap();
    assert_eq!(updated.attachments.len(), 1);
    assert!(updated.updated_at >= before);

    let (after_delete, removed) = repo
        .remove_project_attachment(project.id, "1700000000_a.pdf")
        .await
        .unwrap();
    assert_eq!(removed.filename, "a.pdf");
    assert_eq!(after_delete.attachments.len(), 0);

    let err = repo
        .remove_project_attachment(project.id, "1700000000_a.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}
