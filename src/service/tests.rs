use super::*;
use crate::catalog::{REQUESTS, USERS};
use crate::store::email_document_id;
use crate::test_support::{Harness, MemoryStore, StubStorage, record};
use serde_json::json;

const TOKEN: Option<&str> = Some("token-u1");

fn params(service: &BackendService, term: Option<&str>, page: &str, size: &str) -> crate::query::PageParams {
    service
        .page_params(term.map(str::to_string), Some(page), Some(size))
        .expect("valid params")
}

#[tokio::test]
async fn list_page_filters_public_collection_without_token() {
    let harness = Harness::new().await;
    harness
        .store
        .seed(
            USERS,
            vec![
                record(json!({"name": "Ana", "email": "ana@x.com"})),
                record(json!({"name": "Bea", "email": "bea@x.com"})),
            ],
        )
        .await;

    let params = params(&harness.service, Some("ana"), "1", "10");
    let page = harness
        .service
        .list_page(USERS, &params, None)
        .await
        .expect("page");
    assert_eq!(page.total_results, 1);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.results[0]["name"], "Ana");
}

#[tokio::test]
async fn protected_collection_requires_valid_token() {
    let harness = Harness::new().await;
    let params = params(&harness.service, None, "1", "10");

    let missing = harness.service.list_page(REQUESTS, &params, None).await;
    assert!(matches!(missing, Err(ServiceError::Unauthenticated(_))));

    let invalid = harness
        .service
        .list_page(REQUESTS, &params, Some("garbage"))
        .await;
    assert!(matches!(invalid, Err(ServiceError::Unauthenticated(_))));

    let ok = harness.service.list_page(REQUESTS, &params, TOKEN).await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn unknown_collection_is_not_found() {
    let harness = Harness::new().await;
    let params = params(&harness.service, None, "1", "10");
    let result = harness.service.list_page("invoices", &params, TOKEN).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn invalid_page_params_are_rejected() {
    let harness = Harness::new().await;
    let result = harness.service.page_params(None, Some("0"), None);
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
}

#[tokio::test]
async fn store_failure_surfaces_as_upstream() {
    let harness = Harness::build(MemoryStore::failing(), StubStorage::default()).await;
    let params = params(&harness.service, None, "1", "10");
    let result = harness.service.list_page(USERS, &params, None).await;
    assert!(matches!(result, Err(ServiceError::Upstream(_))));
}

#[tokio::test]
async fn create_record_assigns_id_timestamp_and_creator() {
    let harness = Harness::new().await;
    let input = NewRecord {
        fields: record(json!({"title": "Fix sink", "id": "spoofed", "created_by": "someone"})),
        files: Vec::new(),
    };
    let created = harness
        .service
        .create_record(REQUESTS, input, TOKEN)
        .await
        .expect("created");

    assert_eq!(created["title"], "Fix sink");
    assert_eq!(created[CREATED_BY_FIELD], "u1");
    assert_ne!(created["id"], "spoofed");
    assert!(created["created_at"].is_string());
    assert_eq!(harness.store.records(REQUESTS).await.len(), 1);
}

#[tokio::test]
async fn create_record_requires_token_and_fields() {
    let harness = Harness::new().await;

    let anonymous = harness
        .service
        .create_record(REQUESTS, NewRecord::default(), None)
        .await;
    assert!(matches!(anonymous, Err(ServiceError::Unauthenticated(_))));

    let missing = harness
        .service
        .create_record(
            REQUESTS,
            NewRecord {
                fields: record(json!({"title": "   "})),
                files: Vec::new(),
            },
            TOKEN,
        )
        .await;
    match missing {
        Err(ServiceError::InvalidArgument(message)) => assert!(message.contains("title")),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

#[tokio::test]
async fn create_record_rejects_duplicate_unique_field() {
    let harness = Harness::new().await;
    harness
        .store
        .seed(USERS, vec![record(json!({"email": "ana@x.com"}))])
        .await;

    let result = harness
        .service
        .create_record(
            USERS,
            NewRecord {
                fields: record(json!({"email": " ANA@x.com "})),
                files: Vec::new(),
            },
            TOKEN,
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn create_record_uploads_files_and_stores_urls() {
    let harness = Harness::new().await;
    let input = NewRecord {
        fields: record(json!({"title": "Broken window"})),
        files: vec![FileUpload {
            field: "photo".into(),
            file_name: Some("window.jpg".into()),
            content_type: Some("image/jpeg".into()),
            bytes: vec![1, 2, 3],
        }],
    };
    let created = harness
        .service
        .create_record(REQUESTS, input, TOKEN)
        .await
        .expect("created");

    let url = created["photo"].as_str().expect("photo url");
    assert!(url.starts_with("https://storage.test/uploads/"));
    assert!(url.ends_with("-window.jpg"));
    let uploads = harness.storage.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1, "image/jpeg");
    assert_eq!(uploads[0].2, 3);
}

#[tokio::test]
async fn assigned_email_creates_single_placeholder_user() {
    let harness = Harness::new().await;
    for title in ["First", "Second"] {
        harness
            .service
            .create_record(
                REQUESTS,
                NewRecord {
                    fields: record(json!({"title": title, "assigned_email": "New@Mail.com"})),
                    files: Vec::new(),
                },
                TOKEN,
            )
            .await
            .expect("created");
    }

    let users = harness.store.records(USERS).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "new@mail.com");
    assert_eq!(users[0]["placeholder"], true);
    assert_eq!(users[0]["id"], email_document_id("new@mail.com").as_str());

    let requests = harness.store.records(REQUESTS).await;
    assert!(requests.iter().all(|r| r["assigned_email"] == "new@mail.com"));
}

#[tokio::test]
async fn placeholder_race_loser_is_not_an_error() {
    let harness = Harness::new().await;
    // Placeholder already written under the deterministic id but without the email field,
    // so the lookup misses and create collides.
    harness
        .store
        .seed(
            USERS,
            vec![record(json!({"id": email_document_id("late@x.com")}))],
        )
        .await;

    let created = harness
        .service
        .create_record(
            REQUESTS,
            NewRecord {
                fields: record(json!({"title": "Race", "assigned_email": "late@x.com"})),
                files: Vec::new(),
            },
            TOKEN,
        )
        .await;
    assert!(created.is_ok());
    assert_eq!(harness.store.records(USERS).await.len(), 1);
}

#[tokio::test]
async fn register_then_duplicate_email_conflicts() {
    let harness = Harness::new().await;
    let registration = Registration {
        email: "alex@mail.com".into(),
        password: "hunter22".into(),
        name: Some("Alex".into()),
    };

    let user = harness
        .service
        .register(registration.clone())
        .await
        .expect("registered");
    assert_eq!(user["email"], "alex@mail.com");
    assert_eq!(user["name"], "Alex");

    let again = harness.service.register(registration).await;
    assert!(matches!(again, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn register_replaces_placeholder_user() {
    let harness = Harness::new().await;
    harness
        .service
        .create_record(
            REQUESTS,
            NewRecord {
                fields: record(json!({"title": "Welcome", "assigned_email": "sam@x.com"})),
                files: Vec::new(),
            },
            TOKEN,
        )
        .await
        .expect("request created");

    let user = harness
        .service
        .register(Registration {
            email: "Sam@x.com".into(),
            password: "hunter22".into(),
            name: None,
        })
        .await
        .expect("registered");

    let users = harness.store.records(USERS).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], user["id"]);
    assert!(users[0].get("placeholder").is_none());
}

#[tokio::test]
async fn register_validates_input() {
    let harness = Harness::new().await;
    let bad_email = harness
        .service
        .register(Registration {
            email: "nope".into(),
            password: "hunter22".into(),
            name: None,
        })
        .await;
    assert!(matches!(bad_email, Err(ServiceError::InvalidArgument(_))));

    let weak = harness
        .service
        .register(Registration {
            email: "weak@x.com".into(),
            password: "123".into(),
            name: None,
        })
        .await;
    assert!(matches!(weak, Err(ServiceError::InvalidArgument(_))));
}

#[tokio::test]
async fn login_and_profile() {
    let harness = Harness::new().await;
    let wrong = harness.service.login("owner@x.com", "nope").await;
    assert!(matches!(wrong, Err(ServiceError::Unauthenticated(_))));

    let session = harness
        .service
        .login("Owner@X.com", "secret1")
        .await
        .expect("session");
    assert_eq!(session.uid, "u1");

    let missing = harness.service.profile(Some(&session.id_token)).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    harness
        .store
        .seed(USERS, vec![record(json!({"id": "u1", "email": "owner@x.com"}))])
        .await;
    let profile = harness
        .service
        .profile(Some(&session.id_token))
        .await
        .expect("profile");
    assert_eq!(profile["email"], "owner@x.com");
}

#[tokio::test]
async fn get_record_and_missing_record() {
    let harness = Harness::new().await;
    harness
        .store
        .seed(USERS, vec![record(json!({"id": "abc", "email": "a@x.com"}))])
        .await;

    let found = harness.service.get_record(USERS, "abc", None).await.expect("found");
    assert_eq!(found["email"], "a@x.com");

    let missing = harness.service.get_record(USERS, "zzz", None).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    let invalid = harness.service.get_record(USERS, "..", None).await;
    assert!(matches!(invalid, Err(ServiceError::InvalidArgument(_))));
}

#[tokio::test]
async fn append_to_record_merges_values() {
    let harness = Harness::new().await;
    harness
        .store
        .seed(REQUESTS, vec![record(json!({"id": "r1", "title": "T", "notes": ["a"]}))])
        .await;

    harness
        .service
        .append_to_record(REQUESTS, "r1", "notes", vec![json!("a"), json!("b")], TOKEN)
        .await
        .expect("appended");
    let stored = harness.store.records(REQUESTS).await;
    assert_eq!(stored[0]["notes"], json!(["a", "b"]));

    let missing = harness
        .service
        .append_to_record(REQUESTS, "nope", "notes", vec![json!("x")], TOKEN)
        .await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    let reserved = harness
        .service
        .append_to_record(REQUESTS, "r1", "id", vec![json!("x")], TOKEN)
        .await;
    assert!(matches!(reserved, Err(ServiceError::InvalidArgument(_))));

    let empty = harness
        .service
        .append_to_record(REQUESTS, "r1", "notes", Vec::new(), TOKEN)
        .await;
    assert!(matches!(empty, Err(ServiceError::InvalidArgument(_))));
}

#[tokio::test]
async fn upload_failures_are_reported() {
    let harness = Harness::build(MemoryStore::default(), StubStorage::failing()).await;
    let file = FileUpload {
        field: "file".into(),
        file_name: Some("a.txt".into()),
        content_type: None,
        bytes: b"hello".to_vec(),
    };
    let result = harness.service.upload(file).await;
    assert!(matches!(result, Err(ServiceError::UploadFailed(_))));

    let empty = harness.service.upload(FileUpload::default()).await;
    assert!(matches!(empty, Err(ServiceError::UploadFailed(_))));
}
