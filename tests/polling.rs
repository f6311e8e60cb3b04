mod support;

use std::time::Duration;

use serde_json::json;
use sharepoint_access::{ApiError, ItemKind, SharePointError};
use support::{fast_wait, MockResponse, MockServer};

const FILE_PATH: &str = "/v1.0/sites/s1/drives/d1/root:/Inbox/data.csv";
const FOLDER_PATH: &str = "/v1.0/sites/s1/drives/d1/root:/Inbox/2024-03";

fn not_found() -> MockResponse {
    MockResponse::graph_error(404, "itemNotFound", "The resource could not be found.")
}

#[tokio::test]
async fn file_appears_after_a_few_probes() {
    let server = MockServer::start().await;
    server.mount(
        "GET",
        FILE_PATH,
        vec![
            not_found(),
            not_found(),
            MockResponse::json(
                200,
                json!({ "id": "f1", "name": "data.csv", "createdDateTime": "2024-03-01T10:00:00Z",
                        "file": { "mimeType": "text/csv" } }),
            ),
        ],
    );
    let dir = tempfile::tempdir().unwrap();
    let client = server.client(dir.path());

    let item = client
        .wait_for_file("s1", "d1", "Inbox", "data.csv", fast_wait(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(item.id, "f1");
    assert_eq!(item.kind, ItemKind::File);
    assert_eq!(server.requests_to("GET", FILE_PATH).len(), 3);
}

#[tokio::test]
async fn transient_failures_keep_polling() {
    let server = MockServer::start().await;
    server.mount(
        "GET",
        FILE_PATH,
        vec![
            MockResponse::graph_error(503, "serviceNotAvailable", "busy"),
            MockResponse::json(
                200,
                json!({ "id": "f1", "name": "data.csv", "createdDateTime": "2024-03-01T10:00:00Z", "file": {} }),
            ),
        ],
    );
    let dir = tempfile::tempdir().unwrap();
    let client = server.client(dir.path());

    let item = client
        .wait_for_file("s1", "d1", "Inbox", "data.csv", fast_wait(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(item.name, "data.csv");
}

#[tokio::test]
async fn missing_file_times_out() {
    let server = MockServer::start().await;
    server.mount("GET", FILE_PATH, vec![not_found()]);
    let dir = tempfile::tempdir().unwrap();
    let client = server.client(dir.path());

    let err = client
        .wait_for_file("s1", "d1", "Inbox", "data.csv", fast_wait(Duration::from_millis(200)))
        .await
        .unwrap_err();

    match err {
        SharePointError::WaitTimeout { name, folder, waited } => {
            assert_eq!(name, "data.csv");
            assert_eq!(folder, "Inbox");
            assert!(waited >= Duration::from_millis(200));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // One probe per interval plus the final probe at the deadline.
    assert!(server.requests_to("GET", FILE_PATH).len() >= 2);
}

#[tokio::test]
async fn forbidden_fails_fast() {
    let server = MockServer::start().await;
    server.mount(
        "GET",
        FILE_PATH,
        vec![MockResponse::graph_error(403, "accessDenied", "Access denied")],
    );
    let dir = tempfile::tempdir().unwrap();
    let client = server.client(dir.path());

    let err = client
        .wait_for_file("s1", "d1", "Inbox", "data.csv", fast_wait(Duration::from_secs(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, SharePointError::Api(ApiError::Forbidden)));
    assert_eq!(server.requests_to("GET", FILE_PATH).len(), 1);
}

#[tokio::test]
async fn folder_wait_ignores_files_with_the_same_name() {
    let server = MockServer::start().await;
    server.mount(
        "GET",
        FOLDER_PATH,
        vec![
            MockResponse::json(
                200,
                json!({ "id": "x", "name": "2024-03", "createdDateTime": "2024-03-01T10:00:00Z", "file": {} }),
            ),
            MockResponse::json(
                200,
                json!({ "id": "dir", "name": "2024-03", "createdDateTime": "2024-03-02T10:00:00Z",
                        "folder": { "childCount": 0 } }),
            ),
        ],
    );
    let dir = tempfile::tempdir().unwrap();
    let client = server.client(dir.path());

    let folder = client
        .wait_for_folder("s1", "d1", "Inbox", "2024-03", fast_wait(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(folder.id, "dir");
    assert_eq!(folder.kind, ItemKind::Folder);
    assert_eq!(server.requests_to("GET", FOLDER_PATH).len(), 2);
}
