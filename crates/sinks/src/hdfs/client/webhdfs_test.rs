use super::*;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{Method as HttpMethod, StatusCode as HttpStatus, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

// =============================================================================
// Fake namenode + datanode
// =============================================================================

#[derive(Default)]
struct FakeCluster {
    addr: String,
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
    corrupt: HashSet<String>,
    queries: Vec<HashMap<String, String>>,
}

type Shared = Arc<Mutex<FakeCluster>>;

fn remote_exception(status: HttpStatus, exception: &str, class: &str, message: &str) -> Response {
    let body = json!({
        "RemoteException": {
            "exception": exception,
            "javaClassName": class,
            "message": message,
        }
    });
    (status, axum::Json(body)).into_response()
}

fn redirect_to_datanode(cluster: &FakeCluster, path: &str, op: &str) -> Response {
    let location = format!("http://{}/datanode{}?op={}", cluster.addr, path, op);
    (HttpStatus::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response()
}

async fn namenode_root(
    State(cluster): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    cluster.lock().queries.push(params);
    axum::Json(json!({ "FileStatus": { "type": "DIRECTORY", "length": 0 } })).into_response()
}

async fn namenode(
    State(cluster): State<Shared>,
    method: HttpMethod,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let path = format!("/{path}");
    let op = params.get("op").cloned().unwrap_or_default();
    let mut cluster = cluster.lock();
    cluster.queries.push(params.clone());

    match (method, op.as_str()) {
        (HttpMethod::GET, "GETFILESTATUS") => {
            if cluster.dirs.contains(&path) {
                axum::Json(json!({ "FileStatus": { "type": "DIRECTORY", "length": 0 } }))
                    .into_response()
            } else if let Some(contents) = cluster.files.get(&path) {
                axum::Json(json!({ "FileStatus": { "type": "FILE", "length": contents.len() } }))
                    .into_response()
            } else {
                remote_exception(
                    HttpStatus::NOT_FOUND,
                    "FileNotFoundException",
                    "java.io.FileNotFoundException",
                    &format!("File does not exist: {path}"),
                )
            }
        }
        (HttpMethod::PUT, "MKDIRS") => {
            if path == "/refused" {
                return axum::Json(json!({ "boolean": false })).into_response();
            }
            cluster.dirs.insert(path);
            axum::Json(json!({ "boolean": true })).into_response()
        }
        (HttpMethod::PUT, "CREATE") => {
            if path.starts_with("/secure") {
                return remote_exception(
                    HttpStatus::FORBIDDEN,
                    "AccessControlException",
                    "org.apache.hadoop.security.AccessControlException",
                    "Permission denied: user=etl, access=WRITE",
                );
            }
            if cluster.files.contains_key(&path) {
                return remote_exception(
                    HttpStatus::FORBIDDEN,
                    "FileAlreadyExistsException",
                    "org.apache.hadoop.fs.FileAlreadyExistsException",
                    &format!("{path} already exists"),
                );
            }
            redirect_to_datanode(&cluster, &path, "CREATE")
        }
        (HttpMethod::POST, "APPEND") => {
            if !cluster.files.contains_key(&path) {
                return remote_exception(
                    HttpStatus::NOT_FOUND,
                    "FileNotFoundException",
                    "java.io.FileNotFoundException",
                    &format!("File does not exist: {path}"),
                );
            }
            redirect_to_datanode(&cluster, &path, "APPEND")
        }
        _ => (HttpStatus::BAD_REQUEST, "unsupported").into_response(),
    }
}

async fn datanode(
    State(cluster): State<Shared>,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    body: bytes::Bytes,
) -> Response {
    let path = format!("/{path}");
    let mut cluster = cluster.lock();

    match params.get("op").map(String::as_str) {
        Some("CREATE") => {
            cluster.files.insert(path, body.to_vec());
            HttpStatus::CREATED.into_response()
        }
        Some("APPEND") => {
            if path.starts_with("/plain") {
                return (
                    HttpStatus::INTERNAL_SERVER_ERROR,
                    "org.apache.hadoop.hdfs.BlockMissingException: Could not obtain block",
                )
                    .into_response();
            }
            if cluster.corrupt.contains(&path) {
                return remote_exception(
                    HttpStatus::INTERNAL_SERVER_ERROR,
                    "IOException",
                    "java.io.IOException",
                    "org.apache.hadoop.hdfs.server.datanode.ReplicaNotFoundException: \
                     Cannot append to a non-existent replica",
                );
            }
            if let Some(file) = cluster.files.get_mut(&path) {
                file.extend_from_slice(&body);
            }
            HttpStatus::OK.into_response()
        }
        _ => (HttpStatus::BAD_REQUEST, "unsupported").into_response(),
    }
}

async fn start_cluster() -> (Shared, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr").to_string();

    let cluster: Shared = Arc::new(Mutex::new(FakeCluster {
        addr: addr.clone(),
        ..Default::default()
    }));

    let app = Router::new()
        .route("/webhdfs/v1/", any(namenode_root))
        .route("/webhdfs/v1/{*path}", any(namenode))
        .route("/datanode/{*path}", any(datanode))
        .with_state(cluster.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (cluster, format!("http://{addr}"))
}

fn client_for(url: &str, user: Option<&str>) -> WebHdfsClient {
    WebHdfsClient::new(&WebHdfsConnectionConfig {
        url: url.to_string(),
        user: user.map(String::from),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

// =============================================================================
// Construction and URL building
// =============================================================================

#[test]
fn test_new_rejects_invalid_url() {
    let err = WebHdfsClient::new(&WebHdfsConnectionConfig {
        url: "not a url".into(),
        ..Default::default()
    })
    .unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::Connection);
}

#[test]
fn test_new_rejects_non_base_url() {
    let err = WebHdfsClient::new(&WebHdfsConnectionConfig {
        url: "mailto:ops@example.com".into(),
        ..Default::default()
    })
    .unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::Connection);
}

#[test]
fn test_endpoint_layout() {
    let client = client_for("http://localhost:9870", None);

    let url = client.endpoint("/data/events.log", "APPEND", &[]).unwrap();
    assert_eq!(
        url.as_str(),
        "http://localhost:9870/webhdfs/v1/data/events.log?op=APPEND"
    );

    let url = client.endpoint("/", "GETFILESTATUS", &[]).unwrap();
    assert_eq!(
        url.as_str(),
        "http://localhost:9870/webhdfs/v1/?op=GETFILESTATUS"
    );
}

#[test]
fn test_endpoint_user_and_extra_params() {
    let client = client_for("http://nn:9870/", Some("etl"));

    let url = client.endpoint("/a/b", "CREATE", &[("overwrite", "false")]).unwrap();
    assert_eq!(
        url.as_str(),
        "http://nn:9870/webhdfs/v1/a/b?op=CREATE&user.name=etl&overwrite=false"
    );
}

#[test]
fn test_endpoint_escapes_path_segments() {
    let client = client_for("http://nn:9870", None);

    let url = client.endpoint("/logs/my file.log", "APPEND", &[]).unwrap();
    assert_eq!(
        url.as_str(),
        "http://nn:9870/webhdfs/v1/logs/my%20file.log?op=APPEND"
    );
}

#[test]
fn test_endpoint_rejects_dot_segments() {
    let client = client_for("http://nn:9870", None);

    for path in ["/a/../b/f.log", "/a/./f.log", "/.."] {
        let err = client.endpoint(path, "APPEND", &[]).unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::PermissionDenied, "{path}");
    }

    // Dots inside a segment name are fine
    let url = client.endpoint("/logs/a..b/f.log.1", "APPEND", &[]).unwrap();
    assert_eq!(
        url.as_str(),
        "http://nn:9870/webhdfs/v1/logs/a..b/f.log.1?op=APPEND"
    );
}

#[test]
fn test_classify_remote_exception() {
    let remote = |exception: &str, message: &str| RemoteException {
        exception: exception.into(),
        java_class_name: String::new(),
        message: message.into(),
    };

    assert_eq!(
        classify_remote_exception(&remote("FileNotFoundException", "gone"), StatusCode::NOT_FOUND),
        StorageErrorKind::NotFound
    );
    assert_eq!(
        classify_remote_exception(
            &remote("FileAlreadyExistsException", "exists"),
            StatusCode::FORBIDDEN
        ),
        StorageErrorKind::AlreadyExists
    );
    assert_eq!(
        classify_remote_exception(&remote("AccessControlException", "no"), StatusCode::FORBIDDEN),
        StorageErrorKind::PermissionDenied
    );
    assert_eq!(
        classify_remote_exception(
            &remote("IOException", "Failed to replace a bad datanode on the existing pipeline"),
            StatusCode::INTERNAL_SERVER_ERROR
        ),
        StorageErrorKind::CorruptReplica
    );
    assert_eq!(
        classify_remote_exception(
            &remote("IOException", "disk quota exceeded"),
            StatusCode::INTERNAL_SERVER_ERROR
        ),
        StorageErrorKind::Other
    );
}

// =============================================================================
// Against the fake cluster
// =============================================================================

#[tokio::test]
async fn test_status_missing_file_is_none() {
    let (_cluster, url) = start_cluster().await;
    let client = client_for(&url, None);

    assert_eq!(client.status("/nope.log").await.unwrap(), None);
}

#[tokio::test]
async fn test_status_root_is_directory() {
    let (_cluster, url) = start_cluster().await;
    let client = client_for(&url, None);

    let status = client.status("/").await.unwrap().unwrap();
    assert!(status.is_dir());
}

#[tokio::test]
async fn test_create_dirs_create_file_append() {
    let (cluster, url) = start_cluster().await;
    let client = client_for(&url, None);

    client.create_dirs("/data/2024").await.unwrap();
    assert!(client.status("/data/2024").await.unwrap().unwrap().is_dir());

    client.create_file("/data/2024/events.log").await.unwrap();
    client
        .append("/data/2024/events.log", Bytes::from_static(b"hello "))
        .await
        .unwrap();
    client
        .append("/data/2024/events.log", Bytes::from_static(b"world"))
        .await
        .unwrap();

    assert_eq!(
        cluster.lock().files.get("/data/2024/events.log").unwrap(),
        b"hello world"
    );
    assert_eq!(
        client.status("/data/2024/events.log").await.unwrap(),
        Some(FileStatus::file(11))
    );
}

#[tokio::test]
async fn test_create_sends_overwrite_false_and_user() {
    let (cluster, url) = start_cluster().await;
    let client = client_for(&url, Some("etl"));

    client.create_file("/f.log").await.unwrap();

    let cluster = cluster.lock();
    let create = cluster
        .queries
        .iter()
        .find(|q| q.get("op").map(String::as_str) == Some("CREATE"))
        .unwrap();
    assert_eq!(create.get("overwrite").map(String::as_str), Some("false"));
    assert_eq!(create.get("user.name").map(String::as_str), Some("etl"));
}

#[tokio::test]
async fn test_create_existing_file_is_already_exists() {
    let (cluster, url) = start_cluster().await;
    cluster.lock().files.insert("/f.log".into(), Vec::new());
    let client = client_for(&url, None);

    let err = client.create_file("/f.log").await.unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::AlreadyExists);
}

#[tokio::test]
async fn test_create_permission_denied() {
    let (_cluster, url) = start_cluster().await;
    let client = client_for(&url, None);

    let err = client.create_file("/secure/f.log").await.unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::PermissionDenied);
    assert!(err.message.contains("Permission denied"));
}

#[tokio::test]
async fn test_mkdirs_false_is_error() {
    let (_cluster, url) = start_cluster().await;
    let client = client_for(&url, None);

    let err = client.create_dirs("/refused").await.unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::Other);
}

#[tokio::test]
async fn test_append_missing_file_is_not_found() {
    let (_cluster, url) = start_cluster().await;
    let client = client_for(&url, None);

    let err = client
        .append("/missing.log", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::NotFound);
}

#[tokio::test]
async fn test_parent_traversal_never_reaches_namenode() {
    let (cluster, url) = start_cluster().await;
    let client = client_for(&url, None);

    let err = client
        .append("/a/../b/f.log", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::PermissionDenied);

    let err = client.create_file("/a/../b/f.log").await.unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::PermissionDenied);
    assert!(client.status("/a/./f.log").await.is_err());

    assert!(cluster.lock().queries.is_empty());
    assert!(cluster.lock().files.is_empty());
}

#[tokio::test]
async fn test_append_replica_not_found_is_corrupt_replica() {
    let (cluster, url) = start_cluster().await;
    {
        let mut cluster = cluster.lock();
        cluster.files.insert("/report.log".into(), Vec::new());
        cluster.corrupt.insert("/report.log".into());
    }
    let client = client_for(&url, None);

    let err = client
        .append("/report.log", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(err.is_corrupt_replica());
    assert!(err.message.contains("ReplicaNotFoundException"));
}

#[tokio::test]
async fn test_append_plain_text_signature_is_corrupt_replica() {
    let (cluster, url) = start_cluster().await;
    cluster.lock().files.insert("/plain.log".into(), Vec::new());
    let client = client_for(&url, None);

    let err = client
        .append("/plain.log", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::CorruptReplica);
}

#[tokio::test]
async fn test_unreachable_namenode_is_connection_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"), None);
    let err = client.status("/x").await.unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::Connection);
}
