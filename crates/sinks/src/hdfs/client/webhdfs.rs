//! WebHDFS backend
//!
//! Talks to a namenode over the WebHDFS REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | status | `GET  /webhdfs/v1/<path>?op=GETFILESTATUS` |
//! | create_dirs | `PUT  /webhdfs/v1/<path>?op=MKDIRS` |
//! | create_file | `PUT  /webhdfs/v1/<path>?op=CREATE&overwrite=false` then `PUT` to the datanode |
//! | append | `POST /webhdfs/v1/<path>?op=APPEND` then `POST` to the datanode |
//!
//! CREATE and APPEND are two-step: the namenode answers `307` with a
//! `Location` header naming a datanode, and the payload goes there. Redirects
//! are followed by hand so the payload is never sent to the namenode.
//!
//! Failures come back as `RemoteException` JSON bodies holding the Java
//! exception name and message. They are mapped to [`StorageErrorKind`] here,
//! which is the only place corrupted-block text is inspected.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Method, StatusCode, Url};
use scribe_config::WebHdfsConnectionConfig;
use serde::Deserialize;

use super::{
    FileStatus, StorageClient, StorageError, StorageErrorKind, is_corrupt_replica_signature,
};

/// `GETFILESTATUS` response
#[derive(Debug, Deserialize)]
struct FileStatusResponse {
    #[serde(rename = "FileStatus")]
    file_status: FileStatusBody,
}

#[derive(Debug, Deserialize)]
struct FileStatusBody {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    length: u64,
}

/// `MKDIRS` response
#[derive(Debug, Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

#[derive(Debug, Deserialize)]
struct RemoteExceptionResponse {
    #[serde(rename = "RemoteException")]
    remote_exception: RemoteException,
}

#[derive(Debug, Deserialize)]
struct RemoteException {
    #[serde(default)]
    exception: String,
    #[serde(rename = "javaClassName", default)]
    java_class_name: String,
    #[serde(default)]
    message: String,
}

/// [`StorageClient`] for a WebHDFS namenode
#[derive(Debug, Clone)]
pub struct WebHdfsClient {
    base: Url,
    user: Option<String>,
    http: reqwest::Client,
}

impl WebHdfsClient {
    /// Build a client for the configured namenode
    ///
    /// # Errors
    ///
    /// Returns a `Connection` error if the URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &WebHdfsConnectionConfig) -> Result<Self, StorageError> {
        let base = Url::parse(&config.url).map_err(|e| {
            StorageError::connection(format!("invalid namenode url '{}': {e}", config.url))
        })?;
        if base.cannot_be_a_base() {
            return Err(StorageError::connection(format!(
                "namenode url '{}' cannot carry a path",
                config.url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| StorageError::connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base,
            user: config.user.clone(),
            http,
        })
    }

    /// Namenode address this client talks to
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build `<base>/webhdfs/v1/<path>?op=<op>&user.name=<user>&<extra>`
    ///
    /// `.` and `..` segments are rejected: the URL builder would drop them
    /// and address a different file.
    fn endpoint(&self, path: &str, op: &str, extra: &[(&str, &str)]) -> Result<Url, StorageError> {
        let mut url = self.base.clone();

        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        if parts.iter().any(|p| matches!(*p, "." | "..")) {
            return Err(StorageError::new(
                StorageErrorKind::PermissionDenied,
                format!("{path}: relative path segments are not allowed"),
            ));
        }
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["webhdfs", "v1"]);
            if parts.is_empty() {
                segments.push("");
            } else {
                segments.extend(parts);
            }
        }

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            if let Some(user) = &self.user {
                query.append_pair("user.name", user);
            }
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Bytes>,
        path: &str,
    ) -> Result<reqwest::Response, StorageError> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(body);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::connection(format!("{path}: {e}")))
    }

    /// Run a two-step CREATE/APPEND: ask the namenode, then send data to the datanode
    async fn write_via_datanode(
        &self,
        method: Method,
        path: &str,
        op: &str,
        extra: &[(&str, &str)],
        data: Bytes,
    ) -> Result<(), StorageError> {
        let url = self.endpoint(path, op, extra)?;
        let response = self.send(method.clone(), url, None, path).await?;

        let status = response.status();
        if !status.is_redirection() {
            if status.is_success() {
                return Err(StorageError::connection(format!(
                    "{path}: namenode answered {op} with {status} instead of a datanode redirect"
                )));
            }
            return Err(error_from_response(response, path).await);
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                StorageError::connection(format!("{path}: {op} redirect without Location header"))
            })?;
        let datanode = Url::parse(location).map_err(|e| {
            StorageError::connection(format!("{path}: invalid datanode location '{location}': {e}"))
        })?;

        tracing::trace!(path, op, datanode = %datanode, "sending data to datanode");

        let response = self.send(method, datanode, Some(data), path).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response, path).await)
        }
    }
}

#[async_trait]
impl StorageClient for WebHdfsClient {
    async fn status(&self, path: &str) -> Result<Option<FileStatus>, StorageError> {
        let url = self.endpoint(path, "GETFILESTATUS", &[])?;
        let response = self.send(Method::GET, url, None, path).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let err = error_from_response(response, path).await;
            return match err.kind {
                StorageErrorKind::NotFound => Ok(None),
                _ => Err(err),
            };
        }

        let body: FileStatusResponse = response.json().await.map_err(|e| {
            StorageError::connection(format!("{path}: malformed GETFILESTATUS response: {e}"))
        })?;

        Ok(Some(match body.file_status.kind.as_str() {
            "DIRECTORY" => FileStatus::directory(),
            _ => FileStatus::file(body.file_status.length),
        }))
    }

    async fn create_dirs(&self, path: &str) -> Result<(), StorageError> {
        let url = self.endpoint(path, "MKDIRS", &[])?;
        let response = self.send(Method::PUT, url, None, path).await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, path).await);
        }

        let body: BooleanResponse = response.json().await.map_err(|e| {
            StorageError::connection(format!("{path}: malformed MKDIRS response: {e}"))
        })?;
        if body.boolean {
            Ok(())
        } else {
            Err(StorageError::other(format!("{path}: namenode refused MKDIRS")))
        }
    }

    async fn create_file(&self, path: &str) -> Result<(), StorageError> {
        self.write_via_datanode(
            Method::PUT,
            path,
            "CREATE",
            &[("overwrite", "false")],
            Bytes::new(),
        )
        .await
    }

    async fn append(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        self.write_via_datanode(Method::POST, path, "APPEND", &[], data)
            .await
    }

    fn name(&self) -> &'static str {
        "webhdfs"
    }
}

/// Turn a failed response into a typed error
async fn error_from_response(response: reqwest::Response, path: &str) -> StorageError {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return StorageError::connection(format!(
                "{path}: HTTP {status}, failed to read body: {e}"
            ));
        }
    };

    match serde_json::from_str::<RemoteExceptionResponse>(&body) {
        Ok(parsed) => {
            let remote = parsed.remote_exception;
            let kind = classify_remote_exception(&remote, status);
            StorageError::new(kind, format!("{path}: {}: {}", remote.exception, remote.message))
        }
        Err(_) => {
            let kind = if is_corrupt_replica_signature(&body) {
                StorageErrorKind::CorruptReplica
            } else {
                kind_from_status(status)
            };
            StorageError::new(kind, format!("{path}: HTTP {status}: {}", body.trim()))
        }
    }
}

fn classify_remote_exception(remote: &RemoteException, status: StatusCode) -> StorageErrorKind {
    if is_corrupt_replica_signature(&remote.exception)
        || is_corrupt_replica_signature(&remote.java_class_name)
        || is_corrupt_replica_signature(&remote.message)
    {
        return StorageErrorKind::CorruptReplica;
    }

    match remote.exception.as_str() {
        "FileNotFoundException" => StorageErrorKind::NotFound,
        "FileAlreadyExistsException" => StorageErrorKind::AlreadyExists,
        "AccessControlException" | "SecurityException" => StorageErrorKind::PermissionDenied,
        _ => kind_from_status(status),
    }
}

fn kind_from_status(status: StatusCode) -> StorageErrorKind {
    match status {
        StatusCode::NOT_FOUND => StorageErrorKind::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageErrorKind::PermissionDenied,
        _ => StorageErrorKind::Other,
    }
}

#[cfg(test)]
#[path = "webhdfs_test.rs"]
mod webhdfs_test;
