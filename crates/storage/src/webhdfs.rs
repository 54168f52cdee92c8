//! [`RemoteStore`] over the WebHDFS REST API.
//!
//! Data-bearing calls (`CREATE`, `OPEN`) follow the two-step protocol: the
//! namenode answers with a `307 Temporary Redirect` naming a datanode, and the
//! payload is then sent to (or read from) that datanode. Redirects are
//! followed by hand so the request body is only sent once, to the datanode.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::LOCATION;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::backend::RemoteStore;
use crate::error::StorageError;

pub struct WebHdfsStore {
    client: Client,
    base_url: String,
    user: String,
}

#[derive(Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListStatusResponse {
    file_statuses: FileStatuses,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileStatuses {
    file_status: Vec<FileStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatus {
    path_suffix: String,
}

impl WebHdfsStore {
    /// `base_url` is the namenode HTTP address, e.g. `http://namenode:9870`.
    pub fn new(base_url: impl Into<String>, user: impl Into<String>) -> Result<Self, StorageError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let user = user.into();
        info!("Storage: WebHDFS backend at {} (user: {})", base_url, user);
        Ok(Self {
            client,
            base_url,
            user,
        })
    }

    /// Each `/`-separated segment of `path` is percent-encoded on its own, so
    /// `#`, `?` and `%` in file names stay part of the path.
    fn url(&self, path: &str, op: &str, extra: &[(&str, &str)]) -> Result<Url, StorageError> {
        let mut url = Url::parse(&format!("{}/webhdfs/v1", self.base_url))
            .map_err(|e| StorageError::Other(format!("invalid WebHDFS base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Other(format!("WebHDFS base url {} cannot take a path", self.base_url)))?
            .extend(path.split('/').filter(|s| !s.is_empty()));
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            query.append_pair("user.name", &self.user);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url) -> Result<Response, StorageError> {
        debug!(method = %method, url = %url, "WebHDFS request");
        Ok(self.client.request(method, url).send().await?)
    }

    async fn fail(op: &'static str, path: &str, response: Response) -> StorageError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StorageError::Http {
            op,
            path: path.to_string(),
            status,
            body,
        }
    }

    fn redirect_target(op: &'static str, path: &str, response: &Response) -> Result<Url, StorageError> {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StorageError::Other(format!("{op} {path}: redirect without Location")))?;
        Url::parse(location)
            .map_err(|e| StorageError::Other(format!("{op} {path}: bad redirect '{location}': {e}")))
    }

    async fn boolean(op: &'static str, path: &str, response: Response) -> Result<bool, StorageError> {
        if !response.status().is_success() {
            return Err(Self::fail(op, path, response).await);
        }
        let parsed: BooleanResponse = response.json().await?;
        Ok(parsed.boolean)
    }
}

#[async_trait]
impl RemoteStore for WebHdfsStore {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let url = self.url(path, "GETFILESTATUS", &[])?;
        let response = self.send(Method::GET, url).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::fail("GETFILESTATUS", path, response).await),
        }
    }

    async fn make_directories(&self, path: &str) -> Result<(), StorageError> {
        let url = self.url(path, "MKDIRS", &[])?;
        let response = self.send(Method::PUT, url).await?;
        if Self::boolean("MKDIRS", path, response).await? {
            Ok(())
        } else {
            Err(StorageError::Other(format!("MKDIRS {path} was refused")))
        }
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let url = self.url(path, "CREATE", &[("overwrite", "true")])?;
        let response = self.send(Method::PUT, url).await?;

        let response = match response.status() {
            StatusCode::TEMPORARY_REDIRECT => {
                let target = Self::redirect_target("CREATE", path, &response)?;
                debug!(path, datanode = %target, bytes = data.len(), "WebHDFS upload");
                self.client.put(target).body(data).send().await?
            }
            _ => response,
        };

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::fail("CREATE", path, response).await)
        }
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let url = self.url(path, "OPEN", &[])?;
        let response = self.send(Method::GET, url).await?;

        let response = match response.status() {
            StatusCode::TEMPORARY_REDIRECT => {
                let target = Self::redirect_target("OPEN", path, &response)?;
                self.client.get(target).send().await?
            }
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(path.to_string())),
            _ => response,
        };

        if response.status().is_success() {
            Ok(response.bytes().await?)
        } else {
            Err(Self::fail("OPEN", path, response).await)
        }
    }

    async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError> {
        let url = self.url(directory, "LISTSTATUS", &[])?;
        let response = self.send(Method::GET, url).await?;
        match response.status() {
            StatusCode::OK => {
                let parsed: ListStatusResponse = response.json().await?;
                Ok(parsed
                    .file_statuses
                    .file_status
                    .into_iter()
                    .map(|s| s.path_suffix)
                    .collect())
            }
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(directory.to_string())),
            _ => Err(Self::fail("LISTSTATUS", directory, response).await),
        }
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<bool, StorageError> {
        let recursive = if recursive { "true" } else { "false" };
        let url = self.url(path, "DELETE", &[("recursive", recursive)])?;
        let response = self.send(Method::DELETE, url).await?;
        Self::boolean("DELETE", path, response).await
    }
}
