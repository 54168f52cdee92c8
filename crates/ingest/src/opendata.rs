//! Client for a CKAN-style open-data catalogue.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum OpenDataError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

impl OpenDataError {
    /// HTTP status of a non-200 answer, if that is what this error is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// One downloadable resource of a dataset.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Resource {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct PackageShowResponse {
    result: Package,
}

#[derive(Deserialize)]
struct Package {
    #[serde(default)]
    resources: Vec<Resource>,
}

pub struct OpenDataClient {
    client: Client,
    base_url: String,
}

impl OpenDataClient {
    /// `base_url` is the API root, e.g. `https://host/data/api/3/`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `dataset_id` to its resources via `action/package_show`.
    pub async fn resolve(&self, dataset_id: &str) -> Result<Vec<Resource>, OpenDataError> {
        let url = format!("{}action/package_show", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("id", dataset_id)])
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(OpenDataError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let parsed: PackageShowResponse = response.json().await?;
        debug!(dataset_id, resources = parsed.result.resources.len(), "Resolved dataset");
        Ok(parsed.result.resources)
    }

    /// Fetch the full body of `url`.
    pub async fn download(&self, url: &str) -> Result<Bytes, OpenDataError> {
        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(OpenDataError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// Staged filename of a resource: the last path segment of its URL.
pub fn resource_filename(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(last) = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        {
            return last.to_string();
        }
    }
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

/// Whether `name` ends with any denylisted suffix (case-insensitive).
pub fn is_denylisted(name: &str, denylist: &[String]) -> bool {
    let name = name.to_lowercase();
    denylist
        .iter()
        .any(|suffix| !suffix.is_empty() && name.ends_with(&suffix.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_last_segment() {
        assert_eq!(
            resource_filename("https://host/dataset/abc/resource/2017_renda.csv"),
            "2017_renda.csv"
        );
        assert_eq!(resource_filename("https://host/files/x.json?dl=1"), "x.json");
        assert_eq!(resource_filename("https://host/files/dir/"), "dir");
        assert_eq!(resource_filename("not a url/y.csv"), "y.csv");
    }

    #[test]
    fn denylist_matches_suffix() {
        let deny = vec![".xml".to_string()];
        assert!(is_denylisted("catalog.xml", &deny));
        assert!(is_denylisted("CATALOG.XML", &deny));
        assert!(!is_denylisted("income.csv", &deny));
        assert!(!is_denylisted("xml.csv", &deny));
        assert!(!is_denylisted("a.xml", &[]));
    }

    #[test]
    fn package_show_parses_resources() {
        let body = r#"{"success":true,"result":{"id":"renda","resources":[
            {"url":"https://host/a.csv","name":"A","format":"CSV"},
            {"url":"","name":"empty"},
            {"name":"no url"}
        ]}}"#;
        let parsed: PackageShowResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result.resources.len(), 3);
        assert_eq!(parsed.result.resources[0].url.as_deref(), Some("https://host/a.csv"));
        assert_eq!(parsed.result.resources[2].url, None);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = OpenDataClient::new("https://host/api/3");
        assert_eq!(client.base_url(), "https://host/api/3/");
    }
}
