//! Content API client for fetching file contents from the forge.

use std::collections::HashMap;
use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::model::FileReference;
use crate::infra::config::Settings;

const API_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Any failure while retrieving a file. Nothing is retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid content API url '{0}'")]
    InvalidUrl(String),
    #[error("invalid access token: {0}")]
    InvalidToken(String),
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("'{path}' is not a file")]
    NotAFile { path: String },
    #[error("failed to decode contents of '{path}': {reason}")]
    Decode { path: String, reason: String },
}

/// Anything that can produce the raw text of a referenced file.
pub trait ContentSource {
    fn fetch(
        &self,
        reference: &FileReference,
    ) -> impl Future<Output = Result<String, FetchError>>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsPayload {
    Listing(Vec<serde_json::Value>),
    File(FileContents),
}

#[derive(Debug, Deserialize)]
struct FileContents {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

/// HTTP client for `GET /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: Url,
}

impl GitHubClient {
    /// Build a client from the current settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        let api_url = Url::parse(settings.api_url.trim_end_matches('/'))
            .map_err(|_| FetchError::InvalidUrl(settings.api_url.clone()))?;
        if api_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(settings.api_url.clone()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(API_MEDIA_TYPE));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("ghsnip/", env!("CARGO_PKG_VERSION"))),
        );
        let token = settings.access_token.trim();
        if !token.is_empty() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| FetchError::InvalidToken(err.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| FetchError::Network {
                url: api_url.to_string(),
                source,
            })?;

        Ok(Self { http, api_url })
    }

    /// Endpoint URL for one file, with each path segment percent-encoded.
    pub fn contents_url(&self, owner: &str, repo: &str, path: &str) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", owner, repo, "contents"])
                .extend(path.split('/').filter(|segment| !segment.is_empty()));
        }
        url
    }

    pub async fn fetch_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<String, FetchError> {
        let url = self.contents_url(owner, repo, path);
        tracing::debug!(%url, "fetching file contents");

        let network = |source| FetchError::Network {
            url: url.to_string(),
            source,
        };
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "content API request failed");
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(network)?;
        let payload: ContentsPayload =
            serde_json::from_str(&body).map_err(|err| FetchError::Decode {
                path: path.to_owned(),
                reason: format!("unexpected response body: {err}"),
            })?;

        match payload {
            ContentsPayload::Listing(_) => Err(FetchError::NotAFile {
                path: path.to_owned(),
            }),
            ContentsPayload::File(file) => {
                if file.kind.as_deref().is_some_and(|kind| kind != "file") {
                    return Err(FetchError::NotAFile {
                        path: path.to_owned(),
                    });
                }
                let encoding = file.encoding.as_deref().unwrap_or("base64");
                if encoding != "base64" {
                    return Err(FetchError::Decode {
                        path: path.to_owned(),
                        reason: format!("unsupported encoding '{encoding}'"),
                    });
                }
                decode_content(path, file.content.as_deref().unwrap_or_default())
            }
        }
    }
}

impl ContentSource for GitHubClient {
    async fn fetch(&self, reference: &FileReference) -> Result<String, FetchError> {
        self.fetch_file_content(&reference.owner, &reference.repo, &reference.path)
            .await
    }
}

/// Fetch one file using a client built from `settings` for this call.
pub async fn fetch_file_content(
    settings: &Settings,
    owner: &str,
    repo: &str,
    path: &str,
) -> Result<String, FetchError> {
    GitHubClient::from_settings(settings)?
        .fetch_file_content(owner, repo, path)
        .await
}

/// Decode the API's base64 payload, which arrives wrapped at 60 columns.
pub fn decode_content(path: &str, encoded: &str) -> Result<String, FetchError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| FetchError::Decode {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|err| FetchError::Decode {
        path: path.to_owned(),
        reason: err.to_string(),
    })
}

/// In-memory files keyed by `owner/repo/path`, for tests and offline dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, owner: &str, repo: &str, path: &str, content: impl Into<String>) {
        self.files
            .insert(format!("{owner}/{repo}/{path}"), content.into());
    }

    pub fn with_file(mut self, owner: &str, repo: &str, path: &str, content: &str) -> Self {
        self.insert(owner, repo, path, content);
        self
    }
}

impl ContentSource for MemorySource {
    async fn fetch(&self, reference: &FileReference) -> Result<String, FetchError> {
        let key = format!("{}/{}/{}", reference.owner, reference.repo, reference.path);
        self.files.get(&key).cloned().ok_or(FetchError::Status {
            url: key,
            status: StatusCode::NOT_FOUND,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_url: &str) -> Settings {
        Settings {
            api_url: api_url.into(),
            ..Settings::default()
        }
    }

    #[test]
    fn decodes_wrapped_base64() {
        let encoded = "Zm4gbWFpbigpIHt9\nCi8vIGRvbmUK\n";
        assert_eq!(
            decode_content("main.rs", encoded).expect("valid base64"),
            "fn main() {}\n// done\n"
        );
    }

    #[test]
    fn rejects_invalid_base64_and_utf8() {
        assert!(matches!(
            decode_content("x", "not base64!"),
            Err(FetchError::Decode { .. })
        ));
        // 0xff 0xfe
        assert!(matches!(
            decode_content("x", "//4="),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn contents_url_encodes_segments() {
        let client =
            GitHubClient::from_settings(&settings("https://api.github.com/")).expect("client");
        let url = client.contents_url("octo", "demo", "docs/read me.md");
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/demo/contents/docs/read%20me.md"
        );
    }

    #[test]
    fn contents_url_keeps_enterprise_prefix() {
        let client = GitHubClient::from_settings(&settings("https://git.example.org/api/v3"))
            .expect("client");
        let url = client.contents_url("team", "svc", "/src/lib.rs");
        assert_eq!(
            url.as_str(),
            "https://git.example.org/api/v3/repos/team/svc/contents/src/lib.rs"
        );
    }

    #[test]
    fn rejects_unusable_api_url() {
        assert!(matches!(
            GitHubClient::from_settings(&settings("not a url")),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            GitHubClient::from_settings(&settings("mailto:someone@example.org")),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_token_with_control_characters() {
        let settings = Settings {
            access_token: "abc\ndef".into(),
            ..Settings::default()
        };
        assert!(matches!(
            GitHubClient::from_settings(&settings),
            Err(FetchError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn memory_source_serves_inserted_files() {
        let source = MemorySource::new().with_file("o", "r", "a.txt", "hello");
        let found = source.fetch(&FileReference::new("o", "r", "a.txt")).await;
        assert_eq!(found.expect("file exists"), "hello");

        let missing = source.fetch(&FileReference::new("o", "r", "b.txt")).await;
        assert!(matches!(missing, Err(FetchError::Status { .. })));
    }
}
