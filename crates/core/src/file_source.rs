//! `FileSource` (§4.9): the polymorphic collaborator the rolodex opens files
//! through. `LocalFs` walks a directory tree with `walkdir`; `RemoteFs`
//! fetches over HTTP with a blocking `reqwest` client (see §12 for why
//! blocking, not async, matches this crate's concurrency model); an
//! in-memory double backs tests (§14).

use indexmap::IndexMap;
use rolodex_util::error::{IndexingError, IndexingErrorKind};
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use url::Url;

/// Fetches the raw text of a document by absolute key (a path or URL).
/// Parsing and indexing happen one layer up, in
/// [`crate::rolodex::Rolodex::open`], so every implementation only needs to
/// answer "what bytes live at this key".
pub trait FileSource: Send + Sync {
    fn fetch(&self, key: &str) -> Result<String, IndexingError>;

    /// Whether `key` looks like something this source can serve, used by the
    /// rolodex to pick a source for a given absolute lookup key.
    fn handles(&self, key: &str) -> bool;

    /// Keys this source can enumerate up front, for callers that want to
    /// pre-index everything a source knows about rather than waiting for a
    /// `$ref` to trigger each open (§4.9). Most sources have nothing to
    /// enumerate; `LocalFs` overrides this with its base-directory walk.
    fn discover(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Reads files from the local filesystem, optionally rooted at `base_path`.
pub struct LocalFs {
    pub base_path: Option<PathBuf>,
}

impl LocalFs {
    pub fn new(base_path: Option<PathBuf>) -> Self {
        Self { base_path }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let path = Path::new(key);
        match &self.base_path {
            Some(base) => rolodex_util::paths::normalize_path(base, path),
            None => rolodex_util::paths::expand_home(path).into_owned(),
        }
    }

    /// Enumerate every `.yaml`/`.yml`/`.json` file under `base_path`, for
    /// callers that want to pre-index a whole directory tree rather than
    /// following references on demand.
    pub fn walk_base_directory(&self) -> Vec<PathBuf> {
        let Some(base) = &self.base_path else { return Vec::new() };
        walkdir::WalkDir::new(base)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                matches!(
                    entry.path().extension().and_then(std::ffi::OsStr::to_str),
                    Some("yaml" | "yml" | "json")
                )
            })
            .map(|entry| entry.path().to_path_buf())
            .collect()
    }
}

impl FileSource for LocalFs {
    fn fetch(&self, key: &str) -> Result<String, IndexingError> {
        let path = self.resolve(key);
        std::fs::read_to_string(&path).map_err(|error| {
            IndexingError::new(
                IndexingErrorKind::FetchFailure {
                    url: path.display().to_string(),
                    reason: error.to_string(),
                    source: Some(Box::new(error)),
                },
                key.to_owned(),
            )
        })
    }

    fn handles(&self, key: &str) -> bool {
        !key.starts_with("http:") && !key.starts_with("https:")
    }

    fn discover(&self) -> Vec<String> {
        self.walk_base_directory()
            .into_iter()
            .map(|path| path.display().to_string())
            .collect()
    }
}

/// Fetches files over HTTP(S), joining relative keys against `base_url`.
pub struct RemoteFs {
    pub base_url: Option<Url>,
    client: reqwest::blocking::Client,
    last_modified: Mutex<IndexMap<String, String>>,
}

impl RemoteFs {
    pub fn new(base_url: Option<Url>, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { base_url, client, last_modified: Mutex::new(IndexMap::new()) }
    }

    fn resolve_url(&self, key: &str) -> Result<Url, IndexingError> {
        if let Ok(url) = Url::parse(key) {
            return Ok(url);
        }
        self.base_url
            .as_ref()
            .and_then(|base| base.join(key).ok())
            .ok_or_else(|| {
                IndexingError::new(
                    IndexingErrorKind::FetchFailure {
                        url: key.to_owned(),
                        reason: "no base URL to resolve relative remote ref"
                            .to_owned(),
                        source: None,
                    },
                    key.to_owned(),
                )
            })
    }

    pub fn last_modified(&self, key: &str) -> Option<String> {
        self.last_modified.lock().unwrap().get(key).cloned()
    }
}

impl FileSource for RemoteFs {
    fn fetch(&self, key: &str) -> Result<String, IndexingError> {
        let url = self.resolve_url(key)?;
        let response = self.client.get(url.clone()).send().map_err(|error| {
            IndexingError::new(
                IndexingErrorKind::FetchFailure {
                    url: url.to_string(),
                    reason: error.to_string(),
                    source: Some(Box::new(error)),
                },
                key.to_owned(),
            )
        })?;
        if let Some(last_modified) = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
        {
            self.last_modified
                .lock()
                .unwrap()
                .insert(key.to_owned(), last_modified.to_owned());
        }
        if response.status().as_u16() >= 400 {
            return Err(IndexingError::new(
                IndexingErrorKind::FetchFailure {
                    url: url.to_string(),
                    reason: format!("HTTP {}", response.status()),
                    source: None,
                },
                key.to_owned(),
            ));
        }
        response.text().map_err(|error| {
            IndexingError::new(
                IndexingErrorKind::FetchFailure {
                    url: url.to_string(),
                    reason: error.to_string(),
                    source: Some(Box::new(error)),
                },
                key.to_owned(),
            )
        })
    }

    fn handles(&self, key: &str) -> bool {
        key.starts_with("http:") || key.starts_with("https:")
    }
}

/// An in-memory source keyed by exact path string, for tests that exercise
/// reference resolution and rolodex federation without touching disk or
/// network.
#[derive(Default)]
pub struct InMemoryFs {
    pub files: IndexMap<String, String>,
}

impl InMemoryFs {
    pub fn new(files: impl IntoIterator<Item = (String, String)>) -> Self {
        Self { files: files.into_iter().collect() }
    }
}

impl FileSource for InMemoryFs {
    fn fetch(&self, key: &str) -> Result<String, IndexingError> {
        self.files.get(key).cloned().ok_or_else(|| {
            IndexingError::new(
                IndexingErrorKind::FetchFailure {
                    url: key.to_owned(),
                    reason: "not present in in-memory source".to_owned(),
                    source: None,
                },
                key.to_owned(),
            )
        })
    }

    fn handles(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_fs_resolves_relative_path_against_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pet.yaml"), "type: object\n").unwrap();
        let source = LocalFs::new(Some(dir.path().to_path_buf()));
        let content = source.fetch("pet.yaml").unwrap();
        assert_eq!(content, "type: object\n");
    }

    #[test]
    fn local_fs_discovers_every_yaml_and_json_file_under_its_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pet.yaml"), "type: object\n").unwrap();
        std::fs::write(dir.path().join("owner.json"), "{}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me\n").unwrap();
        let source = LocalFs::new(Some(dir.path().to_path_buf()));
        let mut discovered = source.discover();
        discovered.sort();
        assert_eq!(discovered.len(), 2);
        assert!(discovered.iter().any(|key| key.ends_with("pet.yaml")));
        assert!(discovered.iter().any(|key| key.ends_with("owner.json")));
    }

    #[test]
    fn local_fs_missing_file_is_a_fetch_failure() {
        let source = LocalFs::new(None);
        assert!(source.fetch("/does/not/exist.yaml").is_err());
    }

    #[test]
    fn in_memory_fs_serves_registered_keys_only() {
        let source = InMemoryFs::new([(
            "pet.yaml".to_owned(),
            "type: object\n".to_owned(),
        )]);
        assert!(source.handles("pet.yaml"));
        assert!(!source.handles("other.yaml"));
        assert!(source.fetch("other.yaml").is_err());
    }

    #[test]
    fn remote_fs_fetches_from_its_base_url_and_records_last_modified() {
        use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(matchers::method("GET"))
                .and(matchers::path("/pet.yaml"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string("type: object\n")
                        .insert_header(
                            "Last-Modified",
                            "Tue, 01 Jan 2030 00:00:00 GMT",
                        ),
                )
                .mount(&server)
                .await;

            let base_url = Url::parse(&server.uri()).unwrap();
            let (content, last_modified) = tokio::task::spawn_blocking(move || {
                let source = RemoteFs::new(Some(base_url), Duration::from_secs(5));
                let content = source.fetch("pet.yaml");
                let last_modified = source.last_modified("pet.yaml");
                (content, last_modified)
            })
            .await
            .unwrap();
            assert_eq!(content.unwrap(), "type: object\n");
            assert_eq!(last_modified, Some("Tue, 01 Jan 2030 00:00:00 GMT".to_owned()));
        });
    }

    #[test]
    fn remote_fs_maps_an_http_error_status_to_a_fetch_failure() {
        use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(matchers::method("GET"))
                .and(matchers::path("/missing.yaml"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let base_url = Url::parse(&server.uri()).unwrap();
            let result = tokio::task::spawn_blocking(move || {
                let source = RemoteFs::new(Some(base_url), Duration::from_secs(5));
                source.fetch("missing.yaml")
            })
            .await
            .unwrap();
            assert!(result.is_err());
        });
    }
}
