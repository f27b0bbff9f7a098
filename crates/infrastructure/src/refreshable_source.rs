use filterdns_domain::FilterError;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// A URL-backed, file-cached text blob with staleness and atomic replacement
/// (spec §4.1).
pub struct RefreshableSource {
    path: PathBuf,
    url: String,
    staleness: Duration,
    timeout: Duration,
    max_size: u64,
    client: reqwest::Client,
}

impl RefreshableSource {
    pub fn new(
        path: impl Into<PathBuf>,
        url: impl Into<String>,
        staleness: Duration,
        timeout: Duration,
        max_size: u64,
        client: reqwest::Client,
    ) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            staleness,
            timeout,
            max_size,
            client,
        }
    }

    fn is_fresh(&self) -> bool {
        let Ok(meta) = std::fs::metadata(&self.path) else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return false;
        };
        modified + self.staleness > SystemTime::now()
    }

    fn cached_text(&self) -> Option<String> {
        std::fs::read_to_string(&self.path).ok()
    }

    /// Returns cached text when `accept_stale` is true and a cache file
    /// exists, or when the cache is still fresh; otherwise re-fetches `url`,
    /// validates the body, and atomically replaces the cache file.
    pub async fn refresh(&self, accept_stale: bool) -> Result<String, FilterError> {
        if self.path.exists() && (accept_stale || self.is_fresh()) {
            if let Some(text) = self.cached_text() {
                return Ok(text);
            }
        }

        let fetch = async {
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| FilterError::Fetch {
                    url: self.url.clone(),
                    message: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FilterError::UnexpectedStatus {
                    status: status.as_u16(),
                });
            }

            if let Some(len) = response.content_length() {
                if len > self.max_size {
                    return Err(FilterError::BodyTooLarge {
                        limit: self.max_size,
                    });
                }
            }

            let bytes = response.bytes().await.map_err(|e| FilterError::Fetch {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

            if bytes.len() as u64 > self.max_size {
                return Err(FilterError::BodyTooLarge {
                    limit: self.max_size,
                });
            }

            let text = String::from_utf8_lossy(&bytes).into_owned();
            if text.trim().is_empty() {
                return Err(FilterError::EmptyBody);
            }

            Ok(text)
        };

        let text = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FilterError::Timeout),
        }?;

        self.write_atomic(&text).await?;
        info!(url = %self.url, bytes = text.len(), "refreshed rule list source");
        Ok(text)
    }

    /// Writes `text` to a temp file in the cache directory and renames it
    /// over `self.path`. The temp file and rename live in the same
    /// directory so the replace is atomic on POSIX filesystems.
    async fn write_atomic(&self, text: &str) -> Result<(), FilterError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| FilterError::Io(std::io::Error::other("cache path has no parent")))?;
        tokio::fs::create_dir_all(dir).await?;

        let tmp_path = tmp_path_for(&self.path);
        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(text.as_bytes()).await?;
            file.flush().await?;
            tokio::fs::rename(&tmp_path, &self.path).await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            warn!(path = %self.path.display(), error = %e, "failed to persist refreshed source");
            return Err(FilterError::Io(e));
        }

        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| format!(".{}.tmp", n.to_string_lossy()))
        .unwrap_or_else(|| ".refresh.tmp".to_string());
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> reqwest::Client {
        reqwest::Client::builder().build().unwrap()
    }

    #[tokio::test]
    async fn accepts_stale_cache_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(&path, "||example.com^\n").unwrap();

        let source = RefreshableSource::new(
            &path,
            "http://127.0.0.1:0/unreachable",
            Duration::from_secs(0),
            Duration::from_secs(1),
            1024,
            client(),
        );

        let text = source.refresh(true).await.unwrap();
        assert_eq!(text, "||example.com^\n");
    }

    #[tokio::test]
    async fn fresh_cache_short_circuits_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(&path, "fresh\n").unwrap();

        let source = RefreshableSource::new(
            &path,
            "http://127.0.0.1:0/unreachable",
            Duration::from_secs(3600),
            Duration::from_secs(1),
            1024,
            client(),
        );

        let text = source.refresh(false).await.unwrap();
        assert_eq!(text, "fresh\n");
    }
}
