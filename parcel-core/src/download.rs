use std::path::{Path, PathBuf};

use reqwest::{header, Client, StatusCode};
use tracing::debug;

use crate::errors::{ParcelError, Result, Stage};

const FALLBACK_FILE_NAME: &str = "index.html";

/// A single download attempt: what to fetch, where to put it and how many
/// segments to split it into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    output_path: PathBuf,
    concurrency: usize,
}

/// What the probe learned about the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceMetadata {
    /// Declared `Content-Length`, 0 when unknown.
    pub total_size: u64,
    pub range_supported: bool,
}

impl DownloadRequest {
    /// Validates and builds a request. An empty `output_path` defaults to the
    /// last path component of the URL.
    pub fn new(
        url: impl Into<String>,
        output_path: impl AsRef<Path>,
        concurrency: usize,
    ) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ParcelError::InvalidRequest("url is empty".to_string()));
        }
        if concurrency == 0 {
            return Err(ParcelError::InvalidRequest(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let output_path = if output_path.as_ref().as_os_str().is_empty() {
            PathBuf::from(file_name_from_url(&url))
        } else {
            output_path.as_ref().to_path_buf()
        };
        if output_path.file_name().is_none() {
            return Err(ParcelError::InvalidRequest(format!(
                "output path {} does not name a file",
                output_path.display()
            )));
        }

        Ok(DownloadRequest {
            url,
            output_path,
            concurrency,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

/// Gets a file name from a download url
pub fn file_name_from_url(url: &str) -> String {
    let without_suffix = url
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let trimmed = without_suffix.trim_end_matches('/');

    // A bare host like "https://example.com" has no path to name the file.
    let path_part = match trimmed.find("://") {
        Some(scheme_end) => match trimmed[scheme_end + 3..].find('/') {
            Some(host_end) => &trimmed[scheme_end + 3 + host_end..],
            None => "",
        },
        None => trimmed,
    };

    match path_part.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name.to_string(),
        _ => String::from(FALLBACK_FILE_NAME),
    }
}

/// Issues a HEAD request and reports the resource size and whether it can be
/// fetched in byte ranges.
///
/// Only a failure to get any response is an error. A non-OK status, a missing
/// `Accept-Ranges: bytes` or an unknown size all come back as
/// `range_supported: false` so the caller can fall back to a plain GET.
pub async fn probe(client: &Client, url: &str) -> Result<ResourceMetadata> {
    let response = client
        .head(url)
        .send()
        .await
        .map_err(|e| ParcelError::connectivity(Stage::Probe, url, e))?;

    let status = response.status();
    let headers = response.headers();

    // Get size (Bytes)
    let total_size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);

    // Check if supports partial download
    let accepts_bytes = headers
        .get_all(header::ACCEPT_RANGES)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"));

    let metadata = ResourceMetadata {
        total_size,
        range_supported: status == StatusCode::OK && accepts_bytes && total_size > 0,
    };
    debug!(%url, %status, ?metadata, "probed resource");
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url_1() {
        let result = file_name_from_url("https://mirror.example.org/releases/v2/main.zip");

        assert_eq!(result, String::from("main.zip"));
    }

    #[test]
    fn test_file_name_from_url_2() {
        let result = file_name_from_url(
            "https://mirror.example.org/releases/v2/main.zip?lifetime=100&expire=4000",
        );

        assert_eq!(result, String::from("main.zip"));
    }

    #[test]
    fn test_file_name_from_url_3() {
        let result = file_name_from_url("https://mirror.example.org/releases/heads/");

        assert_eq!(result, String::from("heads"));
    }

    #[test]
    fn test_file_name_from_bare_host() {
        assert_eq!(
            file_name_from_url("https://example.com"),
            FALLBACK_FILE_NAME
        );
        assert_eq!(
            file_name_from_url("https://example.com/"),
            FALLBACK_FILE_NAME
        );
    }

    #[test]
    fn test_request_defaults_output_to_url_name() {
        let request =
            DownloadRequest::new("https://go.dev/dl/go1.18.3.linux-amd64.tar.gz", "", 4).unwrap();

        assert_eq!(
            request.output_path(),
            Path::new("go1.18.3.linux-amd64.tar.gz")
        );
        assert_eq!(request.concurrency(), 4);
    }

    #[test]
    fn test_request_keeps_explicit_output() {
        let request =
            DownloadRequest::new("https://hello.com/smallFile.zip", "downloads/small.zip", 2)
                .unwrap();

        assert_eq!(request.output_path(), Path::new("downloads/small.zip"));
    }

    #[test]
    fn test_request_rejects_zero_concurrency() {
        let result = DownloadRequest::new("https://hello.com/smallFile.zip", "", 0);

        assert!(matches!(result, Err(ParcelError::InvalidRequest(_))));
    }

    #[test]
    fn test_request_rejects_empty_url() {
        assert!(DownloadRequest::new("  ", "out.bin", 1).is_err());
    }
}
