//! Downloading remote artifacts.

use std::fs::File;
use std::io::Write;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Something that can stream the bytes behind a URL.
pub trait Fetcher: Send + Sync {
    /// Copy the resource at `url` into `dest`, returning the bytes written.
    fn fetch(&self, url: &Url, dest: &mut dyn Write) -> Result<u64>;
}

/// Fetches `http(s)://` URLs with a blocking reqwest client and `file://`
/// URLs from the local filesystem.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("keel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Fetch {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(HttpFetcher { client })
    }

    fn fetch_file(&self, url: &Url, dest: &mut dyn Write) -> Result<u64> {
        let fetch_err = |message: String| Error::Fetch {
            url: url.to_string(),
            message,
        };
        let path = url
            .to_file_path()
            .map_err(|_| fetch_err("not a local file path".to_string()))?;
        let mut file = File::open(&path).map_err(|e| fetch_err(e.to_string()))?;
        std::io::copy(&mut file, dest).map_err(|e| fetch_err(e.to_string()))
    }

    fn fetch_http(&self, url: &Url, dest: &mut dyn Write) -> Result<u64> {
        let fetch_err = |message: String| Error::Fetch {
            url: url.to_string(),
            message,
        };
        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| fetch_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }

        response
            .copy_to(dest)
            .map_err(|e| fetch_err(format!("failed to read response body: {}", e)))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url, dest: &mut dyn Write) -> Result<u64> {
        match url.scheme() {
            "file" => self.fetch_file(url, dest),
            "http" | "https" => self.fetch_http(url, dest),
            other => Err(Error::Fetch {
                url: url.to_string(),
                message: format!("unsupported URL scheme `{}`", other),
            }),
        }
    }
}
