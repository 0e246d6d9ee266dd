use crate::error::{MatchError, Result};
use base64::Engine;
use image::{DynamicImage, ImageReader};
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Where an uploaded image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
    /// `file://`, `data:` or, with a [`UrlFetcher`], `http(s)://`.
    Url(String),
}

/// Network access for `http(s)` image URLs, supplied by the host application.
pub trait UrlFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;
}

impl ImageSource {
    /// Interpret a command-line style argument: anything with a scheme is a
    /// URL, everything else a filesystem path.
    pub fn parse(input: &str) -> Self {
        if input.starts_with("data:") || input.contains("://") {
            ImageSource::Url(input.to_string())
        } else {
            ImageSource::Path(PathBuf::from(input))
        }
    }

    /// Like [`ImageSource::parse`], but relative paths are resolved against `base`.
    pub fn parse_relative(input: &str, base: &Path) -> Self {
        match Self::parse(input) {
            ImageSource::Path(path) if path.is_relative() => ImageSource::Path(base.join(path)),
            other => other,
        }
    }

    /// Raw encoded bytes of the image.
    pub fn read_bytes(&self, fetcher: Option<&dyn UrlFetcher>) -> Result<Vec<u8>> {
        match self {
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::Path(path) => read_file(path),
            ImageSource::Url(url) => read_url(url, fetcher),
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            ImageSource::Path(path) => write!(f, "{}", path.display()),
            ImageSource::Url(url) if url.starts_with("data:") => write!(f, "data: URL"),
            ImageSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Decode encoded bytes, sniffing the format from the content.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(MatchError::image_load("empty input"));
    }
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(MatchError::image_load)?
        .decode()
        .map_err(MatchError::image_load)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| MatchError::image_load(format!("{}: {}", path.display(), e)))
}

fn read_url(url: &str, fetcher: Option<&dyn UrlFetcher>) -> Result<Vec<u8>> {
    if let Some(rest) = url.strip_prefix("file://") {
        return read_file(Path::new(rest));
    }
    if let Some(rest) = url.strip_prefix("data:") {
        return decode_data_url(url, rest);
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        let fetcher = fetcher.ok_or_else(|| MatchError::unsupported(url))?;
        return fetcher
            .fetch(url)
            .map_err(|e| MatchError::image_load(format!("{}: {}", url, e)));
    }
    Err(MatchError::unsupported(url))
}

fn decode_data_url(url: &str, rest: &str) -> Result<Vec<u8>> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| MatchError::unsupported(truncate(url)))?;
    if !meta.ends_with(";base64") {
        return Err(MatchError::unsupported(truncate(url)));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(MatchError::image_load)
}

fn truncate(url: &str) -> String {
    url.chars().take(48).collect()
}
