//! Share-link resolution and downloads.
//!
//! Google Drive share links come in two shapes, `/file/d/<ID>/view` and
//! `?id=<ID>` (as used by `open?id=` and `uc?id=`); both are rewritten into
//! the same direct-download URL. Any other absolute http(s) URL is fetched
//! as-is. Drive's virus-scan warning for large files is confirmed once.

use std::{
    io::{self, Read, Write},
    sync::OnceLock,
    time::Duration,
};

use log::{debug, info};
use regex::Regex;
use reqwest::{
    StatusCode, Url,
    blocking::{Client, Response},
    header::CONTENT_TYPE,
};
use tempfile::NamedTempFile;

use crate::{error::DownloadError, format::FileFormat};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DRIVE_DOWNLOAD_BASE: &str = "https://drive.google.com/uc?export=download&id=";

static FILE_PATH_ID: OnceLock<Regex> = OnceLock::new();
static QUERY_ID: OnceLock<Regex> = OnceLock::new();
static CONFIRM_FORM: OnceLock<Regex> = OnceLock::new();
static HIDDEN_INPUT: OnceLock<Regex> = OnceLock::new();
static CONFIRM_LINK: OnceLock<Regex> = OnceLock::new();

const MAX_PAGE_BYTES: u64 = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLink {
    /// A share link rewritten into its direct-download form.
    Drive { file_id: String, download_url: String },
    /// Any other http(s) URL, used unchanged.
    Direct(String),
}

impl ResolvedLink {
    pub fn download_url(&self) -> &str {
        match self {
            ResolvedLink::Drive { download_url, .. } => download_url,
            ResolvedLink::Direct(url) => url,
        }
    }
}

/// Extracts the file id from a share link.
pub fn extract_file_id(link: &str) -> Option<String> {
    let path_id = FILE_PATH_ID
        .get_or_init(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)").expect("valid file id pattern"));
    let query_id = QUERY_ID
        .get_or_init(|| Regex::new(r"[?&]id=([A-Za-z0-9_-]+)").expect("valid query id pattern"));
    path_id
        .captures(link)
        .or_else(|| query_id.captures(link))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn resolve_link(link: &str) -> Result<ResolvedLink, DownloadError> {
    let trimmed = link.trim();
    let is_http = trimmed.starts_with("https://") || trimmed.starts_with("http://");
    if is_http && trimmed.contains("drive.google.com") {
        return extract_file_id(trimmed)
            .map(|file_id| ResolvedLink::Drive {
                download_url: format!("{DRIVE_DOWNLOAD_BASE}{file_id}"),
                file_id,
            })
            .ok_or_else(|| DownloadError::InvalidLink(trimmed.to_string()));
    }
    if is_http {
        Ok(ResolvedLink::Direct(trimmed.to_string()))
    } else {
        Err(DownloadError::InvalidLink(trimmed.to_string()))
    }
}

/// A downloaded body on disk. The file is removed when this is dropped.
#[derive(Debug)]
pub struct Download {
    pub file: NamedTempFile,
    pub bytes: u64,
    pub content_type: Option<String>,
}

/// Maps a non-success status to its download error.
pub fn classify_status(url: &str, status: StatusCode) -> Option<DownloadError> {
    if status.is_success() {
        return None;
    }
    let url = url.to_string();
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DownloadError::Forbidden {
            url,
            status: status.as_u16(),
        },
        StatusCode::NOT_FOUND => DownloadError::NotFound { url },
        other => DownloadError::HttpStatus {
            url,
            status: other.as_u16(),
        },
    })
}

/// Fetches `url` into a temporary file whose suffix matches `format` (when
/// known), failing after `timeout` instead of hanging.
///
/// Drive answers large files with an HTML virus-scan warning instead of the
/// file. The confirmation form on that page is followed once.
pub fn download(
    url: &str,
    format: Option<FileFormat>,
    timeout: Duration,
) -> Result<Download, DownloadError> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| DownloadError::Unreachable {
            url: url.to_string(),
            message: err.to_string(),
        })?;
    info!("Downloading {url}");
    let response = fetch(&client, url, timeout)?;
    let response = match html_content_type(&response) {
        None => response,
        Some(content_type) => {
            let page = read_page(response, url, timeout)?;
            let Some(confirmed) = confirmation_url(url, &page) else {
                // Private files and sign-in walls also come back as HTML.
                return Err(DownloadError::NotAFile {
                    url: url.to_string(),
                    content_type,
                });
            };
            info!("Confirming virus-scan warning for {url}");
            let retried = fetch(&client, &confirmed, timeout)?;
            if html_content_type(&retried).is_some() {
                return Err(DownloadError::ScanWarning {
                    url: url.to_string(),
                });
            }
            retried
        }
    };
    store(response, url, format, timeout)
}

fn fetch(client: &Client, url: &str, timeout: Duration) -> Result<Response, DownloadError> {
    let response = client
        .get(url)
        .send()
        .map_err(|err| transport_error(url, timeout, err))?;
    match classify_status(url, response.status()) {
        Some(err) => Err(err),
        None => Ok(response),
    }
}

fn html_content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|ct| ct.starts_with("text/html"))
        .map(str::to_string)
}

fn read_page(response: Response, url: &str, timeout: Duration) -> Result<String, DownloadError> {
    let mut bytes = Vec::new();
    response
        .take(MAX_PAGE_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|err| match err.kind() {
            io::ErrorKind::TimedOut => DownloadError::Timeout {
                url: url.to_string(),
                seconds: timeout.as_secs(),
            },
            _ => DownloadError::Unreachable {
                url: url.to_string(),
                message: err.to_string(),
            },
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Builds the URL that the confirmation form of a virus-scan warning page
/// submits to. Returns `None` for HTML pages without such a form.
pub fn confirmation_url(page_url: &str, html: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let form = CONFIRM_FORM
        .get_or_init(|| {
            Regex::new(r#"(?s)<form[^>]*\baction="([^"]+)"[^>]*>(.*?)</form>"#)
                .expect("valid form pattern")
        })
        .captures_iter(html)
        .find(|caps| caps[2].contains("confirm"));
    if let Some(form) = form {
        let fields = HIDDEN_INPUT
            .get_or_init(|| {
                Regex::new(r#"<input[^>]*\bname="([^"]+)"[^>]*\bvalue="([^"]*)""#)
                    .expect("valid input pattern")
            })
            .captures_iter(&form[2])
            .map(|caps| (unescape(&caps[1]), unescape(&caps[2])))
            .collect::<Vec<_>>();
        let mut action = base.join(&unescape(&form[1])).ok()?;
        action.query_pairs_mut().extend_pairs(fields);
        return Some(action.to_string());
    }

    // Older pages link straight to `uc?export=download&confirm=<token>`.
    let link = CONFIRM_LINK
        .get_or_init(|| {
            Regex::new(r#"href="([^"]*export=download[^"]*confirm=[^"]*)""#)
                .expect("valid confirm link pattern")
        })
        .captures(html)?;
    base.join(&unescape(&link[1])).ok().map(String::from)
}

fn unescape(value: &str) -> String {
    value.replace("&amp;", "&").replace("&quot;", "\"")
}

fn store(
    mut response: Response,
    url: &str,
    format: Option<FileFormat>,
    timeout: Duration,
) -> Result<Download, DownloadError> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let suffix = format
        .map(|f| format!(".{}", f.extension()))
        .unwrap_or_default();
    let storage = |source| DownloadError::Storage {
        url: url.to_string(),
        source,
    };
    let mut file = tempfile::Builder::new()
        .prefix("taxi-lens-")
        .suffix(&suffix)
        .tempfile()
        .map_err(storage)?;
    let bytes = response
        .copy_to(file.as_file_mut())
        .map_err(|err| transport_error(url, timeout, err))?;
    file.as_file_mut().flush().map_err(storage)?;
    debug!("Stored {bytes} byte(s) from {url} at {:?}", file.path());
    Ok(Download {
        file,
        bytes,
        content_type,
    })
}

fn transport_error(url: &str, timeout: Duration, err: reqwest::Error) -> DownloadError {
    if err.is_timeout() {
        DownloadError::Timeout {
            url: url.to_string(),
            seconds: timeout.as_secs(),
        }
    } else {
        DownloadError::Unreachable {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
