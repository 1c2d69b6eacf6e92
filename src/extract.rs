//! Document-to-text extraction.
//!
//! Text and Markdown uploads are read directly and HTML is stripped locally.
//! PDF, Office, and image files go to a remote extraction service through the
//! [`TextExtractor`] trait. Every extractor answers with a structured
//! [`Extraction`]; the engine decides from `degraded` whether the text is
//! worth vectorizing.
//!
//! # Degraded output
//!
//! Text is degraded when either holds:
//!
//! | Check | Example |
//! |-------|---------|
//! | placeholder marker present | `[PDF document: a.pdf]` followed by `Size: 12.00 KB` |
//! | shorter than `min_content_chars` | an empty page or a one-line stub |
//!
//! # HTTP adapter
//!
//! [`HttpExtractor`] tries an ordered list of [`PayloadStrategy`]s and keeps
//! the first success. A generic failure moves on to the next strategy;
//! rejected credentials or throttling stop immediately, since another
//! payload shape will be refused the same way.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::ExtractionConfig;
use crate::error::{FailureKind, RagError, Result};

pub const MIME_PLAIN: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_HTML: &str = "text/html";
pub const MIME_JSON: &str = "application/json";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPT: &str = "application/vnd.ms-powerpoint";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_GIF: &str = "image/gif";
pub const MIME_WEBP: &str = "image/webp";

/// How an upload's bytes become text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// UTF-8 text used as is.
    Text,
    /// UTF-8 HTML, stripped locally.
    Html,
    /// Binary document sent to a [`TextExtractor`].
    Binary,
}

/// Decide how to read an upload, or `None` when the type is unsupported.
pub fn classify(mime: &str, name: &str) -> Option<ContentClass> {
    let name = name.to_lowercase();
    match mime {
        MIME_PLAIN | MIME_MARKDOWN => Some(ContentClass::Text),
        MIME_PDF => Some(ContentClass::Binary),
        MIME_HTML => Some(ContentClass::Html),
        _ if name.ends_with(".html") || name.ends_with(".htm") => Some(ContentClass::Html),
        m if m.starts_with("image/") => Some(ContentClass::Binary),
        m if is_office_mime(m) => Some(ContentClass::Binary),
        _ => None,
    }
}

/// Word, PowerPoint, and Excel documents in both legacy and OOXML form.
fn is_office_mime(mime: &str) -> bool {
    ["word", "document", "powerpoint", "presentation", "excel", "spreadsheet"]
        .iter()
        .any(|needle| mime.contains(needle))
}

/// Guess a MIME type from a file extension.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "text" | "log" => MIME_PLAIN,
        "md" | "markdown" => MIME_MARKDOWN,
        "html" | "htm" => MIME_HTML,
        "pdf" => MIME_PDF,
        "doc" => MIME_DOC,
        "docx" => MIME_DOCX,
        "ppt" => MIME_PPT,
        "pptx" => MIME_PPTX,
        "xls" => MIME_XLS,
        "xlsx" => MIME_XLSX,
        "png" => MIME_PNG,
        "jpg" | "jpeg" => MIME_JPEG,
        "gif" => MIME_GIF,
        "webp" => MIME_WEBP,
        "json" => MIME_JSON,
        _ => "application/octet-stream",
    }
}

/// Result of turning a document into text.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    /// True when `text` should be stored but not vectorized.
    pub degraded: bool,
    pub reason: Option<String>,
}

impl Extraction {
    /// Classify `text` against the placeholder marker and a minimum length.
    pub fn assess(text: String, min_content_chars: usize) -> Self {
        let reason = if has_placeholder_marker(&text) {
            Some("placeholder content returned by extractor".to_string())
        } else if text.trim().chars().count() < min_content_chars {
            Some(format!(
                "extracted text shorter than {} characters",
                min_content_chars
            ))
        } else {
            None
        };
        Self {
            text,
            degraded: reason.is_some(),
            reason,
        }
    }

    /// A placeholder description standing in for content that could not be
    /// extracted.
    pub fn placeholder(name: &str, mime: &str, size_bytes: u64, reason: impl Into<String>) -> Self {
        Self {
            text: placeholder_text(name, mime, size_bytes),
            degraded: true,
            reason: Some(reason.into()),
        }
    }
}

/// `[<label>: <name>]` followed by a `Size: <n> KB` line.
pub fn placeholder_text(name: &str, mime: &str, size_bytes: u64) -> String {
    // OOXML presentation and sheet types also contain "document".
    let label = if mime == MIME_PDF {
        "PDF document"
    } else if mime.starts_with("image/") {
        "Image"
    } else if mime.contains("powerpoint") || mime.contains("presentation") {
        "PowerPoint presentation"
    } else if mime.contains("excel") || mime.contains("spreadsheet") {
        "Excel spreadsheet"
    } else if mime.contains("word") || mime.contains("document") {
        "Word document"
    } else {
        "File"
    };
    format!(
        "[{}: {}]\nSize: {:.2} KB",
        label,
        name,
        size_bytes as f64 / 1024.0
    )
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[[^\]\n]+: [^\]\n]+\][ \t]*\r?\n[ \t]*Size: [0-9.]+ KB")
            .expect("valid placeholder regex")
    })
}

/// Whether `text` carries a placeholder file-description tag.
pub fn has_placeholder_marker(text: &str) -> bool {
    placeholder_regex().is_match(text)
}

/// Elements whose text never reaches the index.
const NOISE_TAGS: &[&str] = &["script", "style", "noscript", "template", "nav", "header", "footer"];

/// Elements that end a line of readable text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote",
    "section", "article", "main", "table", "ul", "ol", "dt", "dd",
];

/// Reduce an HTML page to its readable text.
///
/// The page is parsed into a DOM. The first element matching `main`,
/// `article`, `.content`, or `#content` in document order is kept whole,
/// otherwise the `<body>`. Script, style, nav, header, and footer subtrees
/// are dropped and entities are decoded by the parser.
pub fn strip_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let content = ["main, article, .content, #content", "body"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    collect_text(content, &mut text);
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(&text.text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if NOISE_TAGS.contains(&name) {
                continue;
            }
            collect_text(child, out);
            if BLOCK_TAGS.contains(&name) {
                out.push('\n');
            }
        }
    }
}

/// A collaborator that turns binary documents into text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from `bytes`.
    ///
    /// Returns [`RagError::ExtractionFailed`] when the service refuses or is
    /// unreachable; degraded but successful output is an `Ok` with
    /// `degraded` set.
    async fn extract(&self, name: &str, mime: &str, bytes: &[u8]) -> Result<Extraction>;
}

/// Payload shapes tried by [`HttpExtractor`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStrategy {
    /// JSON body `{filename, mimeType, data}` with base64 `data`.
    JsonBase64,
    /// The raw bytes as the request body, typed by `Content-Type`.
    RawBinary,
}

impl PayloadStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            PayloadStrategy::JsonBase64 => "json-base64",
            PayloadStrategy::RawBinary => "raw-binary",
        }
    }
}

/// Extraction service client.
pub struct HttpExtractor {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    min_content_chars: usize,
    strategies: Vec<PayloadStrategy>,
}

impl HttpExtractor {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            min_content_chars: 50,
            strategies: vec![PayloadStrategy::JsonBase64, PayloadStrategy::RawBinary],
        })
    }

    /// Build from config. `Ok(None)` when no service URL is configured.
    pub fn from_config(config: &ExtractionConfig) -> anyhow::Result<Option<Self>> {
        let Some(url) = &config.url else {
            return Ok(None);
        };
        let api_key = std::env::var(&config.api_key_env).ok();
        let extractor = Self::new(url.clone(), api_key, Duration::from_secs(config.timeout_secs))?
            .with_min_content_chars(config.min_content_chars);
        Ok(Some(extractor))
    }

    pub fn with_min_content_chars(mut self, min: usize) -> Self {
        self.min_content_chars = min;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<PayloadStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    async fn attempt(
        &self,
        strategy: PayloadStrategy,
        name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> std::result::Result<String, (FailureKind, String)> {
        let mut request = self.client.post(&self.url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        request = match strategy {
            PayloadStrategy::JsonBase64 => request.json(&serde_json::json!({
                "filename": name,
                "mimeType": mime,
                "data": base64::engine::general_purpose::STANDARD.encode(bytes),
            })),
            PayloadStrategy::RawBinary => request
                .header("Content-Type", mime)
                .header("X-Filename", name)
                .body(bytes.to_vec()),
        };

        let response = request
            .send()
            .await
            .map_err(|e| (FailureKind::Failed, e.to_string()))?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with(MIME_JSON));
        let body = response
            .text()
            .await
            .map_err(|e| (FailureKind::Failed, e.to_string()))?;

        if !status.is_success() {
            return Err((
                FailureKind::from_status(status.as_u16()),
                format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            ));
        }
        if is_json {
            return parse_extraction_body(&body).map_err(|e| (FailureKind::Failed, e));
        }
        Ok(body)
    }
}

/// Pull the text out of a JSON response (`text` or `content` field).
fn parse_extraction_body(body: &str) -> std::result::Result<String, String> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON response: {}", e))?;
    json.get("text")
        .or_else(|| json.get("content"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| "response has no text or content field".to_string())
}

#[async_trait]
impl TextExtractor for HttpExtractor {
    async fn extract(&self, name: &str, mime: &str, bytes: &[u8]) -> Result<Extraction> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            match self.attempt(*strategy, name, mime, bytes).await {
                Ok(text) => return Ok(Extraction::assess(text, self.min_content_chars)),
                Err((kind, message)) if !kind.is_retryable() => {
                    return Err(RagError::ExtractionFailed { kind, message });
                }
                Err((_, message)) => failures.push(format!("{}: {}", strategy.name(), message)),
            }
        }

        Err(RagError::ExtractionFailed {
            kind: FailureKind::Failed,
            message: if failures.is_empty() {
                "no payload strategies configured".to_string()
            } else {
                failures.join("; ")
            },
        })
    }
}
