//! Request snapshot the routing layer classifies, and a buffered response type
//! for hosts without a native one.
//!
//! [`Request`] mirrors the parts of the Fetch API routing looks at. The browser
//! keeps its own live request and response objects alongside; [`Response`]
//! backs the in-memory storage, with the body held as `Bytes` so a stored copy
//! shares one buffer with the original.

use bytes::Bytes;
use url::Url;

use crate::error::{CacheError, Result};

/// `Request.mode` as reported by the browser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
    Other(String),
}

impl RequestMode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "navigate" => Self::Navigate,
            "same-origin" => Self::SameOrigin,
            "no-cors" => Self::NoCors,
            "cors" => Self::Cors,
            other => Self::Other(other.to_string()),
        }
    }
}

/// `Request.destination` as reported by the browser. The empty string maps to
/// `None` (plain `fetch()` calls).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    None,
    Document,
    Script,
    Style,
    Worker,
    Module,
    Image,
    Audio,
    Font,
    Other(String),
}

impl Destination {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" => Self::None,
            "document" => Self::Document,
            "script" => Self::Script,
            "style" => Self::Style,
            "worker" => Self::Worker,
            "module" => Self::Module,
            "image" => Self::Image,
            "audio" => Self::Audio,
            "font" => Self::Font,
            other => Self::Other(other.to_string()),
        }
    }

    /// Resources the page cannot boot without.
    pub fn is_boot_critical(&self) -> bool {
        matches!(self, Self::Script | Self::Style | Self::Worker | Self::Module)
    }

    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Audio | Self::Font)
    }
}

/// Ordered header list with case-insensitive lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace any existing value for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.0.push((name, value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

#[derive(Clone, Debug)]
pub struct Request {
    pub url: Url,
    pub method: String,
    pub mode: RequestMode,
    pub destination: Destination,
    pub headers: Headers,
}

impl Request {
    /// Plain `GET` with no declared destination.
    pub fn get(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| CacheError::invalid_url(url, e))?;
        Ok(Self::from_url(parsed))
    }

    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            mode: RequestMode::Cors,
            destination: Destination::None,
            headers: Headers::new(),
        }
    }

    /// Top-level document load.
    pub fn navigate(url: &str) -> Result<Self> {
        Ok(Self::get(url)?
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document))
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// Fully buffered response.
#[derive(Clone, Debug)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: String::new(),
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// 200 response with the given content type.
    pub fn ok_with_type(content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut response = Self::new(200, body);
        response.headers.insert("content-type", content_type);
        response
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Mirrors `Response.ok`.
    pub fn ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn content_type(&self) -> &str {
        self.headers.get("content-type").unwrap_or("")
    }

    /// True when the response declares an HTML body.
    pub fn is_html(&self) -> bool {
        self.content_type().to_ascii_lowercase().contains("text/html")
    }

    /// Lossy UTF-8 view of the body.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
