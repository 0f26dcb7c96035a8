//! Host capabilities the controller is written against.
//!
//! The browser provides these through `fetch` and `caches`; native tests use
//! [`MemoryCacheStorage`] and a scripted network.

#![allow(async_fn_in_trait)]

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::error::{CacheError, Result};
use crate::request::{Request, Response};

/// What the controller needs to know about a response. Hosts keep their own
/// response type so the page receives the live network response untouched.
pub trait HttpResponse: Sized {
    fn status(&self) -> u16;

    fn content_type(&self) -> Option<String>;

    /// Mirrors `Response.ok`.
    fn ok(&self) -> bool {
        (200..=299).contains(&self.status())
    }

    /// True when the response declares an HTML body.
    fn is_html(&self) -> bool {
        self.content_type()
            .is_some_and(|t| t.to_ascii_lowercase().contains("text/html"))
    }

    /// Independent copy with its own body, for storing while the original is
    /// handed on. Fails if the body was already consumed.
    fn duplicate(&self) -> Result<Self>;

    async fn into_text(self) -> Result<String>;
}

pub trait Network {
    /// Host handle of an intercepted request. Fetching through it keeps the
    /// page's mode, credentials and redirect settings.
    type Source;
    type Response: HttpResponse;

    /// Issue the request, through `source` when there is one. `Err` means the
    /// transport failed; HTTP error statuses come back as `Ok`.
    async fn fetch(
        &self,
        request: &Request,
        source: Option<&Self::Source>,
    ) -> Result<Self::Response>;
}

/// Named cache buckets holding responses keyed by absolute URL. Each
/// operation is atomic on its own.
pub trait CacheStorage {
    type Response;

    /// Create the bucket if absent.
    async fn open(&self, generation: &str) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;
    /// Returns whether a bucket was removed.
    async fn delete(&self, generation: &str) -> Result<bool>;
    async fn put(&self, generation: &str, key: &str, response: Self::Response) -> Result<()>;
    async fn lookup(&self, generation: &str, key: &str) -> Result<Option<Self::Response>>;
}

impl HttpResponse for Response {
    fn status(&self) -> u16 {
        self.status
    }

    fn content_type(&self) -> Option<String> {
        self.headers.get("content-type").map(str::to_string)
    }

    fn duplicate(&self) -> Result<Self> {
        Ok(self.clone())
    }

    async fn into_text(self) -> Result<String> {
        Ok(self.text())
    }
}

/// In-process cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    buckets: RefCell<BTreeMap<String, BTreeMap<String, Response>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in `generation` (0 when the bucket does not exist).
    pub fn len(&self, generation: &str) -> usize {
        self.buckets
            .borrow()
            .get(generation)
            .map_or(0, BTreeMap::len)
    }

    pub fn contains(&self, generation: &str, key: &str) -> bool {
        self.buckets
            .borrow()
            .get(generation)
            .is_some_and(|bucket| bucket.contains_key(key))
    }
}

impl CacheStorage for MemoryCacheStorage {
    type Response = Response;

    async fn open(&self, generation: &str) -> Result<()> {
        self.buckets
            .borrow_mut()
            .entry(generation.to_string())
            .or_default();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.buckets.borrow().keys().cloned().collect())
    }

    async fn delete(&self, generation: &str) -> Result<bool> {
        Ok(self.buckets.borrow_mut().remove(generation).is_some())
    }

    async fn put(&self, generation: &str, key: &str, response: Response) -> Result<()> {
        let mut buckets = self.buckets.borrow_mut();
        let bucket = buckets
            .get_mut(generation)
            .ok_or_else(|| CacheError::storage("put", format!("no cache named {generation}")))?;
        bucket.insert(key.to_string(), response);
        Ok(())
    }

    async fn lookup(&self, generation: &str, key: &str) -> Result<Option<Response>> {
        Ok(self
            .buckets
            .borrow()
            .get(generation)
            .and_then(|bucket| bucket.get(key))
            .cloned())
    }
}
