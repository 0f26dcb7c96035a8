//! Error types for the cache controller.

use wasm_bindgen::JsValue;

/// Error type for cache controller operations.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// Transport-level failure (offline, DNS, aborted). HTTP error statuses are
    /// not errors; they arrive as ordinary responses.
    #[error("network request for {url} failed: {message}")]
    Network {
        /// URL that was being fetched
        url: String,
        /// Description of the failure reported by the host
        message: String,
    },

    /// A boot-critical request would have been answered with an HTML document.
    #[error("cached response for {path} is HTML, not an asset")]
    HtmlForAsset {
        /// Path of the script/style/module request that was refused
        path: String,
    },

    /// Cache storage operation failed
    #[error("cache storage {operation} failed: {message}")]
    Storage {
        /// Operation that failed (e.g. "open", "put", "delete")
        operation: String,
        /// Error message from the storage backend
        message: String,
    },

    /// Configuration or validation error
    #[error("cache configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// A request or bundle URL could not be parsed
    #[error("invalid url {url}")]
    InvalidUrl {
        /// The offending input
        url: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// Worker lifecycle was driven out of order
    #[error("invalid lifecycle transition from {from} to {to}")]
    Lifecycle {
        /// State the worker was in
        from: &'static str,
        /// State that was requested
        to: &'static str,
    },

    /// Untyped failure raised by a browser API
    #[error("{operation} failed: {message}")]
    Js {
        /// Browser API that raised
        operation: String,
        /// Stringified JS error value
        message: String,
    },
}

impl CacheError {
    /// Create a network error
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an HTML-for-asset refusal
    #[must_use]
    pub fn html_for_asset(path: impl Into<String>) -> Self {
        Self::HtmlForAsset { path: path.into() }
    }

    /// Create a storage error
    #[must_use]
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an invalid url error
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }

    /// Wrap a JS exception raised by `operation`
    #[must_use]
    pub fn js(operation: impl Into<String>, error: &JsValue) -> Self {
        Self::Js {
            operation: operation.into(),
            message: js_err(error),
        }
    }

    /// True for transport failures (the "offline" branch of every strategy).
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl From<CacheError> for JsValue {
    fn from(error: CacheError) -> Self {
        js_sys::Error::new(&error.to_string()).into()
    }
}

/// Best-effort string form of a thrown JS value.
pub(crate) fn js_err(error: &JsValue) -> String {
    if let Some(value) = error.as_string() {
        return value;
    }
    if let Some(err) = wasm_bindgen::JsCast::dyn_ref::<js_sys::Error>(error) {
        return String::from(err.message());
    }
    if let Ok(json) = js_sys::JSON::stringify(error) {
        if let Some(value) = json.as_string() {
            return value;
        }
    }
    "js error".to_string()
}

/// Result type for cache controller operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_resource() {
        let err = CacheError::html_for_asset("/assets/index-abc.js");
        assert_eq!(
            err.to_string(),
            "cached response for /assets/index-abc.js is HTML, not an asset"
        );
        let err = CacheError::network("https://example.com/a.png", "offline");
        assert!(err.is_network());
        assert!(err.to_string().contains("https://example.com/a.png"));
    }
}
