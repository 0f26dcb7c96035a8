//! Request classification and the per-class caching policy table.

use crate::request::{Destination, RequestMode};

/// Every intercepted request falls into exactly one class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// Full-page HTML load.
    Navigation,
    /// Script, style, worker, module, or anything under the asset directory.
    BootCritical,
    /// Image, audio, font.
    Media,
    Other,
}

impl RequestClass {
    /// Pure classification over the request's mode, path and declared
    /// destination. Checks run in priority order, so an image below the asset
    /// prefix is boot-critical.
    pub fn classify(
        mode: &RequestMode,
        path: &str,
        destination: &Destination,
        asset_prefix: &str,
    ) -> Self {
        if *mode == RequestMode::Navigate {
            return Self::Navigation;
        }
        if destination.is_boot_critical()
            || path.starts_with(asset_prefix)
            || is_bundle_path(path)
        {
            return Self::BootCritical;
        }
        if destination.is_media() {
            return Self::Media;
        }
        Self::Other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::BootCritical => "boot-critical",
            Self::Media => "media",
            Self::Other => "other",
        }
    }
}

/// Path ends with one of the bundle extensions.
pub fn is_bundle_path(path: &str) -> bool {
    path.ends_with(".js") || path.ends_with(".mjs") || path.ends_with(".css")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Try the network; consult the cache only when the network fails.
    NetworkFirst,
    /// Serve from cache when present; otherwise fetch and store.
    CacheFirst,
}

/// Key a response is stored and looked up under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheKey {
    RequestUrl,
    AppShell,
}

/// One row of the routing table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutePolicy {
    pub strategy: Strategy,
    pub store_on_success: bool,
    pub cache_key: CacheKey,
    /// Refuse to deliver HTML-typed responses.
    pub html_guard: bool,
    /// Scan a successful body for bundle references and warm them.
    pub prewarm_bundles: bool,
}

impl RoutePolicy {
    pub const fn for_class(class: RequestClass) -> Self {
        match class {
            RequestClass::Navigation => Self {
                strategy: Strategy::NetworkFirst,
                store_on_success: true,
                cache_key: CacheKey::AppShell,
                html_guard: false,
                prewarm_bundles: true,
            },
            RequestClass::BootCritical => Self {
                strategy: Strategy::NetworkFirst,
                store_on_success: true,
                cache_key: CacheKey::RequestUrl,
                html_guard: true,
                prewarm_bundles: false,
            },
            RequestClass::Media => Self {
                strategy: Strategy::CacheFirst,
                store_on_success: true,
                cache_key: CacheKey::RequestUrl,
                html_guard: false,
                prewarm_bundles: false,
            },
            RequestClass::Other => Self {
                strategy: Strategy::NetworkFirst,
                store_on_success: false,
                cache_key: CacheKey::RequestUrl,
                html_guard: false,
                prewarm_bundles: false,
            },
        }
    }
}
