//! The cache controller: install/activate handling and per-request routing.
//!
//! The controller is host-agnostic. The service worker glue in `worker` wires it
//! to `fetch` and `caches`; tests drive it with in-memory doubles.
//!
//! Every intercepted request is classified (see [`RequestClass`]) and handled by
//! the policy row [`RoutePolicy::for_class`] returns. Two strategies exist:
//!
//! - network-first: the live response wins; the cache is consulted only when
//!   the transport fails.
//! - cache-first: a cached entry is returned without touching the network.
//!
//! Cache writes and bundle pre-warming run on the spawner, so a response is
//! never held back by storage.
//!
//! Boot-critical requests carry an extra guard: a response whose content type
//! is HTML is never delivered for them, from the network or from the cache.
//! The module loader rejects HTML where it expects JavaScript, which leaves the
//! page unbootable.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::join_all;
use futures::task::{LocalSpawn, LocalSpawnExt};
use url::Url;

use crate::bundles::BundleScanner;
use crate::config::ControllerConfig;
use crate::error::{CacheError, Result};
use crate::lifecycle::{CacheGeneration, Lifecycle, WorkerState};
use crate::request::Request;
use crate::routing::{CacheKey, RequestClass, RoutePolicy, Strategy};
use crate::storage::{CacheStorage, HttpResponse, Network};

const TARGET: &str = "proposal_shell::sw";

/// Outcome of pre-populating the static manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

pub struct CacheController<N, S, X> {
    config: ControllerConfig,
    origin: Url,
    generation: CacheGeneration,
    scanner: BundleScanner,
    lifecycle: RefCell<Lifecycle>,
    network: Rc<N>,
    storage: Rc<S>,
    spawner: X,
}

impl<N, S, X> CacheController<N, S, X>
where
    N: Network + 'static,
    N::Response: 'static,
    S: CacheStorage<Response = N::Response> + 'static,
    X: LocalSpawn,
{
    /// `origin` is the worker's own origin (`https://host[:port]`); only
    /// requests to it are intercepted.
    pub fn new(
        config: ControllerConfig,
        origin: &str,
        network: Rc<N>,
        storage: Rc<S>,
        spawner: X,
    ) -> Result<Self> {
        config.validate()?;
        let origin = Url::parse(origin).map_err(|e| CacheError::invalid_url(origin, e))?;
        let generation = CacheGeneration::new(config.cache_name());
        let scanner = BundleScanner::new(&config.asset_prefix)?;
        Ok(Self {
            config,
            origin,
            generation,
            scanner,
            lifecycle: RefCell::new(Lifecycle::new()),
            network,
            storage,
            spawner,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.borrow().state()
    }

    pub fn skips_waiting(&self) -> bool {
        self.lifecycle.borrow().skips_waiting()
    }

    // --- Lifecycle ------------------------------------------------------------

    /// Open the current generation and pre-populate the static manifest. Each
    /// asset is fetched on its own; a failure is logged and skipped so one
    /// missing file never blocks installation.
    pub async fn install(&self) -> Result<InstallReport> {
        self.lifecycle.borrow_mut().begin_install()?;
        self.storage.open(self.generation.name()).await?;

        let mut report = InstallReport::default();
        for path in &self.config.static_assets {
            match self.precache(path).await {
                Ok(()) => report.cached.push(path.clone()),
                Err(error) => {
                    tracing::warn!(target: TARGET, path = %path, error = %error, "precache failed");
                    report.failed.push(path.clone());
                }
            }
        }

        let mut lifecycle = self.lifecycle.borrow_mut();
        lifecycle.finish_install()?;
        lifecycle.skip_waiting();
        tracing::info!(
            target: TARGET,
            cache = %self.generation,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "installed"
        );
        Ok(report)
    }

    async fn precache(&self, path: &str) -> Result<()> {
        let url = self.resolve(path)?;
        let response = self
            .network
            .fetch(&Request::from_url(url.clone()), None)
            .await?;
        if !response.ok() {
            return Err(CacheError::network(
                url.as_str(),
                format!("status {}", response.status()),
            ));
        }
        self.storage
            .put(self.generation.name(), url.as_str(), response)
            .await
    }

    /// Delete every generation other than the current one. Safe to run any
    /// number of times. Returns the names that were removed.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.lifecycle.borrow_mut().begin_activate()?;
        let existing = self.storage.keys().await?;
        let mut deleted = Vec::new();
        for name in self.generation.stale(&existing) {
            tracing::info!(target: TARGET, cache = name, "deleting old cache");
            if self.storage.delete(name).await? {
                deleted.push(name.to_string());
            }
        }
        self.lifecycle.borrow_mut().finish_activate()?;
        tracing::info!(target: TARGET, cache = %self.generation, "activated");
        Ok(deleted)
    }

    // --- Routing --------------------------------------------------------------

    /// Same-origin `GET` requests are handled; everything else goes straight to
    /// the network.
    pub fn intercepts(&self, request: &Request) -> bool {
        request.url.origin() == self.origin.origin() && request.is_get()
    }

    pub fn classify(&self, request: &Request) -> RequestClass {
        RequestClass::classify(
            &request.mode,
            request.path(),
            &request.destination,
            &self.config.asset_prefix,
        )
    }

    /// `source` is the host's own request handle; when given, the network is
    /// asked through it so the page's request settings survive.
    pub async fn handle_fetch(
        &self,
        request: &Request,
        source: Option<&N::Source>,
    ) -> Result<N::Response> {
        if !self.intercepts(request) {
            return self.network.fetch(request, source).await;
        }
        let class = self.classify(request);
        let policy = RoutePolicy::for_class(class);
        let key = self.cache_key(request, policy.cache_key)?;
        tracing::trace!(target: TARGET, class = class.as_str(), url = %request.url, "route");
        match policy.strategy {
            Strategy::NetworkFirst => self.network_first(request, source, policy, &key).await,
            Strategy::CacheFirst => self.cache_first(request, source, policy, &key).await,
        }
    }

    async fn network_first(
        &self,
        request: &Request,
        source: Option<&N::Source>,
        policy: RoutePolicy,
        key: &str,
    ) -> Result<N::Response> {
        let failure = match self.network.fetch(request, source).await {
            Ok(response) if policy.html_guard && response.is_html() => {
                tracing::warn!(target: TARGET, path = request.path(), "network answered asset request with html");
                CacheError::html_for_asset(request.path())
            }
            Ok(response) => {
                if response.ok() {
                    if policy.store_on_success {
                        self.store_in_background(key, &response);
                    }
                    if policy.prewarm_bundles {
                        self.prewarm_bundles(&response);
                    }
                }
                return Ok(response);
            }
            Err(error) => error,
        };

        match self.lookup(key).await {
            Some(cached) if policy.html_guard && cached.is_html() => {
                tracing::error!(target: TARGET, path = request.path(), "blocked html response for asset request");
                Err(CacheError::html_for_asset(request.path()))
            }
            Some(cached) => {
                tracing::info!(target: TARGET, path = request.path(), "serving cached response (offline)");
                Ok(cached)
            }
            None => Err(failure),
        }
    }

    async fn cache_first(
        &self,
        request: &Request,
        source: Option<&N::Source>,
        policy: RoutePolicy,
        key: &str,
    ) -> Result<N::Response> {
        if let Some(cached) = self.lookup(key).await {
            if !(policy.html_guard && cached.is_html()) {
                return Ok(cached);
            }
        }
        let response = self.network.fetch(request, source).await?;
        if policy.store_on_success && response.ok() {
            self.store_in_background(key, &response);
        }
        Ok(response)
    }

    // --- Cache access ---------------------------------------------------------

    fn cache_key(&self, request: &Request, key: CacheKey) -> Result<String> {
        match key {
            CacheKey::AppShell => Ok(self.resolve(&self.config.app_shell_path)?.into()),
            CacheKey::RequestUrl => {
                // Cache matching ignores fragments.
                let mut url = request.url.clone();
                url.set_fragment(None);
                Ok(url.into())
            }
        }
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .map_err(|e| CacheError::invalid_url(path, e))
    }

    /// Copy `response` into the current generation without holding up the
    /// caller. Writes never fail a request.
    fn store_in_background(&self, key: &str, response: &N::Response) {
        let copy = match response.duplicate() {
            Ok(copy) => copy,
            Err(error) => {
                tracing::warn!(target: TARGET, key, error = %error, "response not cacheable");
                return;
            }
        };
        let storage = Rc::clone(&self.storage);
        let generation = self.generation.name().to_string();
        let key = key.to_string();
        self.spawn("cache write", async move {
            if let Err(error) = storage.put(&generation, &key, copy).await {
                tracing::warn!(target: TARGET, key = %key, error = %error, "cache write failed");
            }
        });
    }

    fn spawn(&self, task: &'static str, future: impl Future<Output = ()> + 'static) {
        if let Err(error) = self.spawner.spawn_local(future) {
            tracing::warn!(target: TARGET, task, error = %error, "could not schedule background work");
        }
    }

    /// Storage errors read as a miss.
    async fn lookup(&self, key: &str) -> Option<N::Response> {
        match self.storage.lookup(self.generation.name(), key).await {
            Ok(found) => found,
            Err(error) => {
                tracing::warn!(target: TARGET, key, error = %error, "cache read failed");
                None
            }
        }
    }

    // --- Bundle pre-warming ---------------------------------------------------

    /// Scan the app shell for bundle references and fetch them in the
    /// background. The navigation response is never held up by this.
    fn prewarm_bundles(&self, shell: &N::Response) {
        let shell = match shell.duplicate() {
            Ok(shell) => shell,
            Err(error) => {
                tracing::warn!(target: TARGET, error = %error, "app shell not readable, skipping pre-warm");
                return;
            }
        };
        let scanner = self.scanner.clone();
        let origin = self.origin.clone();
        let network = Rc::clone(&self.network);
        let storage = Rc::clone(&self.storage);
        let generation = self.generation.name().to_string();
        self.spawn("bundle pre-warm", async move {
            let html = match shell.into_text().await {
                Ok(html) => html,
                Err(error) => {
                    tracing::warn!(target: TARGET, error = %error, "app shell not readable, skipping pre-warm");
                    return;
                }
            };
            let urls: Vec<Url> = scanner
                .scan(&html)
                .iter()
                .filter_map(|path| origin.join(path).ok())
                .collect();
            join_all(
                urls.iter()
                    .map(|url| warm_bundle(network.as_ref(), storage.as_ref(), &generation, url)),
            )
            .await;
        });
    }
}

async fn warm_bundle<N, S>(network: &N, storage: &S, generation: &str, url: &Url)
where
    N: Network,
    S: CacheStorage<Response = N::Response>,
{
    match network.fetch(&Request::from_url(url.clone()), None).await {
        Ok(response) if response.ok() && !response.is_html() => {
            match storage.put(generation, url.as_str(), response).await {
                Ok(()) => tracing::info!(target: TARGET, url = %url, "cached boot-critical bundle"),
                Err(error) => {
                    tracing::warn!(target: TARGET, url = %url, error = %error, "failed to cache bundle")
                }
            }
        }
        Ok(response) => {
            tracing::warn!(target: TARGET, url = %url, status = response.status(), content_type = ?response.content_type(), "bundle not cacheable")
        }
        Err(error) => tracing::warn!(target: TARGET, url = %url, error = %error, "failed to cache bundle"),
    }
}
