//! Service worker glue: binds the controller to the worker's `fetch` and
//! `caches`, and exposes it to the worker script.

use std::rc::Rc;

use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use js_sys::{Array, Promise, Reflect};
use tracing::level_filters::LevelFilter;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};
use web_sys::ServiceWorkerGlobalScope;

use crate::config::ControllerConfig;
use crate::controller::CacheController;
use crate::error::{CacheError, Result, js_err};
use crate::logging::init_logging;
use crate::request::{Destination, Headers, Request, RequestMode};
use crate::storage::{CacheStorage, HttpResponse, Network};

const TARGET: &str = "proposal_shell::worker";

type BrowserController = CacheController<BrowserNetwork, BrowserCacheStorage, BrowserSpawner>;

// --- Host capabilities --------------------------------------------------------

impl HttpResponse for web_sys::Response {
    fn status(&self) -> u16 {
        web_sys::Response::status(self)
    }

    fn content_type(&self) -> Option<String> {
        self.headers().get("content-type").ok().flatten()
    }

    fn duplicate(&self) -> Result<Self> {
        // `Response.clone()` tees the body stream.
        web_sys::Response::clone(self).map_err(|e| CacheError::js("Response.clone", &e))
    }

    async fn into_text(self) -> Result<String> {
        let text = self.text().map_err(|e| CacheError::js("Response.text", &e))?;
        let value = JsFuture::from(text)
            .await
            .map_err(|e| CacheError::js("Response.text", &e))?;
        Ok(value.as_string().unwrap_or_default())
    }
}

/// Network access through the worker's global `fetch`.
pub struct BrowserNetwork {
    scope: ServiceWorkerGlobalScope,
}

impl Network for BrowserNetwork {
    type Source = web_sys::Request;
    type Response = web_sys::Response;

    async fn fetch(
        &self,
        request: &Request,
        source: Option<&web_sys::Request>,
    ) -> Result<web_sys::Response> {
        let url = request.url.as_str();
        let pending = match source {
            Some(source) => self.scope.fetch_with_request(source),
            None => self.scope.fetch_with_request(&to_web_request(request)?),
        };
        let value = JsFuture::from(pending)
            .await
            .map_err(|e| CacheError::network(url, js_err(&e)))?;
        value.dyn_into().map_err(|e| CacheError::js("fetch", &e))
    }
}

/// The browser's `caches` object.
pub struct BrowserCacheStorage {
    caches: web_sys::CacheStorage,
}

impl BrowserCacheStorage {
    pub fn new(caches: web_sys::CacheStorage) -> Self {
        Self { caches }
    }

    async fn open_cache(&self, generation: &str) -> Result<web_sys::Cache> {
        let value = JsFuture::from(self.caches.open(generation))
            .await
            .map_err(|e| CacheError::storage("open", js_err(&e)))?;
        value
            .dyn_into()
            .map_err(|e| CacheError::storage("open", js_err(&e)))
    }
}

impl CacheStorage for BrowserCacheStorage {
    type Response = web_sys::Response;

    async fn open(&self, generation: &str) -> Result<()> {
        self.open_cache(generation).await.map(|_| ())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let value = JsFuture::from(self.caches.keys())
            .await
            .map_err(|e| CacheError::storage("keys", js_err(&e)))?;
        Ok(Array::from(&value)
            .iter()
            .filter_map(|name| name.as_string())
            .collect())
    }

    async fn delete(&self, generation: &str) -> Result<bool> {
        let value = JsFuture::from(self.caches.delete(generation))
            .await
            .map_err(|e| CacheError::storage("delete", js_err(&e)))?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn put(&self, generation: &str, key: &str, response: web_sys::Response) -> Result<()> {
        let cache = self.open_cache(generation).await?;
        JsFuture::from(cache.put_with_str(key, &response))
            .await
            .map_err(|e| CacheError::storage("put", js_err(&e)))?;
        Ok(())
    }

    async fn lookup(&self, generation: &str, key: &str) -> Result<Option<web_sys::Response>> {
        let cache = self.open_cache(generation).await?;
        let value = JsFuture::from(cache.match_with_str(key))
            .await
            .map_err(|e| CacheError::storage("match", js_err(&e)))?;
        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        value
            .dyn_into()
            .map(Some)
            .map_err(|e| CacheError::storage("match", js_err(&e)))
    }
}

/// Runs detached futures on the worker's microtask queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> std::result::Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

// --- Conversions --------------------------------------------------------------

fn read_headers(headers: &web_sys::Headers) -> Result<Headers> {
    let entries = js_sys::try_iter(headers)
        .map_err(|e| CacheError::js("headers", &e))?
        .ok_or_else(|| CacheError::Js {
            operation: "headers".to_string(),
            message: "not iterable".to_string(),
        })?;
    let mut out = Headers::new();
    for entry in entries {
        let pair = Array::from(&entry.map_err(|e| CacheError::js("headers", &e))?);
        if let (Some(name), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
            out.insert(name, value);
        }
    }
    Ok(out)
}

fn to_web_headers(headers: &Headers) -> Result<web_sys::Headers> {
    let out = web_sys::Headers::new().map_err(|e| CacheError::js("new Headers", &e))?;
    for (name, value) in headers.iter() {
        out.append(name, value)
            .map_err(|e| CacheError::js("Headers.append", &e))?;
    }
    Ok(out)
}

fn convert_request(request: &web_sys::Request) -> Result<Request> {
    let string_prop = |name: &str| {
        Reflect::get(request, &JsValue::from_str(name))
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    };
    Ok(Request::get(&request.url())?
        .with_method(request.method())
        .with_mode(RequestMode::parse(&string_prop("mode")))
        .with_destination(Destination::parse(&string_prop("destination")))
        .with_headers(read_headers(&request.headers())?))
}

/// Request for a fetch the controller starts itself (install, pre-warm).
fn to_web_request(request: &Request) -> Result<web_sys::Request> {
    let init = web_sys::RequestInit::new();
    init.set_method(&request.method);
    init.set_headers(&to_web_headers(&request.headers)?.into());
    web_sys::Request::new_with_str_and_init(request.url.as_str(), &init)
        .map_err(|e| CacheError::js("new Request", &e))
}

// --- Event wiring -------------------------------------------------------------

/// Controller handle exported to the worker script.
///
/// Service workers must add their `install`/`activate`/`fetch` listeners during
/// the first synchronous evaluation of the script, before the wasm module has
/// finished loading. The script therefore owns the listeners and forwards to
/// this object once it exists (see `web/sw.js`).
#[wasm_bindgen]
pub struct ServiceWorkerApp {
    scope: ServiceWorkerGlobalScope,
    controller: Rc<BrowserController>,
}

#[wasm_bindgen]
impl ServiceWorkerApp {
    /// `config_json` overrides fields of the default [`ControllerConfig`].
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> std::result::Result<ServiceWorkerApp, JsValue> {
        init_logging(LevelFilter::INFO);
        let config = match config_json {
            Some(raw) => ControllerConfig::from_json(&raw)?,
            None => ControllerConfig::default(),
        };
        let scope: ServiceWorkerGlobalScope = js_sys::global().dyn_into()?;
        let origin = scope.location().origin();
        let caches = scope.caches()?;
        let controller = CacheController::new(
            config,
            &origin,
            Rc::new(BrowserNetwork {
                scope: scope.clone(),
            }),
            Rc::new(BrowserCacheStorage::new(caches)),
            BrowserSpawner,
        )?;
        tracing::info!(target: TARGET, origin = %origin, cache = %controller.generation(), "service worker started");
        Ok(Self {
            scope,
            controller: Rc::new(controller),
        })
    }

    /// Pre-populate the cache, then skip the waiting phase.
    pub fn install(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        let scope = self.scope.clone();
        future_to_promise(async move {
            controller.install().await?;
            JsFuture::from(scope.skip_waiting()?).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Drop stale generations, then take control of open tabs.
    pub fn activate(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        let scope = self.scope.clone();
        future_to_promise(async move {
            controller.activate().await?;
            JsFuture::from(scope.clients().claim()).await?;
            tracing::info!(target: TARGET, "activated and claimed clients");
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Whether `handle` should answer this request. When false the script
    /// must not call `respondWith`, leaving the request to the browser.
    pub fn intercepts(&self, request: &web_sys::Request) -> bool {
        match convert_request(request) {
            Ok(request) => self.controller.intercepts(&request),
            Err(error) => {
                tracing::warn!(target: TARGET, error = %error, "unreadable request, passing through");
                false
            }
        }
    }

    /// Resolve the request through the routing table. Network answers reach
    /// the page as the live response.
    pub fn handle(&self, request: &web_sys::Request) -> Promise {
        let controller = Rc::clone(&self.controller);
        let source: web_sys::Request = Clone::clone(request);
        let snapshot = convert_request(request);
        future_to_promise(async move {
            let response = controller.handle_fetch(&snapshot?, Some(&source)).await?;
            Ok(response.into())
        })
    }
}
