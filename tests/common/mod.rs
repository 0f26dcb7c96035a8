// Shared doubles for the controller integration tests. Everything here is
// single-threaded and deterministic so the tests can drive the controller with
// a `LocalPool`.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use proposal_shell::{
    CacheController, CacheError, ControllerConfig, MemoryCacheStorage, Network, Request, Response,
};

pub const ORIGIN: &str = "https://proposal.test";
pub const CURRENT: &str = "valentine-proposal-v4";

pub type TestController = CacheController<StubNetwork, MemoryCacheStorage, LocalSpawner>;

/// Scripted network: serves registered URLs, 404 for anything else, or fails
/// every request while offline.
#[derive(Default)]
pub struct StubNetwork {
    routes: RefCell<HashMap<String, Response>>,
    offline: Cell<bool>,
    log: RefCell<Vec<String>>,
}

impl StubNetwork {
    pub fn serve(&self, path: &str, response: Response) {
        self.routes.borrow_mut().insert(url(path), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl Network for StubNetwork {
    type Source = ();
    type Response = Response;

    async fn fetch(
        &self,
        request: &Request,
        _source: Option<&()>,
    ) -> proposal_shell::Result<Response> {
        let url = request.url.as_str().to_string();
        self.log.borrow_mut().push(url.clone());
        if self.offline.get() {
            return Err(CacheError::network(url, "offline"));
        }
        Ok(self
            .routes
            .borrow()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found").with_url(url)))
    }
}

pub struct Harness {
    pub pool: LocalPool,
    pub network: Rc<StubNetwork>,
    pub storage: Rc<MemoryCacheStorage>,
    pub controller: TestController,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let pool = LocalPool::new();
        let network = Rc::new(StubNetwork::default());
        let storage = Rc::new(MemoryCacheStorage::new());
        let controller = CacheController::new(
            config,
            ORIGIN,
            Rc::clone(&network),
            Rc::clone(&storage),
            pool.spawner(),
        )
        .unwrap();
        Self {
            pool,
            network,
            storage,
            controller,
        }
    }

    /// Handle one request, then let the background cache writes it spawned
    /// finish.
    pub fn fetch(&mut self, request: &Request) -> proposal_shell::Result<Response> {
        let response = self.fetch_only(request);
        self.settle();
        response
    }

    /// Handle one request without running any background work.
    pub fn fetch_only(&mut self, request: &Request) -> proposal_shell::Result<Response> {
        self.pool.run_until(self.controller.handle_fetch(request, None))
    }

    /// Drive spawned background work (cache writes, bundle pre-warming) to
    /// completion.
    pub fn settle(&mut self) {
        self.pool.run();
    }

    /// Put an entry straight into a cache generation.
    pub fn seed(&mut self, generation: &str, path: &str, response: Response) {
        use proposal_shell::CacheStorage;
        let storage = Rc::clone(&self.storage);
        let key = url(path);
        self.pool.run_until(async move {
            storage.open(generation).await.unwrap();
            storage.put(generation, &key, response).await.unwrap();
        });
    }

    pub fn cached(&mut self, path: &str) -> Option<Response> {
        use proposal_shell::CacheStorage;
        self.pool
            .run_until(self.storage.lookup(CURRENT, &url(path)))
            .unwrap()
    }
}

pub fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

pub fn html(body: &str) -> Response {
    Response::ok_with_type("text/html; charset=utf-8", body.to_string())
}

pub fn javascript(body: &str) -> Response {
    Response::ok_with_type("application/javascript", body.to_string())
}
