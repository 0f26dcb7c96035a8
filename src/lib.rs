//! Proposal shell core crate.
//!
//! Two independent pieces ship in this wasm module:
//!
//! - the offline cache controller behind the site's service worker
//!   (`ServiceWorkerApp`, driven from `web/sw.js`), and
//! - the placement solver that keeps the evasive "no" control clear of the
//!   other on-screen elements (`EvasiveControl`, `findSafePosition`).
//!
//! Everything below `controller` is host-agnostic and tested natively; the
//! browser bindings live in `worker` and `page`.

use wasm_bindgen::prelude::*;

pub mod bundles;
pub mod config;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod page;
pub mod placement;
pub mod request;
pub mod routing;
pub mod storage;
pub mod worker;

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

pub use config::{ControllerConfig, DEFAULT_CLEARANCE, PlacementConfig};
pub use controller::{CacheController, InstallReport};
pub use error::{CacheError, Result};
pub use lifecycle::{CacheGeneration, Lifecycle, WorkerState};
pub use placement::{
    Phase, Placement, PlacementSolver, Position, Rect, Size, initial_centered_position,
    rects_overlap,
};
pub use request::{Destination, Headers, Request, RequestMode, Response};
pub use routing::{CacheKey, RequestClass, RoutePolicy, Strategy};
pub use storage::{CacheStorage, HttpResponse, MemoryCacheStorage, Network};
