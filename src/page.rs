//! Page-side helpers: worker registration with periodic update checks, and the
//! evasive control that hops away from the pointer.

use std::cell::RefCell;
use std::rc::Rc;

use gloo::events::{EventListener, EventListenerOptions};
use gloo::timers::callback::Interval;
use js_sys::Reflect;
use tracing::level_filters::LevelFilter;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    DomRect, Element, HtmlElement, ServiceWorkerContainer, ServiceWorkerRegistration,
    ServiceWorkerState,
};

use crate::config::{DEFAULT_CLEARANCE, PlacementConfig};
use crate::error::{CacheError, js_err};
use crate::logging::init_logging;
use crate::placement::{PlacementSolver, Position, Rect, Size, initial_centered_position};

const TARGET: &str = "proposal_shell::page";

/// How often the page asks the browser to re-check the worker script.
pub const UPDATE_INTERVAL_MS: u32 = 60_000;

// --- Registration -------------------------------------------------------------

/// Register the worker script and poll for updates. Failures are logged only;
/// the page works without offline support.
#[wasm_bindgen]
pub fn register_service_worker(script_url: String) {
    init_logging(LevelFilter::INFO);
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(error) = register(&script_url).await {
            tracing::info!(target: TARGET, error = %error, "service worker registration failed");
        }
    });
}

async fn register(script_url: &str) -> Result<(), CacheError> {
    let window = web_sys::window().ok_or_else(|| CacheError::Js {
        operation: "register".to_string(),
        message: "no window".to_string(),
    })?;
    let Some(container) = service_worker_container(&window.navigator()) else {
        tracing::info!(target: TARGET, "service workers unavailable, running without offline support");
        return Ok(());
    };
    let value = JsFuture::from(container.register(script_url))
        .await
        .map_err(|e| CacheError::js("register", &e))?;
    let registration: ServiceWorkerRegistration = value
        .dyn_into()
        .map_err(|e| CacheError::js("register", &e))?;
    tracing::info!(target: TARGET, "service worker registered");

    watch_updates(&registration, container);

    Interval::new(UPDATE_INTERVAL_MS, move || match registration.update() {
        Ok(check) => wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(check).await {
                tracing::debug!(target: TARGET, error = %js_err(&e), "update check failed");
            }
        }),
        Err(e) => tracing::debug!(target: TARGET, error = %js_err(&e), "update check failed"),
    })
    .forget();
    Ok(())
}

/// `navigator.serviceWorker`, if this context exposes one. Insecure origins
/// and some private modes leave it out or set it to `undefined`.
fn service_worker_container(navigator: &JsValue) -> Option<ServiceWorkerContainer> {
    let key = JsValue::from_str("serviceWorker");
    if !Reflect::has(navigator, &key).unwrap_or(false) {
        return None;
    }
    Reflect::get(navigator, &key).ok()?.dyn_into().ok()
}

fn watch_updates(registration: &ServiceWorkerRegistration, container: ServiceWorkerContainer) {
    let watched = registration.clone();
    EventListener::new(registration, "updatefound", move |_| {
        let Some(worker) = watched.installing() else {
            return;
        };
        let container = container.clone();
        let state_source = worker.clone();
        EventListener::new(&worker, "statechange", move |_| {
            if state_source.state() != ServiceWorkerState::Activated {
                return;
            }
            tracing::info!(target: TARGET, "service worker activated");
            // A previous controller means a new version took over this tab.
            if container.controller().is_some() {
                tracing::info!(target: TARGET, "new service worker activated, content updated");
            }
        })
        .forget();
    })
    .forget();
}

// --- Evasive control ----------------------------------------------------------

fn placement_config(raw: Option<String>) -> Result<PlacementConfig, JsValue> {
    match raw {
        Some(raw) => Ok(PlacementConfig::from_json(&raw)?),
        None => Ok(PlacementConfig::default()),
    }
}

fn to_rect(rect: &DomRect) -> Rect {
    Rect::new(rect.left(), rect.top(), rect.right(), rect.bottom())
}

struct Evasion {
    container: Element,
    element: HtmlElement,
    avoid: RefCell<Vec<Element>>,
    clearance: f64,
    solver: PlacementSolver,
}

impl Evasion {
    fn size(&self) -> Size {
        let own = self.element.get_bounding_client_rect();
        Size::new(own.width(), own.height())
    }

    fn center(&self) -> Result<(), JsValue> {
        let container = to_rect(&self.container.get_bounding_client_rect());
        self.place(initial_centered_position(&container, self.size()))
    }

    fn relocate(&self) -> Result<(), JsValue> {
        let container = to_rect(&self.container.get_bounding_client_rect());
        let obstacles: Vec<Rect> = self
            .avoid
            .borrow()
            .iter()
            .map(|el| to_rect(&el.get_bounding_client_rect()))
            .collect();
        let placement = self.solver.solve(
            &container,
            self.size(),
            &obstacles,
            self.clearance,
            &mut rand::thread_rng(),
        );
        tracing::debug!(target: TARGET, phase = ?placement.phase, x = placement.position.x, y = placement.position.y, "relocated");
        self.place(placement.position)
    }

    fn relocate_logged(&self) {
        if let Err(e) = self.relocate() {
            tracing::warn!(target: TARGET, error = %js_err(&e), "relocation failed");
        }
    }

    fn place(&self, position: Position) -> Result<(), JsValue> {
        let style = self.element.style();
        style.set_property("left", &format!("{}px", position.x))?;
        style.set_property("top", &format!("{}px", position.y))?;
        Ok(())
    }
}

/// A control positioned inside `container` that moves away whenever the
/// pointer enters it or it is touched, keeping clear of the avoided elements.
/// `config_json` overrides fields of [`PlacementConfig`].
#[wasm_bindgen]
pub struct EvasiveControl {
    evasion: Rc<Evasion>,
    _listeners: Vec<EventListener>,
}

#[wasm_bindgen]
impl EvasiveControl {
    #[wasm_bindgen(constructor)]
    pub fn new(
        container: Element,
        element: HtmlElement,
        clearance: Option<f64>,
        config_json: Option<String>,
    ) -> Result<EvasiveControl, JsValue> {
        let evasion = Rc::new(Evasion {
            container,
            element,
            avoid: RefCell::new(Vec::new()),
            clearance: clearance.unwrap_or(DEFAULT_CLEARANCE),
            solver: PlacementSolver::new(placement_config(config_json)?),
        });
        evasion.center()?;

        let on_enter = {
            let target = evasion.element.clone();
            let evasion = Rc::clone(&evasion);
            EventListener::new(&target, "pointerenter", move |_| {
                evasion.relocate_logged();
            })
        };
        let on_touch = {
            let target = evasion.element.clone();
            let evasion = Rc::clone(&evasion);
            EventListener::new_with_options(
                &target,
                "touchstart",
                EventListenerOptions::enable_prevent_default(),
                move |event| {
                    event.prevent_default();
                    evasion.relocate_logged();
                },
            )
        };

        Ok(Self {
            evasion,
            _listeners: vec![on_enter, on_touch],
        })
    }

    /// Add an element the control must keep clear of.
    pub fn avoid(&self, element: Element) {
        self.evasion.avoid.borrow_mut().push(element);
    }

    pub fn clear_avoided(&self) {
        self.evasion.avoid.borrow_mut().clear();
    }

    /// Move now (e.g. from a click handler).
    pub fn relocate(&self) -> Result<(), JsValue> {
        self.evasion.relocate()
    }
}

/// Stateless solver entry for scripts. `container` is `[left, top, width,
/// height]`; `obstacles` is a flat list of `[left, top, right, bottom]` quads.
/// Returns `[x, y]` relative to the container.
#[wasm_bindgen(js_name = findSafePosition)]
pub fn find_safe_position(
    container: &[f64],
    element_width: f64,
    element_height: f64,
    obstacles: &[f64],
    clearance: Option<f64>,
    config_json: Option<String>,
) -> Result<Vec<f64>, JsValue> {
    let [left, top, width, height] = container else {
        return Err(JsValue::from_str("container must be [left, top, width, height]"));
    };
    let obstacles = Rect::from_flat(obstacles)
        .ok_or_else(|| JsValue::from_str("obstacles must be [left, top, right, bottom] quads"))?;
    let container = Rect::from_origin_size(*left, *top, *width, *height);
    let placement = PlacementSolver::new(placement_config(config_json)?).solve(
        &container,
        Size::new(element_width, element_height),
        &obstacles,
        clearance.unwrap_or(DEFAULT_CLEARANCE),
        &mut rand::thread_rng(),
    );
    Ok(vec![placement.position.x, placement.position.y])
}
