// Browser-only checks for the exported bindings. Run with
// `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use proposal_shell::page::{EvasiveControl, find_safe_position};
use proposal_shell::worker::BrowserCacheStorage;
use proposal_shell::{CacheStorage, HttpResponse};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::HtmlElement;

wasm_bindgen_test_configure!(run_in_browser);

fn block(tag: &str, css: &str) -> HtmlElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let element: HtmlElement = document.create_element(tag).unwrap().dyn_into().unwrap();
    element.set_attribute("style", css).unwrap();
    element
}

fn px(element: &HtmlElement, property: &str) -> f64 {
    element
        .style()
        .get_property_value(property)
        .unwrap()
        .trim_end_matches("px")
        .parse()
        .unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.01
}

#[wasm_bindgen_test]
fn find_safe_position_clears_obstacle() {
    let position = find_safe_position(
        &[0.0, 0.0, 1000.0, 1000.0],
        50.0,
        50.0,
        &[400.0, 400.0, 600.0, 600.0],
        None,
        None,
    )
    .unwrap();
    assert_eq!(position.len(), 2);
    let (x, y) = (position[0], position[1]);
    let clear = x + 50.0 + 60.0 < 400.0 || x - 60.0 > 600.0 || y + 50.0 + 60.0 < 400.0 || y - 60.0 > 600.0;
    assert!(clear, "({x}, {y}) too close");
}

#[wasm_bindgen_test]
fn find_safe_position_rejects_bad_quads() {
    assert!(find_safe_position(&[0.0, 0.0, 100.0], 10.0, 10.0, &[], None, None).is_err());
    assert!(find_safe_position(&[0.0, 0.0, 100.0, 100.0], 10.0, 10.0, &[1.0, 2.0], None, None).is_err());
}

#[wasm_bindgen_test]
fn find_safe_position_honours_config() {
    // no sampling budget: straight to the fixed upper-right spot
    let position = find_safe_position(
        &[0.0, 0.0, 800.0, 600.0],
        100.0,
        50.0,
        &[],
        None,
        Some(r#"{"maxAttempts":0}"#.to_string()),
    )
    .unwrap();
    assert!(close(position[0], 476.0) && close(position[1], 106.0), "{position:?}");

    let bad = Some(r#"{"fallbackXRatio":3}"#.to_string());
    assert!(find_safe_position(&[0.0, 0.0, 800.0, 600.0], 100.0, 50.0, &[], None, bad).is_err());
}

#[wasm_bindgen_test]
fn evasive_control_centres_then_moves_clear() {
    let body = web_sys::window().unwrap().document().unwrap().body().unwrap();
    let container = block(
        "div",
        "position:absolute;left:0;top:0;width:400px;height:300px;margin:0;padding:0",
    );
    let button = block(
        "button",
        "position:absolute;width:50px;height:20px;box-sizing:border-box;padding:0;border:0;margin:0",
    );
    let cover = block(
        "div",
        "position:absolute;left:0;top:0;width:400px;height:300px;margin:0;padding:0",
    );
    body.append_child(&container).unwrap();
    container.append_child(&button).unwrap();
    body.append_child(&cover).unwrap();

    let control = EvasiveControl::new(container.clone().into(), button.clone(), None, None).unwrap();
    assert!(close(px(&button, "left"), 175.0));
    assert!(close(px(&button, "top"), 140.0));

    // nothing fits next to a full cover: fixed fallback spot
    control.avoid(cover.clone().into());
    control.relocate().unwrap();
    assert!(close(px(&button, "left"), 231.0));
    assert!(close(px(&button, "top"), 52.0));

    control.clear_avoided();
    control.relocate().unwrap();
    let (x, y) = (px(&button, "left"), px(&button, "top"));
    assert!((20.0..=330.0).contains(&x) && (20.0..=260.0).contains(&y));
    assert!(!(close(x, 231.0) && close(y, 52.0)), "still avoiding a cleared element");

    container.remove();
    cover.remove();
}

#[wasm_bindgen_test]
async fn browser_cache_storage_round_trip() {
    let caches = web_sys::window().unwrap().caches().unwrap();
    let storage = BrowserCacheStorage::new(caches);
    let generation = "proposal-shell-test-v1";
    let key = "https://proposal.test/assets/index-Ab12.js";

    storage.open(generation).await.unwrap();
    let response = web_sys::Response::new_with_opt_str(Some("export {}")).unwrap();
    response
        .headers()
        .set("content-type", "application/javascript")
        .unwrap();
    storage.put(generation, key, response).await.unwrap();

    let found = storage.lookup(generation, key).await.unwrap().expect("entry stored");
    assert!(found.ok());
    assert_eq!(found.content_type().as_deref(), Some("application/javascript"));
    assert_eq!(found.into_text().await.unwrap(), "export {}");
    assert!(
        storage
            .lookup(generation, "https://proposal.test/assets/missing.js")
            .await
            .unwrap()
            .is_none()
    );

    assert!(storage.keys().await.unwrap().contains(&generation.to_string()));
    assert!(storage.delete(generation).await.unwrap());
    assert!(!storage.keys().await.unwrap().contains(&generation.to_string()));
}
