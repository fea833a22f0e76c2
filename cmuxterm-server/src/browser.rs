//! The browser adapter: maps `browser.*` RPC methods onto the host
//! web-view collaborator identified by a surface id.
//!
//! The core never talks to a real web view; it calls through [`WebView`].
//! The in-process [`StubWebView`] keeps enough state (url, history,
//! cookies, storage, console) to honor the protocol headless, which is
//! also what the tests drive.

use codec::{codes, RpcError};
use mux::{Handle, Mux, PanelKind, SurfaceId};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Methods the host web view refuses on this platform.
const UNSUPPORTED: &[&str] = &[
    "viewport.set",
    "geolocation.set",
    "offline.set",
    "input_mouse",
    "input_keyboard",
    "input_touch",
];
const UNSUPPORTED_PREFIXES: &[&str] = &["trace.", "network.", "screencast."];

const INTERACTIONS: &[&str] = &[
    "click",
    "dblclick",
    "hover",
    "focus",
    "check",
    "uncheck",
    "scroll_into_view",
    "type",
    "fill",
    "press",
    "keydown",
    "keyup",
    "select",
    "scroll",
];

#[derive(Debug, Default, Clone)]
pub struct WaitParams {
    pub selector: Option<String>,
    pub text_contains: Option<String>,
    pub url_contains: Option<String>,
    pub load_state: Option<String>,
    pub function: Option<String>,
    pub timeout_ms: u64,
}

impl WaitParams {
    fn from_params(params: &Value) -> Self {
        Self {
            selector: str_param(params, "selector"),
            text_contains: str_param(params, "text_contains"),
            url_contains: str_param(params, "url_contains"),
            load_state: str_param(params, "load_state"),
            function: str_param(params, "function"),
            timeout_ms: params
                .get("timeout_ms")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_WAIT_TIMEOUT_MS),
        }
    }
}

pub trait WebView: Send + Sync {
    fn navigate(&self, url: &str) -> anyhow::Result<()>;
    fn back(&self) -> bool;
    fn forward(&self) -> bool;
    fn reload(&self);
    fn current_url(&self) -> String;
    fn title(&self) -> String;

    /// Selector-driven reads: `text`, `html`, `value`, `attr`, `count`,
    /// `box`, `styles`.
    fn read(&self, what: &str, selector: Option<&str>, arg: Option<&str>)
        -> anyhow::Result<Value>;

    /// User gestures (`click`, `type`, ...).
    fn perform(&self, gesture: &str, selector: Option<&str>, arg: Option<&str>)
        -> anyhow::Result<()>;

    fn satisfies(&self, wait: &WaitParams) -> bool;

    fn snapshot(&self, opts: &Value) -> String;

    fn screenshot_png(&self) -> Vec<u8>;

    /// Grab-bag for the state/meta groups (`cookies.*`, `storage.*`,
    /// `console.*`, `tab.*`, ...).
    fn misc(&self, method: &str, params: &Value) -> anyhow::Result<Value>;
}

#[derive(Default)]
struct StubState {
    url: String,
    title: String,
    history: Vec<String>,
    history_pos: usize,
    cookies: BTreeMap<String, String>,
    local_storage: BTreeMap<String, String>,
    session_storage: BTreeMap<String, String>,
    console: Vec<Value>,
    errors: Vec<Value>,
    init_scripts: Vec<String>,
    gestures: Vec<String>,
    load_state: String,
}

/// A headless in-memory web view.  Navigation and history behave like a
/// real view; DOM reads return empty-but-well-formed results.
pub struct StubWebView {
    state: Mutex<StubState>,
}

impl StubWebView {
    pub fn new() -> Self {
        let mut state = StubState::default();
        state.url = "about:blank".to_string();
        state.history = vec!["about:blank".to_string()];
        state.load_state = "complete".to_string();
        Self {
            state: Mutex::new(state),
        }
    }

    /// The gestures performed so far, for assertions in tests.
    pub fn gesture_log(&self) -> Vec<String> {
        self.state.lock().gestures.clone()
    }
}

impl Default for StubWebView {
    fn default() -> Self {
        Self::new()
    }
}

impl WebView for StubWebView {
    fn navigate(&self, url: &str) -> anyhow::Result<()> {
        if url.is_empty() {
            anyhow::bail!("empty url");
        }
        let mut state = self.state.lock();
        let pos = state.history_pos;
        state.history.truncate(pos + 1);
        state.history.push(url.to_string());
        state.history_pos += 1;
        state.url = url.to_string();
        state.title = url.to_string();
        state.load_state = "complete".to_string();
        Ok(())
    }

    fn back(&self) -> bool {
        let mut state = self.state.lock();
        if state.history_pos == 0 {
            return false;
        }
        state.history_pos -= 1;
        state.url = state.history[state.history_pos].clone();
        true
    }

    fn forward(&self) -> bool {
        let mut state = self.state.lock();
        if state.history_pos + 1 >= state.history.len() {
            return false;
        }
        state.history_pos += 1;
        state.url = state.history[state.history_pos].clone();
        true
    }

    fn reload(&self) {
        self.state.lock().load_state = "complete".to_string();
    }

    fn current_url(&self) -> String {
        self.state.lock().url.clone()
    }

    fn title(&self) -> String {
        self.state.lock().title.clone()
    }

    fn read(&self, what: &str, selector: Option<&str>, arg: Option<&str>) -> anyhow::Result<Value> {
        let selector = selector.unwrap_or("");
        Ok(match what {
            "text" | "html" | "value" => json!(""),
            "attr" => json!({ "name": arg.unwrap_or(""), "value": Value::Null, "selector": selector }),
            "count" => json!(0),
            "box" => json!({ "x": 0, "y": 0, "width": 0, "height": 0 }),
            "styles" => json!({}),
            other => anyhow::bail!("unknown read {:?}", other),
        })
    }

    fn perform(&self, gesture: &str, selector: Option<&str>, arg: Option<&str>) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.gestures.push(format!(
            "{} {} {}",
            gesture,
            selector.unwrap_or("-"),
            arg.unwrap_or("-")
        ));
        Ok(())
    }

    fn satisfies(&self, wait: &WaitParams) -> bool {
        let state = self.state.lock();
        if let Some(url_contains) = &wait.url_contains {
            if !state.url.contains(url_contains.as_str()) {
                return false;
            }
        }
        if let Some(load_state) = &wait.load_state {
            if &state.load_state != load_state {
                return false;
            }
        }
        // the stub has no DOM: selector/text/function conditions never
        // become true
        wait.selector.is_none() && wait.text_contains.is_none() && wait.function.is_none()
    }

    fn snapshot(&self, _opts: &Value) -> String {
        let state = self.state.lock();
        format!("page \"{}\"\n  url {}\n", state.title, state.url)
    }

    fn screenshot_png(&self) -> Vec<u8> {
        // 1x1 transparent png
        const PNG: &[u8] = &[
            0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
            0x00, 0x1f, 0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78,
            0x9c, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00,
            0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
        ];
        PNG.to_vec()
    }

    fn misc(&self, method: &str, params: &Value) -> anyhow::Result<Value> {
        let mut state = self.state.lock();
        Ok(match method {
            "cookies.get" | "cookies.list" => json!(state.cookies),
            "cookies.set" => {
                let name = str_param(params, "name").unwrap_or_default();
                let value = str_param(params, "value").unwrap_or_default();
                state.cookies.insert(name, value);
                json!({ "count": state.cookies.len() })
            }
            "cookies.clear" => {
                state.cookies.clear();
                json!({ "count": 0 })
            }
            "storage.get" | "storage.list" => json!(state.local_storage),
            "storage.set" => {
                let key = str_param(params, "key").unwrap_or_default();
                let value = str_param(params, "value").unwrap_or_default();
                state.local_storage.insert(key, value);
                json!({ "count": state.local_storage.len() })
            }
            "storage.clear" => {
                state.local_storage.clear();
                state.session_storage.clear();
                json!({ "count": 0 })
            }
            "state.save" => json!({
                "cookies": state.cookies,
                "local_storage": state.local_storage,
            }),
            "state.load" => {
                if let Some(cookies) = params.get("cookies").and_then(Value::as_object) {
                    for (k, v) in cookies {
                        if let Some(v) = v.as_str() {
                            state.cookies.insert(k.clone(), v.to_string());
                        }
                    }
                }
                json!({ "loaded": true })
            }
            "addinitscript" | "addscript" | "addstyle" => {
                let source = str_param(params, "source")
                    .or_else(|| str_param(params, "script"))
                    .unwrap_or_default();
                state.init_scripts.push(source);
                json!({ "count": state.init_scripts.len() })
            }
            "console.list" | "console.read" => json!(state.console),
            "console.clear" => {
                state.console.clear();
                json!([])
            }
            "errors.list" | "errors.read" => json!(state.errors),
            "errors.clear" => {
                state.errors.clear();
                json!([])
            }
            "tab.info" => json!({ "url": state.url, "title": state.title }),
            "frame.list" => json!([{ "url": state.url, "main": true }]),
            "dialog.pending" => Value::Null,
            "dialog.accept" | "dialog.dismiss" => json!({ "handled": false }),
            "highlight" => json!({ "highlighted": str_param(params, "selector") }),
            method if method.starts_with("find.") => json!([]),
            method if method.starts_with("is.") => json!(false),
            other => anyhow::bail!("unknown method {:?}", other),
        })
    }
}

pub struct BrowserAdapter {
    mux: Arc<Mux>,
    views: RwLock<HashMap<SurfaceId, Arc<dyn WebView>>>,
    factory: Box<dyn Fn() -> Arc<dyn WebView> + Send + Sync>,
}

impl BrowserAdapter {
    pub fn new(mux: &Arc<Mux>) -> Self {
        Self::with_factory(mux, Box::new(|| Arc::new(StubWebView::new())))
    }

    pub fn with_factory(
        mux: &Arc<Mux>,
        factory: Box<dyn Fn() -> Arc<dyn WebView> + Send + Sync>,
    ) -> Self {
        Self {
            mux: Arc::clone(mux),
            views: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Drop the view for a surface that no longer exists.
    pub fn forget(&self, surface_id: SurfaceId) {
        self.views.write().remove(&surface_id);
    }

    pub fn view_for(&self, surface_id: SurfaceId) -> Result<Arc<dyn WebView>, RpcError> {
        let kind = self
            .mux
            .surface_kind(surface_id)
            .map_err(|e| RpcError::new(e.code(), e.to_string()))?;
        if kind != PanelKind::Browser {
            return Err(RpcError::not_supported("surface is not a browser"));
        }
        let mut views = self.views.write();
        Ok(Arc::clone(
            views
                .entry(surface_id)
                .or_insert_with(|| (self.factory)()),
        ))
    }

    fn resolve_surface(&self, params: &Value) -> Result<SurfaceId, RpcError> {
        let handle = match str_param(params, "surface_id").or_else(|| str_param(params, "surface"))
        {
            Some(text) => {
                Handle::parse(&text).map_err(|e| RpcError::new(e.code(), e.to_string()))?
            }
            None => Handle::Current,
        };
        self.mux
            .resolve_surface(&handle)
            .map_err(|e| RpcError::new(e.code(), e.to_string()))
    }

    /// Dispatch a `browser.*` method.  `method` arrives without the
    /// `browser.` prefix.
    pub fn dispatch(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        if UNSUPPORTED.contains(&method)
            || UNSUPPORTED_PREFIXES.iter().any(|p| method.starts_with(p))
        {
            return Err(RpcError::not_supported(format!(
                "browser.{} is not supported on this host",
                method
            )));
        }

        if method == "open_split" {
            return self.open_split(params);
        }

        let surface_id = self.resolve_surface(params)?;
        let view = self.view_for(surface_id)?;

        match method {
            "navigate" => {
                let url = require_str(params, "url")?;
                view.navigate(&url)
                    .map_err(|e| RpcError::invalid_argument(e.to_string()))?;
                self.mux.set_surface_title(surface_id, &url).ok();
                Ok(json!({ "url": view.current_url() }))
            }
            "back" => Ok(json!({ "moved": view.back(), "url": view.current_url() })),
            "forward" => Ok(json!({ "moved": view.forward(), "url": view.current_url() })),
            "reload" => {
                view.reload();
                Ok(json!({ "url": view.current_url() }))
            }
            "url.get" => Ok(json!({ "value": view.current_url() })),
            "get.title" => Ok(json!({ "value": view.title() })),
            "get.text" | "get.html" | "get.value" | "get.attr" | "get.count" | "get.box"
            | "get.styles" => {
                let what = &method["get.".len()..];
                let selector = str_param(params, "selector");
                let arg = str_param(params, "name").or_else(|| str_param(params, "attr"));
                let value = view
                    .read(what, selector.as_deref(), arg.as_deref())
                    .map_err(|e| RpcError::invalid_argument(e.to_string()))?;
                Ok(json!({ "value": value }))
            }
            "wait" => {
                let wait = WaitParams::from_params(params);
                let deadline = Instant::now() + Duration::from_millis(wait.timeout_ms);
                loop {
                    if view.satisfies(&wait) {
                        return Ok(json!({ "satisfied": true }));
                    }
                    if Instant::now() >= deadline {
                        return Err(RpcError::new(
                            codes::TIMEOUT,
                            format!("wait did not complete within {}ms", wait.timeout_ms),
                        ));
                    }
                    std::thread::sleep(WAIT_POLL_INTERVAL);
                }
            }
            "snapshot" => Ok(json!({ "snapshot": view.snapshot(params) })),
            "screenshot" => {
                use base64::Engine as _;
                let png = view.screenshot_png();
                Ok(json!({
                    "png_base64": base64::engine::general_purpose::STANDARD.encode(png)
                }))
            }
            gesture if INTERACTIONS.contains(&gesture) => {
                let selector = str_param(params, "selector");
                let arg = str_param(params, "text")
                    .or_else(|| str_param(params, "value"))
                    .or_else(|| str_param(params, "key"));
                view.perform(gesture, selector.as_deref(), arg.as_deref())
                    .map_err(|e| RpcError::invalid_argument(e.to_string()))?;
                let mut result = json!({ "performed": gesture });
                if params
                    .get("snapshot_after")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                {
                    result["snapshot"] = json!(view.snapshot(&Value::Null));
                }
                Ok(result)
            }
            other => view
                .misc(other, params)
                .map_err(|e| RpcError::new(codes::UNKNOWN_METHOD, e.to_string())),
        }
    }

    /// Open a url in the current workspace: reuse an existing browser
    /// surface when one is present, otherwise split the focused pane and
    /// create one.
    fn open_split(&self, params: &Value) -> Result<Value, RpcError> {
        let workspace = match str_param(params, "workspace_id")
            .or_else(|| str_param(params, "workspace"))
        {
            Some(text) => {
                Handle::parse(&text).map_err(|e| RpcError::new(e.code(), e.to_string()))?
            }
            None => Handle::Current,
        };
        let url = str_param(params, "url");

        let existing = self
            .mux
            .find_browser_surface(&workspace)
            .map_err(|e| RpcError::new(e.code(), e.to_string()))?;

        let (surface_id, created_split) = match existing {
            Some(surface_id) => (surface_id, false),
            None => {
                let direction = str_param(params, "direction")
                    .unwrap_or_else(|| "right".to_string())
                    .parse::<mux::SplitDirection>()
                    .map_err(|e| RpcError::new(e.code(), e.to_string()))?;
                let focused_pane = self
                    .mux
                    .list_panes(Some(&workspace))
                    .map_err(|e| RpcError::new(e.code(), e.to_string()))?
                    .into_iter()
                    .find(|p| p.is_focused)
                    .map(|p| Handle::Uuid(p.pane_id));
                let (_, surface_id) = self
                    .mux
                    .split_pane(focused_pane.as_ref(), direction, PanelKind::Browser)
                    .map_err(|e| RpcError::new(e.code(), e.to_string()))?;
                (surface_id, true)
            }
        };

        let view = self.view_for(surface_id)?;
        if let Some(url) = &url {
            view.navigate(url)
                .map_err(|e| RpcError::invalid_argument(e.to_string()))?;
            self.mux.set_surface_title(surface_id, url).ok();
        }

        let entry = self
            .mux
            .surface_entry(surface_id)
            .map_err(|e| RpcError::new(e.code(), e.to_string()))?;
        Ok(json!({
            "surface_id": entry.surface_id,
            "surface_ref": entry.surface_ref,
            "created_split": created_split,
            "url": view.current_url(),
        }))
    }
}

fn str_param(params: &Value, name: &str) -> Option<String> {
    params.get(name).and_then(Value::as_str).map(String::from)
}

fn require_str(params: &Value, name: &str) -> Result<String, RpcError> {
    str_param(params, name)
        .ok_or_else(|| RpcError::invalid_argument(format!("missing required param {:?}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9::assert_equal;

    fn adapter_with_window() -> (Arc<Mux>, BrowserAdapter) {
        let mux = Arc::new(Mux::new());
        mux.new_window();
        let adapter = BrowserAdapter::new(&mux);
        (mux, adapter)
    }

    #[test]
    fn navigate_and_history() {
        let (mux, adapter) = adapter_with_window();
        let (_, surface) = mux
            .split_pane(None, mux::SplitDirection::Right, PanelKind::Browser)
            .unwrap();

        let params = json!({ "surface_id": surface.to_string(), "url": "https://example.com" });
        let result = adapter.dispatch("navigate", &params).unwrap();
        assert_equal!(result["url"], json!("https://example.com"));

        adapter
            .dispatch(
                "navigate",
                &json!({ "surface_id": surface.to_string(), "url": "https://example.com/two" }),
            )
            .unwrap();
        let result = adapter
            .dispatch("back", &json!({ "surface_id": surface.to_string() }))
            .unwrap();
        assert_equal!(result["moved"], json!(true));
        assert_equal!(result["url"], json!("https://example.com"));
    }

    #[test]
    fn terminal_surface_is_not_supported() {
        let (mux, adapter) = adapter_with_window();
        let focus = mux.focused().unwrap();
        let err = adapter
            .dispatch(
                "navigate",
                &json!({
                    "surface_id": focus.surface_id.unwrap().to_string(),
                    "url": "https://example.com"
                }),
            )
            .unwrap_err();
        assert_equal!(err.code, codes::NOT_SUPPORTED);
    }

    #[test]
    fn unsupported_methods() {
        let (_mux, adapter) = adapter_with_window();
        for method in &["viewport.set", "network.route", "trace.start", "input_mouse"] {
            let err = adapter.dispatch(method, &json!({})).unwrap_err();
            assert_equal!(err.code.as_str(), codes::NOT_SUPPORTED);
        }
    }

    #[test]
    fn open_split_reuses_existing_browser() {
        let (mux, adapter) = adapter_with_window();

        let result = adapter
            .dispatch("open_split", &json!({ "url": "https://one.test" }))
            .unwrap();
        assert_equal!(result["created_split"], json!(true));
        let first_ref = result["surface_ref"].clone();

        let result = adapter
            .dispatch("open_split", &json!({ "url": "https://two.test" }))
            .unwrap();
        assert_equal!(result["created_split"], json!(false));
        assert_equal!(result["surface_ref"], first_ref);
        assert_equal!(result["url"], json!("https://two.test"));

        // still exactly one browser surface in the workspace
        let browsers = mux
            .list_surfaces(None)
            .unwrap()
            .into_iter()
            .filter(|s| s.kind == PanelKind::Browser)
            .count();
        assert_equal!(browsers, 1);
    }

    #[test]
    fn wait_times_out() {
        let (mux, adapter) = adapter_with_window();
        let (_, surface) = mux
            .split_pane(None, mux::SplitDirection::Right, PanelKind::Browser)
            .unwrap();

        let err = adapter
            .dispatch(
                "wait",
                &json!({
                    "surface_id": surface.to_string(),
                    "selector": "#never",
                    "timeout_ms": 60,
                }),
            )
            .unwrap_err();
        assert_equal!(err.code.as_str(), codes::TIMEOUT);
    }

    #[test]
    fn wait_url_contains_succeeds() {
        let (mux, adapter) = adapter_with_window();
        let (_, surface) = mux
            .split_pane(None, mux::SplitDirection::Right, PanelKind::Browser)
            .unwrap();
        adapter
            .dispatch(
                "navigate",
                &json!({ "surface_id": surface.to_string(), "url": "https://example.com/app" }),
            )
            .unwrap();
        let result = adapter
            .dispatch(
                "wait",
                &json!({
                    "surface_id": surface.to_string(),
                    "url_contains": "example.com",
                    "timeout_ms": 200,
                }),
            )
            .unwrap();
        assert_equal!(result["satisfied"], json!(true));
    }

    #[test]
    fn interaction_with_snapshot_after() {
        let (mux, adapter) = adapter_with_window();
        let (_, surface) = mux
            .split_pane(None, mux::SplitDirection::Right, PanelKind::Browser)
            .unwrap();
        let result = adapter
            .dispatch(
                "click",
                &json!({
                    "surface_id": surface.to_string(),
                    "selector": "#submit",
                    "snapshot_after": true,
                }),
            )
            .unwrap();
        assert_equal!(result["performed"], json!("click"));
        assert!(result["snapshot"].is_string());
    }

    #[test]
    fn cookies_round_trip() {
        let (mux, adapter) = adapter_with_window();
        let (_, surface) = mux
            .split_pane(None, mux::SplitDirection::Right, PanelKind::Browser)
            .unwrap();
        let sid = surface.to_string();
        adapter
            .dispatch(
                "cookies.set",
                &json!({ "surface_id": sid.clone(), "name": "token", "value": "abc" }),
            )
            .unwrap();
        let result = adapter
            .dispatch("cookies.get", &json!({ "surface_id": sid }))
            .unwrap();
        assert_equal!(result["token"], json!("abc"));
    }
}
