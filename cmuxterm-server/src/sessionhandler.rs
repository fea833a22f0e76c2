//! The command dispatcher: parses v1 line commands and v2 JSON-RPC
//! requests and routes them to the topology, notification and browser
//! operations.  One instance is shared by every client; callers are
//! expected to run requests on the main scheduler (browser.wait is the
//! exception, see dispatch.rs).

use crate::browser::BrowserAdapter;
use codec::{codes, Request, Response, RpcError};
use config::AccessMode;
use mux::{
    Handle, MoveRequest, Mux, MuxError, PanelKind, Position, SplitDirection, StatusIndicator,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// v2 methods advertised by system.capabilities.  browser.* methods are
/// summarized by their group prefix.
const METHODS: &[&str] = &[
    "system.ping",
    "system.capabilities",
    "system.identify",
    "window.list",
    "window.current",
    "window.new",
    "window.focus",
    "window.close",
    "workspace.list",
    "workspace.current",
    "workspace.new",
    "workspace.select",
    "workspace.close",
    "workspace.reorder",
    "workspace.move_to_window",
    "workspace.set_status",
    "workspace.clear_status",
    "pane.list",
    "pane.focus",
    "surface.list",
    "surface.new",
    "surface.close",
    "surface.focus",
    "surface.reorder",
    "surface.move",
    "surface.trigger_flash",
    "browser.*",
];

pub struct SessionHandler {
    mux: Arc<Mux>,
    browser: Arc<BrowserAdapter>,
    access_mode: AccessMode,
    ambient_workspace: Option<String>,
    ambient_surface: Option<String>,
}

fn rpc_err(err: MuxError) -> RpcError {
    RpcError::new(err.code(), err.to_string())
}

impl SessionHandler {
    pub fn new(mux: &Arc<Mux>, browser: Arc<BrowserAdapter>, access_mode: AccessMode) -> Self {
        let cfg = config::configuration();
        Self {
            mux: Arc::clone(mux),
            browser,
            access_mode,
            ambient_workspace: cfg.workspace_ctx.clone(),
            ambient_surface: cfg.surface_ctx.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_ambient(mut self, workspace: Option<String>, surface: Option<String>) -> Self {
        self.ambient_workspace = workspace;
        self.ambient_surface = surface;
        self
    }

    /// True when this request line is a browser.wait call, which must not
    /// occupy the main scheduler while it polls.
    pub fn is_wait_request(line: &str) -> bool {
        let line = line.trim_start();
        line.starts_with('{') && {
            serde_json::from_str::<Request>(line)
                .map(|r| r.method == "browser.wait")
                .unwrap_or(false)
        }
    }

    /// Process one request line and return the response (no trailing
    /// newline).
    pub fn process_request(&self, line: &str) -> String {
        let line = line.trim();
        if line.starts_with('{') {
            self.process_v2(line)
        } else {
            self.process_v1(line)
        }
    }

    fn process_v2(&self, line: &str) -> String {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                let response = Response::error(
                    None,
                    RpcError::new(codes::PARSE_ERROR, format!("invalid request: {}", err)),
                );
                return serde_json::to_string(&response).unwrap_or_default();
            }
        };
        let id = request.id.clone();
        let result = if self.access_mode.allows(gate_name(&request.method)) {
            self.dispatch_v2(&request.method, &request.params)
        } else {
            Err(RpcError::new(
                codes::PERMISSION_DENIED,
                format!("access mode denies {}", request.method),
            ))
        };
        let response = match result {
            Ok(value) => Response::result(id, value),
            Err(err) => Response::error(id, err),
        };
        serde_json::to_string(&response).unwrap_or_default()
    }

    fn process_v1(&self, line: &str) -> String {
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        if verb.is_empty() {
            return "ERROR: Unknown command".to_string();
        }
        if !self.access_mode.allows(verb) {
            return format!("ERROR: permission_denied: access mode denies {}", verb);
        }
        match self.dispatch_v1(verb, rest) {
            Ok(response) => response,
            Err(err) if err.code == codes::UNKNOWN_METHOD => "ERROR: Unknown command".to_string(),
            Err(err) => format!("ERROR: {}", err),
        }
    }

    // ----- v1 -----

    fn dispatch_v1(&self, verb: &str, rest: &str) -> Result<String, RpcError> {
        let mux = &self.mux;
        match verb {
            "ping" => Ok("OK".to_string()),
            "help" => Ok(help_text()),

            "list_windows" => {
                let windows = mux.list_windows();
                if windows.is_empty() {
                    return Ok("No windows".to_string());
                }
                Ok(windows
                    .iter()
                    .enumerate()
                    .map(|(idx, w)| {
                        format!(
                            "{} {}: {} {}",
                            if w.is_key { "*" } else { " " },
                            idx,
                            w.window_id,
                            w.window_ref
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            "current_window" => {
                let window = mux.current_window().map_err(rpc_err)?;
                Ok(format!("{} {}", window.window_id, window.window_ref))
            }
            "new_window" => {
                let window_id = mux.new_window();
                Ok(format!("OK {}", window_id))
            }
            "focus_window" => {
                let handle = parse_handle(first_token(rest))?;
                mux.focus_window(&handle).map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "close_window" => {
                let args = V1Args::parse(rest);
                let handle = parse_handle(args.positional.first().map(String::as_str))?;
                mux.close_window(&handle, args.flag("force"))
                    .map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "move_workspace_to_window" => {
                let mut tokens = rest.split_whitespace();
                let ws = parse_handle(tokens.next())?;
                let win = parse_handle(tokens.next())?;
                mux.move_workspace_to_window(&ws, &win).map_err(rpc_err)?;
                Ok("OK".to_string())
            }

            "list_workspaces" => {
                let entries = mux.list_workspaces(None).map_err(rpc_err)?;
                if entries.is_empty() {
                    return Ok("No workspaces".to_string());
                }
                Ok(entries
                    .iter()
                    .enumerate()
                    .map(|(idx, ws)| {
                        format!(
                            "{} {}: {} {}",
                            if ws.is_selected { "*" } else { " " },
                            idx,
                            ws.workspace_id,
                            ws.title
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            "new_workspace" => {
                let workspace_id = mux.new_workspace(None, None).map_err(rpc_err)?;
                Ok(format!("OK {}", workspace_id))
            }
            "select_workspace" => {
                let handle = parse_handle(first_token(rest))?;
                mux.select_workspace(&handle).map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "current_workspace" => {
                let ws = mux.current_workspace().map_err(rpc_err)?;
                Ok(format!("{} {} {}", ws.workspace_id, ws.workspace_ref, ws.title))
            }
            "close_workspace" => {
                let handle = parse_handle(first_token(rest))?;
                mux.close_workspace(&handle).map_err(rpc_err)?;
                Ok("OK".to_string())
            }

            "list_surfaces" => {
                let workspace = opt_handle(first_token(rest))?;
                let entries = mux.list_surfaces(workspace.as_ref()).map_err(rpc_err)?;
                Ok(render_surface_listing(&entries))
            }
            "focus_surface" => {
                let handle = parse_handle(first_token(rest))?;
                mux.focus_surface(&handle).map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "new_split" => {
                let mut tokens = rest.split_whitespace();
                let direction: SplitDirection = tokens
                    .next()
                    .ok_or_else(|| RpcError::invalid_argument("missing direction"))?
                    .parse()
                    .map_err(rpc_err)?;
                let pane = opt_handle(tokens.next())?;
                let (pane_id, _) = mux
                    .split_pane(pane.as_ref(), direction, PanelKind::Terminal)
                    .map_err(rpc_err)?;
                Ok(format!("OK {}", pane_id))
            }
            "list_panes" => {
                let entries = mux.list_panes(None).map_err(rpc_err)?;
                if entries.is_empty() {
                    return Ok("No panes".to_string());
                }
                Ok(entries
                    .iter()
                    .enumerate()
                    .map(|(idx, p)| {
                        format!(
                            "{} {}: {} [{} tabs]",
                            if p.is_focused { "*" } else { " " },
                            idx,
                            p.pane_id,
                            p.surface_count
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            "list_pane_surfaces" => {
                let args = V1Args::parse(rest);
                let pane = opt_handle(args.option("pane"))?;
                let entries = mux.list_pane_surfaces(pane.as_ref()).map_err(rpc_err)?;
                Ok(render_surface_listing(&entries))
            }
            "focus_pane" => {
                let handle = parse_handle(first_token(rest))?;
                mux.focus_pane(&handle).map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "new_pane" => {
                let args = V1Args::parse(rest);
                let kind: PanelKind = args
                    .option("type")
                    .unwrap_or("terminal")
                    .parse()
                    .map_err(rpc_err)?;
                let direction: SplitDirection = args
                    .option("direction")
                    .unwrap_or("right")
                    .parse()
                    .map_err(rpc_err)?;
                let (pane_id, surface_id) =
                    mux.split_pane(None, direction, kind).map_err(rpc_err)?;
                if let Some(url) = args.option("url") {
                    if kind == PanelKind::Browser {
                        self.browser.dispatch(
                            "navigate",
                            &json!({ "surface_id": surface_id.to_string(), "url": url }),
                        )?;
                    }
                }
                Ok(format!("OK {}", pane_id))
            }
            "new_surface" => {
                let args = V1Args::parse(rest);
                let kind: PanelKind = args
                    .option("type")
                    .unwrap_or("terminal")
                    .parse()
                    .map_err(rpc_err)?;
                let pane = opt_handle(args.option("pane"))?;
                let surface_id = mux.new_surface(kind, pane.as_ref()).map_err(rpc_err)?;
                if let Some(url) = args.option("url") {
                    if kind == PanelKind::Browser {
                        self.browser.dispatch(
                            "navigate",
                            &json!({ "surface_id": surface_id.to_string(), "url": url }),
                        )?;
                    }
                }
                Ok(format!("OK {}", surface_id))
            }
            "close_surface" => {
                let handle = Handle::parse_opt(first_token(rest)).map_err(rpc_err)?;
                mux.close_surface(&handle).map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "drag_surface_to_split" => {
                let mut tokens = rest.split_whitespace();
                let handle = parse_handle(tokens.next())?;
                let direction: SplitDirection = tokens
                    .next()
                    .ok_or_else(|| RpcError::invalid_argument("missing direction"))?
                    .parse()
                    .map_err(rpc_err)?;
                let pane_id = mux
                    .drag_surface_to_split(&handle, direction)
                    .map_err(rpc_err)?;
                Ok(format!("OK {}", pane_id))
            }
            "refresh_surfaces" => {
                let count = mux.refresh_surfaces();
                Ok(format!("OK {}", count))
            }
            "surface_health" => {
                let workspace = opt_handle(first_token(rest))?;
                let health = mux.surface_health(workspace.as_ref()).map_err(rpc_err)?;
                if health.is_empty() {
                    return Ok("No surfaces".to_string());
                }
                Ok(health
                    .iter()
                    .map(|(entry, healthy)| {
                        format!(
                            "{} {} {}",
                            entry.surface_id,
                            entry.surface_ref,
                            if *healthy { "healthy" } else { "unresponsive" }
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }

            "send" => {
                mux.send_text(None, &codec::unescape_text(rest))
                    .map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "send_key" => {
                let key = first_token(rest)
                    .ok_or_else(|| RpcError::invalid_argument("missing key"))?;
                mux.send_key(None, key).map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "send_surface" => {
                let (handle_text, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| RpcError::invalid_argument("missing text"))?;
                let handle = parse_handle(Some(handle_text))?;
                mux.send_text(Some(&handle), &codec::unescape_text(text.trim_start()))
                    .map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "send_key_surface" => {
                let mut tokens = rest.split_whitespace();
                let handle = parse_handle(tokens.next())?;
                let key = tokens
                    .next()
                    .ok_or_else(|| RpcError::invalid_argument("missing key"))?;
                mux.send_key(Some(&handle), key).map_err(rpc_err)?;
                Ok("OK".to_string())
            }

            "notify" => {
                let workspace = match &self.ambient_workspace {
                    Some(text) => Handle::parse(text).map_err(rpc_err)?,
                    None => Handle::Current,
                };
                let surface = match &self.ambient_surface {
                    Some(text) => Some(Handle::parse(text).map_err(rpc_err)?),
                    None => None,
                };
                self.notify_common(&workspace, surface.as_ref(), rest)
            }
            "notify_surface" => {
                let (handle_text, payload) = match rest.split_once(char::is_whitespace) {
                    Some((h, p)) => (h, p.trim()),
                    None => (rest, ""),
                };
                let surface = parse_handle(Some(handle_text))?;
                let surface_id = mux.resolve_surface(&surface).map_err(rpc_err)?;
                let workspace_id = mux.workspace_of_surface(surface_id).map_err(rpc_err)?;
                self.notify_common(
                    &Handle::Uuid(workspace_id),
                    Some(&Handle::Uuid(surface_id)),
                    payload,
                )
            }
            "notify_target" => {
                let mut tokens = rest.splitn(3, char::is_whitespace);
                let workspace = parse_handle(tokens.next())?;
                let surface_text = tokens
                    .next()
                    .ok_or_else(|| RpcError::invalid_argument("missing surface"))?;
                let surface = if surface_text == "-" || surface_text == "none" {
                    None
                } else {
                    Some(Handle::parse(surface_text).map_err(rpc_err)?)
                };
                let payload = tokens.next().unwrap_or("").trim();
                self.notify_common(&workspace, surface.as_ref(), payload)
            }
            "list_notifications" => {
                let notifications = mux.list_notifications();
                if notifications.is_empty() {
                    return Ok("No notifications".to_string());
                }
                Ok(notifications
                    .iter()
                    .enumerate()
                    .map(|(idx, n)| {
                        format!(
                            "{} {}: {} {}",
                            if n.is_read { " " } else { "*" },
                            idx,
                            n.id,
                            codec::encode_notify_payload(&n.title, &n.subtitle, &n.body)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            "clear_notifications" => {
                let count = mux.clear_notifications();
                Ok(format!("OK {}", count))
            }

            "set_app_focus" => match first_token(rest) {
                Some("active") => {
                    mux.set_app_focus(Some(true));
                    Ok("OK".to_string())
                }
                Some("inactive") => {
                    mux.set_app_focus(Some(false));
                    Ok("OK".to_string())
                }
                Some("clear") => {
                    mux.set_app_focus(None);
                    Ok("OK".to_string())
                }
                _ => Err(RpcError::invalid_argument(
                    "expected active, inactive or clear",
                )),
            },
            "simulate_app_active" => {
                mux.simulate_app_active();
                Ok("OK".to_string())
            }

            "set_status" => {
                let args = V1Args::parse(rest);
                let key = args
                    .positional
                    .first()
                    .ok_or_else(|| RpcError::invalid_argument("missing status key"))?;
                let value = args.positional[1..].join(" ");
                let workspace = opt_handle(args.option("tab"))?.unwrap_or(Handle::Current);
                mux.set_status(
                    &workspace,
                    key,
                    StatusIndicator {
                        value,
                        icon: args.option("icon").map(String::from),
                        color: args.option("color").map(String::from),
                    },
                )
                .map_err(rpc_err)?;
                Ok("OK".to_string())
            }
            "clear_status" => {
                let args = V1Args::parse(rest);
                let key = args
                    .positional
                    .first()
                    .ok_or_else(|| RpcError::invalid_argument("missing status key"))?;
                let workspace = opt_handle(args.option("tab"))?.unwrap_or(Handle::Current);
                mux.clear_status(&workspace, key).map_err(rpc_err)?;
                Ok("OK".to_string())
            }

            "open_browser" => {
                let mut params = json!({});
                if let Some(url) = first_token(rest) {
                    params["url"] = json!(url);
                }
                let result = self.browser.dispatch("open_split", &params)?;
                Ok(format!(
                    "OK {}",
                    result["surface_id"].as_str().unwrap_or_default()
                ))
            }
            "navigate" => {
                let mut tokens = rest.split_whitespace();
                let handle_text = tokens
                    .next()
                    .ok_or_else(|| RpcError::invalid_argument("missing surface"))?;
                let url = tokens
                    .next()
                    .ok_or_else(|| RpcError::invalid_argument("missing url"))?;
                self.browser.dispatch(
                    "navigate",
                    &json!({ "surface_id": handle_text, "url": url }),
                )?;
                Ok("OK".to_string())
            }
            "browser_back" | "browser_forward" | "browser_reload" => {
                let handle_text = first_token(rest)
                    .ok_or_else(|| RpcError::invalid_argument("missing surface"))?;
                let method = &verb["browser_".len()..];
                self.browser
                    .dispatch(method, &json!({ "surface_id": handle_text }))?;
                Ok("OK".to_string())
            }
            "get_url" => {
                let handle_text = first_token(rest)
                    .ok_or_else(|| RpcError::invalid_argument("missing surface"))?;
                let result = self
                    .browser
                    .dispatch("url.get", &json!({ "surface_id": handle_text }))?;
                Ok(result["value"].as_str().unwrap_or_default().to_string())
            }

            _ => Err(RpcError::new(codes::UNKNOWN_METHOD, "Unknown command")),
        }
    }

    fn notify_common(
        &self,
        workspace: &Handle,
        surface: Option<&Handle>,
        payload: &str,
    ) -> Result<String, RpcError> {
        let (title, subtitle, body) = codec::split_notify_payload(payload);
        let title = if title.is_empty() {
            "Notification".to_string()
        } else {
            title
        };
        let id = self
            .mux
            .add_notification(workspace, surface, &title, &subtitle, &body)
            .map_err(rpc_err)?;
        Ok(format!("OK {}", id))
    }

    // ----- v2 -----

    fn dispatch_v2(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        let mux = &self.mux;

        if let Some(browser_method) = method.strip_prefix("browser.") {
            return self.browser.dispatch(browser_method, params);
        }

        match method {
            "system.ping" => Ok(json!({ "pong": true })),
            "system.capabilities" => Ok(json!({
                "version": env!("CARGO_PKG_VERSION"),
                "protocols": ["v1", "v2"],
                "methods": METHODS,
            })),
            "system.identify" => {
                let caller = params.get("caller").and_then(Value::as_str).map(String::from);
                let identify = mux.identify(caller).map_err(rpc_err)?;
                to_value(identify)
            }

            "window.list" => to_value(mux.list_windows()),
            "window.current" => to_value(mux.current_window().map_err(rpc_err)?),
            "window.new" => {
                mux.new_window();
                to_value(mux.current_window().map_err(rpc_err)?)
            }
            "window.focus" => {
                let handle = handle_param(params, "window")?.unwrap_or(Handle::Current);
                let window_id = mux.focus_window(&handle).map_err(rpc_err)?;
                Ok(json!({ "window_id": window_id }))
            }
            "window.close" => {
                let handle = handle_param(params, "window")?.unwrap_or(Handle::Current);
                let force = params.get("force").and_then(Value::as_bool).unwrap_or(false);
                let window_id = mux.close_window(&handle, force).map_err(rpc_err)?;
                Ok(json!({ "window_id": window_id }))
            }

            "workspace.list" => {
                let window = handle_param(params, "window")?;
                to_value(mux.list_workspaces(window.as_ref()).map_err(rpc_err)?)
            }
            "workspace.current" => to_value(mux.current_workspace().map_err(rpc_err)?),
            "workspace.new" => {
                let window = handle_param(params, "window")?;
                let title = params.get("title").and_then(Value::as_str).map(String::from);
                let workspace_id = mux.new_workspace(window.as_ref(), title).map_err(rpc_err)?;
                Ok(json!({ "workspace_id": workspace_id }))
            }
            "workspace.select" => {
                let handle = handle_param(params, "workspace")?.unwrap_or(Handle::Current);
                let workspace_id = mux.select_workspace(&handle).map_err(rpc_err)?;
                Ok(json!({ "workspace_id": workspace_id }))
            }
            "workspace.close" => {
                let handle = handle_param(params, "workspace")?.unwrap_or(Handle::Current);
                let workspace_id = mux.close_workspace(&handle).map_err(rpc_err)?;
                Ok(json!({ "workspace_id": workspace_id }))
            }
            "workspace.reorder" => {
                let handle = handle_param(params, "workspace")?.unwrap_or(Handle::Current);
                let window = handle_param(params, "window")?;
                let position = position_param(params)?;
                let index = mux
                    .reorder_workspace(&handle, &position, window.as_ref())
                    .map_err(rpc_err)?;
                Ok(json!({ "index": index }))
            }
            "workspace.move_to_window" => {
                let workspace = handle_param(params, "workspace")?.unwrap_or(Handle::Current);
                let window = handle_param(params, "window")?
                    .ok_or_else(|| RpcError::invalid_argument("missing window"))?;
                let (workspace_id, window_id) = mux
                    .move_workspace_to_window(&workspace, &window)
                    .map_err(rpc_err)?;
                Ok(json!({ "workspace_id": workspace_id, "window_id": window_id }))
            }
            "workspace.set_status" => {
                let workspace = handle_param(params, "workspace")?.unwrap_or(Handle::Current);
                let key = params
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RpcError::invalid_argument("missing key"))?;
                let indicator = StatusIndicator {
                    value: params
                        .get("value")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    icon: params.get("icon").and_then(Value::as_str).map(String::from),
                    color: params.get("color").and_then(Value::as_str).map(String::from),
                };
                mux.set_status(&workspace, key, indicator).map_err(rpc_err)?;
                Ok(json!({}))
            }
            "workspace.clear_status" => {
                let workspace = handle_param(params, "workspace")?.unwrap_or(Handle::Current);
                let key = params
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RpcError::invalid_argument("missing key"))?;
                let cleared = mux.clear_status(&workspace, key).map_err(rpc_err)?;
                Ok(json!({ "cleared": cleared }))
            }

            "pane.list" => {
                let workspace = handle_param(params, "workspace")?;
                to_value(mux.list_panes(workspace.as_ref()).map_err(rpc_err)?)
            }
            "pane.focus" => {
                let handle = handle_param(params, "pane")?.unwrap_or(Handle::Current);
                let pane_id = mux.focus_pane(&handle).map_err(rpc_err)?;
                Ok(json!({ "pane_id": pane_id }))
            }

            "surface.list" => {
                let workspace = handle_param(params, "workspace")?;
                to_value(mux.list_surfaces(workspace.as_ref()).map_err(rpc_err)?)
            }
            "surface.new" => {
                let kind: PanelKind = params
                    .get("kind")
                    .and_then(Value::as_str)
                    .unwrap_or("terminal")
                    .parse()
                    .map_err(rpc_err)?;
                let pane = handle_param(params, "pane")?;
                let surface_id = mux.new_surface(kind, pane.as_ref()).map_err(rpc_err)?;
                if let (Some(url), PanelKind::Browser) =
                    (params.get("url").and_then(Value::as_str), kind)
                {
                    self.browser.dispatch(
                        "navigate",
                        &json!({ "surface_id": surface_id.to_string(), "url": url }),
                    )?;
                }
                to_value(mux.surface_entry(surface_id).map_err(rpc_err)?)
            }
            "surface.close" => {
                let handle = handle_param(params, "surface")?.unwrap_or(Handle::Current);
                let surface_id = mux.close_surface(&handle).map_err(rpc_err)?;
                Ok(json!({ "surface_id": surface_id }))
            }
            "surface.focus" => {
                let handle = handle_param(params, "surface")?.unwrap_or(Handle::Current);
                let surface_id = mux.focus_surface(&handle).map_err(rpc_err)?;
                Ok(json!({ "surface_id": surface_id }))
            }
            "surface.reorder" => {
                let handle = handle_param(params, "surface")?.unwrap_or(Handle::Current);
                let position = position_param(params)?;
                let index = mux.reorder_surface(&handle, &position).map_err(rpc_err)?;
                Ok(json!({ "index": index }))
            }
            "surface.move" => {
                let handle = handle_param(params, "surface")?.unwrap_or(Handle::Current);
                let request = MoveRequest {
                    pane: handle_param(params, "pane")?,
                    workspace: handle_param(params, "workspace")?,
                    window: handle_param(params, "window")?,
                    position: position_param(params)?,
                    focus: params.get("focus").and_then(Value::as_bool),
                };
                to_value(mux.move_surface(&handle, &request).map_err(rpc_err)?)
            }
            "surface.trigger_flash" => {
                let workspace = handle_param(params, "workspace")?;
                let surface = handle_param(params, "surface")?;
                let surface_id = mux
                    .trigger_flash(workspace.as_ref(), surface.as_ref())
                    .map_err(rpc_err)?;
                Ok(json!({ "surface_id": surface_id }))
            }

            _ => Err(RpcError::new(
                codes::UNKNOWN_METHOD,
                format!("unknown method {:?}", method),
            )),
        }
    }
}

/// v1 spelling used for access gating of a v2 method.
fn gate_name(method: &str) -> &str {
    match method {
        "system.ping" => "ping",
        other => other,
    }
}

fn to_value(value: impl serde::Serialize) -> Result<Value, RpcError> {
    serde_json::to_value(value)
        .map_err(|e| RpcError::new(codes::IO_ERROR, format!("serializing response: {}", e)))
}

fn first_token(rest: &str) -> Option<&str> {
    rest.split_whitespace().next()
}

fn parse_handle(text: Option<&str>) -> Result<Handle, RpcError> {
    let text = text.ok_or_else(|| RpcError::invalid_argument("missing handle"))?;
    Handle::parse(text).map_err(rpc_err)
}

fn opt_handle(text: Option<&str>) -> Result<Option<Handle>, RpcError> {
    match text {
        Some(text) => Ok(Some(Handle::parse(text).map_err(rpc_err)?)),
        None => Ok(None),
    }
}

fn handle_param(params: &Value, kind: &str) -> Result<Option<Handle>, RpcError> {
    let key_id = format!("{}_id", kind);
    let text = params
        .get(key_id.as_str())
        .or_else(|| params.get(kind))
        .and_then(Value::as_str);
    match text {
        Some(text) => Ok(Some(Handle::parse(text).map_err(rpc_err)?)),
        None => Ok(None),
    }
}

fn position_param(params: &Value) -> Result<Position, RpcError> {
    let get = |name: &str| -> Result<Option<Handle>, RpcError> {
        match params.get(name).and_then(Value::as_str) {
            Some(text) => Ok(Some(Handle::parse(text).map_err(rpc_err)?)),
            None => Ok(None),
        }
    };
    Ok(Position {
        before: get("before")?,
        after: get("after")?,
        index: params
            .get("index")
            .and_then(Value::as_u64)
            .map(|i| i as usize),
    })
}

fn render_surface_listing(entries: &[mux::SurfaceEntry]) -> String {
    if entries.is_empty() {
        return "No surfaces".to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            format!(
                "{} {}: {} {}",
                if s.is_selected { "*" } else { " " },
                idx,
                s.surface_id,
                s.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Simple v1 argument splitter: `--key=value` / `--key` options anywhere,
/// everything else positional.
struct V1Args {
    positional: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

impl V1Args {
    fn parse(rest: &str) -> Self {
        let tokens = shlex::split(rest).unwrap_or_else(|| {
            rest.split_whitespace().map(String::from).collect()
        });
        let mut positional = vec![];
        let mut options = vec![];
        for token in tokens {
            if let Some(option) = token.strip_prefix("--") {
                match option.split_once('=') {
                    Some((key, value)) => {
                        options.push((key.to_string(), Some(value.to_string())))
                    }
                    None => options.push((option.to_string(), None)),
                }
            } else {
                positional.push(token);
            }
        }
        Self { positional, options }
    }

    fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    fn flag(&self, key: &str) -> bool {
        self.options.iter().any(|(k, _)| k == key)
    }
}

fn help_text() -> String {
    [
        "Commands:",
        "  ping help list_windows current_window new_window focus_window close_window",
        "  move_workspace_to_window list_workspaces new_workspace select_workspace",
        "  current_workspace close_workspace list_surfaces focus_surface new_split",
        "  list_panes list_pane_surfaces focus_pane new_pane new_surface close_surface",
        "  drag_surface_to_split refresh_surfaces surface_health",
        "  send send_key send_surface send_key_surface",
        "  notify notify_surface notify_target list_notifications clear_notifications",
        "  set_app_focus simulate_app_active set_status clear_status",
        "  open_browser navigate browser_back browser_forward browser_reload get_url",
        "v2: send one JSON object per line: {\"id\":1,\"method\":\"window.list\",\"params\":{}}",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9::assert_equal;

    fn handler() -> SessionHandler {
        let mux = Arc::new(Mux::new());
        mux.new_window();
        let browser = Arc::new(BrowserAdapter::new(&mux));
        SessionHandler::new(&mux, browser, AccessMode::Full)
            .with_ambient(None, None)
    }

    fn v2(handler: &SessionHandler, method: &str, params: Value) -> Result<Value, RpcError> {
        let line = serde_json::to_string(&json!({
            "id": 1,
            "method": method,
            "params": params,
        }))
        .unwrap();
        let response: Response = serde_json::from_str(&handler.process_request(&line)).unwrap();
        response.into_result()
    }

    #[test]
    fn ping_and_unknown() {
        let handler = handler();
        assert_equal!(handler.process_request("ping"), "OK");
        assert_equal!(handler.process_request("frobnicate"), "ERROR: Unknown command");
        // trailing whitespace is ignored
        assert_equal!(handler.process_request("ping   "), "OK");
    }

    #[test]
    fn new_surface_flow() {
        let handler = handler();
        let response = handler.process_request("new_surface --type=terminal");
        assert!(response.starts_with("OK "), "got {:?}", response);

        let panes = handler.process_request("list_panes");
        assert!(panes.contains("[2 tabs]"), "got {:?}", panes);

        let listing = handler.process_request("list_pane_surfaces");
        let lines: Vec<&str> = listing.lines().collect();
        assert_equal!(lines.len(), 2);
        assert!(lines[1].starts_with("* 1:"), "got {:?}", lines);
        assert!(lines[0].starts_with("  0:"), "got {:?}", lines);
    }

    #[test]
    fn close_last_window_empties_listing() {
        let handler = handler();
        let response = v2(
            &handler,
            "window.close",
            json!({ "window_id": "window:1", "force": true }),
        );
        assert!(response.is_ok());
        assert_equal!(handler.process_request("list_windows"), "No windows");
    }

    #[test]
    fn v2_identify_includes_refs_and_uuids() {
        let handler = handler();
        v2(&handler, "window.focus", json!({ "window_id": "window:1" })).unwrap();
        let result = v2(&handler, "system.identify", json!({})).unwrap();
        assert_equal!(result["window_ref"], json!("window:1"));
        assert!(result["window_id"].is_string());
        assert!(result["surface_ref"].is_string());
    }

    #[test]
    fn v2_reorder_missing_position() {
        let handler = handler();
        let err = v2(&handler, "workspace.reorder", json!({})).unwrap_err();
        assert_equal!(err.code.as_str(), codes::MISSING_POSITION);
    }

    #[test]
    fn v2_and_v1_have_identical_effects() {
        let handler = handler();
        // v1 with trailing whitespace
        handler.process_request("new_workspace  ");
        // v2 with empty params
        v2(&handler, "workspace.new", json!({})).unwrap();

        let listing = handler.process_request("list_workspaces");
        assert_equal!(listing.lines().count(), 3);
    }

    #[test]
    fn unknown_v2_method() {
        let handler = handler();
        let err = v2(&handler, "gadget.spin", json!({})).unwrap_err();
        assert_equal!(err.code.as_str(), codes::UNKNOWN_METHOD);
    }

    #[test]
    fn v2_parse_error() {
        let handler = handler();
        let response: Response =
            serde_json::from_str(&handler.process_request("{not json")).unwrap();
        let err = response.into_result().unwrap_err();
        assert_equal!(err.code.as_str(), codes::PARSE_ERROR);
    }

    #[test]
    fn notifications_only_gate() {
        let mux = Arc::new(Mux::new());
        mux.new_window();
        let browser = Arc::new(BrowserAdapter::new(&mux));
        let handler = SessionHandler::new(&mux, browser, AccessMode::NotificationsOnly)
            .with_ambient(None, None);

        assert_equal!(handler.process_request("ping"), "OK");
        assert!(handler
            .process_request("notify Title|Sub|Body")
            .starts_with("OK "));
        let denied = handler.process_request("new_window");
        assert!(denied.starts_with("ERROR: permission_denied"), "got {:?}", denied);

        let response: Response = serde_json::from_str(
            &handler.process_request("{\"method\":\"window.list\",\"params\":{}}"),
        )
        .unwrap();
        assert_equal!(
            response.into_result().unwrap_err().code.as_str(),
            codes::PERMISSION_DENIED
        );
    }

    #[test]
    fn off_mode_refuses_everything() {
        let mux = Arc::new(Mux::new());
        mux.new_window();
        let browser = Arc::new(BrowserAdapter::new(&mux));
        let handler =
            SessionHandler::new(&mux, browser, AccessMode::Off).with_ambient(None, None);
        assert!(handler.process_request("ping").starts_with("ERROR: permission_denied"));
    }

    #[test]
    fn notify_target_and_listing() {
        let handler = handler();
        let response = handler.process_request("notify_target workspace:1 - Build done|CI|All tests passed");
        assert!(response.starts_with("OK "), "got {:?}", response);

        let listing = handler.process_request("list_notifications");
        assert!(listing.contains("Build done|CI|All tests passed"), "got {:?}", listing);
        assert!(listing.starts_with("* 0:"), "unread marker missing: {:?}", listing);

        assert_equal!(handler.process_request("clear_notifications"), "OK 1");
        assert_equal!(handler.process_request("list_notifications"), "No notifications");
    }

    #[test]
    fn reorder_surface_via_v2_matches_listing_index() {
        let handler = handler();
        handler.process_request("new_surface");
        handler.process_request("new_surface");
        // surfaces: [s1, s2, s3], focused s3; focus s2 then move index 2 to 0
        let listing = handler.process_request("list_pane_surfaces");
        assert_equal!(listing.lines().count(), 3);
        v2(&handler, "surface.focus", json!({ "surface_id": "1" })).unwrap();
        v2(
            &handler,
            "surface.reorder",
            json!({ "surface_id": "2", "index": 0 }),
        )
        .unwrap();

        let result = v2(&handler, "system.identify", json!({})).unwrap();
        assert_equal!(result["surface_ref"], json!("surface:2"));
    }

    #[test]
    fn browser_open_via_v1_and_get_url() {
        let handler = handler();
        let response = handler.process_request("open_browser https://example.com");
        assert!(response.starts_with("OK "), "got {:?}", response);
        let surface_id = response.trim_start_matches("OK ").to_string();

        let url = handler.process_request(&format!("get_url {}", surface_id));
        assert_equal!(url, "https://example.com");
    }

    #[test]
    fn status_verbs() {
        let handler = handler();
        let response = handler
            .process_request("set_status claude Running --icon=sparkle --color=#ff8800 --tab=workspace:1");
        assert_equal!(response, "OK");
        assert_equal!(
            handler.process_request("clear_status claude --tab=workspace:1"),
            "OK"
        );
    }

    #[test]
    fn capabilities_lists_methods() {
        let handler = handler();
        let result = v2(&handler, "system.capabilities", json!({})).unwrap();
        let methods = result["methods"].as_array().unwrap();
        assert!(methods.iter().any(|m| m == "surface.move"));
        assert!(result["protocols"].as_array().unwrap().len() == 2);
    }
}
