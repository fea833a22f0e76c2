//! The `cmux claude-hook` subcommands, invoked by the agent's lifecycle
//! hooks with the hook JSON on stdin.
//!
//! These must never wedge the agent: the session store is maintained
//! unconditionally, RPC side effects (status badges, notifications) are
//! best-effort and error-suppressed, and the process prints `OK` on the
//! paths that completed.

use crate::Opt;
use anyhow::Context as _;
use clap::Parser;
use cmuxterm_client::Client;
use cmuxterm_hook::classify::truncate;
use cmuxterm_hook::{
    classify, last_assistant_message, message_text, normalize_body, normalize_session_id,
    ConsumeQuery, NotificationClass, SessionStore, TRANSCRIPT_BODY_LIMIT,
};
use serde_json::{json, Value};
use std::io::Read as _;

const STATUS_KEY: &str = "claude";

#[derive(Debug, Parser)]
pub enum ClaudeHookCommand {
    /// An agent session started in this surface
    #[command(name = "session-start")]
    SessionStart,

    /// The agent session ended
    #[command(name = "stop")]
    Stop,

    /// The agent raised a notification event
    #[command(name = "notification")]
    Notification,
}

struct HookEnv {
    payload: Value,
    store: SessionStore,
    client: Option<Client>,
    workspace_ctx: Option<String>,
    surface_ctx: Option<String>,
}

pub fn run(cmd: &ClaudeHookCommand, opt: &Opt) -> anyhow::Result<()> {
    let mut stdin = String::new();
    std::io::stdin()
        .read_to_string(&mut stdin)
        .context("reading hook payload from stdin")?;
    // hook payloads are best-effort JSON
    let payload: Value = serde_json::from_str(&stdin).unwrap_or_else(|err| {
        log::warn!("hook payload is not valid JSON ({}); continuing empty", err);
        json!({})
    });

    let cfg = config::configuration();
    let path = opt.socket.clone().unwrap_or_else(|| cfg.socket_path.clone());
    let client = match Client::connect(&path, cfg.cli_response_timeout) {
        Ok(client) => Some(client),
        Err(err) => {
            log::warn!("app is unreachable, continuing store-only: {:#}", err);
            None
        }
    };

    let mut env = HookEnv {
        payload,
        store: SessionStore::new(cfg.hook_state_path.clone()),
        client,
        workspace_ctx: cfg.workspace_ctx.clone(),
        surface_ctx: cfg.surface_ctx.clone(),
    };

    match cmd {
        ClaudeHookCommand::SessionStart => session_start(&mut env)?,
        ClaudeHookCommand::Stop => stop(&mut env)?,
        ClaudeHookCommand::Notification => notification(&mut env)?,
    }
    println!("OK");
    Ok(())
}

fn session_id(env: &HookEnv) -> String {
    normalize_session_id(
        env.payload
            .get("session_id")
            .and_then(Value::as_str)
            .unwrap_or(""),
    )
}

/// The (workspace, surface) this hook should route to: the ambient env
/// injected into the surface, else whatever is focused right now.
fn routing_target(env: &mut HookEnv) -> Option<(String, String)> {
    if let (Some(ws), Some(sfc)) = (env.workspace_ctx.clone(), env.surface_ctx.clone()) {
        return Some((ws, sfc));
    }
    let client = env.client.as_mut()?;
    match client.call_ok("system.identify", json!({ "caller": "claude-hook" })) {
        Ok(result) => {
            let ws = result.get("workspace_id").and_then(Value::as_str)?.to_string();
            let sfc = result.get("surface_id").and_then(Value::as_str)?.to_string();
            Some((ws, sfc))
        }
        Err(err) => {
            log::warn!("identify failed: {:#}", err);
            None
        }
    }
}

/// Fire a v1 command, suppressing failures.
fn best_effort(env: &mut HookEnv, command: &str) {
    if let Some(client) = env.client.as_mut() {
        match client.send_line(command) {
            Ok(response) if response.starts_with("ERROR:") => {
                log::warn!("{} -> {}", command, response);
            }
            Ok(_) => {}
            Err(err) => log::warn!("{} failed: {:#}", command, err),
        }
    }
}

fn set_status(env: &mut HookEnv, workspace: &str, value: &str, icon: &str, color: &str) {
    let command = format!(
        "set_status {} {} --icon={} --color={} --tab={}",
        STATUS_KEY, value, icon, color, workspace
    );
    best_effort(env, &command);
}

fn set_running_status(env: &mut HookEnv, workspace: &str) {
    set_status(env, workspace, "Running", "bolt.circle", "#34C759");
}

fn class_status(env: &mut HookEnv, workspace: &str, class: NotificationClass) {
    let (value, icon, color) = match class {
        NotificationClass::Permission => {
            ("Permission", "exclamationmark.shield", "#FF9F0A")
        }
        NotificationClass::Error => ("Error", "xmark.octagon", "#FF3B30"),
        NotificationClass::Waiting => ("Waiting", "hourglass", "#FFCC00"),
        NotificationClass::Attention => ("Running", "bolt.circle", "#34C759"),
    };
    set_status(env, workspace, value, icon, color);
}

fn send_notification(env: &mut HookEnv, workspace: &str, surface: &str, subtitle: &str, body: &str) {
    let payload = codec::encode_notify_payload("Claude", subtitle, body);
    let surface = if surface.is_empty() { "-" } else { surface };
    let command = format!("notify_target {} {} {}", workspace, surface, payload);
    best_effort(env, &command);
}

fn session_start(env: &mut HookEnv) -> anyhow::Result<()> {
    let session = session_id(env);
    let cwd = env
        .payload
        .get("cwd")
        .and_then(Value::as_str)
        .map(String::from);

    match routing_target(env) {
        Some((workspace, surface)) => {
            env.store
                .upsert(&session, &workspace, &surface, cwd.as_deref(), None, None)
                .context("recording session")?;
            set_running_status(env, &workspace);
        }
        None => {
            log::warn!("no routing target for session {}; not recorded", session);
        }
    }
    Ok(())
}

fn stop(env: &mut HookEnv) -> anyhow::Result<()> {
    let session = session_id(env);
    let record = env
        .store
        .consume(&ConsumeQuery {
            session_id: Some(session.clone()),
            workspace_id: env.workspace_ctx.clone(),
            surface_id: env.surface_ctx.clone(),
        })
        .context("consuming session record")?;

    let target = record
        .as_ref()
        .map(|r| (r.workspace_id.clone(), r.surface_id.clone()))
        .or_else(|| routing_target(env));
    let (workspace, surface) = match target {
        Some(target) => target,
        None => return Ok(()),
    };

    best_effort(
        env,
        &format!("clear_status {} --tab={}", STATUS_KEY, workspace),
    );

    let body = transcript_tail(env)
        .or_else(|| {
            record.as_ref().and_then(|r| {
                r.cwd
                    .as_ref()
                    .map(|cwd| format!("Finished in {}", cwd))
            })
        })
        .unwrap_or_else(|| "Claude session ended".to_string());
    send_notification(env, &workspace, &surface, "Completed", &body);
    Ok(())
}

/// Read the last assistant message from the transcript file named in the
/// hook payload, if any.
fn transcript_tail(env: &HookEnv) -> Option<String> {
    let path = env.payload.get("transcript_path").and_then(Value::as_str)?;
    let transcript = match std::fs::read_to_string(path) {
        Ok(transcript) => transcript,
        Err(err) => {
            log::warn!("cannot read transcript {}: {}", path, err);
            return None;
        }
    };
    let message = last_assistant_message(&transcript)?;
    Some(truncate(&message.replace('\n', " "), TRANSCRIPT_BODY_LIMIT))
}

fn notification(env: &mut HookEnv) -> anyhow::Result<()> {
    let session = session_id(env);
    let class = classify(&env.payload);
    let record = env.store.lookup(&session).context("loading session record")?;

    let target = record
        .as_ref()
        .map(|r| (r.workspace_id.clone(), r.surface_id.clone()))
        .or_else(|| routing_target(env));
    let (workspace, surface) = match target {
        Some(target) => target,
        None => return Ok(()),
    };

    if !class.is_actionable() {
        set_running_status(env, &workspace);
        return Ok(());
    }

    let subtitle = class.subtitle().to_string();
    let raw_body = message_text(&env.payload);

    // duplicate suppression compares the raw (subtitle, body) pair as it
    // was stored, before the session suffix and truncation are applied
    let duplicate = record
        .as_ref()
        .map(|r| {
            r.last_subtitle.as_deref() == Some(subtitle.as_str())
                && r.last_body.as_deref() == Some(raw_body.as_str())
        })
        .unwrap_or(false);
    if duplicate {
        set_running_status(env, &workspace);
        return Ok(());
    }

    let body = normalize_body(&raw_body, Some(&session));
    send_notification(env, &workspace, &surface, &subtitle, &body);
    env.store
        .remember_notification(&session, &subtitle, &raw_body)
        .context("recording notification")?;
    class_status(env, &workspace, class);
    Ok(())
}
