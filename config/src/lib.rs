//! Process-wide configuration for the cmuxterm control plane.
//!
//! Everything here is resolved from the environment once at startup and
//! then treated as immutable; runtime admin state (app focus, access mode
//! overrides) lives in the mux, not here.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const SOCKET_PATH_ENV: &str = "CMUX_SOCKET_PATH";
pub const HOOK_STATE_PATH_ENV: &str = "CMUX_CLAUDE_HOOK_STATE_PATH";
pub const RESPONSE_TIMEOUT_ENV: &str = "CMUXTERM_CLI_RESPONSE_TIMEOUT_SEC";
pub const ACCESS_MODE_ENV: &str = "CMUX_ACCESS_MODE";
pub const WORKSPACE_CTX_ENV: &str = "CMUX_WORKSPACE_ID";
pub const SURFACE_CTX_ENV: &str = "CMUX_SURFACE_ID";

const DEFAULT_SOCKET_PATH: &str = "/tmp/cmux.sock";
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

lazy_static! {
    pub static ref HOME_DIR: PathBuf = dirs_next::home_dir().expect("can't find HOME dir");
    static ref CONFIG: Config = Config::from_env();
}

/// Controls which socket commands are honored by the server.
/// `Off` refuses everything; `NotificationsOnly` permits the small
/// notification-related subset; `Full` permits all commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    Off,
    NotificationsOnly,
    Full,
}

impl Default for AccessMode {
    fn default() -> Self {
        AccessMode::Full
    }
}

impl std::str::FromStr for AccessMode {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<AccessMode, Self::Err> {
        match s {
            "off" => Ok(AccessMode::Off),
            "notifications_only" | "notifications-only" => Ok(AccessMode::NotificationsOnly),
            // `allowAll` is the documented legacy spelling of full access
            "full" | "allowAll" | "allow_all" => Ok(AccessMode::Full),
            _ => anyhow::bail!("invalid access mode {:?}", s),
        }
    }
}

impl AccessMode {
    /// The notifications_only admit-list; verbs are the v1 spellings,
    /// v2 methods are mapped onto them by the dispatcher.
    pub fn allows(self, verb: &str) -> bool {
        match self {
            AccessMode::Full => true,
            AccessMode::Off => false,
            AccessMode::NotificationsOnly => matches!(
                verb,
                "ping"
                    | "help"
                    | "notify"
                    | "notify_surface"
                    | "notify_target"
                    | "list_notifications"
                    | "clear_notifications"
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub socket_path: PathBuf,
    pub hook_state_path: PathBuf,
    pub cli_response_timeout: Duration,
    pub access_mode: AccessMode,
    /// Ambient routing context for `notify`, `browser open` and the
    /// claude hooks, typically injected into terminal surfaces by the host.
    pub workspace_ctx: Option<String>,
    pub surface_ctx: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            socket_path: std::env::var_os(SOCKET_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH)),
            hook_state_path: std::env::var_os(HOOK_STATE_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(default_hook_state_path),
            cli_response_timeout: response_timeout_from_env(),
            access_mode: std::env::var(ACCESS_MODE_ENV)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            workspace_ctx: non_empty_env(WORKSPACE_CTX_ENV),
            surface_ctx: non_empty_env(SURFACE_CTX_ENV),
        }
    }
}

fn default_hook_state_path() -> PathBuf {
    HOME_DIR.join(".cmuxterm").join("claude-hook-sessions.json")
}

fn non_empty_env(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn response_timeout_from_env() -> Duration {
    match std::env::var(RESPONSE_TIMEOUT_ENV) {
        Ok(v) => match v.trim().parse::<f64>() {
            Ok(secs) if secs > 0.0 && secs.is_finite() => Duration::from_secs_f64(secs),
            _ => {
                log::warn!("ignoring invalid {}={:?}", RESPONSE_TIMEOUT_ENV, v);
                DEFAULT_RESPONSE_TIMEOUT
            }
        },
        Err(_) => DEFAULT_RESPONSE_TIMEOUT,
    }
}

/// Returns the cached process-wide configuration.
pub fn configuration() -> &'static Config {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mode_parsing() {
        assert_eq!("off".parse::<AccessMode>().unwrap(), AccessMode::Off);
        assert_eq!(
            "notifications_only".parse::<AccessMode>().unwrap(),
            AccessMode::NotificationsOnly
        );
        assert_eq!("full".parse::<AccessMode>().unwrap(), AccessMode::Full);
        assert_eq!("allowAll".parse::<AccessMode>().unwrap(), AccessMode::Full);
        assert!("sometimes".parse::<AccessMode>().is_err());
    }

    #[test]
    fn notifications_only_gate() {
        let mode = AccessMode::NotificationsOnly;
        assert!(mode.allows("ping"));
        assert!(mode.allows("notify_target"));
        assert!(mode.allows("list_notifications"));
        assert!(!mode.allows("new_window"));
        assert!(!mode.allows("send"));

        assert!(!AccessMode::Off.allows("ping"));
        assert!(AccessMode::Full.allows("close_window"));
    }
}
