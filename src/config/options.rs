use super::AppArgs;
use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use strum_macros::{Display, EnumString};

const ENV_WAIT_MODE: &str = "HOSTWEAVE_WAIT_MODE";
const ENV_FEATURE_TIMEOUT_MS: &str = "HOSTWEAVE_FEATURE_TIMEOUT_MS";
const ENV_QUIT_COMMAND: &str = "HOSTWEAVE_QUIT_COMMAND";

/// How the running application waits for its shutdown trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum WaitMode {
    /// Run an interactive wait (console, UI) alongside the shutdown signals.
    Attended,
    /// Only wait for the shutdown signals.
    #[default]
    Unattended,
}

/// Tunables of the lifecycle runtime.
///
/// Sources are layered: defaults, then JSON or environment, then arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    pub wait_mode: WaitMode,
    /// Per-feature limit for initialize and finalize.
    pub feature_timeout_ms: Option<u64>,
    pub quit_command: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            wait_mode: WaitMode::default(),
            feature_timeout_ms: None,
            quit_command: "quit".to_string(),
        }
    }
}

impl RuntimeOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overlaid with `HOSTWEAVE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();
        if let Ok(mode) = env::var(ENV_WAIT_MODE) {
            options.wait_mode = parse_wait_mode(&mode)?;
        }
        if let Ok(timeout) = env::var(ENV_FEATURE_TIMEOUT_MS) {
            options.feature_timeout_ms = Some(parse_timeout(&timeout)?);
        }
        if let Ok(command) = env::var(ENV_QUIT_COMMAND) {
            options.quit_command = command;
        }
        Ok(options)
    }

    /// Overlay `--wait-mode`, `--feature-timeout-ms` and `--quit-command`.
    pub fn apply_args(mut self, args: &AppArgs) -> Result<Self> {
        if let Some(mode) = args.get("wait-mode") {
            self.wait_mode = parse_wait_mode(&mode)?;
        }
        if let Some(timeout) = args.get("feature-timeout-ms") {
            self.feature_timeout_ms = Some(parse_timeout(&timeout)?);
        }
        if let Some(command) = args.get("quit-command") {
            self.quit_command = command;
        }
        Ok(self)
    }

    pub fn feature_timeout(&self) -> Option<Duration> {
        self.feature_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_wait_mode(value: &str) -> Result<WaitMode> {
    value
        .parse()
        .map_err(|_| RuntimeError::Configuration(format!("unknown wait mode '{value}'")))
}

fn parse_timeout(value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| RuntimeError::Configuration(format!("invalid feature timeout '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RuntimeOptions::default();
        assert_eq!(options.wait_mode, WaitMode::Unattended);
        assert_eq!(options.feature_timeout(), None);
        assert_eq!(options.quit_command, "quit");
    }

    #[test]
    fn test_from_json_partial() {
        let options =
            RuntimeOptions::from_json(r#"{ "wait_mode": "attended", "feature_timeout_ms": 1500 }"#)
                .unwrap();
        assert_eq!(options.wait_mode, WaitMode::Attended);
        assert_eq!(options.feature_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(options.quit_command, "quit");
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = RuntimeOptions::from_json(r#"{ "wait_mode": "sometimes" }"#).unwrap_err();
        assert!(matches!(err, RuntimeError::Configuration(_)));
    }

    #[test]
    fn test_args_override() {
        let args = AppArgs::parse(["--wait-mode", "ATTENDED", "--quit-command=exit"]);
        let options = RuntimeOptions::default().apply_args(&args).unwrap();
        assert_eq!(options.wait_mode, WaitMode::Attended);
        assert_eq!(options.quit_command, "exit");
    }

    #[test]
    fn test_args_invalid_timeout() {
        let args = AppArgs::parse(["--feature-timeout-ms=soon"]);
        assert!(RuntimeOptions::default().apply_args(&args).is_err());
    }

    #[test]
    fn test_wait_mode_display() {
        assert_eq!(WaitMode::Attended.to_string(), "attended");
    }
}
