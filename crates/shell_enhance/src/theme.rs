//! Theme codes, shell agents, and the host capability descriptor.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Feature name that gates every bridge side effect.
pub const ENHANCE_FEATURE: &str = "enhance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Theme state reported to the native shell.
pub enum ShellTheme {
    /// Light web UI.
    Light,
    /// Dark web UI.
    Dark,
    /// Bridge torn down; the shell restores its own theme.
    Reset,
}

impl ShellTheme {
    /// Theme implied by the document root class list.
    pub fn from_root_dark(dark: bool) -> Self {
        if dark {
            Self::Dark
        } else {
            Self::Light
        }
    }

    /// Two-letter wire code posted to the shell.
    pub fn code(self) -> &'static str {
        match self {
            Self::Light => "TL",
            Self::Dark => "TD",
            Self::Reset => "TR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Native shell flavor hosting the web UI.
pub enum ShellAgent {
    /// Windows shell (`shellwin`).
    Windows,
    /// macOS shell (`shellmac`).
    Mac,
    /// Linux shell (`shelllinux`).
    Linux,
    /// Missing or unknown agent string.
    Unrecognized,
}

impl ShellAgent {
    /// Map a descriptor agent string; every input has a result.
    pub fn from_agent(agent: Option<&str>) -> Self {
        match agent {
            Some("shellwin") => Self::Windows,
            Some("shellmac") => Self::Mac,
            Some("shelllinux") => Self::Linux,
            _ => Self::Unrecognized,
        }
    }

    /// Outbound transport for this agent.
    ///
    /// The Linux shell has no inbound channel, so it shares the inert `None` with unknown agents.
    pub fn channel(self) -> Option<MessageChannel> {
        match self {
            Self::Windows => Some(MessageChannel::WebView2),
            Self::Mac => Some(MessageChannel::WebKitHandler),
            Self::Linux | Self::Unrecognized => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Host-side message sinks.
pub enum MessageChannel {
    /// `window.chrome.webview.postMessage`.
    WebView2,
    /// `window.webkit.messageHandlers.shellmacHandler.postMessage`.
    WebKitHandler,
}

impl MessageChannel {
    /// Property path of the `postMessage` owner below `window`.
    pub fn object_path(self) -> &'static [&'static str] {
        match self {
            Self::WebView2 => &["chrome", "webview"],
            Self::WebKitHandler => &["webkit", "messageHandlers", "shellmacHandler"],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Read-only descriptor published by the shell as `window.__KOI_SHELL__`.
pub struct HostCapabilities {
    /// Shell agent identifier. Non-string values read as absent.
    #[serde(deserialize_with = "string_or_none")]
    pub agent: Option<String>,
    /// Feature names the shell understands. Non-string entries are skipped and a non-array
    /// value reads as empty.
    #[serde(deserialize_with = "string_entries")]
    pub supports: Vec<String>,
}

fn string_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(agent) => Some(agent),
        _ => None,
    })
}

fn string_entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(feature) => Some(feature),
            _ => None,
        })
        .collect())
}

impl HostCapabilities {
    /// Parse a descriptor serialized as JSON.
    pub fn from_json(raw: &str) -> Result<Self, crate::EnhanceError> {
        serde_json::from_str(raw).map_err(|err| crate::EnhanceError::Descriptor(err.to_string()))
    }

    /// Whether the shell opted into the enhance feature.
    pub fn supports_enhance(&self) -> bool {
        self.supports.iter().any(|feature| feature == ENHANCE_FEATURE)
    }

    /// Parsed agent.
    pub fn agent(&self) -> ShellAgent {
        ShellAgent::from_agent(self.agent.as_deref())
    }
}
