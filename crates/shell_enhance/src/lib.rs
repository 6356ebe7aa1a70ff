//! Theme synchronization between an embedded web UI and its native KoiShell host.
//!
//! The shell advertises itself through a capability descriptor (`window.__KOI_SHELL__`). When it
//! lists the `enhance` feature, [`ThemeBridge`] reports the page theme as `TL`/`TD` over the
//! agent's message channel, injects transparent-chrome CSS, and sends `TR` on teardown.
//!
//! The state machine in [`bridge`] is target-independent and talks to the page only through
//! [`EnhanceHost`]. The `web` module provides the `web-sys` implementation on `wasm32`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod bridge;
pub mod host;
pub mod theme;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use bridge::{Phase, ThemeBridge};
pub use host::{
    EnhanceError, EnhanceHost, EnhanceOptions, RootClassCallback, TickCallback,
    DEFAULT_RECHECK_INTERVAL, DEFAULT_STYLESHEET_ID, ENHANCE_CSS,
};
pub use theme::{HostCapabilities, MessageChannel, ShellAgent, ShellTheme, ENHANCE_FEATURE};
#[cfg(target_arch = "wasm32")]
pub use web::{install, WebHost, WebInterval, WebObserver};
