//! Host seam between the bridge state machine and the embedding document.

use std::time::Duration;

use thiserror::Error;

use crate::theme::{HostCapabilities, MessageChannel};

/// Element id of the injected stylesheet.
pub const DEFAULT_STYLESHEET_ID: &str = "koishell-enhance-stylesheet";
/// Cadence of the self-healing re-check.
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(4);
/// Stylesheet injected while the bridge is active.
pub const ENHANCE_CSS: &str = include_str!("../assets/enhance.css");

/// Callback receiving "root has the `dark` class" after each class-attribute mutation.
pub type RootClassCallback = Box<dyn FnMut(bool)>;
/// Recurring timer callback.
pub type TickCallback = Box<dyn FnMut()>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Host adapter failures. The bridge logs these and stays inert; they never reach the embedder.
pub enum EnhanceError {
    /// `window` (or its document) is not reachable.
    #[error("window unavailable")]
    WindowUnavailable,
    /// The capability descriptor exists but does not have the expected shape.
    #[error("malformed shell descriptor: {0}")]
    Descriptor(String),
    /// The agent's `postMessage` target is missing from the page.
    #[error("message channel {0:?} unavailable")]
    ChannelUnavailable(MessageChannel),
    /// A DOM call threw.
    #[error("dom operation failed: {0}")]
    Dom(String),
}

/// Document and transport operations the bridge needs.
///
/// Implementations are single-threaded. Callbacks passed to [`EnhanceHost::observe_root_class`]
/// and [`EnhanceHost::start_interval`] must stop firing once the returned handle has been handed
/// back to [`EnhanceHost::disconnect`] or [`EnhanceHost::clear_interval`].
pub trait EnhanceHost {
    /// Live root attribute observer.
    type Observer;
    /// Live recurring timer.
    type Interval;

    /// Current capability descriptor; an absent descriptor is the default (unsupported) value.
    fn capabilities(&self) -> Result<HostCapabilities, EnhanceError>;
    /// Fire-and-forget message to the shell.
    fn post_message(&self, channel: MessageChannel, payload: &str) -> Result<(), EnhanceError>;
    /// Whether the document root currently carries the `dark` class.
    fn root_is_dark(&self) -> Result<bool, EnhanceError>;
    /// Whether an element with `id` exists.
    fn has_style(&self, id: &str) -> bool;
    /// Append a `<style id=..>` element to the document head.
    fn insert_style(&self, id: &str, css: &str) -> Result<(), EnhanceError>;
    /// Remove the element with `id`.
    fn remove_style(&self, id: &str) -> Result<(), EnhanceError>;
    /// Watch the document root's attributes.
    fn observe_root_class(&self, on_change: RootClassCallback)
        -> Result<Self::Observer, EnhanceError>;
    /// Stop an observer returned by [`EnhanceHost::observe_root_class`].
    fn disconnect(&self, observer: Self::Observer);
    /// Start a recurring timer.
    fn start_interval(&self, period: Duration, tick: TickCallback)
        -> Result<Self::Interval, EnhanceError>;
    /// Stop a timer returned by [`EnhanceHost::start_interval`].
    fn clear_interval(&self, interval: Self::Interval);
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Tunables for a [`ThemeBridge`](crate::ThemeBridge).
pub struct EnhanceOptions {
    /// Id of the injected `<style>` element.
    pub stylesheet_id: String,
    /// CSS injected while active.
    pub stylesheet: String,
    /// Re-check cadence.
    pub recheck_interval: Duration,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            stylesheet_id: DEFAULT_STYLESHEET_ID.to_string(),
            stylesheet: ENHANCE_CSS.to_string(),
            recheck_interval: DEFAULT_RECHECK_INTERVAL,
        }
    }
}
