//! `web-sys` backed [`EnhanceHost`] for the embedded web UI.

use std::time::Duration;

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{Document, Element, MutationObserver, MutationObserverInit, MutationRecord, Window};

use crate::host::{EnhanceError, EnhanceHost, EnhanceOptions, RootClassCallback, TickCallback};
use crate::theme::{HostCapabilities, MessageChannel};
use crate::ThemeBridge;

/// Global the native shell publishes before loading the page.
pub const DESCRIPTOR_GLOBAL: &str = "__KOI_SHELL__";

const DARK_CLASS: &str = "dark";

/// Browser host bound to the current `window`.
#[derive(Debug, Clone)]
pub struct WebHost {
    window: Window,
}

/// Connected root observer and the closure it calls.
pub struct WebObserver {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

/// Active `setInterval` registration and the closure it calls.
pub struct WebInterval {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl WebHost {
    /// Bind to the global `window`.
    pub fn new() -> Result<Self, EnhanceError> {
        let window = web_sys::window().ok_or(EnhanceError::WindowUnavailable)?;
        Ok(Self { window })
    }

    fn document(&self) -> Result<Document, EnhanceError> {
        self.window.document().ok_or(EnhanceError::WindowUnavailable)
    }

    fn root(&self) -> Result<Element, EnhanceError> {
        self.document()?
            .document_element()
            .ok_or_else(|| EnhanceError::Dom("document has no root element".to_string()))
    }
}

/// Create a bridge over the current page and start it.
pub fn install(options: EnhanceOptions) -> Result<ThemeBridge<WebHost>, EnhanceError> {
    let bridge = ThemeBridge::new(WebHost::new()?, options);
    bridge.start();
    Ok(bridge)
}

fn js_error(err: JsValue) -> EnhanceError {
    if let Some(text) = err.as_string() {
        return EnhanceError::Dom(text);
    }
    if let Ok(message) = Reflect::get(&err, &JsValue::from_str("message")) {
        if let Some(text) = message.as_string() {
            return EnhanceError::Dom(text);
        }
    }
    EnhanceError::Dom(format!("{err:?}"))
}

impl EnhanceHost for WebHost {
    type Observer = WebObserver;
    type Interval = WebInterval;

    fn capabilities(&self) -> Result<HostCapabilities, EnhanceError> {
        let raw = Reflect::get(&self.window, &JsValue::from_str(DESCRIPTOR_GLOBAL))
            .map_err(js_error)?;
        if raw.is_undefined() || raw.is_null() {
            return Ok(HostCapabilities::default());
        }
        serde_wasm_bindgen::from_value(raw).map_err(|err| EnhanceError::Descriptor(err.to_string()))
    }

    fn post_message(&self, channel: MessageChannel, payload: &str) -> Result<(), EnhanceError> {
        let mut target: JsValue = self.window.clone().into();
        for key in channel.object_path() {
            target = Reflect::get(&target, &JsValue::from_str(key)).map_err(js_error)?;
            if target.is_undefined() || target.is_null() {
                return Err(EnhanceError::ChannelUnavailable(channel));
            }
        }
        let post = Reflect::get(&target, &JsValue::from_str("postMessage"))
            .map_err(js_error)?
            .dyn_into::<Function>()
            .map_err(|_| EnhanceError::ChannelUnavailable(channel))?;
        post.call1(&target, &JsValue::from_str(payload))
            .map(|_| ())
            .map_err(js_error)
    }

    fn root_is_dark(&self) -> Result<bool, EnhanceError> {
        Ok(self.root()?.class_list().contains(DARK_CLASS))
    }

    fn has_style(&self, id: &str) -> bool {
        self.document()
            .map(|document| document.get_element_by_id(id).is_some())
            .unwrap_or(false)
    }

    fn insert_style(&self, id: &str, css: &str) -> Result<(), EnhanceError> {
        let document = self.document()?;
        let head = document
            .head()
            .ok_or_else(|| EnhanceError::Dom("document has no head".to_string()))?;
        let style = document.create_element("style").map_err(js_error)?;
        style.set_id(id);
        style.set_text_content(Some(css));
        head.append_child(&style).map(|_| ()).map_err(js_error)
    }

    fn remove_style(&self, id: &str) -> Result<(), EnhanceError> {
        if let Some(style) = self.document()?.get_element_by_id(id) {
            style.remove();
        }
        Ok(())
    }

    fn observe_root_class(
        &self,
        on_change: RootClassCallback,
    ) -> Result<Self::Observer, EnhanceError> {
        let mut on_change = on_change;
        let callback = Closure::<dyn FnMut(Array, MutationObserver)>::new(
            move |records: Array, _observer: MutationObserver| {
                for record in records.iter() {
                    let record: MutationRecord = record.unchecked_into();
                    if record.attribute_name().as_deref() != Some("class") {
                        continue;
                    }
                    if let Some(target) = record.target() {
                        let element: Element = target.unchecked_into();
                        on_change(element.class_list().contains(DARK_CLASS));
                    }
                }
            },
        );
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(js_error)?;
        let init = MutationObserverInit::new();
        init.set_attributes(true);
        observer
            .observe_with_options(&self.root()?, &init)
            .map_err(js_error)?;
        Ok(WebObserver {
            observer,
            _callback: callback,
        })
    }

    fn disconnect(&self, observer: Self::Observer) {
        observer.observer.disconnect();
    }

    fn start_interval(
        &self,
        period: Duration,
        tick: TickCallback,
    ) -> Result<Self::Interval, EnhanceError> {
        let mut tick = tick;
        let callback = Closure::<dyn FnMut()>::new(move || tick());
        let millis = i32::try_from(period.as_millis()).unwrap_or(i32::MAX);
        let handle = self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                millis,
            )
            .map_err(js_error)?;
        Ok(WebInterval {
            handle,
            _callback: callback,
        })
    }

    fn clear_interval(&self, interval: Self::Interval) {
        self.window.clear_interval_with_handle(interval.handle);
    }
}
