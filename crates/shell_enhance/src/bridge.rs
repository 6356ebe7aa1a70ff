//! Theme bridge lifecycle.
//!
//! A [`ThemeBridge`] is `Inactive` until a check finds the `enhance` feature in the shell
//! descriptor. Activation reports the current theme, installs one root observer, and injects the
//! enhance stylesheet. While active, observer callbacks and the recurring re-check report theme
//! changes and restore a stylesheet that went missing. [`ThemeBridge::stop`] sends `TR` once and
//! undoes everything activation did.
//!
//! Every host failure is logged through `tracing` and otherwise ignored; the bridge never
//! surfaces an error to the embedding page.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::host::{EnhanceHost, EnhanceOptions, RootClassCallback, TickCallback};
use crate::theme::{HostCapabilities, ShellTheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Bridge lifecycle phase.
pub enum Phase {
    /// No observer, no stylesheet, nothing reported.
    Inactive,
    /// Observing the document root and reporting theme changes.
    Active,
}

/// Per-instance theme bridge.
///
/// Callbacks handed to the host hold weak references, so dropping the bridge releases it; drop
/// runs the same teardown as [`ThemeBridge::stop`].
pub struct ThemeBridge<H: EnhanceHost + 'static> {
    shared: Rc<Shared<H>>,
}

struct Shared<H: EnhanceHost> {
    host: H,
    options: EnhanceOptions,
    state: RefCell<BridgeState<H::Observer, H::Interval>>,
}

struct BridgeState<O, I> {
    phase: Phase,
    last_sent: Option<ShellTheme>,
    observer: Option<O>,
    interval: Option<I>,
}

impl<O, I> Default for BridgeState<O, I> {
    fn default() -> Self {
        Self {
            phase: Phase::Inactive,
            last_sent: None,
            observer: None,
            interval: None,
        }
    }
}

impl<H: EnhanceHost + 'static> ThemeBridge<H> {
    /// Create an inactive bridge over `host`.
    pub fn new(host: H, options: EnhanceOptions) -> Self {
        Self {
            shared: Rc::new(Shared {
                host,
                options,
                state: RefCell::new(BridgeState::default()),
            }),
        }
    }

    /// Borrow the host adapter.
    pub fn host(&self) -> &H {
        &self.shared.host
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.state.borrow().phase
    }

    /// Last theme reported to the shell while active.
    pub fn last_sent(&self) -> Option<ShellTheme> {
        self.shared.state.borrow().last_sent
    }

    /// Check immediately, then keep re-checking on the configured interval.
    ///
    /// Starting a bridge that already owns a timer only runs the immediate check.
    pub fn start(&self) {
        self.shared.check();
        if self.shared.state.borrow().interval.is_some() {
            return;
        }

        let weak = Rc::downgrade(&self.shared);
        let tick: TickCallback = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.check();
            }
        });
        match self
            .shared
            .host
            .start_interval(self.shared.options.recheck_interval, tick)
        {
            Ok(interval) => self.shared.state.borrow_mut().interval = Some(interval),
            Err(err) => warn!(error = %err, "failed to start enhance re-check timer"),
        }
    }

    /// Activate if the shell supports it, or re-sync an active bridge.
    pub fn check(&self) {
        self.shared.check();
    }

    /// Tear down. Repeated calls are no-ops.
    pub fn stop(&self) {
        self.shared.stop();
    }
}

impl<H: EnhanceHost + 'static> Drop for ThemeBridge<H> {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl<H: EnhanceHost + 'static> Shared<H> {
    fn supported_capabilities(&self) -> Option<HostCapabilities> {
        match self.host.capabilities() {
            Ok(caps) if caps.supports_enhance() => Some(caps),
            Ok(_) => None,
            Err(err) => {
                debug!(error = %err, "shell descriptor unreadable; enhance stays inert");
                None
            }
        }
    }

    fn check(self: &Rc<Self>) {
        let Some(caps) = self.supported_capabilities() else {
            return;
        };
        let theme = match self.host.root_is_dark() {
            Ok(dark) => ShellTheme::from_root_dark(dark),
            Err(err) => {
                warn!(error = %err, "failed to read document theme");
                return;
            }
        };

        let (phase, last_sent, observing) = {
            let state = self.state.borrow();
            (state.phase, state.last_sent, state.observer.is_some())
        };
        if phase == Phase::Inactive {
            debug!(agent = ?caps.agent(), "activating shell enhance");
            self.state.borrow_mut().phase = Phase::Active;
        }
        if last_sent != Some(theme) {
            self.report(&caps, theme);
        }
        if !observing {
            self.observe();
        }
        self.ensure_stylesheet();
    }

    fn observe(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let on_change: RootClassCallback = Box::new(move |dark| {
            if let Some(shared) = weak.upgrade() {
                shared.on_root_class(dark);
            }
        });
        match self.host.observe_root_class(on_change) {
            Ok(observer) => self.state.borrow_mut().observer = Some(observer),
            Err(err) => warn!(error = %err, "failed to observe document root"),
        }
    }

    fn on_root_class(&self, dark: bool) {
        let (phase, last_sent) = {
            let state = self.state.borrow();
            (state.phase, state.last_sent)
        };
        if phase != Phase::Active {
            return;
        }
        let Some(caps) = self.supported_capabilities() else {
            return;
        };
        let theme = ShellTheme::from_root_dark(dark);
        if last_sent != Some(theme) {
            self.report(&caps, theme);
        }
    }

    fn report(&self, caps: &HostCapabilities, theme: ShellTheme) {
        self.state.borrow_mut().last_sent = Some(theme);
        self.send(caps, theme);
    }

    fn send(&self, caps: &HostCapabilities, theme: ShellTheme) {
        let agent = caps.agent();
        let Some(channel) = agent.channel() else {
            debug!(?agent, code = theme.code(), "no shell channel for agent");
            return;
        };
        if let Err(err) = self.host.post_message(channel, theme.code()) {
            warn!(error = %err, code = theme.code(), "failed to post theme to shell");
        }
    }

    fn ensure_stylesheet(&self) {
        let id = &self.options.stylesheet_id;
        if self.host.has_style(id) {
            return;
        }
        if let Err(err) = self.host.insert_style(id, &self.options.stylesheet) {
            warn!(error = %err, "failed to inject enhance stylesheet");
        }
    }

    fn stop(&self) {
        let (interval, observer, was_active) = {
            let mut state = self.state.borrow_mut();
            let was_active = state.phase == Phase::Active;
            state.phase = Phase::Inactive;
            state.last_sent = None;
            (state.interval.take(), state.observer.take(), was_active)
        };
        if let Some(interval) = interval {
            self.host.clear_interval(interval);
        }
        // Disconnect even when the descriptor disappeared so no callback outlives teardown.
        if let Some(observer) = observer {
            self.host.disconnect(observer);
        }
        if !was_active {
            return;
        }

        let Some(caps) = self.supported_capabilities() else {
            return;
        };
        self.send(&caps, ShellTheme::Reset);
        let id = &self.options.stylesheet_id;
        if self.host.has_style(id) {
            if let Err(err) = self.host.remove_style(id) {
                warn!(error = %err, "failed to remove enhance stylesheet");
            }
        }
        debug!("shell enhance stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::EnhanceError;
    use crate::theme::MessageChannel;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeState {
        caps: HostCapabilities,
        dark: bool,
        styles: Vec<(String, String)>,
        dom_mutations: usize,
        sent: Vec<(MessageChannel, String)>,
        next_id: usize,
        observers: BTreeMap<usize, RootClassCallback>,
        live_observers: BTreeSet<usize>,
        observers_installed: usize,
        timers: BTreeMap<usize, TickCallback>,
        live_timers: BTreeSet<usize>,
        timer_periods: Vec<Duration>,
    }

    /// In-memory document; clones share state so tests can drive callbacks.
    #[derive(Clone, Default)]
    struct FakeHost {
        state: Rc<RefCell<FakeState>>,
    }

    impl FakeHost {
        fn with_descriptor(agent: Option<&str>, supports: &[&str]) -> Self {
            let host = Self::default();
            host.set_descriptor(agent, supports);
            host
        }

        fn set_descriptor(&self, agent: Option<&str>, supports: &[&str]) {
            self.state.borrow_mut().caps = HostCapabilities {
                agent: agent.map(str::to_string),
                supports: supports.iter().map(|s| s.to_string()).collect(),
            };
        }

        /// Toggle the root `dark` class and deliver the mutation to live observers.
        fn set_dark(&self, dark: bool) {
            let ids: Vec<usize> = {
                let mut state = self.state.borrow_mut();
                state.dark = dark;
                state.live_observers.iter().copied().collect()
            };
            for id in ids {
                let callback = self.state.borrow_mut().observers.remove(&id);
                if let Some(mut callback) = callback {
                    callback(dark);
                    let mut state = self.state.borrow_mut();
                    if state.live_observers.contains(&id) {
                        state.observers.insert(id, callback);
                    }
                }
            }
        }

        fn tick(&self) {
            let ids: Vec<usize> = self.state.borrow().live_timers.iter().copied().collect();
            for id in ids {
                let callback = self.state.borrow_mut().timers.remove(&id);
                if let Some(mut callback) = callback {
                    callback();
                    let mut state = self.state.borrow_mut();
                    if state.live_timers.contains(&id) {
                        state.timers.insert(id, callback);
                    }
                }
            }
        }

        fn drop_style_externally(&self, id: &str) {
            self.state.borrow_mut().styles.retain(|(style_id, _)| style_id != id);
        }

        fn sent_codes(&self) -> Vec<String> {
            self.state
                .borrow()
                .sent
                .iter()
                .map(|(_, code)| code.clone())
                .collect()
        }

        fn style_count(&self) -> usize {
            self.state.borrow().styles.len()
        }

        fn dom_mutations(&self) -> usize {
            self.state.borrow().dom_mutations
        }

        fn live_observers(&self) -> usize {
            self.state.borrow().live_observers.len()
        }

        fn live_timers(&self) -> usize {
            self.state.borrow().live_timers.len()
        }

        fn next_id(state: &mut FakeState) -> usize {
            state.next_id += 1;
            state.next_id
        }
    }

    impl EnhanceHost for FakeHost {
        type Observer = usize;
        type Interval = usize;

        fn capabilities(&self) -> Result<HostCapabilities, EnhanceError> {
            Ok(self.state.borrow().caps.clone())
        }

        fn post_message(&self, channel: MessageChannel, payload: &str) -> Result<(), EnhanceError> {
            self.state
                .borrow_mut()
                .sent
                .push((channel, payload.to_string()));
            Ok(())
        }

        fn root_is_dark(&self) -> Result<bool, EnhanceError> {
            Ok(self.state.borrow().dark)
        }

        fn has_style(&self, id: &str) -> bool {
            self.state.borrow().styles.iter().any(|(style_id, _)| style_id == id)
        }

        fn insert_style(&self, id: &str, css: &str) -> Result<(), EnhanceError> {
            let mut state = self.state.borrow_mut();
            state.dom_mutations += 1;
            state.styles.push((id.to_string(), css.to_string()));
            Ok(())
        }

        fn remove_style(&self, id: &str) -> Result<(), EnhanceError> {
            let mut state = self.state.borrow_mut();
            state.dom_mutations += 1;
            state.styles.retain(|(style_id, _)| style_id != id);
            Ok(())
        }

        fn observe_root_class(
            &self,
            on_change: RootClassCallback,
        ) -> Result<Self::Observer, EnhanceError> {
            let mut state = self.state.borrow_mut();
            let id = Self::next_id(&mut state);
            state.observers.insert(id, on_change);
            state.live_observers.insert(id);
            state.observers_installed += 1;
            Ok(id)
        }

        fn disconnect(&self, observer: Self::Observer) {
            let mut state = self.state.borrow_mut();
            state.live_observers.remove(&observer);
            state.observers.remove(&observer);
        }

        fn start_interval(
            &self,
            period: Duration,
            tick: TickCallback,
        ) -> Result<Self::Interval, EnhanceError> {
            let mut state = self.state.borrow_mut();
            let id = Self::next_id(&mut state);
            state.timers.insert(id, tick);
            state.live_timers.insert(id);
            state.timer_periods.push(period);
            Ok(id)
        }

        fn clear_interval(&self, interval: Self::Interval) {
            let mut state = self.state.borrow_mut();
            state.live_timers.remove(&interval);
            state.timers.remove(&interval);
        }
    }

    fn bridge(host: &FakeHost) -> ThemeBridge<FakeHost> {
        ThemeBridge::new(host.clone(), EnhanceOptions::default())
    }

    #[test]
    fn descriptor_without_enhance_is_inert() {
        let host = FakeHost::with_descriptor(Some("shellwin"), &["tray"]);
        let bridge = bridge(&host);

        bridge.start();
        host.tick();
        host.set_dark(true);
        bridge.stop();

        assert_eq!(bridge.phase(), Phase::Inactive);
        assert_eq!(host.dom_mutations(), 0);
        assert!(host.sent_codes().is_empty());
        assert_eq!(host.state.borrow().observers_installed, 0);
    }

    #[test]
    fn missing_descriptor_is_inert() {
        let host = FakeHost::default();
        let bridge = bridge(&host);
        bridge.start();
        assert_eq!(host.dom_mutations(), 0);
        assert!(host.sent_codes().is_empty());
    }

    #[test]
    fn theme_changes_are_reported_and_teardown_resets_once() {
        let host = FakeHost::with_descriptor(Some("shellwin"), &["enhance"]);
        let bridge = bridge(&host);

        bridge.start();
        assert_eq!(bridge.phase(), Phase::Active);
        host.set_dark(true);
        host.set_dark(false);
        bridge.stop();
        bridge.stop();

        assert_eq!(host.sent_codes(), vec!["TL", "TD", "TL", "TR"]);
        assert!(host
            .state
            .borrow()
            .sent
            .iter()
            .all(|(channel, _)| *channel == MessageChannel::WebView2));
    }

    #[test]
    fn dark_root_reports_dark_on_activation() {
        let host = FakeHost::with_descriptor(Some("shellmac"), &["enhance"]);
        host.state.borrow_mut().dark = true;
        let bridge = bridge(&host);

        bridge.start();

        assert_eq!(bridge.last_sent(), Some(ShellTheme::Dark));
        assert_eq!(
            host.state.borrow().sent,
            vec![(MessageChannel::WebKitHandler, "TD".to_string())]
        );
    }

    #[test]
    fn recheck_sends_only_changes_and_keeps_one_observer() {
        let host = FakeHost::with_descriptor(Some("shellwin"), &["enhance"]);
        let bridge = bridge(&host);

        bridge.start();
        host.tick();
        host.tick();
        host.state.borrow_mut().dark = true;
        host.tick();

        assert_eq!(host.sent_codes(), vec!["TL", "TD"]);
        assert_eq!(host.state.borrow().observers_installed, 1);
        assert_eq!(host.live_observers(), 1);
        assert_eq!(host.style_count(), 1);
        assert_eq!(
            host.state.borrow().timer_periods,
            vec![Duration::from_secs(4)]
        );
    }

    #[test]
    fn existing_stylesheet_is_not_duplicated() {
        let host = FakeHost::with_descriptor(Some("shellwin"), &["enhance"]);
        host.insert_style("koishell-enhance-stylesheet", "body {}")
            .expect("pre-existing style");
        let bridge = bridge(&host);

        bridge.start();
        bridge.check();

        assert_eq!(host.style_count(), 1);
        assert_eq!(host.state.borrow().styles[0].1, "body {}");
    }

    #[test]
    fn missing_stylesheet_is_restored_on_recheck() {
        let host = FakeHost::with_descriptor(Some("shellwin"), &["enhance"]);
        let bridge = bridge(&host);

        bridge.start();
        host.drop_style_externally("koishell-enhance-stylesheet");
        host.tick();

        assert_eq!(host.style_count(), 1);
        assert!(host.state.borrow().styles[0].1.contains("layout-activity"));
    }

    #[test]
    fn linux_agent_never_touches_transport() {
        let host = FakeHost::with_descriptor(Some("shelllinux"), &["enhance"]);
        let bridge = bridge(&host);

        bridge.start();
        host.set_dark(true);
        bridge.stop();

        assert!(host.sent_codes().is_empty());
        assert_eq!(host.dom_mutations(), 2);
    }

    #[test]
    fn non_string_agent_enhances_without_sending() {
        let host = FakeHost::default();
        host.state.borrow_mut().caps =
            HostCapabilities::from_json(r#"{"agent":7,"supports":["enhance",1]}"#)
                .expect("descriptor");
        let bridge = bridge(&host);

        bridge.start();
        host.set_dark(true);

        assert_eq!(bridge.phase(), Phase::Active);
        assert_eq!(host.state.borrow().styles.len(), 1);
        assert_eq!(host.state.borrow().observers_installed, 1);
        assert!(host.sent_codes().is_empty());
    }

    #[test]
    fn stop_clears_timer_observer_and_stylesheet() {
        let host = FakeHost::with_descriptor(Some("shellwin"), &["enhance"]);
        let bridge = bridge(&host);

        bridge.start();
        bridge.stop();
        host.set_dark(true);
        host.tick();

        assert_eq!(bridge.phase(), Phase::Inactive);
        assert_eq!(host.live_timers(), 0);
        assert_eq!(host.live_observers(), 0);
        assert_eq!(host.style_count(), 0);
        assert_eq!(host.sent_codes(), vec!["TL", "TR"]);
    }

    #[test]
    fn stop_before_activation_sends_nothing() {
        let host = FakeHost::with_descriptor(Some("shellwin"), &[]);
        let bridge = bridge(&host);

        bridge.start();
        host.set_descriptor(Some("shellwin"), &["enhance"]);
        bridge.stop();

        assert!(host.sent_codes().is_empty());
        assert_eq!(host.live_timers(), 0);
    }

    #[test]
    fn late_descriptor_activates_on_recheck() {
        let host = FakeHost::with_descriptor(None, &[]);
        let bridge = bridge(&host);

        bridge.start();
        assert_eq!(bridge.phase(), Phase::Inactive);
        host.set_descriptor(Some("shellwin"), &["enhance"]);
        host.tick();

        assert_eq!(bridge.phase(), Phase::Active);
        assert_eq!(host.sent_codes(), vec!["TL"]);
    }

    #[test]
    fn restart_after_stop_reactivates() {
        let host = FakeHost::with_descriptor(Some("shellwin"), &["enhance"]);
        let bridge = bridge(&host);

        bridge.start();
        bridge.stop();
        bridge.start();

        assert_eq!(host.sent_codes(), vec!["TL", "TR", "TL"]);
        assert_eq!(host.live_timers(), 1);
        assert_eq!(host.live_observers(), 1);
    }

    #[test]
    fn drop_tears_down() {
        let host = FakeHost::with_descriptor(Some("shellwin"), &["enhance"]);
        {
            let bridge = bridge(&host);
            bridge.start();
        }
        assert_eq!(host.live_timers(), 0);
        assert_eq!(host.live_observers(), 0);
        assert_eq!(host.sent_codes(), vec!["TL", "TR"]);
    }

    #[test]
    fn instances_do_not_share_state() {
        let first = FakeHost::with_descriptor(Some("shellwin"), &["enhance"]);
        let second = FakeHost::with_descriptor(Some("shellmac"), &["enhance"]);
        let a = bridge(&first);
        let b = bridge(&second);

        a.start();
        b.start();
        a.stop();

        assert_eq!(b.phase(), Phase::Active);
        assert_eq!(second.live_timers(), 1);
        assert_eq!(second.sent_codes(), vec!["TL"]);
    }
}
