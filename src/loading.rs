//! Loading indicator overlay.
//!
//! A small state machine over an [`Overlay`]:
//!
//! ```text
//! Hidden --show--> Showing --hide--> Removing --poll (fade elapsed)--> Hidden
//!                     ^                  |
//!                     +------show--------+
//! ```
//!
//! At most one overlay is mounted at any time. Showing again while the old
//! overlay is fading out cancels the fade and reuses it.

use instant::{Duration, Instant};

use crate::resources::loader::LoadEvent;

/// Where the indicator text is displayed.
pub trait Overlay {
    fn mount(&mut self, text: &str);
    fn set_text(&mut self, text: &str);
    fn begin_fade(&mut self);
    fn cancel_fade(&mut self);
    fn unmount(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndicatorState {
    Hidden,
    Showing,
    Removing { since: Instant },
}

pub fn indicator_text(percent: f64) -> String {
    format!("Loading: {:.2}%", percent)
}

pub struct LoadingIndicator<O: Overlay> {
    overlay: O,
    state: IndicatorState,
    fade: Duration,
    loaded: usize,
    total: usize,
}

impl<O: Overlay> LoadingIndicator<O> {
    pub fn new(overlay: O, fade: Duration) -> Self {
        Self {
            overlay,
            state: IndicatorState::Hidden,
            fade,
            loaded: 0,
            total: 0,
        }
    }

    pub fn state(&self) -> IndicatorState {
        self.state
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn show(&mut self) {
        match self.state {
            IndicatorState::Hidden => {
                self.overlay.mount(&indicator_text(0.0));
                self.state = IndicatorState::Showing;
            }
            IndicatorState::Showing => log::debug!("loading indicator is already showing"),
            IndicatorState::Removing { .. } => {
                self.overlay.cancel_fade();
                self.overlay.set_text(&indicator_text(0.0));
                self.state = IndicatorState::Showing;
            }
        }
    }

    /// Set the displayed percentage, clamped to `[0, 100]`.
    ///
    /// Ignored unless the indicator is showing; returns whether the text changed.
    pub fn update(&mut self, percent: f64) -> bool {
        if self.state != IndicatorState::Showing {
            log::debug!("ignoring progress {:.2}% while {:?}", percent, self.state);
            return false;
        }
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        self.overlay.set_text(&indicator_text(percent));
        true
    }

    pub fn progress(&mut self, loaded: usize, total: usize) -> bool {
        self.loaded = loaded;
        self.total = total;
        let percent = if total == 0 {
            0.0
        } else {
            loaded as f64 / total as f64 * 100.0
        };
        self.update(percent)
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.loaded, self.total)
    }

    pub fn hide(&mut self, now: Instant) {
        match self.state {
            IndicatorState::Showing => {
                self.overlay.begin_fade();
                self.state = IndicatorState::Removing { since: now };
            }
            IndicatorState::Hidden | IndicatorState::Removing { .. } => {
                log::debug!("loading indicator is not showing, nothing to hide")
            }
        }
    }

    /// Unmount the overlay once the fade has run its course. Returns `true` on unmount.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let IndicatorState::Removing { since } = self.state {
            if now >= since && now.duration_since(since) >= self.fade {
                self.overlay.unmount();
                self.state = IndicatorState::Hidden;
                return true;
            }
        }
        false
    }

    pub fn on_event(&mut self, event: &LoadEvent, now: Instant) {
        match event {
            LoadEvent::Started => self.show(),
            LoadEvent::Progress { url, loaded, total } => {
                log::debug!("loaded {} ({}/{})", url, loaded, total);
                self.progress(*loaded, *total);
            }
            LoadEvent::Failed {
                url,
                reason,
                loaded,
                total,
            } => {
                log::debug!("there was an error loading {}: {}", url, reason);
                self.progress(*loaded, *total);
            }
            LoadEvent::Finished => {
                log::info!("loading complete");
                self.hide(now);
            }
        }
    }
}

/// Browser overlay: a `div.loading` appended to the document body. Fading
/// adds the `fade-out` class, whose transition lives in the page stylesheet.
#[cfg(target_arch = "wasm32")]
#[derive(Default)]
pub struct DomOverlay {
    element: Option<web_sys::Element>,
}

#[cfg(target_arch = "wasm32")]
impl Overlay for DomOverlay {
    fn mount(&mut self, text: &str) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            log::error!("no document to mount the loading indicator in");
            return;
        };
        let element = match document.create_element("div") {
            Ok(element) => element,
            Err(e) => {
                log::error!("cannot create the loading indicator: {:?}", e);
                return;
            }
        };
        element.set_class_name("loading");
        element.set_text_content(Some(text));
        if let Some(body) = document.body() {
            if let Err(e) = body.append_child(&element) {
                log::error!("cannot mount the loading indicator: {:?}", e);
            }
        }
        self.element = Some(element);
    }

    fn set_text(&mut self, text: &str) {
        if let Some(element) = &self.element {
            element.set_text_content(Some(text));
        }
    }

    fn begin_fade(&mut self) {
        if let Some(element) = &self.element {
            let _ = element.class_list().add_1("fade-out");
        }
    }

    fn cancel_fade(&mut self) {
        if let Some(element) = &self.element {
            let _ = element.class_list().remove_1("fade-out");
        }
    }

    fn unmount(&mut self) {
        if let Some(element) = self.element.take() {
            element.remove();
        }
    }
}

/// Native overlay: the text is appended to the window title.
#[cfg(not(target_arch = "wasm32"))]
pub struct TitleOverlay {
    window: std::sync::Arc<winit::window::Window>,
    title: String,
}

#[cfg(not(target_arch = "wasm32"))]
impl TitleOverlay {
    pub fn new(window: std::sync::Arc<winit::window::Window>, title: &str) -> Self {
        Self {
            window,
            title: title.to_string(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Overlay for TitleOverlay {
    fn mount(&mut self, text: &str) {
        self.set_text(text);
    }

    fn set_text(&mut self, text: &str) {
        self.window.set_title(&format!("{} ({})", self.title, text));
    }

    fn begin_fade(&mut self) {}

    fn cancel_fade(&mut self) {}

    fn unmount(&mut self) {
        self.window.set_title(&self.title);
    }
}

#[cfg(target_arch = "wasm32")]
pub type PlatformOverlay = DomOverlay;
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformOverlay = TitleOverlay;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        mounted: usize,
        unmounted: usize,
        faded: bool,
        text: String,
    }

    impl Overlay for Recorder {
        fn mount(&mut self, text: &str) {
            self.mounted += 1;
            self.text = text.to_string();
        }
        fn set_text(&mut self, text: &str) {
            self.text = text.to_string();
        }
        fn begin_fade(&mut self) {
            self.faded = true;
        }
        fn cancel_fade(&mut self) {
            self.faded = false;
        }
        fn unmount(&mut self) {
            self.unmounted += 1;
        }
    }

    fn indicator() -> LoadingIndicator<Recorder> {
        LoadingIndicator::new(Recorder::default(), Duration::from_millis(1000))
    }

    #[test]
    fn text_has_two_decimals() {
        for (p, text) in [(0.0, "Loading: 0.00%"), (25.0, "Loading: 25.00%"), (33.3333, "Loading: 33.33%"), (100.0, "Loading: 100.00%")] {
            let mut indicator = indicator();
            indicator.show();
            assert!(indicator.update(p));
            assert_eq!(indicator.overlay().text, text);
        }
    }

    #[test]
    fn show_mounts_once() {
        let mut indicator = indicator();
        indicator.show();
        assert_eq!(indicator.overlay().text, "Loading: 0.00%");
        indicator.show();
        assert_eq!(indicator.overlay().mounted, 1);
        assert_eq!(indicator.state(), IndicatorState::Showing);
    }

    #[test]
    fn update_is_ignored_unless_showing() {
        let mut indicator = indicator();
        assert!(!indicator.update(50.0));
        indicator.show();
        indicator.hide(Instant::now());
        assert!(!indicator.update(50.0));
        assert_eq!(indicator.overlay().text, "Loading: 0.00%");
    }

    #[test]
    fn update_clamps_out_of_range_values() {
        let mut indicator = indicator();
        indicator.show();
        indicator.update(140.0);
        assert_eq!(indicator.overlay().text, "Loading: 100.00%");
        indicator.update(-3.0);
        assert_eq!(indicator.overlay().text, "Loading: 0.00%");
    }

    #[test]
    fn progress_with_no_total_is_zero() {
        let mut indicator = indicator();
        indicator.show();
        indicator.progress(0, 0);
        assert_eq!(indicator.overlay().text, "Loading: 0.00%");
    }

    #[test]
    fn hide_twice_is_harmless() {
        let mut indicator = indicator();
        let t0 = Instant::now();
        indicator.hide(t0);
        assert_eq!(indicator.state(), IndicatorState::Hidden);
        indicator.show();
        indicator.hide(t0);
        indicator.hide(t0 + Duration::from_millis(500));
        assert_eq!(indicator.state(), IndicatorState::Removing { since: t0 });
    }

    #[test]
    fn poll_unmounts_after_the_fade() {
        let mut indicator = indicator();
        let t0 = Instant::now();
        indicator.show();
        indicator.hide(t0);
        assert!(indicator.overlay().faded);
        assert!(!indicator.poll(t0 + Duration::from_millis(999)));
        assert_eq!(indicator.overlay().unmounted, 0);
        assert!(indicator.poll(t0 + Duration::from_millis(1000)));
        assert_eq!(indicator.overlay().unmounted, 1);
        assert_eq!(indicator.state(), IndicatorState::Hidden);
        assert!(!indicator.poll(t0 + Duration::from_millis(5000)));
    }

    #[test]
    fn show_during_fade_reuses_the_overlay() {
        let mut indicator = indicator();
        let t0 = Instant::now();
        indicator.show();
        indicator.update(80.0);
        indicator.hide(t0);
        indicator.show();
        assert_eq!(indicator.state(), IndicatorState::Showing);
        assert!(!indicator.overlay().faded);
        assert_eq!(indicator.overlay().text, "Loading: 0.00%");
        // the cancelled removal must not fire later
        assert!(!indicator.poll(t0 + Duration::from_millis(2000)));
        assert_eq!(indicator.overlay().mounted, 1);
        assert_eq!(indicator.overlay().unmounted, 0);
    }

    #[test]
    fn load_events_drive_the_indicator() {
        let mut indicator = indicator();
        let t0 = Instant::now();
        indicator.on_event(&LoadEvent::Started, t0);
        assert_eq!(indicator.overlay().text, "Loading: 0.00%");
        indicator.on_event(
            &LoadEvent::Progress {
                url: "a".into(),
                loaded: 1,
                total: 4,
            },
            t0,
        );
        assert_eq!(indicator.overlay().text, "Loading: 25.00%");
        indicator.on_event(
            &LoadEvent::Progress {
                url: "b".into(),
                loaded: 2,
                total: 4,
            },
            t0,
        );
        assert_eq!(indicator.overlay().text, "Loading: 50.00%");
        assert_eq!(indicator.counts(), (2, 4));
        indicator.on_event(&LoadEvent::Finished, t0);
        assert_eq!(indicator.state(), IndicatorState::Removing { since: t0 });
    }

    #[test]
    fn a_failed_last_file_still_completes_the_count() {
        let mut indicator = indicator();
        let t0 = Instant::now();
        indicator.on_event(&LoadEvent::Started, t0);
        indicator.on_event(
            &LoadEvent::Progress {
                url: "a".into(),
                loaded: 1,
                total: 2,
            },
            t0,
        );
        indicator.on_event(
            &LoadEvent::Failed {
                url: "b".into(),
                reason: "not found".into(),
                loaded: 2,
                total: 2,
            },
            t0,
        );
        assert_eq!(indicator.overlay().text, "Loading: 100.00%");
        assert_eq!(indicator.counts(), (2, 2));
        indicator.on_event(&LoadEvent::Finished, t0);
        assert_eq!(indicator.state(), IndicatorState::Removing { since: t0 });
    }
}
