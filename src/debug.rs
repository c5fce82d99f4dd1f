//! Keyboard driven debug panel for the shadow blur radius and the fog far distance.
//!
//! `[` / `]` step the shadow radius, `-` / `=` step the fog far distance.
//! Values live for the session only.

use winit::keyboard::Key;

use crate::{
    config::{FogConfig, SunConfig},
    pipelines::light::LightUniform,
};

/// A bounded, stepped value.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: &'static str,
    value: f32,
    min: f32,
    max: f32,
    step: f32,
}

impl Parameter {
    pub fn new(name: &'static str, value: f32, min: f32, max: f32, step: f32) -> Self {
        let max = max.max(min);
        Self {
            name,
            value: value.clamp(min, max),
            min,
            max,
            step,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// Set the value, clamped to the range. Returns whether it changed.
    pub fn set(&mut self, value: f32) -> bool {
        let value = value.clamp(self.min, self.max);
        if value == self.value {
            return false;
        }
        self.value = value;
        true
    }

    pub fn increase(&mut self) -> bool {
        self.set(self.value + self.step)
    }

    pub fn decrease(&mut self) -> bool {
        self.set(self.value - self.step)
    }
}

pub struct DebugPanel {
    pub shadow_radius: Parameter,
    pub fog_far: Parameter,
    #[cfg(target_arch = "wasm32")]
    element: Option<web_sys::Element>,
}

impl DebugPanel {
    pub fn new(sun: &SunConfig, fog: &FogConfig) -> Self {
        Self {
            shadow_radius: Parameter::new("shadow radius", sun.shadow_radius, 0.0, 8.0, 0.5),
            // fog may never end before it starts
            fog_far: Parameter::new("fog far", fog.far, fog.near.max(10.0), 500.0, 5.0),
            #[cfg(target_arch = "wasm32")]
            element: None,
        }
    }

    /// Apply a key press. Returns `true` when a value changed.
    pub fn handle_key(&mut self, key: &Key) -> bool {
        match key {
            Key::Character(c) => self.handle_char(c.as_str()),
            _ => false,
        }
    }

    fn handle_char(&mut self, c: &str) -> bool {
        let changed = match c {
            "[" => self.shadow_radius.decrease(),
            "]" => self.shadow_radius.increase(),
            "-" => self.fog_far.decrease(),
            "=" | "+" => self.fog_far.increase(),
            _ => return false,
        };
        if changed {
            log::debug!("{}", self.describe());
        }
        changed
    }

    pub fn apply(&self, light: &mut LightUniform) {
        light.set_shadow_radius(self.shadow_radius.value());
        light.set_fog_far(self.fog_far.value());
    }

    pub fn describe(&self) -> String {
        format!(
            "{}: {:.1}  {}: {:.0}",
            self.shadow_radius.name,
            self.shadow_radius.value(),
            self.fog_far.name,
            self.fog_far.value()
        )
    }

    /// Show the current values: a `div.debug-panel` on the web, a log line natively.
    #[cfg(target_arch = "wasm32")]
    pub fn show(&mut self) {
        if self.element.is_none() {
            self.element = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|document| {
                    let element = document.create_element("div").ok()?;
                    element.set_class_name("debug-panel");
                    document.body()?.append_child(&element).ok()?;
                    Some(element)
                });
        }
        if let Some(element) = &self.element {
            element.set_text_content(Some(&self.describe()));
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn show(&mut self) {
        log::info!("{}", self.describe());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;

    fn panel() -> DebugPanel {
        let cfg = ViewerConfig::default();
        DebugPanel::new(&cfg.sun, &cfg.fog)
    }

    #[test]
    fn defaults() {
        let panel = panel();
        assert_eq!(panel.shadow_radius.value(), 1.0);
        assert_eq!(panel.shadow_radius.range(), (0.0, 8.0));
        assert_eq!(panel.fog_far.value(), 50.0);
        assert_eq!(panel.fog_far.range(), (10.0, 500.0));
    }

    #[test]
    fn keys_step_the_values() {
        let mut panel = panel();
        assert!(panel.handle_key(&Key::Character("]".into())));
        assert_eq!(panel.shadow_radius.value(), 1.5);
        assert!(panel.handle_key(&Key::Character("[".into())));
        assert!(panel.handle_key(&Key::Character("[".into())));
        assert_eq!(panel.shadow_radius.value(), 0.5);
        assert!(panel.handle_key(&Key::Character("=".into())));
        assert_eq!(panel.fog_far.value(), 55.0);
        assert!(panel.handle_key(&Key::Character("-".into())));
        assert_eq!(panel.fog_far.value(), 50.0);
        assert!(!panel.handle_key(&Key::Character("x".into())));
    }

    #[test]
    fn values_stop_at_the_bounds() {
        let mut panel = panel();
        for _ in 0..20 {
            panel.handle_key(&Key::Character("[".into()));
        }
        assert_eq!(panel.shadow_radius.value(), 0.0);
        assert!(!panel.handle_key(&Key::Character("[".into())));
        for _ in 0..200 {
            panel.handle_key(&Key::Character("=".into()));
        }
        assert_eq!(panel.fog_far.value(), 500.0);
    }

    #[test]
    fn fog_far_never_goes_below_fog_near() {
        let mut cfg = ViewerConfig::default();
        cfg.fog.near = 40.0;
        let mut panel = DebugPanel::new(&cfg.sun, &cfg.fog);
        for _ in 0..10 {
            panel.handle_key(&Key::Character("-".into()));
        }
        assert_eq!(panel.fog_far.value(), 40.0);
    }

    #[test]
    fn apply_writes_the_light_uniform() {
        let cfg = ViewerConfig::default();
        let mut panel = panel();
        panel.handle_key(&Key::Character("]".into()));
        panel.handle_key(&Key::Character("=".into()));
        let mut light = LightUniform::new(&cfg.sun, &cfg.ambient, &cfg.fog, 1024);
        panel.apply(&mut light);
        assert_eq!(light.shadow_radius(), 1.5);
        assert_eq!(light.fog_far(), 55.0);
    }
}
