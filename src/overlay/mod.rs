//! Visual comparison overlay.
//!
//! The overlay frames a second copy of the current page on top of the
//! original. The framed copy loads with the freshly written cookies and runs
//! the injector itself, so toggling the frame's blend mode to `difference`
//! highlights what the overrides changed.

use serde::{Deserialize, Serialize};
use url::Url;

pub const OVERLAY_FRAME_ID: &str = "scriptswap-overlay-frame";
pub const OVERLAY_PANEL_ID: &str = "scriptswap-overlay-panel";

/// Stylesheet injected into the tab before the overlay is mounted.
pub const OVERLAY_CSS: &str = "\
#scriptswap-overlay-frame {
  position: fixed; inset: 0; width: 100vw; height: 100vh;
  border: 0; z-index: 2147483646; background: transparent;
}
#scriptswap-overlay-panel {
  position: fixed; right: 12px; bottom: 12px; z-index: 2147483647;
  padding: 8px 12px; border-radius: 6px;
  font: 12px/1.4 system-ui, sans-serif; color: #fff; background: rgba(20, 20, 20, 0.85);
}
#scriptswap-overlay-panel input[type=range] { width: 120px; vertical-align: middle; }
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Difference,
}

impl BlendMode {
    /// CSS `mix-blend-mode` value.
    pub fn as_css(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Difference => "difference",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            BlendMode::Normal => BlendMode::Difference,
            BlendMode::Difference => BlendMode::Normal,
        }
    }
}

/// Defaults for newly mounted overlays.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub opacity: f32,
    pub blend: BlendMode,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            opacity: 0.5,
            blend: BlendMode::Normal,
        }
    }
}

/// What the page program needs to build the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySpec {
    pub frame_url: Url,
    pub opacity: f32,
    pub blend: BlendMode,
}

impl OverlaySpec {
    pub fn new(frame_url: Url, config: &OverlayConfig) -> Self {
        Self {
            frame_url,
            opacity: clamp_opacity(config.opacity),
            blend: config.blend,
        }
    }
}

/// Live state of the control panel: opacity slider and compare toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPanel {
    frame_url: Url,
    opacity: f32,
    blend: BlendMode,
}

impl OverlayPanel {
    pub fn mount(spec: &OverlaySpec) -> Self {
        Self {
            frame_url: spec.frame_url.clone(),
            opacity: clamp_opacity(spec.opacity),
            blend: spec.blend,
        }
    }

    pub fn frame_url(&self) -> &Url {
        &self.frame_url
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    /// Slider input; values outside `0..=1` are clamped.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = clamp_opacity(opacity);
    }

    /// The "compare" toggle. Returns the new mode.
    pub fn toggle_compare(&mut self) -> BlendMode {
        self.blend = self.blend.toggled();
        self.blend
    }

    pub fn is_comparing(&self) -> bool {
        self.blend == BlendMode::Difference
    }

    /// Inline style of the frame element.
    pub fn frame_style(&self) -> String {
        format!(
            "opacity: {:.2}; mix-blend-mode: {};",
            self.opacity,
            self.blend.as_css()
        )
    }
}

fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        OverlayConfig::default().opacity
    } else {
        opacity.clamp(0.0, 1.0)
    }
}
