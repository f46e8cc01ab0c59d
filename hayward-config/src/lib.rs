//! Library for configuration types definitions and configuration file loading using [`toml`] and
//! [`serde`]

#[macro_use]
extern crate tracing;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

const fn default_true() -> bool {
    true
}

const fn default_false() -> bool {
    false
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub general: General,
    pub gaps: Gaps,
    pub decorations: Decorations,
    pub floating: Floating,
    pub input: Input,
    pub cursor: Cursor,
    pub workspaces: Workspaces,
    pub debug: Debug,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct General {
    pub focus_wrapping: FocusWrapping,
    pub mouse_warping: MouseWarping,
    #[serde(default = "default_true")]
    pub focus_follows_mouse: bool,
    pub focus_on_window_activation: FocusOnWindowActivation,
    pub popup_during_fullscreen: PopupDuringFullscreen,
    pub xwayland: Xwayland,
    /// How long the compositor waits for clients to acknowledge a resize before promoting a
    /// transaction anyway, in milliseconds.
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_ms: u32,
    /// How long a window moved across workspaces keeps its urgency flag, in milliseconds.
    #[serde(default = "default_urgent_timeout")]
    pub urgent_timeout_ms: u32,
}

const fn default_transaction_timeout() -> u32 {
    200
}

const fn default_urgent_timeout() -> u32 {
    500
}

impl Default for General {
    fn default() -> Self {
        Self {
            focus_wrapping: FocusWrapping::default(),
            mouse_warping: MouseWarping::default(),
            focus_follows_mouse: true,
            focus_on_window_activation: FocusOnWindowActivation::default(),
            popup_during_fullscreen: PopupDuringFullscreen::default(),
            xwayland: Xwayland::default(),
            transaction_timeout_ms: default_transaction_timeout(),
            urgent_timeout_ms: default_urgent_timeout(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusWrapping {
    No,
    #[default]
    Yes,
    Force,
    Workspace,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MouseWarping {
    No,
    #[default]
    Output,
    Container,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusOnWindowActivation {
    #[default]
    Smart,
    Urgent,
    Focus,
    None,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PopupDuringFullscreen {
    #[default]
    Smart,
    Ignore,
    Leave,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Xwayland {
    Disabled,
    #[default]
    Lazy,
    Immediate,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Gaps {
    /// Gap between neighbouring tiles.
    pub inner: i32,
    /// Gap between the tiles and the edge of the workspace area.
    pub outer: i32,
    pub smart: SmartGaps,
}

impl Default for Gaps {
    fn default() -> Self {
        Self {
            inner: 0,
            outer: 0,
            smart: SmartGaps::Off,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmartGaps {
    #[default]
    Off,
    /// Drop all gaps when a workspace shows a single container.
    On,
    /// Only keep outer gaps when a workspace shows a single container.
    Inverse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Decorations {
    pub border: BorderKind,
    pub border_thickness: i32,
    pub titlebar_height: i32,
    pub hide_edge_borders: HideEdgeBorders,
}

impl Default for Decorations {
    fn default() -> Self {
        Self {
            border: BorderKind::Normal,
            border_thickness: 2,
            titlebar_height: 24,
            hide_edge_borders: HideEdgeBorders::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BorderKind {
    None,
    Pixel,
    #[default]
    Normal,
    /// The client draws its own decorations, the compositor draws nothing.
    Csd,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HideEdgeBorders {
    #[default]
    None,
    Vertical,
    Horizontal,
    Both,
    Smart,
    SmartNoGaps,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Floating {
    /// Minimum floating window size. `0` means automatic, `-1` means unconstrained.
    pub minimum_width: i32,
    pub minimum_height: i32,
    /// Maximum floating window size. `0` means automatic, `-1` means unconstrained.
    pub maximum_width: i32,
    pub maximum_height: i32,
}

impl Default for Floating {
    fn default() -> Self {
        Self {
            minimum_width: 0,
            minimum_height: 0,
            maximum_width: 0,
            maximum_height: 0,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Input {
    pub keyboard: Keyboard,
    /// Configuration applied to every pointer-ish device unless a per-device section overrides
    /// it. Keyed by device identifier, for example `"1133:16505:Logitech_MX_Master"`.
    pub devices: HashMap<String, DeviceConfig>,
    pub default_device: DeviceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Keyboard {
    pub layout: String,
    pub variant: String,
    pub options: Option<String>,
    pub repeat_rate: i32,
    pub repeat_delay: i32,
}

impl Default for Keyboard {
    fn default() -> Self {
        Self {
            layout: String::from("us"),
            variant: String::new(),
            options: None,
            repeat_rate: 25,
            repeat_delay: 600,
        }
    }
}

/// Per-device libinput-style knobs. Every field is optional, `None` keeps the device default.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DeviceConfig {
    pub tap: Option<bool>,
    pub tap_button_map: Option<TapButtonMap>,
    pub drag: Option<bool>,
    pub drag_lock: Option<bool>,
    pub natural_scroll: Option<bool>,
    pub accel_profile: Option<AccelProfile>,
    pub accel_speed: Option<f64>,
    pub click_method: Option<ClickMethod>,
    pub scroll_method: Option<ScrollMethod>,
    pub scroll_button: Option<u32>,
    pub middle_emulation: Option<bool>,
    pub disable_while_typing: Option<bool>,
    pub left_handed: Option<bool>,
    pub events: Option<SendEvents>,
    pub calibration_matrix: Option<[f32; 6]>,
    /// Restrict the device to one output. Touch and tablet devices on laptops are mapped to the
    /// built-in panel automatically when this is unset.
    pub map_to_output: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TapButtonMap {
    LeftRightMiddle,
    LeftMiddleRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccelProfile {
    Flat,
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClickMethod {
    None,
    ButtonAreas,
    Clickfinger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrollMethod {
    None,
    TwoFinger,
    Edge,
    OnButtonDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendEvents {
    Enabled,
    Disabled,
    DisabledOnExternalMouse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Cursor {
    pub name: String,
    pub size: u32,
    pub hide_when_typing: HideCursorWhenTyping,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            size: 24,
            hide_when_typing: HideCursorWhenTyping::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HideCursorWhenTyping {
    #[default]
    Default,
    Enable,
    Disable,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Workspaces {
    /// Workspaces created at startup. Must not be empty.
    pub names: Vec<String>,
}

impl Default for Workspaces {
    fn default() -> Self {
        Self {
            names: vec![String::from("1")],
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Debug {
    /// Apply transactions immediately without waiting for client acknowledgments.
    #[serde(default = "default_false")]
    pub noatomic: bool,
    /// Force every transaction to run into its timeout.
    #[serde(default = "default_false")]
    pub txn_wait: bool,
    /// Log wall-time deltas for transaction commits and acknowledgments.
    #[serde(default = "default_false")]
    pub txn_timings: bool,
}

impl Default for Debug {
    fn default() -> Self {
        Self {
            noatomic: false,
            txn_wait: false,
            txn_timings: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load the configuration from `path`, falling back to
/// `$XDG_CONFIG_HOME/hayward/hayward.toml`.
///
/// A missing configuration file is not an error, the compositor starts with built-in defaults.
pub fn load(path: Option<PathBuf>) -> Result<Config, Error> {
    let path = match path {
        Some(path) => path,
        None => {
            let base_dirs = xdg::BaseDirectories::new();
            match base_dirs.find_config_file("hayward/hayward.toml") {
                Some(path) => path,
                None => {
                    info!("No configuration file found, using defaults");
                    return Ok(Config::default());
                }
            }
        }
    };

    debug!(?path, "Loading configuration");
    let contents = std::fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&contents)?;

    if config.workspaces.names.is_empty() {
        warn!("Configuration declares no workspaces, falling back to a single one");
        return Ok(Config {
            workspaces: Workspaces::default(),
            ..config
        });
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.general.transaction_timeout_ms, 200);
        assert_eq!(config.general.focus_wrapping, FocusWrapping::Yes);
        assert_eq!(config.decorations.border, BorderKind::Normal);
        assert_eq!(config.workspaces.names, vec![String::from("1")]);
    }

    #[test]
    fn parse_partial() {
        let config: Config = toml::from_str(
            r#"
            [general]
            transaction-timeout-ms = 500
            mouse-warping = "container"

            [gaps]
            inner = 10
            outer = 5
            smart = "inverse"

            [input.devices."1267:12608:MSFT0001:00_04F3:3140_Touchpad"]
            tap = true
            natural-scroll = true
            accel-profile = "flat"
            "#,
        )
        .unwrap();

        assert_eq!(config.general.transaction_timeout_ms, 500);
        assert_eq!(config.general.mouse_warping, MouseWarping::Container);
        assert_eq!(config.gaps.inner, 10);
        assert_eq!(config.gaps.smart, SmartGaps::Inverse);
        let device = &config.input.devices["1267:12608:MSFT0001:00_04F3:3140_Touchpad"];
        assert_eq!(device.tap, Some(true));
        assert_eq!(device.accel_profile, Some(AccelProfile::Flat));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[general]\nnot-a-real-field = 1\n");
        assert!(result.is_err());
    }
}
