//! Theme plumbing for the styling collaborator.
//!
//! The styling layer is external. This module builds the configuration it is
//! handed, tracks the live color mode, and turns its raw `__cssMap` token
//! table into a nested lookup tree with [`flatten`].

mod flatten;

use core::fmt;

use serde_json::{Map, Value, json};

pub use self::flatten::{CssMap, TokenFlattener, TokenTree, VAR_REF_FIELD, flatten};

/// Field of a theme object holding the raw token table.
pub const CSS_MAP_FIELD: &str = "__cssMap";

/// A color mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// Light mode.
    #[default]
    Light,
    /// Dark mode.
    Dark,
}

impl ColorMode {
    /// The wire name, `"light"` or `"dark"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// The opposite mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Parses a wire name, ignoring ASCII case.
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("light") {
            Some(Self::Light)
        } else if name.eq_ignore_ascii_case("dark") {
            Some(Self::Dark)
        } else {
            None
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color mode options of a theme provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThemeOptions {
    /// Mode used before any toggle.
    pub initial_color_mode: Option<ColorMode>,
    /// Whether to follow the system preference.
    pub use_system_color_mode: Option<bool>,
    /// Mode that overrides everything and cannot be toggled.
    pub force_color_mode: Option<ColorMode>,
}

/// Builds the configuration handed to the styling layer: `theme` with its
/// `config` replaced.
///
/// ```
/// use clutch_report::theme::{ColorMode, ThemeOptions, provider_config};
/// use serde_json::json;
///
/// let options = ThemeOptions {
///     initial_color_mode: Some(ColorMode::Dark),
///     ..ThemeOptions::default()
/// };
/// let config = provider_config(&json!({ "colors": { "bg": "#000" } }), &options);
/// assert_eq!(
///     config,
///     json!({
///         "colors": { "bg": "#000" },
///         "config": { "cssVarPrefix": "", "initialColorMode": "dark" },
///     })
/// );
/// ```
pub fn provider_config(theme: &Value, options: &ThemeOptions) -> Value {
    let mut config = Map::new();
    config.insert("cssVarPrefix".into(), json!(""));
    if let Some(mode) = options.initial_color_mode {
        config.insert("initialColorMode".into(), json!(mode.as_str()));
    }
    if let Some(use_system) = options.use_system_color_mode {
        config.insert("useSystemColorMode".into(), json!(use_system));
    }

    let mut merged = theme.as_object().cloned().unwrap_or_default();
    merged.insert("config".into(), Value::Object(config));
    Value::Object(merged)
}

/// Extracts the raw token table of a theme, if it has one.
pub fn css_map(theme: &Value) -> Option<CssMap> {
    let table = theme.get(CSS_MAP_FIELD)?.as_object()?;
    Some(
        table
            .iter()
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect(),
    )
}

/// The live color mode of a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorModeState {
    mode: ColorMode,
    forced: bool,
}

impl ColorModeState {
    /// Picks the starting mode: the forced mode, then the system preference
    /// when enabled, then the initial mode, then light.
    pub fn new(options: &ThemeOptions, system: Option<ColorMode>) -> Self {
        let followed = system.filter(|_| options.use_system_color_mode == Some(true));
        match options.force_color_mode {
            Some(mode) => Self { mode, forced: true },
            None => Self {
                mode: followed
                    .or(options.initial_color_mode)
                    .unwrap_or_default(),
                forced: false,
            },
        }
    }

    /// The current mode.
    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    /// Whether the mode is forced.
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// Flips the mode unless it is forced, returning the resulting mode.
    pub fn toggle(&mut self) -> ColorMode {
        if !self.forced {
            self.mode = self.mode.toggled();
        }
        self.mode
    }

    /// Sets the mode unless it is forced. Returns whether it changed.
    pub fn set(&mut self, mode: ColorMode) -> bool {
        if self.forced || self.mode == mode {
            return false;
        }
        self.mode = mode;
        true
    }
}
