use crate::collision::solver::Movement;
use crate::error::ConfigError;
use crate::figure::LineDash;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "DECLUTTER_";

/// Look of the guide line drawn from a displaced label back to its anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorStyle {
    /// `None` uses the theme's grid color.
    pub color: Option<String>,
    pub width: f64,
    pub alpha: f64,
    pub dash: LineDash,
}

impl Default for ConnectorStyle {
    fn default() -> Self {
        Self {
            color: None,
            width: 0.8,
            alpha: 0.5,
            dash: LineDash::Solid,
        }
    }
}

/// Knobs for one resolution pass. Build it once and pass it down; the
/// engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionConfig {
    pub obstacle_padding: f64,
    pub label_padding: f64,
    pub max_iterations: usize,
    pub movement: Movement,
    pub connector_threshold: f64,
    pub connector: ConnectorStyle,
    pub debug_overlay: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            obstacle_padding: 4.0,
            label_padding: 2.0,
            max_iterations: 50,
            movement: Movement::Y,
            connector_threshold: 30.0,
            connector: ConnectorStyle::default(),
            debug_overlay: false,
        }
    }
}

impl ResolutionConfig {
    pub fn builder() -> ResolutionConfigBuilder {
        ResolutionConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::NonPositiveIterations(0));
        }
        for (field, value) in [
            ("obstacle_padding", self.obstacle_padding),
            ("label_padding", self.label_padding),
            ("connector_threshold", self.connector_threshold),
            ("connector.width", self.connector.width),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidPixels { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.connector.alpha) {
            return Err(ConfigError::InvalidAlpha(self.connector.alpha));
        }
        Ok(())
    }

    /// Fill in the connector color from the theme when none was given.
    pub fn with_theme(mut self, theme: &Theme) -> Self {
        if self.connector.color.is_none() {
            self.connector.color = Some(theme.grid_color.clone());
        }
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolutionConfigBuilder {
    config: ResolutionConfig,
}

impl ResolutionConfigBuilder {
    pub fn obstacle_padding(mut self, px: f64) -> Self {
        self.config.obstacle_padding = px;
        self
    }

    pub fn label_padding(mut self, px: f64) -> Self {
        self.config.label_padding = px;
        self
    }

    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.max_iterations = iterations;
        self
    }

    pub fn movement(mut self, movement: Movement) -> Self {
        self.config.movement = movement;
        self
    }

    pub fn connector_threshold(mut self, px: f64) -> Self {
        self.config.connector_threshold = px;
        self
    }

    pub fn connector(mut self, style: ConnectorStyle) -> Self {
        self.config.connector = style;
        self
    }

    pub fn debug_overlay(mut self, enabled: bool) -> Self {
        self.config.debug_overlay = enabled;
        self
    }

    pub fn build(self) -> Result<ResolutionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f64,
    pub height: f64,
    pub background: String,
    /// Measure label text with system fonts instead of the fixed estimate.
    pub system_fonts: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 500.0,
            background: "#FFFFFF".to_string(),
            system_fonts: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub resolution: ResolutionConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConnectorFile {
    color: Option<String>,
    width: Option<f64>,
    alpha: Option<f64>,
    dash: Option<LineDash>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ResolutionFile {
    obstacle_padding: Option<f64>,
    label_padding: Option<f64>,
    max_iterations: Option<i64>,
    movement: Option<String>,
    connector_threshold: Option<f64>,
    connector: Option<ConnectorFile>,
    debug_overlay: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderFile {
    width: Option<f64>,
    height: Option<f64>,
    system_fonts: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f64>,
    title_size: Option<f64>,
    text_color: Option<String>,
    axis_color: Option<String>,
    grid_color: Option<String>,
    background: Option<String>,
    label_background: Option<String>,
    palette: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    resolution: Option<ResolutionFile>,
    render: Option<RenderFile>,
}

/// Load configuration: defaults, then the optional JSON/JSON5 file, then
/// `DECLUTTER_*` environment variables. The result is validated.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    if let Some(path) = path {
        let contents = std::fs::read_to_string(path)?;
        let parsed: ConfigFile = json5::from_str(&contents)?;
        apply_file(&mut config, parsed)?;
    }
    apply_env(&mut config, |name| std::env::var(name).ok())?;
    config.resolution.validate()?;
    config.render.background = config.theme.background.clone();
    Ok(config)
}

fn apply_file(config: &mut Config, parsed: ConfigFile) -> Result<(), ConfigError> {
    if let Some(name) = parsed.theme {
        config.theme = Theme::by_name(&name).ok_or(ConfigError::UnknownTheme(name))?;
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.title_size {
            config.theme.title_size = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.axis_color {
            config.theme.axis_color = v;
        }
        if let Some(v) = vars.grid_color {
            config.theme.grid_color = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
        if vars.label_background.is_some() {
            config.theme.label_background = vars.label_background;
        }
        if let Some(v) = vars.palette
            && !v.is_empty()
        {
            config.theme.palette = v;
        }
    }

    if let Some(res) = parsed.resolution {
        let target = &mut config.resolution;
        if let Some(v) = res.obstacle_padding {
            target.obstacle_padding = v;
        }
        if let Some(v) = res.label_padding {
            target.label_padding = v;
        }
        if let Some(v) = res.max_iterations {
            target.max_iterations = iterations(v)?;
        }
        if let Some(v) = res.movement {
            target.movement = v.parse()?;
        }
        if let Some(v) = res.connector_threshold {
            target.connector_threshold = v;
        }
        if let Some(connector) = res.connector {
            if connector.color.is_some() {
                target.connector.color = connector.color;
            }
            if let Some(v) = connector.width {
                target.connector.width = v;
            }
            if let Some(v) = connector.alpha {
                target.connector.alpha = v;
            }
            if let Some(v) = connector.dash {
                target.connector.dash = v;
            }
        }
        if let Some(v) = res.debug_overlay {
            target.debug_overlay = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.system_fonts {
            config.render.system_fonts = v;
        }
    }
    Ok(())
}

fn iterations(value: i64) -> Result<usize, ConfigError> {
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or(ConfigError::NonPositiveIterations(value))
}

fn apply_env<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| {
        let name = format!("{ENV_PREFIX}{suffix}");
        lookup(&name).map(|value| (name, value))
    };
    let number = |name: String, value: String| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidEnv { name, value })
    };

    if let Some((_, value)) = var("THEME") {
        config.theme = Theme::by_name(&value).ok_or(ConfigError::UnknownTheme(value))?;
    }
    if let Some((_, value)) = var("MOVEMENT") {
        config.resolution.movement = value.parse()?;
    }
    if let Some((name, value)) = var("MAX_ITERATIONS") {
        let parsed = match value.trim().parse::<i64>() {
            Ok(v) => v,
            Err(_) => return Err(ConfigError::InvalidEnv { name, value }),
        };
        config.resolution.max_iterations = iterations(parsed)?;
    }
    if let Some((name, value)) = var("OBSTACLE_PADDING") {
        config.resolution.obstacle_padding = number(name, value)?;
    }
    if let Some((name, value)) = var("LABEL_PADDING") {
        config.resolution.label_padding = number(name, value)?;
    }
    if let Some((name, value)) = var("CONNECTOR_THRESHOLD") {
        config.resolution.connector_threshold = number(name, value)?;
    }
    if let Some((name, value)) = var("DEBUG_OVERLAY") {
        config.resolution.debug_overlay = match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => return Err(ConfigError::InvalidEnv { name, value }),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        let parsed: ConfigFile = json5::from_str(text).unwrap();
        let mut config = Config::default();
        apply_file(&mut config, parsed)?;
        Ok(config)
    }

    #[test]
    fn defaults_are_valid() {
        assert!(ResolutionConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_rejects_zero_iterations() {
        let err = ResolutionConfig::builder().max_iterations(0).build().unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveIterations(0));
    }

    #[test]
    fn builder_rejects_negative_padding() {
        let err = ResolutionConfig::builder().label_padding(-2.0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPixels { field: "label_padding", .. }));
    }

    #[test]
    fn file_overrides_are_applied() {
        let config = parse(
            r#"{
                // comments are fine, the file is read as JSON5
                theme: "dark",
                resolution: { movement: "xy", maxIterations: 7, connector: { dash: "dotted" } },
                render: { width: 640 },
            }"#,
        )
        .unwrap();
        assert_eq!(config.theme, Theme::dark());
        assert_eq!(config.resolution.movement, Movement::XY);
        assert_eq!(config.resolution.max_iterations, 7);
        assert_eq!(config.resolution.connector.dash, LineDash::Dotted);
        assert_eq!(config.render.width, 640.0);
    }

    #[test]
    fn negative_iterations_in_file_fail_fast() {
        let err = parse(r#"{"resolution": {"maxIterations": -3}}"#).unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveIterations(-3));
    }

    #[test]
    fn env_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("DECLUTTER_MOVEMENT", "x"),
            ("DECLUTTER_LABEL_PADDING", "6.5"),
            ("DECLUTTER_DEBUG_OVERLAY", "yes"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        apply_env(&mut config, |name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.resolution.movement, Movement::X);
        assert_eq!(config.resolution.label_padding, 6.5);
        assert!(config.resolution.debug_overlay);
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut config = Config::default();
        let err = apply_env(&mut config, |name| {
            (name == "DECLUTTER_OBSTACLE_PADDING").then(|| "wide".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn unknown_theme_name_is_rejected() {
        let err = parse(r#"{theme: "neon"}"#).unwrap_err();
        assert_eq!(err, ConfigError::UnknownTheme("neon".to_string()));

        let mut config = Config::default();
        let err = apply_env(&mut config, |name| (name == "DECLUTTER_THEME").then(|| "solarized".to_string()))
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownTheme("solarized".to_string()));
        assert_eq!(config.theme, Theme::default());
    }

    #[test]
    fn connector_color_falls_back_to_theme() {
        let theme = Theme::standard();
        let cfg = ResolutionConfig::default().with_theme(&theme);
        assert_eq!(cfg.connector.color.as_deref(), Some(theme.grid_color.as_str()));
    }
}
