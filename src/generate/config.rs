//! Rendering options passed to a [`Renderer`](super::Renderer).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported output format '{0}' (expected png, svg, pdf or jpeg)")]
    Format(String),
    #[error("unknown theme '{0}' (expected default, dark, forest, neutral or base)")]
    Theme(String),
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: String },
}

/// Mermaid theme presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Forest,
    Neutral,
    Base,
}

impl Theme {
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::Dark,
        Self::Forest,
        Self::Neutral,
        Self::Base,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
            Self::Forest => "forest",
            Self::Neutral => "neutral",
            Self::Base => "base",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Theme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|theme| theme.name() == lower)
            .ok_or_else(|| ConfigError::Theme(s.to_string()))
    }
}

/// Output image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Svg,
    Pdf,
    Jpeg,
}

impl OutputFormat {
    pub const ALL: [Self; 4] = [Self::Png, Self::Svg, Self::Pdf, Self::Jpeg];

    /// Canonical lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
            Self::Jpeg => "jpeg",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            other => other.name(),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    /// Case-insensitive; `jpg` is accepted for `jpeg`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            "pdf" => Ok(Self::Pdf),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            _ => Err(ConfigError::Format(s.to_string())),
        }
    }
}

/// Validated rendering options. Immutable once constructed; every
/// `with_*` call returns a new value or a [`ConfigError`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    theme: Theme,
    format: OutputFormat,
    width: u32,
    height: u32,
    scale: f64,
    background: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            theme: Theme::Default,
            format: OutputFormat::Png,
            width: 800,
            height: 600,
            scale: 1.0,
            background: "white".to_string(),
        }
    }
}

impl GenerationConfig {
    /// Build a config from user-supplied strings and numbers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown theme or format, or a
    /// non-positive dimension or scale.
    pub fn new(
        theme: &str,
        format: &str,
        width: u32,
        height: u32,
        scale: f64,
    ) -> Result<Self, ConfigError> {
        Self::default()
            .with_theme(theme)?
            .with_format(format)?
            .with_size(width, height)?
            .with_scale(scale)
    }

    pub fn with_theme(mut self, theme: &str) -> Result<Self, ConfigError> {
        self.theme = theme.parse()?;
        Ok(self)
    }

    pub fn with_format(mut self, format: &str) -> Result<Self, ConfigError> {
        self.format = format.parse()?;
        Ok(self)
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Result<Self, ConfigError> {
        for (name, value) in [("width", width), ("height", height)] {
            if value == 0 {
                return Err(ConfigError::NotPositive {
                    name,
                    value: value.to_string(),
                });
            }
        }
        self.width = width;
        self.height = height;
        Ok(self)
    }

    pub fn with_scale(mut self, scale: f64) -> Result<Self, ConfigError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::NotPositive {
                name: "scale",
                value: scale.to_string(),
            });
        }
        self.scale = scale;
        Ok(self)
    }

    #[must_use]
    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        let background = background.into();
        if !background.trim().is_empty() {
            self.background = background.trim().to_string();
        }
        self
    }

    pub const fn theme(&self) -> Theme {
        self.theme
    }

    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn scale(&self) -> f64 {
        self.scale
    }

    pub fn background(&self) -> &str {
        &self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_is_case_insensitive_and_canonical() {
        let config = GenerationConfig::default().with_format("PNG").unwrap();
        assert_eq!(config.format(), OutputFormat::Png);
        assert_eq!(config.format().to_string(), "png");
        assert_eq!("Jpg".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn test_unknown_format_and_theme_fail() {
        assert_eq!(
            GenerationConfig::default().with_format("gif").unwrap_err(),
            ConfigError::Format("gif".to_string())
        );
        assert!(matches!(
            GenerationConfig::default().with_theme("solarized"),
            Err(ConfigError::Theme(_))
        ));
        assert_eq!("FOREST".parse::<Theme>(), Ok(Theme::Forest));
    }

    #[test]
    fn test_dimensions_must_be_positive() {
        assert!(GenerationConfig::default().with_size(0, 10).is_err());
        assert!(GenerationConfig::default().with_size(10, 0).is_err());
        assert!(GenerationConfig::default().with_scale(0.0).is_err());
        assert!(GenerationConfig::default().with_scale(-1.5).is_err());
        assert!(GenerationConfig::default().with_scale(f64::NAN).is_err());
    }

    #[test]
    fn test_new_builds_full_config() {
        let config = GenerationConfig::new("Dark", "SVG", 1024, 768, 2.0).unwrap();
        assert_eq!(config.theme(), Theme::Dark);
        assert_eq!(config.format(), OutputFormat::Svg);
        assert_eq!((config.width(), config.height()), (1024, 768));
        assert!((config.scale() - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.background(), "white");
    }

    #[test]
    fn test_blank_background_keeps_default() {
        let config = GenerationConfig::default().with_background("  ");
        assert_eq!(config.background(), "white");
        let config = GenerationConfig::default().with_background("transparent");
        assert_eq!(config.background(), "transparent");
    }
}
