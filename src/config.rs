//! Persisted CLI defaults.
//!
//! Defaults live in rc files holding plain flag tokens: a global file under
//! the platform config directory and a local `.mermaidviewrc` override.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::generate::{ConfigError, DEFAULT_TIMEOUT, GenerationConfig, RendererKind};

const VALUED_FLAGS: [&str; 10] = [
    "--theme",
    "--format",
    "--width",
    "--height",
    "--scale",
    "--background",
    "--renderer",
    "--timeout",
    "--mmdc",
    "--render-url",
];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFlags {
    pub verbose: bool,
    pub theme: Option<String>,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<f64>,
    pub background: Option<String>,
    pub renderer: Option<String>,
    /// Per-attempt render timeout in seconds.
    pub timeout: Option<u64>,
    pub mmdc: Option<PathBuf>,
    pub render_url: Option<String>,
}

impl ConfigFlags {
    /// Layer `other` on top of `self`: valued options from `other` win,
    /// booleans are OR-ed.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            verbose: self.verbose || other.verbose,
            theme: other.theme.clone().or_else(|| self.theme.clone()),
            format: other.format.clone().or_else(|| self.format.clone()),
            width: other.width.or(self.width),
            height: other.height.or(self.height),
            scale: other.scale.or(self.scale),
            background: other
                .background
                .clone()
                .or_else(|| self.background.clone()),
            renderer: other.renderer.clone().or_else(|| self.renderer.clone()),
            timeout: other.timeout.or(self.timeout),
            mmdc: other.mmdc.clone().or_else(|| self.mmdc.clone()),
            render_url: other
                .render_url
                .clone()
                .or_else(|| self.render_url.clone()),
        }
    }

    /// Validated rendering options, unset values taking their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown theme or format, or a
    /// non-positive size or scale.
    pub fn generation_config(&self) -> Result<GenerationConfig, ConfigError> {
        let defaults = GenerationConfig::default();
        let mut config = defaults.clone();
        if let Some(theme) = &self.theme {
            config = config.with_theme(theme)?;
        }
        if let Some(format) = &self.format {
            config = config.with_format(format)?;
        }
        config = config.with_size(
            self.width.unwrap_or(defaults.width()),
            self.height.unwrap_or(defaults.height()),
        )?;
        if let Some(scale) = self.scale {
            config = config.with_scale(scale)?;
        }
        if let Some(background) = &self.background {
            config = config.with_background(background.as_str());
        }
        Ok(config)
    }

    pub fn renderer_kind(&self) -> Result<RendererKind> {
        self.renderer
            .as_deref()
            .map_or(Ok(RendererKind::default()), |name| {
                name.parse::<RendererKind>().map_err(|err| anyhow!(err))
            })
    }

    /// Per-attempt render timeout, [`DEFAULT_TIMEOUT`] when unset.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotPositive`] for a zero timeout.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        match self.timeout {
            None => Ok(DEFAULT_TIMEOUT),
            Some(0) => Err(ConfigError::NotPositive {
                name: "timeout",
                value: "0".to_string(),
            }),
            Some(secs) => Ok(Duration::from_secs(secs)),
        }
    }

    /// Browser renderer command: flag, then `MERMAIDVIEW_MMDC`.
    pub fn mmdc_command(&self) -> Option<PathBuf> {
        self.mmdc
            .clone()
            .or_else(|| std::env::var_os("MERMAIDVIEW_MMDC").map(PathBuf::from))
    }

    /// Remote renderer base URL: flag, then `MERMAIDVIEW_RENDER_URL`.
    pub fn render_url(&self) -> Option<String> {
        self.render_url
            .clone()
            .or_else(|| std::env::var("MERMAIDVIEW_RENDER_URL").ok())
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("mermaidview").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("mermaidview")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("mermaidview").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("mermaidview")
                .join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".mermaidviewrc")
}

/// Global file, then local override. Missing files count as empty.
pub fn load_file_flags(global: &Path, local: &Path) -> Result<ConfigFlags> {
    Ok(load_config_flags(global)?.union(&load_config_flags(local)?))
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    tracing::debug!(path = %path.display(), tokens = tokens.len(), "loaded config flags");
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# mermaidview defaults (saved with --save)".to_string()];
    if flags.verbose {
        lines.push("--verbose".to_string());
    }
    let valued = [
        ("--theme", flags.theme.clone()),
        ("--format", flags.format.clone()),
        ("--width", flags.width.map(|v| v.to_string())),
        ("--height", flags.height.map(|v| v.to_string())),
        ("--scale", flags.scale.map(|v| v.to_string())),
        ("--background", flags.background.clone()),
        ("--renderer", flags.renderer.clone()),
        ("--timeout", flags.timeout.map(|v| v.to_string())),
        ("--mmdc", flags.mmdc.as_ref().map(|p| p.display().to_string())),
        ("--render-url", flags.render_url.clone()),
    ];
    for (name, value) in valued {
        if let Some(value) = value {
            lines.push(format!("{name} {value}"));
        }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Extract known flags from a token stream. Unknown tokens and unparsable
/// numbers are skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        if token == "--verbose" {
            flags.verbose = true;
            i += 1;
            continue;
        }

        let (name, inline) = match token.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (token, None),
        };
        if VALUED_FLAGS.contains(&name) {
            let value = match inline {
                Some(value) => Some(value),
                None => {
                    let next = tokens.get(i + 1).cloned();
                    if next.is_some() {
                        i += 1;
                    }
                    next
                }
            };
            if let Some(value) = value {
                apply_flag(&mut flags, name, &value);
            }
        }
        i += 1;
    }
    flags
}

fn apply_flag(flags: &mut ConfigFlags, name: &str, value: &str) {
    match name {
        "--theme" => flags.theme = Some(value.to_string()),
        "--format" => flags.format = Some(value.to_string()),
        "--width" => flags.width = parse_number(name, value),
        "--height" => flags.height = parse_number(name, value),
        "--scale" => flags.scale = parse_number(name, value),
        "--background" => flags.background = Some(value.to_string()),
        "--renderer" => flags.renderer = Some(value.to_string()),
        "--timeout" => flags.timeout = parse_number(name, value),
        "--mmdc" => flags.mmdc = Some(PathBuf::from(value)),
        "--render-url" => flags.render_url = Some(value.to_string()),
        _ => {}
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Option<T> {
    let parsed = value.parse().ok();
    if parsed.is_none() {
        tracing::warn!(flag = name, value, "ignoring invalid numeric flag");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{OutputFormat, Theme};
    use tempfile::tempdir;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let flags = parse_flag_tokens(&tokens(&[
            "--verbose",
            "--theme",
            "dark",
            "--format=SVG",
            "--width",
            "1024",
            "--scale=1.5",
            "--renderer",
            "remote",
            "--timeout",
            "45",
            "--mmdc=/opt/bin/mmdc",
            "diagram.mmd",
        ]));
        assert!(flags.verbose);
        assert_eq!(flags.theme.as_deref(), Some("dark"));
        assert_eq!(flags.format.as_deref(), Some("SVG"));
        assert_eq!(flags.width, Some(1024));
        assert_eq!(flags.height, None);
        assert_eq!(flags.scale, Some(1.5));
        assert_eq!(flags.renderer.as_deref(), Some("remote"));
        assert_eq!(flags.timeout, Some(45));
        assert_eq!(flags.mmdc, Some(PathBuf::from("/opt/bin/mmdc")));
    }

    #[test]
    fn test_parse_flag_tokens_skips_bad_numbers_and_dangling_flags() {
        let flags = parse_flag_tokens(&tokens(&["--width", "wide", "--theme"]));
        assert_eq!(flags.width, None);
        assert_eq!(flags.theme, None);
    }

    #[test]
    fn test_config_union_merges_cli_over_file_for_options() {
        let file = ConfigFlags {
            verbose: true,
            theme: Some("forest".to_string()),
            width: Some(1200),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            theme: Some("dark".to_string()),
            height: Some(900),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.verbose);
        assert_eq!(merged.theme.as_deref(), Some("dark"));
        assert_eq!(merged.width, Some(1200));
        assert_eq!(merged.height, Some(900));
    }

    #[test]
    fn test_generation_config_from_flags() {
        let flags = ConfigFlags {
            theme: Some("Forest".to_string()),
            format: Some("JPG".to_string()),
            width: Some(1024),
            background: Some("#000000".to_string()),
            ..ConfigFlags::default()
        };
        let config = flags.generation_config().unwrap();
        assert_eq!(config.theme(), Theme::Forest);
        assert_eq!(config.format(), OutputFormat::Jpeg);
        assert_eq!((config.width(), config.height()), (1024, 600));
        assert_eq!(config.background(), "#000000");

        let bad = ConfigFlags {
            format: Some("gif".to_string()),
            ..ConfigFlags::default()
        };
        assert_eq!(
            bad.generation_config(),
            Err(ConfigError::Format("gif".to_string()))
        );
    }

    #[test]
    fn test_renderer_kind_and_timeout_defaults() {
        let flags = ConfigFlags::default();
        assert_eq!(flags.renderer_kind().unwrap(), RendererKind::Browser);
        assert_eq!(flags.timeout(), Ok(DEFAULT_TIMEOUT));

        let flags = ConfigFlags {
            renderer: Some("canvas".to_string()),
            ..ConfigFlags::default()
        };
        assert!(flags.renderer_kind().is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let flags = ConfigFlags {
            timeout: Some(0),
            ..ConfigFlags::default()
        };
        assert_eq!(
            flags.timeout(),
            Err(ConfigError::NotPositive {
                name: "timeout",
                value: "0".to_string(),
            })
        );

        let flags = ConfigFlags {
            timeout: Some(30),
            ..ConfigFlags::default()
        };
        assert_eq!(flags.timeout(), Ok(Duration::from_secs(30)));
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config");
        let flags = ConfigFlags {
            verbose: true,
            theme: Some("dark".to_string()),
            format: Some("svg".to_string()),
            width: Some(640),
            height: Some(480),
            scale: Some(2.0),
            background: Some("transparent".to_string()),
            renderer: Some("remote".to_string()),
            timeout: Some(10),
            mmdc: Some(PathBuf::from("/usr/local/bin/mmdc")),
            render_url: Some("https://render.example".to_string()),
        };

        save_config_flags(&path, &flags).unwrap();
        let loaded = load_config_flags(&path).unwrap();
        assert_eq!(loaded, flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(load_config_flags(&path).unwrap(), ConfigFlags::default());
    }

    #[test]
    fn test_local_file_overrides_global() {
        let dir = tempdir().unwrap();
        let global = dir.path().join("global");
        let local = dir.path().join(".mermaidviewrc");
        fs::write(&global, "# defaults\n--theme forest\n--width 1000\n").unwrap();
        fs::write(&local, "--theme neutral\n").unwrap();

        let flags = load_file_flags(&global, &local).unwrap();
        assert_eq!(flags.theme.as_deref(), Some("neutral"));
        assert_eq!(flags.width, Some(1000));
    }
}
