//! Local rendering through the Mermaid CLI (`mmdc`), which drives a
//! headless Chromium.
//!
//! A browser context (scratch directory + puppeteer config) is reused across
//! renders and guarded by an async mutex, so at most one render runs on it at
//! a time. The context is moved into the in-flight render: if that future is
//! dropped (timeout or cancellation) the context goes with it, the child
//! process is killed, and the next render starts from a fresh context.

use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::{GenerationConfig, OutputFormat, RenderError, Renderer};

pub const DEFAULT_MMDC: &str = "mmdc";

const JPEG_QUALITY: u8 = 95;

const PUPPETEER_CONFIG: &str = r#"{
  "args": ["--no-sandbox", "--disable-setuid-sandbox", "--disable-gpu"]
}
"#;

struct BrowserContext {
    dir: TempDir,
    puppeteer_config: PathBuf,
}

impl BrowserContext {
    fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("mermaidview-").tempdir()?;
        let puppeteer_config = dir.path().join("puppeteer.json");
        std::fs::write(&puppeteer_config, PUPPETEER_CONFIG)?;
        tracing::debug!(dir = %dir.path().display(), "created browser context");
        Ok(Self {
            dir,
            puppeteer_config,
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Drop for BrowserContext {
    fn drop(&mut self) {
        tracing::debug!(dir = %self.dir.path().display(), "tearing down browser context");
    }
}

pub struct BrowserRenderer {
    command: PathBuf,
    context: Mutex<Option<BrowserContext>>,
}

impl BrowserRenderer {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            context: Mutex::new(None),
        }
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    async fn run(
        &self,
        context: &BrowserContext,
        source: &str,
        config: &GenerationConfig,
    ) -> Result<Vec<u8>, RenderError> {
        let input = context.path("input.mmd");
        tokio::fs::write(&input, source).await?;

        // mmdc has no JPEG output; render PNG and convert.
        let native = match config.format() {
            OutputFormat::Jpeg => OutputFormat::Png,
            other => other,
        };
        let output = context.path(&format!("output.{}", native.extension()));

        let result = Command::new(&self.command)
            .arg("--input")
            .arg(&input)
            .arg("--output")
            .arg(&output)
            .args(["--theme", config.theme().name()])
            .args(["--backgroundColor", config.background()])
            .arg("--width")
            .arg(config.width().to_string())
            .arg("--height")
            .arg(config.height().to_string())
            .arg("--scale")
            .arg(config.scale().to_string())
            .arg("--puppeteerConfigFile")
            .arg(&context.puppeteer_config)
            .arg("--quiet")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let result = match result {
            Ok(result) => result,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(RenderError::Unavailable(format!(
                    "'{}' not found; install @mermaid-js/mermaid-cli or set MERMAIDVIEW_MMDC",
                    self.command.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let message = stderr
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or("mmdc exited without output")
                .to_string();
            return Err(RenderError::Rejected(message));
        }

        let bytes = tokio::fs::read(&output).await?;
        let _ = tokio::fs::remove_file(&output).await;

        if config.format() == OutputFormat::Jpeg {
            png_to_jpeg(&bytes)
        } else {
            Ok(bytes)
        }
    }
}

impl Default for BrowserRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MMDC)
    }
}

#[async_trait]
impl Renderer for BrowserRenderer {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn render(
        &self,
        source: &str,
        config: &GenerationConfig,
    ) -> Result<Vec<u8>, RenderError> {
        let mut slot = self.context.lock().await;
        let context = match slot.take() {
            Some(context) => context,
            None => BrowserContext::create()?,
        };

        let result = self.run(&context, source, config).await;
        // Only reached when the render ran to completion.
        *slot = Some(context);
        result
    }
}

/// Re-encode a PNG as JPEG. JPEG has no alpha channel, so it is dropped.
fn png_to_jpeg(png: &[u8]) -> Result<Vec<u8>, RenderError> {
    let image = image::load_from_memory_with_format(png, ImageFormat::Png)?;
    let mut out = Cursor::new(Vec::new());
    image
        .to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(4, 3, image::Rgba([255, 0, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_png_to_jpeg_keeps_dimensions() {
        let jpeg = png_to_jpeg(&tiny_png()).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn test_png_to_jpeg_rejects_garbage() {
        assert!(matches!(
            png_to_jpeg(b"not a png"),
            Err(RenderError::Image(_))
        ));
    }

    #[test]
    fn test_context_writes_puppeteer_config() {
        let context = BrowserContext::create().unwrap();
        let config = std::fs::read_to_string(&context.puppeteer_config).unwrap();
        assert!(config.contains("--no-sandbox"));
        let dir = context.dir.path().to_path_buf();
        drop(context);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let renderer = BrowserRenderer::new("/nonexistent/mermaidview-mmdc");
        let err = renderer
            .render("flowchart TD\n    A --> B", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Unavailable(_)), "{err}");
        // The context survives a completed (failed) render.
        assert!(renderer.context.lock().await.is_some());
    }

    /// A stand-in for mmdc that exits with an error, or hangs while a
    /// `<script>.hang` marker file exists.
    #[cfg(unix)]
    fn fake_mmdc(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("mmdc");
        std::fs::write(
            &script,
            "#!/bin/sh\nif [ -f \"$0.hang\" ]; then exec sleep 30; fi\necho 'Parse error' >&2\nexit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_render_tears_down_context() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_mmdc(dir.path());
        let renderer = BrowserRenderer::new(&script);
        let config = GenerationConfig::default();
        let source = "flowchart TD\n    A --> B";

        let err = renderer.render(source, &config).await.unwrap_err();
        assert!(matches!(err, RenderError::Rejected(ref msg) if msg == "Parse error"), "{err}");
        let first_dir = renderer
            .context
            .lock()
            .await
            .as_ref()
            .map(|context| context.dir.path().to_path_buf())
            .unwrap();

        std::fs::write(script.with_extension("hang"), "").unwrap();
        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            renderer.render(source, &config),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(renderer.context.lock().await.is_none());
        assert!(!first_dir.exists());

        std::fs::remove_file(script.with_extension("hang")).unwrap();
        assert!(renderer.render(source, &config).await.is_err());
        let second_dir = renderer
            .context
            .lock()
            .await
            .as_ref()
            .map(|context| context.dir.path().to_path_buf())
            .unwrap();
        assert_ne!(first_dir, second_dir);
    }
}
