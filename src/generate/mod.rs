//! Image generation.
//!
//! The [`Generator`] is renderer-agnostic: it owns an `Arc<dyn Renderer>`,
//! bounds each attempt with a timeout, retries once after a timeout, and
//! writes output files atomically.

mod browser;
mod config;
mod remote;
mod renderer;

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

pub use browser::{BrowserRenderer, DEFAULT_MMDC};
pub use config::{ConfigError, GenerationConfig, OutputFormat, Theme};
pub use remote::{DEFAULT_RENDER_URL, HttpRenderer};
pub use renderer::{RenderError, Renderer};

/// Total render attempts per generation (first try plus one retry).
pub const MAX_ATTEMPTS: u32 = 2;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Records a [`Generator`] keeps before dropping the oldest.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("rendering timed out after {attempts} attempts ({}s each)", timeout.as_secs_f64())]
    Timeout { attempts: u32, timeout: Duration },
    #[error("rendering failed: {0}")]
    Render(#[source] RenderError),
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Which renderer strategy to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendererKind {
    #[default]
    Browser,
    Remote,
}

impl RendererKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Remote => "remote",
        }
    }
}

impl FromStr for RendererKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" | "local" | "mmdc" => Ok(Self::Browser),
            "remote" | "http" | "api" => Ok(Self::Remote),
            _ => Err(format!("unknown renderer '{s}' (expected browser or remote)")),
        }
    }
}

/// Build the renderer for `kind`, falling back to the default command / URL.
///
/// # Errors
///
/// Returns [`RenderError::Unavailable`] if the HTTP client cannot be built.
pub fn renderer_for(
    kind: RendererKind,
    mmdc: Option<&Path>,
    render_url: Option<&str>,
) -> Result<Arc<dyn Renderer>, RenderError> {
    let renderer: Arc<dyn Renderer> = match kind {
        RendererKind::Browser => Arc::new(BrowserRenderer::new(
            mmdc.unwrap_or_else(|| Path::new(DEFAULT_MMDC)),
        )),
        RendererKind::Remote => Arc::new(HttpRenderer::new(
            render_url.unwrap_or(DEFAULT_RENDER_URL),
        )?),
    };
    tracing::debug!(renderer = renderer.name(), "selected renderer");
    Ok(renderer)
}

/// One entry in a generator's history.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub started_at: SystemTime,
    pub renderer: &'static str,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub theme: Theme,
    pub attempts: u32,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl GenerationRecord {
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Generator {
    renderer: Arc<dyn Renderer>,
    timeout: Duration,
    history: Mutex<VecDeque<GenerationRecord>>,
    history_limit: usize,
}

impl Generator {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            timeout: DEFAULT_TIMEOUT,
            history: Mutex::new(VecDeque::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Keep at most `limit` history records, at least one.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Render `source` and, when `output` is given, persist the bytes there.
    ///
    /// The source is not re-validated. A timed-out attempt is retried once;
    /// any other renderer failure is returned immediately.
    ///
    /// # Errors
    ///
    /// [`GenerateError::Timeout`] after [`MAX_ATTEMPTS`] timeouts,
    /// [`GenerateError::Render`] for other renderer failures and
    /// [`GenerateError::Io`] if the output file cannot be written. On error
    /// nothing is left at `output`.
    pub async fn generate(
        &self,
        source: &str,
        config: &GenerationConfig,
        output: Option<&Path>,
    ) -> Result<Vec<u8>, GenerateError> {
        let started_at = SystemTime::now();
        let clock = Instant::now();

        let (result, attempts) = self.render_with_retry(source, config).await;
        let result = match (result, output) {
            (Ok(bytes), Some(path)) => persist(path, bytes).await,
            (result, _) => result,
        };

        self.record(GenerationRecord {
            started_at,
            renderer: self.renderer.name(),
            output: output.map(Path::to_path_buf),
            format: config.format(),
            theme: config.theme(),
            attempts,
            elapsed: clock.elapsed(),
            error: result.as_ref().err().map(ToString::to_string),
        });
        result
    }

    /// Read a `.mmd` file and render it next to itself (or to `output`).
    ///
    /// # Errors
    ///
    /// See [`Self::generate`]; reading the input maps to
    /// [`GenerateError::Io`].
    pub async fn generate_from_file(
        &self,
        input: &Path,
        config: &GenerationConfig,
        output: Option<&Path>,
    ) -> Result<PathBuf, GenerateError> {
        let source =
            tokio::fs::read_to_string(input)
                .await
                .map_err(|source| GenerateError::Io {
                    path: input.to_path_buf(),
                    source,
                })?;
        let output = output.map_or_else(
            || default_output_path(input, config.format()),
            Path::to_path_buf,
        );
        self.generate(&source, config, Some(&output)).await?;
        Ok(output)
    }

    async fn render_with_retry(
        &self,
        source: &str,
        config: &GenerationConfig,
    ) -> (Result<Vec<u8>, GenerateError>, u32) {
        for attempt in 1..=MAX_ATTEMPTS {
            tracing::debug!(
                renderer = self.renderer.name(),
                attempt,
                format = %config.format(),
                theme = %config.theme(),
                "render attempt"
            );
            match tokio::time::timeout(self.timeout, self.renderer.render(source, config)).await {
                Ok(Ok(bytes)) => return (Ok(bytes), attempt),
                Ok(Err(RenderError::Timeout)) | Err(_) => {
                    tracing::warn!(
                        renderer = self.renderer.name(),
                        attempt,
                        timeout_secs = self.timeout.as_secs_f64(),
                        "render attempt timed out"
                    );
                }
                Ok(Err(err)) => return (Err(GenerateError::Render(err)), attempt),
            }
        }
        (
            Err(GenerateError::Timeout {
                attempts: MAX_ATTEMPTS,
                timeout: self.timeout,
            }),
            MAX_ATTEMPTS,
        )
    }

    fn record(&self, record: GenerationRecord) {
        let mut history = match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// The most recent generations, oldest first.
    pub fn history(&self) -> Vec<GenerationRecord> {
        match self.history.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn clear_history(&self) {
        match self.history.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

async fn persist(path: &Path, bytes: Vec<u8>) -> Result<Vec<u8>, GenerateError> {
    let target = path.to_path_buf();
    let written = tokio::task::spawn_blocking(move || {
        write_atomically(&target, &bytes).map(|()| bytes)
    })
    .await
    .unwrap_or_else(|err| Err(io::Error::other(err)));

    match written {
        Ok(bytes) => {
            tracing::info!(path = %path.display(), bytes = bytes.len(), "wrote diagram");
            Ok(bytes)
        }
        Err(source) => Err(GenerateError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// `diagram.mmd` → `diagram.png` (or the format's extension).
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    input.with_extension(format.extension())
}

/// Write through a temp file in the destination directory, then rename.
fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
