//! Rendering through a mermaid.ink compatible HTTP service.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

use super::{GenerationConfig, OutputFormat, RenderError, Renderer};

pub const DEFAULT_RENDER_URL: &str = "https://mermaid.ink";

pub struct HttpRenderer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRenderer {
    /// # Errors
    ///
    /// Returns [`RenderError::Unavailable`] if the HTTP client cannot be
    /// initialised.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mermaidview/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| RenderError::Unavailable(err.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the request URL for `source` under `config`.
    pub fn request_url(&self, source: &str, config: &GenerationConfig) -> String {
        let encoded = URL_SAFE.encode(source.as_bytes());
        let (endpoint, image_type) = match config.format() {
            OutputFormat::Png => ("img", Some("png")),
            OutputFormat::Jpeg => ("img", Some("jpeg")),
            OutputFormat::Svg => ("svg", None),
            OutputFormat::Pdf => ("pdf", None),
        };

        let mut query = Vec::new();
        if let Some(image_type) = image_type {
            query.push(format!("type={image_type}"));
        }
        query.push(format!("theme={}", config.theme()));
        if let Some(bg) = background_param(config.background()) {
            query.push(format!("bgColor={bg}"));
        }
        if config.format() == OutputFormat::Pdf {
            query.push("fit".to_string());
        } else {
            query.push(format!("width={}", config.width()));
            query.push(format!("height={}", config.height()));
            query.push(format!("scale={}", config.scale()));
        }

        format!(
            "{}/{endpoint}/{encoded}?{}",
            self.base_url,
            query.join("&")
        )
    }
}

/// The service takes hex colors without `#` and named colors prefixed `!`.
fn background_param(background: &str) -> Option<String> {
    let background = background.trim();
    if background.is_empty() || background.eq_ignore_ascii_case("transparent") {
        return None;
    }
    Some(match background.strip_prefix('#') {
        Some(hex) => hex.to_string(),
        None => format!("!{background}"),
    })
}

fn request_error(err: &reqwest::Error) -> RenderError {
    if err.is_timeout() {
        RenderError::Timeout
    } else {
        RenderError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn render(
        &self,
        source: &str,
        config: &GenerationConfig,
    ) -> Result<Vec<u8>, RenderError> {
        let url = self.request_url(source, config);
        tracing::debug!(base_url = %self.base_url, format = %config.format(), "requesting remote render");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| request_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("{status}: {}", body.trim());
            return Err(if status.is_client_error() {
                RenderError::Rejected(detail)
            } else {
                RenderError::Unavailable(detail)
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| request_error(&err))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> HttpRenderer {
        HttpRenderer::with_client(reqwest::Client::new(), "https://render.example/")
    }

    #[test]
    fn test_png_url_carries_size_and_theme() {
        let config = GenerationConfig::new("dark", "PNG", 640, 480, 2.0).unwrap();
        let url = renderer().request_url("flowchart TD\n    A --> B", &config);
        let encoded = URL_SAFE.encode("flowchart TD\n    A --> B");
        assert_eq!(
            url,
            format!(
                "https://render.example/img/{encoded}?type=png&theme=dark&bgColor=!white&width=640&height=480&scale=2"
            )
        );
    }

    #[test]
    fn test_svg_and_pdf_endpoints() {
        let svg = GenerationConfig::default().with_format("svg").unwrap();
        assert!(renderer().request_url("pie", &svg).starts_with("https://render.example/svg/"));

        let pdf = GenerationConfig::default()
            .with_format("pdf")
            .unwrap()
            .with_background("transparent");
        let url = renderer().request_url("pie", &pdf);
        assert!(url.starts_with("https://render.example/pdf/"));
        assert!(url.ends_with("?theme=default&fit"));
    }

    #[test]
    fn test_background_param_forms() {
        assert_eq!(background_param("#1e1e1e").as_deref(), Some("1e1e1e"));
        assert_eq!(background_param("white").as_deref(), Some("!white"));
        assert_eq!(background_param("transparent"), None);
    }
}
