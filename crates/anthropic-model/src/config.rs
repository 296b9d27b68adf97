use std::fmt::{self, Debug, Formatter};

const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2_000;

/// Builder for [`AnthropicConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AnthropicConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    max_tokens: Option<u32>,
}

impl AnthropicConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            api_version: None,
            max_tokens: None,
        }
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the `anthropic-version` header value.
    #[inline]
    pub fn with_api_version<S: Into<String>>(mut self, version: S) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Sets the token budget used when a request doesn't carry its own.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> AnthropicConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        AnthropicConfig {
            api_key: self.api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }
}

impl Debug for AnthropicConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Configuration for the Anthropic provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AnthropicConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) api_version: String,
    pub(crate) max_tokens: u32,
}

impl AnthropicConfig {
    /// Returns the model name requests are sent to.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Debug for AnthropicConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
