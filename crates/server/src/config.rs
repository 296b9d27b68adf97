use std::env;
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

/// The instructions prepended to every conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

const DEFAULT_PORT: u16 = 8787;
const DEFAULT_MAX_TOKENS: u32 = 2_000;

/// Configuration of the tutor endpoint.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    addr: SocketAddr,
    max_tokens: u32,
    system_prompt: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.trim().to_owned(),
        }
    }
}

impl ServerConfig {
    /// Reads `TUTOR_ADDR` and `TUTOR_MAX_TOKENS`, falling back to the
    /// defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(addr) = env::var("TUTOR_ADDR") {
            config.addr = addr
                .parse()
                .map_err(|_| ConfigError::new("TUTOR_ADDR", addr))?;
        }
        if let Ok(max_tokens) = env::var("TUTOR_MAX_TOKENS") {
            config.max_tokens = match max_tokens.parse() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::new(
                        "TUTOR_MAX_TOKENS",
                        max_tokens,
                    ));
                }
                Ok(value) => value,
            };
        }
        Ok(config)
    }

    /// Sets the address to listen on.
    #[inline]
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Sets the token budget of each reply.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Replaces the system prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// The address to listen on.
    #[inline]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The token budget of each reply.
    #[inline]
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// The instructions prepended to every conversation.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

/// An environment variable holds a value that can't be used.
#[derive(Debug)]
pub struct ConfigError {
    var: &'static str,
    value: String,
}

impl ConfigError {
    fn new(var: &'static str, value: String) -> Self {
        Self { var, value }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.var, self.value)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr().to_string(), "0.0.0.0:8787");
        assert_eq!(config.max_tokens(), 2_000);
        assert!(config.system_prompt().contains("__COMPLETE__"));
        assert!(!config.system_prompt().starts_with('\n'));
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::default()
            .with_addr("127.0.0.1:0".parse().unwrap())
            .with_max_tokens(64)
            .with_system_prompt("Be brief.");
        assert_eq!(config.addr().port(), 0);
        assert_eq!(config.max_tokens(), 64);
        assert_eq!(config.system_prompt(), "Be brief.");
    }
}
