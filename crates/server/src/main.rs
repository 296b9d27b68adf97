#[macro_use]
extern crate tracing;

use std::env;
use std::error::Error;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tutor_anthropic_model::{AnthropicConfigBuilder, AnthropicProvider};
use tutor_server::{AppState, ServerConfig, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("tutor_server=info,tower_http=info")
            }),
        )
        .init();

    let Ok(api_key) = env::var("ANTHROPIC_API_KEY") else {
        eprintln!("ANTHROPIC_API_KEY environment variable is not set");
        return Ok(());
    };
    let mut builder = AnthropicConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("ANTHROPIC_BASE_URL") {
        builder = builder.with_base_url(base_url);
    }
    if let Ok(model) = env::var("TUTOR_MODEL") {
        builder = builder.with_model(model);
    }

    let config = ServerConfig::from_env()?;
    let anthropic_config = builder.with_max_tokens(config.max_tokens()).build();
    info!("using model {}", anthropic_config.model());

    let state = AppState::new(AnthropicProvider::new(anthropic_config), &config);
    let listener = TcpListener::bind(config.addr()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;

    Ok(())
}
