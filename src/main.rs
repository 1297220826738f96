use std::sync::Arc;

use imessage_relay::config::RelayConfig;
use imessage_relay::relay::Relay;
use imessage_relay::responder::AnthropicResponder;
use imessage_relay::sink::OsaScriptSink;
use imessage_relay::source::{ChatDbSource, MessageSource};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Missing credentials must fail here, never inside the poll loop.
    let config = RelayConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    });

    eprintln!("iMessage relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Monitoring: {}", config.db_path.display());
    eprintln!("   Model: {}", config.model);
    eprintln!("   Poll interval: {:?}", config.poll_interval);
    eprintln!();

    let source = ChatDbSource::open(&config.db_path, config.fetch_limit)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            eprintln!("  (is Full Disk Access granted, and does the path exist?)");
            std::process::exit(1);
        });
    let source: Arc<dyn MessageSource> = Arc::new(source);

    let responder = Arc::new(AnthropicResponder::new(
        config.api_key.clone(),
        config.model.clone(),
        config.max_tokens,
    ));
    let sink = Arc::new(OsaScriptSink::new());

    let relay = Relay::new(
        source,
        responder,
        sink,
        config.system_prompt.clone(),
        config.poll_interval,
        config.lookback,
    );

    relay.run().await;
}
