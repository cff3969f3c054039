/// fadepix server binary
use fadepix::{config::ServerConfig, context::AppContext, error::PixResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> PixResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fadepix=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let config = ServerConfig::from_env()?;
    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        "fadepix v{}: sixty seconds, then it's gone",
        env!("CARGO_PKG_VERSION")
    );
}
