use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use multidata_classifier::config::{Args, Config, Mode};
use multidata_classifier::server::{self, Endpoint};
use multidata_classifier::{ClassifierSchemas, Gateway, Predictor, StubPredictor, logging};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config.with_args(&args),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run(args, config).await {
        error!(error = format!("{e:#}"), "Fatal error");
        std::process::exit(1);
    }
}

async fn run(args: Args, config: Config) -> Result<()> {
    let mode = args.mode()?;
    info!(mode = mode.name(), "Starting classification server");

    // Everything is loaded before the listener is bound.
    let (predictor, endpoint): (Arc<dyn Predictor>, Endpoint) = match &mode {
        Mode::Models {
            gender,
            relationship,
        } => {
            let schemas = ClassifierSchemas::bundled().context("Failed to load attribute schema")?;
            info!(
                relation = schemas.gender.relation(),
                features = schemas.feature_count(),
                "Attribute schema loaded"
            );
            let gateway = Gateway::load(schemas, gender, relationship)
                .context("Failed to load classifier models")?;
            (Arc::new(gateway), Endpoint::Features)
        }
        Mode::Stub => (Arc::new(StubPredictor), Endpoint::Stub),
    };

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %listener.local_addr()?, endpoint = endpoint.name(), "Listening");

    server::serve(listener, server::router(predictor, endpoint)).await?;
    info!("Server stopped");
    Ok(())
}
