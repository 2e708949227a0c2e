use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use policy_rag::{router, PipelineArgs, ProviderArgs, Service};

#[derive(Parser, Debug)]
#[command(
    name = "policy-api",
    about = "HTTP API answering batches of questions about a policy document"
)]
struct ApiCli {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "POLICY_BIND", default_value = "127.0.0.1:8000")]
    bind: String,

    /// Bearer token clients must present on the query endpoint
    #[arg(long, env = "API_BEARER_TOKEN", hide_env_values = true)]
    api_bearer_token: String,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    provider: ProviderArgs,
}

fn init_logger(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ApiCli::parse();
    init_logger(cli.verbose);
    anyhow::ensure!(
        !cli.api_bearer_token.trim().is_empty(),
        "API_BEARER_TOKEN must not be empty"
    );

    let embedder = cli.provider.build_embedder()?;
    let generator = cli.provider.build_generator()?;
    let service = Service::initialize(
        &cli.pipeline.document,
        cli.pipeline.build_settings(),
        embedder,
        generator,
    )
    .await;
    if let Service::NotReady { reason } = &service {
        info!("serving in not-ready mode: {reason}");
    }

    let app = router(service, cli.api_bearer_token);
    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    info!("policy-api listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .await
        .context("server shutdown")?;
    Ok(())
}
