//! Planflow server - reference HTTP adapter exposing the workflow engine.

mod demo;
mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use planflow::config::load_config;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::demo::DemoAgent;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "planflow-server")]
#[command(about = "JSON-RPC + SSE server for interactive plan-mode agents")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "8000")]
    port: u16,

    /// Engine config (TOML); defaults apply when the file is missing
    #[arg(long, default_value = "planflow.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    planflow::logging::init(&["planflow_server=info"])?;

    let args = Args::parse();

    let config = load_config(&args.config)?;
    info!(
        config = %args.config.display(),
        agent_id = %config.agent_id,
        "starting planflow-server"
    );

    let state = AppState::with_agent(config, DemoAgent);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router().layer(cors).with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
