use devconnector_api::server::{AuthSettings, ServerState, app};
use devconnector_common::{
    model::IdGenerator,
    snowflake::{NodeId, NodeIdOutOfRangeError},
    util::PositiveDuration,
};
use devconnector_db::{memory::MemoryStore, postgres::PgStore, store::DbError};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid node id: {0}")]
    InvalidNodeId(#[from] NodeIdOutOfRangeError),
    #[error("Token lifetime must be positive, got {0} seconds")]
    InvalidTokenLifetime(i64),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn default_token_lifetime_seconds() -> i64 {
    DEFAULT_TOKEN_LIFETIME_SECONDS
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: Option<String>,
    #[serde(default)]
    node_id: u16,
    #[serde(default = "default_token_lifetime_seconds")]
    token_lifetime_seconds: i64,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "devconnector_api=debug,\
                devconnector_content=debug,\
                devconnector_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn build_state(env: &Env) -> Result<ServerState, InitError> {
    let ids = Arc::new(IdGenerator::new(NodeId::try_from(env.node_id)?));
    let auth = AuthSettings {
        token_lifetime: Some(
            PositiveDuration::from_seconds(env.token_lifetime_seconds)
                .ok_or(InitError::InvalidTokenLifetime(env.token_lifetime_seconds))?,
        ),
    };

    let state = if let Some(database_url) = &env.database_url {
        let store = PgStore::connect(database_url).await?;
        store.migrate().await?;
        info!("Connected to database");
        ServerState::new(Arc::new(store), ids, auth)
    } else {
        warn!("No DATABASE_URL configured, keeping all data in memory");
        ServerState::new(Arc::new(MemoryStore::new()), ids, auth)
    };

    Ok(state)
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(err) => error!(%err, "Could not listen for ctrl-c, shutting down"),
        }
        trigger.cancel();
    });

    shutdown
}

async fn run() -> Result<(), InitError> {
    let env = get_env()?;
    let state = build_state(&env).await?;

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = shutdown_on_ctrl_c();
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();

    run().await.inspect_err(|err| error!(%err, "Server failed"))
}
