mod broadcast;
mod error;
mod proto;
mod routes;
mod state;
mod store;
mod sweep;

use axum::{Extension, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::{broadcast::Broadcaster, state::Directory, store::VisitorStore};
use error::AppErr;

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let pool  = SqlitePool::connect(&std::env::var("DATABASE_URL")?).await?;
    let store = VisitorStore::new(pool);
    store.ensure_schema().await?;

    let bc = Broadcaster::new(Directory::default(), store);
    tokio::spawn(sweep::task(bc.clone()));

    let app = Router::new()
        .merge(routes::router())
        .layer(Extension(bc))
        .layer(TraceLayer::new_for_http());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!(%addr, "presence server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
