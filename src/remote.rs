use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
  Json, Router,
  extract::State,
  routing::{get, post},
};
use log::info;
use tokio::sync::Mutex;
use tower_http::trace::{self, TraceLayer};

use crate::{
  map::map_event::MapEvent,
  session::{MapSession, MapView},
};

pub type SharedSession = Arc<Mutex<MapSession>>;

/// Applies one event and answers with the resulting view. Searches and location requests the
/// event started keep running; their results show up in a later `GET /view`.
pub async fn map_event_handler(
  State(session): State<SharedSession>,
  Json(event): Json<MapEvent>,
) -> Json<MapView> {
  let mut session = session.lock().await;
  session.apply(event).await;
  session.pump();
  Json(session.view())
}

async fn view_handler(State(session): State<SharedSession>) -> Json<MapView> {
  let mut session = session.lock().await;
  session.pump();
  Json(session.view())
}

async fn healthcheck() {}

pub fn router(session: SharedSession) -> Router {
  Router::new()
    .route("/", post(map_event_handler))
    .route("/view", get(view_handler))
    .route("/healthcheck", get(healthcheck))
    .with_state(session)
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(trace::DefaultOnResponse::new().level(tracing::Level::INFO)),
    )
}

async fn shutdown_signal() {
  let ctrl_c = async {
    let _ = tokio::signal::ctrl_c().await;
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(_) => std::future::pending::<()>().await,
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
      () = ctrl_c => {},
      () = terminate => {},
  }
}

/// Serves the session on localhost until interrupted.
///
/// # Errors
/// If the port cannot be bound or the server fails.
pub async fn remote_runner(session: SharedSession, port: u16) -> anyhow::Result<()> {
  let addr = SocketAddr::from(([127, 0, 0, 1], port));
  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .with_context(|| format!("Port {port} is not free."))?;
  info!("Serving the project map on http://{addr}");

  axum::serve(listener, router(session.clone()))
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Remote server failed.")?;

  session.lock().await.shutdown();
  Ok(())
}
