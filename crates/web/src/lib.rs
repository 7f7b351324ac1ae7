//! Read-only HTTP/JSON surface over the service store, with a timetable
//! fallback for services the store does not know.

use axum::{routing::get, Router};
use iff::IffSource;
use model::ServiceSelection;
use store::{Keyspace, ServiceStore};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod response;
pub mod routes;

#[derive(Clone)]
pub struct WebState<K: Keyspace> {
    pub store: ServiceStore<K>,
    /// Timetable fallback; absent when no `iff_database` is configured.
    pub iff: Option<IffSource>,
    /// Scheduler selection, applied to fallback results.
    pub filter: ServiceSelection,
}

pub fn routes<K: Keyspace>(state: WebState<K>) -> Router {
    Router::new()
        .route("/service/:servicedate", get(routes::service_numbers::<K>))
        .route(
            "/service/:servicedate/:servicenumber",
            get(routes::service_details::<K>),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .fallback(routes::route_not_found)
}

pub async fn start_web_server<K: Keyspace>(
    state: WebState<K>,
    bind: &str,
    port: u16,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(format!("{bind}:{port}")).await?;
    axum::serve(listener, routes(state).into_make_service()).await
}
