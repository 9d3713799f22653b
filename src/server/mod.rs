mod handlers;

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};

use crate::api::DynAPI;
use crate::error::Error;
use crate::server::handlers::trips;

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/trip/preview", post(trips::preview))
        .route("/trip/start", post(trips::start))
        .route("/trips/:id", get(trips::find))
        .route("/users/:user_id/trips", get(trips::find_by_user))
        .layer(Extension(api))
}

/// Serves the trip API on `addr` until `shutdown` resolves.
pub async fn serve<F>(api: DynAPI, addr: SocketAddr, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::try_bind(&addr)
        .map_err(|err| Error::config_error(format!("cannot bind {}: {}", addr, err)))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| Error::unexpected_error(err.to_string()))
}
