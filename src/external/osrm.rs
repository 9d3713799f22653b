use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    entities::{Coordinates, Route},
    error::Error,
    external::RoutingGateway,
};

pub const DEFAULT_BASE_URL: &str = "http://router.project-osrm.org";

#[derive(Clone, Debug)]
pub struct OsrmClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Clone, Debug, Deserialize)]
struct Response {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Clone, Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

/// GeoJSON line; positions are `[lon, lat]`.
#[derive(Clone, Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<Vec<f64>>,
}

impl OsrmClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, pickup: &Coordinates, destination: &Coordinates) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url,
            pickup.longitude,
            pickup.latitude,
            destination.longitude,
            destination.latitude
        )
    }
}

#[async_trait]
impl RoutingGateway for OsrmClient {
    #[tracing::instrument(skip(self))]
    async fn get_route(
        &self,
        pickup: &Coordinates,
        destination: &Coordinates,
    ) -> Result<Route, Error> {
        let res = self
            .client
            .get(self.endpoint(pickup, destination))
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await?;

        let status = res.status();
        let body = res.bytes().await?;

        if !status.is_success() {
            // OSRM answers unroutable requests with a 4xx and a `NoRoute` code
            if let Ok(data) = serde_json::from_slice::<Response>(&body) {
                if data.code == "NoRoute" {
                    return Err(Error::no_route_found_error());
                }
            }

            tracing::warn!("routing provider answered {}", status);
            return Err(Error::routing_unavailable_error(format!(
                "routing provider answered {}",
                status
            )));
        }

        let data: Response = serde_json::from_slice(&body).map_err(|err| {
            Error::routing_unavailable_error(format!("malformed routing response: {}", err))
        })?;

        into_route(data)
    }
}

fn into_route(data: Response) -> Result<Route, Error> {
    if data.code != "Ok" {
        tracing::info!("routing provider found no route: {}", data.code);
        return Err(Error::no_route_found_error());
    }

    let route = data
        .routes
        .into_iter()
        .next()
        .ok_or_else(Error::no_route_found_error)?;

    let coordinates = route
        .geometry
        .coordinates
        .iter()
        .filter(|position| position.len() >= 2)
        .map(|position| Coordinates::new(position[1], position[0]))
        .collect();

    Ok(Route::new(route.distance, route.duration, coordinates))
}

#[test]
fn swaps_provider_positions_into_latitude_longitude() {
    let data: Response = serde_json::from_value(serde_json::json!({
        "code": "Ok",
        "routes": [{
            "distance": 5000.0,
            "duration": 600.0,
            "geometry": {
                "type": "LineString",
                "coordinates": [[-122.4194, 37.7749], [-122.4094, 37.7849], [1.0]]
            }
        }]
    }))
    .unwrap();

    let route = into_route(data).unwrap();

    assert_eq!(route.distance, 5000.0);
    assert_eq!(route.duration, 600.0);
    assert_eq!(
        route.geometry[0].coordinates,
        vec![
            Coordinates::new(37.7749, -122.4194),
            Coordinates::new(37.7849, -122.4094)
        ]
    );
}

#[test]
fn no_route_when_code_is_not_ok_or_routes_are_empty() {
    let no_route: Response =
        serde_json::from_value(serde_json::json!({ "code": "NoRoute", "routes": [] })).unwrap();
    assert!(into_route(no_route).unwrap_err().is_no_route_found_error());

    let empty: Response = serde_json::from_value(serde_json::json!({ "code": "Ok" })).unwrap();
    assert!(into_route(empty).unwrap_err().is_no_route_found_error());
}

#[test]
fn endpoint_puts_longitude_first() {
    let client = OsrmClient::new("http://osrm.local/");

    let url = client.endpoint(
        &Coordinates::new(37.7749, -122.4194),
        &Coordinates::new(37.7849, -122.4094),
    );

    assert_eq!(
        url,
        "http://osrm.local/route/v1/driving/-122.4194,37.7749;-122.4094,37.7849"
    );
}

/// Serves `body` with `status` for every route request and returns the base
/// url to point an `OsrmClient` at.
#[cfg(test)]
async fn stub_provider(status: axum::http::StatusCode, body: serde_json::Value) -> String {
    use axum::{routing::get, Json, Router};

    let app = Router::new().route(
        "/route/v1/driving/*coordinates",
        get(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    );

    let server = axum::Server::bind(&std::net::SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);

    format!("http://{}", addr)
}

#[cfg(test)]
fn san_francisco() -> (Coordinates, Coordinates) {
    (
        Coordinates::new(37.7749, -122.4194),
        Coordinates::new(37.7849, -122.4094),
    )
}

#[tokio::test]
async fn fetches_a_route_over_http() {
    let url = stub_provider(
        axum::http::StatusCode::OK,
        serde_json::json!({
            "code": "Ok",
            "routes": [{
                "distance": 5000.0,
                "duration": 600.0,
                "geometry": { "coordinates": [[-122.4194, 37.7749], [-122.4094, 37.7849]] }
            }]
        }),
    )
    .await;
    let (pickup, destination) = san_francisco();

    let route = OsrmClient::new(url)
        .get_route(&pickup, &destination)
        .await
        .unwrap();

    assert_eq!(route.distance, 5000.0);
    assert_eq!(route.geometry[0].coordinates, vec![pickup, destination]);
}

#[tokio::test]
async fn provider_errors_make_routing_unavailable() {
    let url = stub_provider(
        axum::http::StatusCode::BAD_GATEWAY,
        serde_json::json!({ "message": "upstream down" }),
    )
    .await;
    let (pickup, destination) = san_francisco();

    let err = OsrmClient::new(url)
        .get_route(&pickup, &destination)
        .await
        .unwrap_err();

    assert!(err.is_routing_unavailable_error());
}

#[tokio::test]
async fn unroutable_requests_find_no_route() {
    let url = stub_provider(
        axum::http::StatusCode::BAD_REQUEST,
        serde_json::json!({ "code": "NoRoute", "message": "Impossible route between points" }),
    )
    .await;
    let (pickup, destination) = san_francisco();

    let err = OsrmClient::new(url)
        .get_route(&pickup, &destination)
        .await
        .unwrap_err();

    assert!(err.is_no_route_found_error());
}

#[tokio::test]
async fn refused_connections_make_routing_unavailable() {
    // grab a free port, then close it again
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let (pickup, destination) = san_francisco();

    let err = OsrmClient::new(format!("http://{}", addr))
        .get_route(&pickup, &destination)
        .await
        .unwrap_err();

    assert!(err.is_routing_unavailable_error());
}
