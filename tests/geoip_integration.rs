use std::collections::HashMap;

use axum::extract::{Path, Query};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use visitor_analytics::config::GeoIpConfig;
use visitor_analytics::geoip::{locate, GeoLocator, IpApiLocator};

/// Serve a fake ip-api.com on a random local port and return its base URL.
async fn spawn_geo_service(succeed: bool) -> String {
    let app = Router::new().route(
        "/json/:ip",
        get(
            move |Path(ip): Path<String>, Query(params): Query<HashMap<String, String>>| async move {
                let fields = params.get("fields").cloned().unwrap_or_default();
                let body: Value = if succeed && fields.contains("timezone") {
                    json!({
                        "status": "success",
                        "country": "Japan",
                        "countryCode": "JP",
                        "region": "13",
                        "city": ip,
                        "lat": 35.6895,
                        "lon": 139.6917,
                        "timezone": "Asia/Tokyo"
                    })
                } else {
                    json!({ "status": "fail", "message": "reserved range" })
                };
                Json(body)
            },
        ),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    format!("http://{addr}/json/")
}

fn locator(endpoint: String) -> IpApiLocator {
    IpApiLocator::new(&GeoIpConfig { endpoint }).expect("client")
}

#[tokio::test]
async fn successful_lookup_populates_every_field() {
    let locator = locator(spawn_geo_service(true).await);

    let location = locator
        .lookup("203.0.113.7")
        .await
        .expect("lookup")
        .expect("location");

    assert_eq!(location.country, "Japan");
    assert_eq!(location.country_code, "JP");
    assert_eq!(location.region, "13");
    assert_eq!(location.city, "203.0.113.7");
    assert_eq!(location.latitude, 35.6895);
    assert_eq!(location.longitude, 139.6917);
    assert_eq!(location.timezone, "Asia/Tokyo");
}

#[tokio::test]
async fn fail_status_yields_no_location() {
    let locator = locator(spawn_geo_service(false).await);

    let location = locator.lookup("10.0.0.1").await.expect("lookup");
    assert!(location.is_none());
}

#[tokio::test]
async fn unreachable_service_fails_open() {
    // Reserve a port, then close it so the connection is refused
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let locator = locator(format!("http://{addr}/json"));

    assert!(locator.lookup("203.0.113.7").await.is_err());
    assert!(locate(&locator, "203.0.113.7").await.is_none());
}
