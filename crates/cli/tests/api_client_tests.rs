#[path = "../src/api_client.rs"]
#[allow(dead_code)] // Some methods are used by the binary but not by tests
mod api_client;

use api_client::{ApiClient, RegisterRequest};
use httpmock::Method::{DELETE, GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn record_json(cert_id: &str) -> serde_json::Value {
    json!({
        "certId": cert_id,
        "name": "Anil Kumar",
        "email": "anil@example.com",
        "age": 45,
        "gender": "Male",
        "state": "Delhi",
        "district": "New Delhi",
        "latitude": null,
        "longitude": null,
        "vaccineType": "Covishield",
        "dose": "2",
        "dateAdministered": "2025-01-15",
        "administeringOfficer": null,
        "createdAt": "2025-01-15T09:30:00Z"
    })
}

#[tokio::test]
async fn api_client_success_paths() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let token = "secret-token";
    let cert_id = "VAX-20250115-004211";

    let register_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/vaccinations")
            .header("authorization", format!("Bearer {token}"))
            .json_body_partial(
                r#"{"name": "Anil Kumar", "vaccineType": "Covishield", "dateAdministered": "2025-01-15"}"#,
            );
        then.status(201).json_body(json!({
            "success": true,
            "certId": cert_id,
            "record": record_json(cert_id)
        }));
    });

    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/v1/vaccinations/{cert_id}"))
            .header("authorization", format!("Bearer {token}"));
        then.status(200)
            .json_body(json!({ "success": true, "record": record_json(cert_id) }));
    });

    server.mock(|when, then| {
        when.method(GET)
            .path("/v1/vaccinations")
            .header("authorization", format!("Bearer {token}"));
        then.status(200)
            .json_body(json!({ "success": true, "records": [record_json(cert_id)] }));
    });

    let delete_mock = server.mock(|when, then| {
        when.method(DELETE)
            .path(format!("/v1/vaccinations/{cert_id}"))
            .header("authorization", format!("Bearer {token}"));
        then.status(200).json_body(json!({
            "success": true,
            "message": "Record deleted successfully"
        }));
    });

    let bulk_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/vaccinations/bulk")
            .header("authorization", format!("Bearer {token}"))
            .body_contains("VAX-20240610-000001");
        then.status(200).json_body(json!({
            "success": true,
            "message": "Inserted 1 records, 0 errors",
            "inserted": 1,
            "errors": 0
        }));
    });

    server.mock(|when, then| {
        when.method(GET)
            .path("/v1/dashboard")
            .header("authorization", format!("Bearer {token}"));
        then.status(200).json_body(json!({
            "success": true,
            "stats": {
                "totalVaccinations": 1,
                "vaccineTypes": {"Covishield": 1},
                "doseDistribution": {"1": 0, "2": 1, "3": 0, "Booster": 0},
                "monthlyData": {"2025-01": 1},
                "stateHeatmapData": [{"state": "Delhi", "count": 1}],
                "districtHeatmapData": [{"state": "Delhi", "district": "New Delhi", "count": 1}]
            }
        }));
    });

    server.mock(|when, then| {
        when.method(GET).path("/v1/health");
        then.status(200).json_body(json!({
            "status": "ok",
            "timestamp": "2025-01-15T09:30:00Z",
            "server": "vaxtrack",
            "version": "0.1.0"
        }));
    });

    let client = ApiClient::new(&server.base_url(), token).unwrap();

    let registered = client
        .register(&RegisterRequest {
            name: "Anil Kumar".to_string(),
            email: "anil@example.com".to_string(),
            state: "Delhi".to_string(),
            district: "New Delhi".to_string(),
            vaccine_type: "Covishield".to_string(),
            dose: "2".to_string(),
            date_administered: "2025-01-15".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(registered.cert_id, cert_id);
    assert_eq!(registered.record.cert_id.as_str(), cert_id);
    register_mock.assert();

    let record = client.get_record(cert_id).await.unwrap();
    assert_eq!(record.name, "Anil Kumar");
    assert_eq!(record.age, Some(45));

    let records = client.list_records().await.unwrap();
    assert_eq!(records.len(), 1);

    let deleted = client.delete_record(cert_id).await.unwrap();
    assert_eq!(deleted.message, "Record deleted successfully");
    delete_mock.assert();

    let imported = client
        .bulk_import(vec![json!({"certId": "VAX-20240610-000001", "name": "Imported"})])
        .await
        .unwrap();
    assert_eq!(imported.inserted, 1);
    assert_eq!(imported.errors, 0);
    bulk_mock.assert();

    let stats = client.dashboard().await.unwrap();
    assert_eq!(stats.total_vaccinations, 1);
    assert_eq!(stats.vaccine_types["Covishield"], 1);
    assert_eq!(stats.district_heatmap_data[0].district, "New Delhi");

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, "0.1.0");
}

#[tokio::test]
async fn api_client_surfaces_error_bodies() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/vaccinations/VAX-19990101-000000");
        then.status(404).json_body(json!({
            "error": "record VAX-19990101-000000 not found",
            "code": "not_found"
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/health");
        then.status(500).body("store unavailable");
    });

    let client = ApiClient::new(&server.base_url(), "token").unwrap();

    let err = client.get_record("VAX-19990101-000000").await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("404"));
    assert!(message.contains("not_found"));

    let err = client.health().await.unwrap_err();
    assert!(err.to_string().contains("store unavailable"));
}

#[test]
fn api_client_rejects_invalid_url() {
    assert!(ApiClient::new("not a url", "token").is_err());
}
