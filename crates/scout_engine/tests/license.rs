use std::sync::{Arc, Once};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use scout_core::LicenseType;
use scout_engine::{
    ApiSettings, EntitlementGate, HttpSessionProbe, LicenseClient, LicenseError, LocalStore,
    PremiumActivation, SessionProbe, StoreGate,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scout_logging::initialize_for_tests);
}

fn settings(server: &MockServer) -> ApiSettings {
    ApiSettings {
        api_base: server.uri(),
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
    }
}

fn valid_body() -> serde_json::Value {
    json!({
        "valid": true,
        "error": null,
        "license_key": {"status": "active", "status_formatted": "Active"},
        "meta": {"store_id": 162254, "product_id": 622076}
    })
}

#[tokio::test]
async fn activation_validates_the_new_instance() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lemonsqueezy/licenses/activate"))
        .and(query_param("license_key", "KEY-1"))
        .and(query_param("instance_name", "device-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activated": true,
            "instance": {"id": "inst-9"},
            "meta": {"store_id": 162254, "product_id": 622076}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lemonsqueezy/licenses/validate"))
        .and(query_param("instance_id", "inst-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(valid_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = LicenseClient::new(&settings(&server)).unwrap();
    let activation = client.activate("KEY-1", "device-abc").await.unwrap();
    assert_eq!(
        activation,
        PremiumActivation {
            license_key: "KEY-1".into(),
            instance_id: "inst-9".into(),
            license_type: LicenseType::Yearly,
        }
    );
}

#[tokio::test]
async fn refused_activation_carries_the_api_message() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lemonsqueezy/licenses/activate"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "activated": false,
            "error": "This license key has reached the activation limit."
        })))
        .mount(&server)
        .await;

    let client = LicenseClient::new(&settings(&server)).unwrap();
    let err = client.activate("KEY-1", "device").await.unwrap_err();
    assert!(
        matches!(err, LicenseError::Rejected(ref msg) if msg.contains("activation limit")),
        "{err:?}"
    );
}

#[tokio::test]
async fn trial_conflict_means_already_used() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/free-trial"))
        .and(query_param("email", "fp123@producthunt.scaper.com"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let client = LicenseClient::new(&settings(&server)).unwrap();
    let err = client.start_trial("fp123").await.unwrap_err();
    assert!(matches!(err, LicenseError::TrialAlreadyUsed));
}

#[tokio::test]
async fn trial_contact_ids_may_be_numbers() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/free-trial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 4711})))
        .mount(&server)
        .await;

    let client = LicenseClient::new(&settings(&server)).unwrap();
    assert_eq!(client.start_trial("fp").await.unwrap(), "4711");
}

#[tokio::test]
async fn store_gate_trusts_stored_license_when_offline() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalStore::open(dir.path()));
    store
        .set_premium(Some(PremiumActivation {
            license_key: "KEY".into(),
            instance_id: "inst".into(),
            license_type: LicenseType::Monthly,
        }))
        .unwrap();

    // Nothing listens on this port.
    let client = LicenseClient::new(&ApiSettings {
        api_base: "http://127.0.0.1:9".into(),
        connect_timeout: Duration::from_millis(200),
        request_timeout: Duration::from_millis(200),
    })
    .unwrap();
    let gate = StoreGate::new(store, Some(client));
    assert!(gate.is_entitled().await);
}

#[tokio::test]
async fn store_gate_rejects_a_license_the_api_reports_expired() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lemonsqueezy/licenses/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "license_key": {"status": "expired", "status_formatted": "Expired"},
            "meta": {"store_id": 162254, "product_id": 622075}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalStore::open(dir.path()));
    store
        .set_premium(Some(PremiumActivation {
            license_key: "KEY".into(),
            instance_id: "inst".into(),
            license_type: LicenseType::Monthly,
        }))
        .unwrap();
    let gate = StoreGate::new(store, Some(LicenseClient::new(&settings(&server)).unwrap()));

    assert!(!gate.is_entitled().await);
    // Validated once per gate.
    assert!(!gate.is_entitled().await);
}

#[tokio::test]
async fn trial_start_is_recorded_and_entitles_until_it_ends() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/free-trial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "contact-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalStore::open(dir.path()));
    let gate = StoreGate::new(store.clone(), Some(LicenseClient::new(&settings(&server)).unwrap()));
    let start = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

    let record = gate.start_trial(3, start).await.unwrap();
    assert_eq!(record.contact_id, "contact-1");
    assert!(store.snapshot().device_fingerprint.is_some());

    let during = gate.entitlement_at(start + chrono::Duration::days(1)).await;
    assert!(during.is_entitled());
    assert_eq!(
        during.trial_notice().as_deref(),
        Some("Trial mode: 2 days remaining.")
    );

    let after = gate.entitlement_at(start + chrono::Duration::days(3)).await;
    assert!(!after.is_entitled());

    // A second start is refused locally.
    assert!(matches!(
        gate.start_trial(3, start).await,
        Err(LicenseError::TrialAlreadyUsed)
    ));
}

#[tokio::test]
async fn session_probe_reads_user_or_null() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": "u1", "name": "Ada", "email": "ada@example.com", "emailVerified": true}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("null", "application/json"))
        .mount(&server)
        .await;

    let probe = HttpSessionProbe::new(&server.uri(), &settings(&server)).unwrap();
    let user = probe.current_user().await.unwrap().unwrap();
    assert_eq!(user.id, "u1");
    assert!(user.email_verified);
    assert_eq!(probe.current_user().await.unwrap(), None);
}
