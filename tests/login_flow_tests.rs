//! End-to-end login, protected action and logout through `AuthService`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use orbit::auth::{
    AuthError, AuthService, Clock, CredentialStore, CredentialStoreConfig, DeviceAuthClient,
    DeviceAuthParams, FileCredentialStore, InMemoryCredentialStore, ManualClock,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_device_code(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "D1",
            "user_code": "ABCD-1234",
            "verification_uri": "http://localhost:3005/device",
            "interval": 5,
            "expires_in": 600
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_pending(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/device/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "authorization_pending"
        })))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_granted(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/device/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T1",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> Arc<DeviceAuthClient> {
    Arc::new(DeviceAuthClient::new(
        DeviceAuthParams::builder()
            .base_url(format!("{}/api/auth", server.uri()))
            .client_id("orbit-test")
            .build(),
    ))
}

fn file_store(dir: &TempDir) -> Arc<FileCredentialStore> {
    Arc::new(FileCredentialStore::new(CredentialStoreConfig::in_dir(
        dir.path().join(".orbit"),
    )))
}

#[tokio::test]
async fn device_login_persists_credential_and_guard_tracks_expiry() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    mount_pending(&server, 2).await;
    mount_granted(&server).await;

    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let svc = AuthService::new(client_for(&server), store.clone()).with_clock(clock.clone());

    let session = svc.start_login().await.unwrap();
    assert_eq!(session.user_code, "ABCD-1234");

    let outcome = svc
        .complete_login(&session, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert!(outcome.persisted.is_ok());
    assert_eq!(outcome.credential.access_token, "T1");
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(5); 3],
        "three attempts spaced by the interval"
    );

    let stored = store.read().unwrap().expect("credential on disk");
    assert_eq!(stored, outcome.credential);
    assert!(!stored.is_expired_at(clock.now()));
    assert_eq!(svc.require_valid_credential().unwrap().access_token, "T1");

    clock.advance(Duration::from_secs(3356));
    let err = svc.require_valid_credential().unwrap_err();
    assert!(matches!(err, AuthError::CredentialExpired { expires_at: Some(_) }));
}

#[tokio::test]
async fn protected_action_without_credential_is_unauthenticated() {
    let server = MockServer::start().await;
    let svc = AuthService::new(client_for(&server), Arc::new(InMemoryCredentialStore::new()));

    assert!(matches!(
        svc.require_valid_credential(),
        Err(AuthError::Unauthenticated)
    ));
    assert!(matches!(svc.whoami().await, Err(AuthError::Unauthenticated)));
    assert!(!svc.has_valid_credential());
}

#[tokio::test]
async fn denied_login_leaves_store_untouched() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/device/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "access_denied"
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let svc = AuthService::new(client_for(&server), store.clone())
        .with_clock(Arc::new(ManualClock::new(Utc::now())));

    let session = svc.start_login().await.unwrap();
    let err = svc
        .complete_login(&session, &CancellationToken::new(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::PollingDenied));
    assert!(!store.path().exists());
}

#[tokio::test]
async fn write_failure_still_returns_the_credential() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    mount_granted(&server).await;

    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();
    let store = Arc::new(FileCredentialStore::new(CredentialStoreConfig::in_dir(&blocker)));
    let svc = AuthService::new(client_for(&server), store)
        .with_clock(Arc::new(ManualClock::new(Utc::now())));

    let session = svc.start_login().await.unwrap();
    let outcome = svc
        .complete_login(&session, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome.credential.access_token, "T1");
    assert!(matches!(outcome.persisted, Err(AuthError::Storage(_))));
}

#[tokio::test]
async fn whoami_resolves_user_for_stored_credential() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    mount_granted(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": "u1", "name": "Ada", "email": "ada@example.com" }
        })))
        .mount(&server)
        .await;

    let svc = AuthService::new(client_for(&server), Arc::new(InMemoryCredentialStore::new()))
        .with_clock(Arc::new(ManualClock::new(Utc::now())));
    let session = svc.start_login().await.unwrap();
    svc.complete_login(&session, &CancellationToken::new(), None)
        .await
        .unwrap();

    let identity = svc.whoami().await.unwrap();
    assert_eq!(identity.credential.access_token, "T1");
    assert_eq!(
        identity.user.unwrap().unwrap().email.as_deref(),
        Some("ada@example.com")
    );
}

async fn logged_in_service(server: &MockServer) -> AuthService {
    mount_device_code(server).await;
    mount_granted(server).await;
    let svc = AuthService::new(client_for(server), Arc::new(InMemoryCredentialStore::new()))
        .with_clock(Arc::new(ManualClock::new(Utc::now())));
    let session = svc.start_login().await.unwrap();
    svc.complete_login(&session, &CancellationToken::new(), None)
        .await
        .unwrap();
    svc
}

#[tokio::test]
async fn whoami_rejected_token_is_expired_credential() {
    let server = MockServer::start().await;
    let svc = logged_in_service(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = svc.whoami().await.unwrap_err();
    assert!(matches!(err, AuthError::CredentialExpired { expires_at: Some(_) }));
}

#[tokio::test]
async fn whoami_keeps_credential_when_lookup_fails() {
    let server = MockServer::start().await;
    let svc = logged_in_service(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let identity = svc.whoami().await.unwrap();
    assert_eq!(identity.credential.access_token, "T1");
    assert!(matches!(identity.user, Err(AuthError::InvalidResponse(_))));
}

#[tokio::test]
async fn out_of_range_lifetimes_do_not_abort_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "D1",
            "user_code": "ABCD-1234",
            "verification_uri": "http://localhost:3005/device",
            "interval": 5,
            "expires_in": 10_000_000_000_000u64
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/device/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T1",
            "expires_in": 10_000_000_000_000u64
        })))
        .mount(&server)
        .await;

    let svc = AuthService::new(client_for(&server), Arc::new(InMemoryCredentialStore::new()))
        .with_clock(Arc::new(ManualClock::new(Utc::now())));
    let session = svc.start_login().await.unwrap();
    let outcome = svc
        .complete_login(&session, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome.credential.expires_at, None);
    assert!(matches!(
        svc.require_valid_credential(),
        Err(AuthError::CredentialExpired { expires_at: None })
    ));
}

#[tokio::test]
async fn logout_removes_credential_once() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    mount_granted(&server).await;

    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let svc = AuthService::new(client_for(&server), store.clone())
        .with_clock(Arc::new(ManualClock::new(Utc::now())));
    let session = svc.start_login().await.unwrap();
    svc.complete_login(&session, &CancellationToken::new(), None)
        .await
        .unwrap();
    assert!(store.path().exists());
    assert_eq!(
        svc.current_credential().unwrap().map(|c| c.access_token),
        Some("T1".to_string())
    );

    assert!(svc.logout().unwrap());
    assert_eq!(svc.current_credential().unwrap(), None);
    assert!(!store.path().exists());
    assert!(!svc.logout().unwrap());
    assert!(matches!(
        svc.require_valid_credential(),
        Err(AuthError::Unauthenticated)
    ));
}
