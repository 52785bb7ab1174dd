//! Test utilities shared by the unit and HTTP tests.

use crate::config::Config;
use crate::store::{User, in_memory::InMemoryStore};
use crate::{AppState, Application};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum_test::TestServer;
use std::sync::Arc;

/// A user with the given id and raw groups claim.
pub fn test_user(id: &str, groups: Option<&str>) -> User {
    User {
        id: id.to_string(),
        name: id.to_string(),
        email: format!("{id}@example.com"),
        display_name: Some(format!("Test {id}")),
        given_name: None,
        family_name: None,
        preferred_username: Some(id.to_string()),
        groups: groups.map(str::to_string),
    }
}

/// The default API key header carrying `secret`.
pub fn api_key_header(secret: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_str(secret).expect("test secret is a valid header value"),
    )
}

/// A cookie header carrying the default session cookie.
pub fn session_cookie_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::COOKIE,
        HeaderValue::from_str(&format!("quizctl.session_token={token}")).expect("test token is a valid header value"),
    )
}

pub fn headers<const N: usize>(pairs: [(HeaderName, HeaderValue); N]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(name, value);
    }
    map
}

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    };
    config.auth.store_timeout = std::time::Duration::from_secs(1);
    config
}

/// App state over a fresh in-memory store, returned alongside it for seeding.
pub fn create_test_state() -> (AppState, InMemoryStore) {
    let store = InMemoryStore::default();
    let state = AppState::from_stores(create_test_config(), Arc::new(store.clone()), Arc::new(store.clone()))
        .expect("Failed to create test state");
    (state, store)
}

/// A test server over a fresh in-memory store, returned alongside it for seeding.
pub fn create_test_app() -> (TestServer, InMemoryStore) {
    let store = InMemoryStore::default();
    let app = Application::from_stores(create_test_config(), Arc::new(store.clone()), Arc::new(store.clone()))
        .expect("Failed to create application");
    (app.into_test_server(), store)
}
