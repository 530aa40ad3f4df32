use axum::extract::{Form, Path, Query, State};
use axum::http::header::{ACCEPT, AUTHORIZATION, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use glossary_catalog::{CatalogClient, ClientCredentials, StaticToken};
use glossary_core::{
    delete_published, synchronize, CatalogConfig, RemoteTerm, RemoteTermService, ServiceError,
    SyncOptions, TermPayload, TermRecord,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Mock glossary endpoint plus an OAuth2 token endpoint.
struct MockCatalog {
    base: String,
    terms: Mutex<Vec<RemoteTerm>>,
    next_id: AtomicUsize,
    accepted_token: Mutex<String>,
    issued_tokens: AtomicUsize,
    redirects_left: AtomicUsize,
    list_failures_left: AtomicUsize,
    create_throttles_left: AtomicUsize,
    /// Creates that are stored but still answered with `502`
    create_failures_after_store_left: AtomicUsize,
    write_redirects_left: AtomicUsize,
    omit_create_location: AtomicBool,
}

impl MockCatalog {
    async fn start() -> Arc<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(Self {
            base: format!("http://{}:{}", addr.ip(), addr.port()),
            terms: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            accepted_token: Mutex::new("good".to_string()),
            issued_tokens: AtomicUsize::new(0),
            redirects_left: AtomicUsize::new(0),
            list_failures_left: AtomicUsize::new(0),
            create_throttles_left: AtomicUsize::new(0),
            create_failures_after_store_left: AtomicUsize::new(0),
            write_redirects_left: AtomicUsize::new(0),
            omit_create_location: AtomicBool::new(false),
        });

        let app = Router::new()
            .route(
                "/catalogs/{catalog}/glossaries/{glossary}/terms",
                get(list_terms).post(create_term),
            )
            .route(
                "/catalogs/{catalog}/glossaries/{glossary}/terms/{id}",
                put(update_term).delete(delete_term),
            )
            .route("/moved/terms", get(list_terms))
            .route(
                "/moved/catalogs/{catalog}/glossaries/{glossary}/terms",
                post(create_term),
            )
            .route(
                "/moved/catalogs/{catalog}/glossaries/{glossary}/terms/{id}",
                put(update_term),
            )
            .route("/token", post(issue_token))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        state
    }

    fn accept_token(&self, token: &str) {
        *self.accepted_token.lock().unwrap() = token.to_string();
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.accepted_token.lock().unwrap());
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false)
    }

    fn term_location(&self, catalog: &str, glossary: &str, id: &str) -> String {
        format!("{}/catalogs/{catalog}/glossaries/{glossary}/terms/{id}", self.base)
    }

    fn seed(&self, name: &str, parent: Option<&str>) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let location = self.term_location("contoso", "contoso", &n.to_string());
        self.terms.lock().unwrap().push(RemoteTerm::new(
            location.clone(),
            name,
            parent.map(str::to_string),
        ));
        location
    }

    fn term_count(&self) -> usize {
        self.terms.lock().unwrap().len()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn precheck(
    state: &MockCatalog,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Option<Response> {
    if !state.authorized(headers) {
        return Some(StatusCode::UNAUTHORIZED.into_response());
    }
    if !params.contains_key("api-version") {
        return Some((StatusCode::BAD_REQUEST, "missing api-version").into_response());
    }
    None
}

fn temporary_redirect(location: String) -> Response {
    (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response()
}

async fn list_terms(
    State(state): State<Arc<MockCatalog>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = precheck(&state, &headers, &params) {
        return rejection;
    }
    if take_one(&state.list_failures_left) {
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }
    if take_one(&state.redirects_left) {
        return (
            StatusCode::FOUND,
            [(LOCATION, "/moved/terms?api-version=2016-03-30".to_string())],
        )
            .into_response();
    }
    let full_metadata = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("adc.metadata=full"))
        .unwrap_or(false);
    if !full_metadata {
        return (StatusCode::BAD_REQUEST, "listing requires full metadata").into_response();
    }

    let terms = state.terms.lock().unwrap().clone();
    Json(json!({ "value": terms })).into_response()
}

async fn create_term(
    State(state): State<Arc<MockCatalog>>,
    Path((catalog, glossary)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if let Some(rejection) = precheck(&state, &headers, &params) {
        return rejection;
    }
    if take_one(&state.write_redirects_left) {
        return temporary_redirect(format!(
            "/moved/catalogs/{catalog}/glossaries/{glossary}/terms?api-version=2016-03-30"
        ));
    }
    if take_one(&state.create_throttles_left) {
        return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
    }

    let n = state.next_id.fetch_add(1, Ordering::SeqCst);
    let location = state.term_location(&catalog, &glossary, &n.to_string());
    state.terms.lock().unwrap().push(RemoteTerm::new(
        location.clone(),
        body["name"].as_str().unwrap_or_default(),
        body["parentId"].as_str().map(str::to_string),
    ));

    if take_one(&state.create_failures_after_store_left) {
        return (StatusCode::BAD_GATEWAY, "upstream timeout").into_response();
    }
    if state.omit_create_location.load(Ordering::SeqCst) {
        return StatusCode::CREATED.into_response();
    }
    (StatusCode::CREATED, [(LOCATION, location)]).into_response()
}

async fn update_term(
    State(state): State<Arc<MockCatalog>>,
    Path((catalog, glossary, id)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if let Some(rejection) = precheck(&state, &headers, &params) {
        return rejection;
    }
    if take_one(&state.write_redirects_left) {
        return temporary_redirect(format!(
            "/moved/catalogs/{catalog}/glossaries/{glossary}/terms/{id}?api-version=2016-03-30"
        ));
    }
    let location = state.term_location(&catalog, &glossary, &id);
    let mut terms = state.terms.lock().unwrap();
    match terms.iter_mut().find(|t| t.id == location) {
        Some(term) => {
            term.name = body["name"].as_str().unwrap_or_default().to_string();
            term.parent_id = body["parentId"].as_str().map(str::to_string);
            StatusCode::OK.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_term(
    State(state): State<Arc<MockCatalog>>,
    Path((catalog, glossary, id)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = precheck(&state, &headers, &params) {
        return rejection;
    }
    let location = state.term_location(&catalog, &glossary, &id);
    let mut terms = state.terms.lock().unwrap();
    let before = terms.len();
    terms.retain(|t| t.id != location);
    if terms.len() < before {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn issue_token(
    State(state): State<Arc<MockCatalog>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if form.get("grant_type").map(String::as_str) != Some("client_credentials")
        || form.get("client_secret").map(String::as_str) != Some("s3cret")
    {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let n = state.issued_tokens.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "access_token": format!("token-{n}"), "expires_in": "3599" })).into_response()
}

fn catalog_config(base: &str) -> CatalogConfig {
    CatalogConfig {
        base_url: base.to_string(),
        catalog_name: "contoso".to_string(),
        timeout_secs: 5,
        max_redirects: 3,
        max_retries: 2,
        ..CatalogConfig::default()
    }
}

fn client_for(mock: &MockCatalog) -> CatalogClient {
    CatalogClient::new(catalog_config(&mock.base), Arc::new(StaticToken::new("good")))
        .unwrap()
        .with_retry_base(Duration::from_millis(10))
}

fn payload(name: &str) -> TermPayload {
    TermPayload {
        name: name.to_string(),
        definition: format!("{name} definition"),
        description: None,
        parent_id: None,
        stakeholders: Vec::new(),
    }
}

fn finance_records() -> Vec<TermRecord> {
    vec![
        TermRecord::new("2", "Budget", Some("1".to_string())).with_definition("Planned spend"),
        TermRecord::new("1", "Finance", None).with_definition("Money matters"),
        TermRecord::new("3", "Capex", Some("2".to_string())).with_definition("Capital spend"),
    ]
}

#[tokio::test]
async fn sync_update_and_cleanup_round_trip() {
    let mock = MockCatalog::start().await;
    let client = Arc::new(client_for(&mock));

    let first = synchronize(finance_records(), client.clone(), SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(first.summary().created, 3);
    assert_eq!(mock.term_count(), 3);

    let finance = first.locations.get("1").unwrap().to_string();
    let budget = first.locations.get("2").unwrap().to_string();
    {
        let terms = mock.terms.lock().unwrap();
        let stored_budget = terms.iter().find(|t| t.id == budget).unwrap();
        assert_eq!(stored_budget.parent_id.as_deref(), Some(finance.as_str()));
    }

    let mut second = synchronize(finance_records(), client.clone(), SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(second.summary().updated, 3);
    assert_eq!(second.summary().created, 0);
    assert_eq!(mock.term_count(), 3);
    assert_eq!(second.locations.get("2"), Some(budget.as_str()));

    let cleanup = delete_published(&mut second.locations, client.as_ref()).await;
    assert_eq!(cleanup.deleted.len(), 3);
    assert!(cleanup.failed.is_empty());
    assert!(second.locations.is_empty());
    assert_eq!(mock.term_count(), 0);
}

#[tokio::test]
async fn list_follows_redirects() {
    let mock = MockCatalog::start().await;
    mock.seed("Finance", None);
    mock.redirects_left.store(1, Ordering::SeqCst);

    let terms = client_for(&mock).list_all().await.unwrap();

    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0].name, "Finance");
    assert_eq!(mock.redirects_left.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn redirect_loop_is_bounded() {
    let mock = MockCatalog::start().await;
    mock.redirects_left.store(10, Ordering::SeqCst);

    let err = client_for(&mock).list_all().await.unwrap_err();

    assert_eq!(err, ServiceError::TooManyRedirects(3));
}

#[tokio::test]
async fn expired_token_is_refreshed_once() {
    let mock = MockCatalog::start().await;
    mock.seed("Finance", None);
    mock.accept_token("token-2");

    let tokens = ClientCredentials::new(
        reqwest::Client::new(),
        format!("{}/token", mock.base),
        "app",
        "s3cret",
        "https://api.azuredatacatalog.com",
    );
    let client = CatalogClient::new(catalog_config(&mock.base), Arc::new(tokens)).unwrap();

    assert_eq!(client.list_all().await.unwrap().len(), 1);
    assert_eq!(mock.issued_tokens.load(Ordering::SeqCst), 2);

    client.list_all().await.unwrap();
    assert_eq!(mock.issued_tokens.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_static_token_is_an_auth_error() {
    let mock = MockCatalog::start().await;
    let client = CatalogClient::new(catalog_config(&mock.base), Arc::new(StaticToken::new("bad")))
        .unwrap();

    assert!(matches!(
        client.list_all().await,
        Err(ServiceError::Auth(_))
    ));
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let mock = MockCatalog::start().await;
    mock.seed("Finance", None);
    let client = client_for(&mock);

    mock.list_failures_left.store(1, Ordering::SeqCst);
    assert_eq!(client.list_all().await.unwrap().len(), 1);

    mock.list_failures_left.store(5, Ordering::SeqCst);
    let err = client.list_all().await.unwrap_err();
    assert!(matches!(err, ServiceError::Http { status: 503, .. }));
}

#[tokio::test]
async fn throttled_create_is_retried() {
    let mock = MockCatalog::start().await;
    mock.create_throttles_left.store(1, Ordering::SeqCst);

    let location = client_for(&mock).create(&payload("Finance")).await.unwrap();

    assert!(location.ends_with("/terms/1"));
    assert_eq!(mock.term_count(), 1);
}

#[tokio::test]
async fn create_is_not_resent_after_server_error() {
    let mock = MockCatalog::start().await;
    mock.create_failures_after_store_left.store(1, Ordering::SeqCst);

    let err = client_for(&mock).create(&payload("Finance")).await.unwrap_err();

    assert!(matches!(err, ServiceError::Http { status: 502, .. }));
    assert_eq!(mock.term_count(), 1);
}

#[tokio::test]
async fn create_and_update_keep_method_and_body_across_redirects() {
    let mock = MockCatalog::start().await;
    let parent = mock.seed("Finance", None);
    let client = client_for(&mock);

    let mut budget = payload("Budget");
    budget.parent_id = Some(parent.clone());
    mock.write_redirects_left.store(1, Ordering::SeqCst);
    let location = client.create(&budget).await.unwrap();

    assert_eq!(mock.write_redirects_left.load(Ordering::SeqCst), 0);
    {
        let terms = mock.terms.lock().unwrap();
        let stored = terms.iter().find(|t| t.id == location).unwrap();
        assert_eq!(stored.name, "Budget");
        assert_eq!(stored.parent_id.as_deref(), Some(parent.as_str()));
    }

    budget.name = "Budgets".to_string();
    mock.write_redirects_left.store(1, Ordering::SeqCst);
    let updated = client.update(&location, &budget).await.unwrap();

    assert_eq!(updated, location);
    assert_eq!(mock.write_redirects_left.load(Ordering::SeqCst), 0);
    let terms = mock.terms.lock().unwrap();
    let stored = terms.iter().find(|t| t.id == location).unwrap();
    assert_eq!(stored.name, "Budgets");
    assert_eq!(stored.parent_id.as_deref(), Some(parent.as_str()));
    assert_eq!(terms.len(), 2);
}

#[tokio::test]
async fn create_without_location_fails() {
    let mock = MockCatalog::start().await;
    mock.omit_create_location.store(true, Ordering::SeqCst);

    let err = client_for(&mock).create(&payload("Finance")).await.unwrap_err();

    assert_eq!(err, ServiceError::MissingLocation);
}

#[tokio::test]
async fn update_falls_back_to_known_location() {
    let mock = MockCatalog::start().await;
    let location = mock.seed("Finance", None);

    let returned = client_for(&mock)
        .update(&location, &payload("Finance & Accounting"))
        .await
        .unwrap();

    assert_eq!(returned, location);
    assert_eq!(mock.terms.lock().unwrap()[0].name, "Finance & Accounting");
}

#[tokio::test]
async fn deleting_unknown_term_is_not_found() {
    let mock = MockCatalog::start().await;
    let location = mock.seed("Finance", None);
    let client = client_for(&mock);

    assert!(client.delete(&location).await.unwrap());
    assert!(matches!(
        client.delete(&location).await,
        Err(ServiceError::NotFound(_))
    ));
}
