//! Drives the HTTP handlers directly against the in-memory store.

use std::sync::Arc;

use api_lib::config::Config;
use api_lib::web::auth::{self, ChangePasswordRequest, LoginRequest, SignupRequest};
use api_lib::web::connections::{self, ConnectionRequestPayload};
use api_lib::web::messages::{self, ComposeRequest};
use api_lib::web::profile::{self, EducationPayload, SearchQuery, UpdateProfileRequest};
use api_lib::web::{AppState, CurrentUser};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::NaiveDate;
use prof_network_core::{ConnectionStatus, MemoryStore, Store, StoreTransaction};
use serde_json::Value;

fn config(allow_isolated_requests: bool) -> Arc<Config> {
    Arc::new(Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "memory:".to_string(),
        db_max_connections: 1,
        log_level: tracing::Level::DEBUG,
        session_ttl_days: 1,
        cors_origin: "http://localhost:3000".to_string(),
        max_connection_degree: 3,
        allow_isolated_requests,
    })
}

fn app(allow_isolated_requests: bool) -> (Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(config(allow_isolated_requests), store.clone()));
    (state, store)
}

fn me(user: &str) -> Extension<CurrentUser> {
    Extension(CurrentUser(user.to_string()))
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_id(response: &Response) -> String {
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    cookie
        .split(';')
        .next()
        .and_then(|c| c.strip_prefix("session="))
        .unwrap()
        .to_string()
}

async fn signup(state: &Arc<AppState>, user: &str) -> Response {
    auth::signup_handler(
        State(state.clone()),
        Json(SignupRequest {
            user_id: user.to_string(),
            email: format!("{user}@example.com"),
            password: format!("{user}-secret"),
        }),
    )
    .await
    .into_response()
}

async fn login(state: &Arc<AppState>, user: &str, password: &str) -> Response {
    auth::login_handler(
        State(state.clone()),
        Json(LoginRequest {
            user_id: user.to_string(),
            password: password.to_string(),
        }),
    )
    .await
    .into_response()
}

async fn connect(store: &MemoryStore, a: &str, b: &str) {
    let mut tx = store.begin().await.unwrap();
    let edge = tx.insert_edge(a, b).await.unwrap();
    tx.set_edge_status(edge.id, ConnectionStatus::Accepted)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

async fn compose(state: &Arc<AppState>, from: &str, to: &str, body: &str, draft: bool) -> Response {
    messages::compose_handler(
        State(state.clone()),
        me(from),
        Json(ComposeRequest {
            receiver_id: to.to_string(),
            body: body.to_string(),
            draft,
        }),
    )
    .await
    .into_response()
}

//=========================================================================================
// Auth
//=========================================================================================

#[tokio::test]
async fn signup_opens_a_session_and_rejects_duplicates() {
    let (state, _) = app(false);

    let response = signup(&state, "ann").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let session = session_id(&response);
    assert_eq!(
        state.sessions.validate_auth_session(&session).await.unwrap(),
        "ann"
    );
    let body = body_json(response).await;
    assert_eq!(body["user_id"], "ann");
    assert_eq!(body["email"], "ann@example.com");

    assert_eq!(signup(&state, "ann").await.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_checks_the_password() {
    let (state, _) = app(false);
    signup(&state, "ann").await;

    assert_eq!(
        login(&state, "ann", "wrong").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&state, "nobody", "ann-secret").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(login(&state, "ann", "ann-secret").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let (state, _) = app(false);
    let session = session_id(&signup(&state, "ann").await);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("session={session}")).unwrap(),
    );
    let response = auth::logout_handler(State(state.clone()), headers)
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.sessions.validate_auth_session(&session).await.is_err());

    let response = auth::logout_handler(State(state.clone()), HeaderMap::new())
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_change_requires_the_old_password() {
    let (state, _) = app(false);
    signup(&state, "ann").await;

    let change = |old: &str, new: &str| {
        auth::change_password_handler(
            State(state.clone()),
            me("ann"),
            Json(ChangePasswordRequest {
                old_password: old.to_string(),
                new_password: new.to_string(),
            }),
        )
    };

    assert_eq!(
        change("guess", "fresh").await.into_response().status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        change("ann-secret", "fresh").await.into_response().status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        login(&state, "ann", "ann-secret").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(login(&state, "ann", "fresh").await.status(), StatusCode::OK);
}

//=========================================================================================
// Profiles
//=========================================================================================

#[tokio::test]
async fn profile_visibility_follows_the_relation() {
    let (state, store) = app(false);
    for user in ["ann", "bob", "cat"] {
        signup(&state, user).await;
    }
    connect(&store, "ann", "bob").await;

    profile::update_profile_handler(
        State(state.clone()),
        me("ann"),
        Json(UpdateProfileRequest {
            name: Some("  Ann Lee ".to_string()),
            date_of_birth: NaiveDate::from_ymd_opt(1991, 2, 3),
        }),
    )
    .await
    .into_response();

    let view = |viewer: &str| {
        profile::get_profile_handler(State(state.clone()), me(viewer), Path("ann".to_string()))
    };

    let own = body_json(view("ann").await.into_response()).await;
    assert_eq!(own["relation"], "own");
    assert_eq!(own["name"], "Ann Lee");
    assert_eq!(own["email"], "ann@example.com");
    assert_eq!(own["date_of_birth"], "1991-02-03");

    let friend = body_json(view("bob").await.into_response()).await;
    assert_eq!(friend["relation"], "connection");
    assert!(friend.get("email").is_none());
    assert_eq!(friend["date_of_birth"], "1991-02-03");

    let stranger = body_json(view("cat").await.into_response()).await;
    assert_eq!(stranger["relation"], "other");
    assert!(stranger.get("email").is_none());
    assert!(stranger.get("date_of_birth").is_none());

    let missing = profile::get_profile_handler(
        State(state.clone()),
        me("ann"),
        Path("nobody".to_string()),
    )
    .await
    .into_response();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn education_records_keep_their_ordinals() {
    let (state, _) = app(false);
    signup(&state, "ann").await;

    let payload = |school: &str| EducationPayload {
        institution_name: school.to_string(),
        major: "CS".to_string(),
        degree: "BS".to_string(),
        start_date: NaiveDate::from_ymd_opt(2010, 9, 1).unwrap(),
        end_date: None,
    };

    for school in ["UCR", "MIT"] {
        let response =
            profile::add_education_handler(State(state.clone()), me("ann"), Json(payload(school)))
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = profile::delete_education_handler(State(state.clone()), me("ann"), Path(1))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let added = profile::add_education_handler(State(state.clone()), me("ann"), Json(payload("CMU")))
        .await
        .into_response();
    assert_eq!(body_json(added).await["ordinal"], 3);

    let updated = profile::update_education_handler(
        State(state.clone()),
        me("ann"),
        Path(2),
        Json(payload("Stanford")),
    )
    .await
    .into_response();
    assert_eq!(body_json(updated).await["institution_name"], "Stanford");

    let gone = profile::update_education_handler(
        State(state.clone()),
        me("ann"),
        Path(1),
        Json(payload("UCR")),
    )
    .await
    .into_response();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let listed = profile::list_education_handler(State(state.clone()), me("ann"))
        .await
        .into_response();
    let ordinals: Vec<i64> = body_json(listed)
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["ordinal"].as_i64().unwrap())
        .collect();
    assert_eq!(ordinals, vec![2, 3]);
}

#[tokio::test]
async fn search_matches_ids_and_names() {
    let (state, _) = app(false);
    for user in ["annie", "bob", "joanna"] {
        signup(&state, user).await;
    }

    let response = profile::search_users_handler(
        State(state.clone()),
        Query(SearchQuery {
            q: "ANN".to_string(),
        }),
    )
    .await
    .into_response();
    let ids: Vec<String> = body_json(response)
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["user_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["annie", "joanna"]);
}

//=========================================================================================
// Connections
//=========================================================================================

async fn request(state: &Arc<AppState>, from: &str, to: &str) -> Response {
    connections::send_request_handler(
        State(state.clone()),
        me(from),
        Json(ConnectionRequestPayload {
            target_id: to.to_string(),
        }),
    )
    .await
    .into_response()
}

#[tokio::test]
async fn request_accept_and_list() {
    let (state, store) = app(false);
    for user in ["ann", "bob", "cat", "dan"] {
        signup(&state, user).await;
    }
    connect(&store, "ann", "bob").await;
    connect(&store, "bob", "cat").await;

    // dan has no connections and the default policy keeps isolated users out
    assert_eq!(
        request(&state, "dan", "ann").await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        request(&state, "ann", "ann").await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        request(&state, "ann", "ghost").await.status(),
        StatusCode::NOT_FOUND
    );

    let response = request(&state, "ann", "cat").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["status"], "pending");
    assert_eq!(
        request(&state, "cat", "ann").await.status(),
        StatusCode::CONFLICT
    );

    let incoming = connections::list_requests_handler(State(state.clone()), me("cat"))
        .await
        .into_response();
    assert_eq!(body_json(incoming).await, serde_json::json!(["ann"]));

    // only the target answers
    let response = connections::accept_request_handler(
        State(state.clone()),
        me("ann"),
        Path("cat".to_string()),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = connections::accept_request_handler(
        State(state.clone()),
        me("cat"),
        Path("ann".to_string()),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "accepted");

    let listed = connections::list_connections_handler(State(state.clone()), Path("ann".to_string()))
        .await
        .into_response();
    assert_eq!(body_json(listed).await, serde_json::json!(["bob", "cat"]));

    let reach = connections::reachable_handler(State(state.clone()), me("ann"), Path("cat".to_string()))
        .await
        .into_response();
    let reach = body_json(reach).await;
    assert_eq!(reach["reachable"], true);
    assert_eq!(reach["degree"], 1);

    let reach = connections::reachable_handler(State(state.clone()), me("ann"), Path("dan".to_string()))
        .await
        .into_response();
    assert_eq!(body_json(reach).await["reachable"], false);
}

#[tokio::test]
async fn rejected_requests_can_be_retried() {
    let (state, store) = app(false);
    for user in ["ann", "bob", "cat"] {
        signup(&state, user).await;
    }
    connect(&store, "ann", "bob").await;
    connect(&store, "bob", "cat").await;

    request(&state, "ann", "cat").await;
    let response = connections::reject_request_handler(
        State(state.clone()),
        me("cat"),
        Path("ann".to_string()),
    )
    .await
    .into_response();
    assert_eq!(body_json(response).await["status"], "rejected");

    assert_eq!(
        request(&state, "ann", "cat").await.status(),
        StatusCode::CREATED
    );
}

#[tokio::test]
async fn isolated_users_may_reach_out_when_allowed() {
    let (state, _) = app(true);
    signup(&state, "ann").await;
    signup(&state, "bob").await;

    assert_eq!(
        request(&state, "ann", "bob").await.status(),
        StatusCode::CREATED
    );
}

//=========================================================================================
// Messages
//=========================================================================================

#[tokio::test]
async fn draft_send_read_lifecycle() {
    let (state, _) = app(false);
    for user in ["ann", "bob", "eve"] {
        signup(&state, user).await;
    }

    let first = body_json(compose(&state, "ann", "bob", "hello", false).await).await;
    let draft = body_json(compose(&state, "ann", "bob", "later", true).await).await;
    assert_eq!(draft["status"], "draft");
    let draft_id = draft["id"].as_i64().unwrap();
    assert!(draft_id > first["id"].as_i64().unwrap());

    let outgoing = messages::list_outgoing_handler(State(state.clone()), me("ann"))
        .await
        .into_response();
    assert_eq!(body_json(outgoing).await.as_array().unwrap().len(), 1);

    let sent = messages::send_draft_handler(State(state.clone()), me("ann"), Path(draft_id))
        .await
        .into_response();
    assert_eq!(body_json(sent).await["status"], "sent");

    let unread = messages::list_unread_handler(State(state.clone()), me("bob"))
        .await
        .into_response();
    let unread = body_json(unread).await;
    let bodies: Vec<&str> = unread
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["hello", "later"]);
    assert!(unread
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["status"] == "delivered"));

    let outsider = messages::open_handler(State(state.clone()), me("eve"), Path(draft_id))
        .await
        .into_response();
    assert_eq!(outsider.status(), StatusCode::FORBIDDEN);

    let opened = messages::open_handler(State(state.clone()), me("bob"), Path(draft_id))
        .await
        .into_response();
    assert_eq!(body_json(opened).await["status"], "read");

    let read = messages::list_read_handler(State(state.clone()), me("bob"))
        .await
        .into_response();
    assert_eq!(body_json(read).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn compose_validates_body_and_receiver() {
    let (state, _) = app(false);
    signup(&state, "ann").await;
    signup(&state, "bob").await;

    assert_eq!(
        compose(&state, "ann", "bob", "   ", false).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        compose(&state, "ann", "ghost", "hi", false).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    let drafts = messages::list_drafts_handler(State(state.clone()), me("ann"))
        .await
        .into_response();
    assert_eq!(body_json(drafts).await, serde_json::json!([]));
}

#[tokio::test]
async fn deletes_are_per_party() {
    let (state, _) = app(false);
    signup(&state, "ann").await;
    signup(&state, "bob").await;

    let id = body_json(compose(&state, "ann", "bob", "hi", false).await).await["id"]
        .as_i64()
        .unwrap();

    let wrong = messages::delete_sent_handler(State(state.clone()), me("bob"), Path(id))
        .await
        .into_response();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    let response = messages::delete_sent_handler(State(state.clone()), me("ann"), Path(id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let outgoing = messages::list_outgoing_handler(State(state.clone()), me("ann"))
        .await
        .into_response();
    assert_eq!(body_json(outgoing).await, serde_json::json!([]));
    let unread = messages::list_unread_handler(State(state.clone()), me("bob"))
        .await
        .into_response();
    assert_eq!(body_json(unread).await.as_array().unwrap().len(), 1);

    let response = messages::delete_received_handler(State(state.clone()), me("bob"), Path(id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let opened = messages::open_handler(State(state.clone()), me("bob"), Path(id))
        .await
        .into_response();
    assert_eq!(opened.status(), StatusCode::NOT_FOUND);

    // the record survives both deletions
    assert!(state.messages.get(id).await.is_ok());
}
