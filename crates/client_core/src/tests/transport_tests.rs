use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::{JobStatus, RecommendationKind, WatchStatus},
    error::{ApiError, ErrorCode},
};
use tokio::net::TcpListener;

use super::*;
use crate::test_support::{corpus, item, report, watch};

#[derive(Clone, Default)]
struct ServerState {
    listings: Arc<Mutex<Vec<(usize, usize)>>>,
    searches: Arc<Mutex<Vec<(String, Vec<String>, SortMode)>>>,
    deleted: Arc<Mutex<Vec<PathBuf>>>,
}

async fn list_all(
    State(state): State<ServerState>,
    Json(request): Json<ListAllRequest>,
) -> Json<SearchResults> {
    state
        .listings
        .lock()
        .unwrap()
        .push((request.offset, request.limit));
    let all = corpus(25);
    Json(SearchResults {
        count: all.len(),
        documents: all
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect(),
    })
}

async fn search(
    State(state): State<ServerState>,
    Json(request): Json<SearchRequest>,
) -> Json<SearchResults> {
    state
        .searches
        .lock()
        .unwrap()
        .push((request.query, request.tags, request.sort));
    Json(SearchResults {
        count: 1,
        documents: vec![item("/docs/hit.md", Some("<b>hit</b>"))],
    })
}

async fn list_watches() -> Json<Vec<Watch>> {
    Json(vec![watch(1, "/docs", WatchStatus::Active)])
}

async fn watch_state() -> Json<WatchState> {
    let docs = watch(1, "/docs", WatchStatus::Adding);
    Json(WatchState {
        job_reports: vec![report(&docs, JobStatus::Running)],
        watches: vec![docs],
    })
}

async fn add_watch(Json(request): Json<PathRequest>) -> Response {
    match request.path.to_str() {
        Some("/docs") => (
            StatusCode::CONFLICT,
            Json(AddWatchError::WatchAlreadyExists),
        )
            .into_response(),
        Some("/docs/sub") => (
            StatusCode::BAD_REQUEST,
            Json(AddWatchError::ParentChildRelationship),
        )
            .into_response(),
        Some("/garbled") => (StatusCode::BAD_REQUEST, "not json").into_response(),
        Some("/crash") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(Watch {
            path: request.path,
            ..watch(2, "", WatchStatus::Adding)
        })
        .into_response(),
    }
}

async fn delete_watch(
    State(state): State<ServerState>,
    Json(request): Json<PathRequest>,
) -> Response {
    if request.path == Path::new("/missing") {
        return (StatusCode::NOT_FOUND, "no watch for /missing").into_response();
    }
    if request.path == Path::new("/crash") {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    state.deleted.lock().unwrap().push(request.path);
    StatusCode::OK.into_response()
}

async fn containing_folder(Json(request): Json<PathRequest>) -> Json<PathResponse> {
    Json(PathResponse {
        path: request
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    })
}

async fn recommendations() -> Json<Vec<PathRecommendation>> {
    Json(vec![PathRecommendation {
        path: PathBuf::from("/home/user/vault"),
        kind: RecommendationKind::Obsidian,
    }])
}

async fn events(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(push_events)
}

async fn push_events(mut socket: WebSocket) {
    let first = ServerEvent::Watches(WatchState {
        watches: vec![watch(1, "/docs", WatchStatus::Adding)],
        job_reports: Vec::new(),
    });
    let error = ServerEvent::Error(ApiError::new(ErrorCode::Internal, "indexer hiccup"));
    let second = ServerEvent::Watches(WatchState {
        watches: vec![watch(1, "/docs", WatchStatus::Active)],
        job_reports: Vec::new(),
    });
    let frames = [
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&error).unwrap(),
        "{not json".to_string(),
        serde_json::to_string(&second).unwrap(),
    ];
    for frame in frames {
        if socket.send(WsMessage::Text(frame)).await.is_err() {
            return;
        }
    }
    let _ = socket.send(WsMessage::Close(None)).await;
}

async fn spawn_backend() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/documents/all", post(list_all))
        .route("/documents/search", post(search))
        .route("/watches", get(list_watches))
        .route("/watch_state", get(watch_state))
        .route("/watches/add", post(add_watch))
        .route("/watches/delete", post(delete_watch))
        .route("/path/containing_folder", post(containing_folder))
        .route("/path_recommendations", get(recommendations))
        .route("/events", get(events))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/"), state))
}

#[test]
fn rejects_non_http_urls() {
    assert!(matches!(
        HttpBackend::new("ftp://example.com"),
        Err(ClientError::InvalidUrl { .. })
    ));
    assert!(matches!(
        HttpBackend::new("not a url"),
        Err(ClientError::InvalidUrl { .. })
    ));

    let backend = HttpBackend::new("https://search.local/").expect("valid url");
    assert_eq!(backend.base_url(), "https://search.local");
    assert_eq!(backend.events_url(), "wss://search.local/events");
}

#[tokio::test]
async fn listing_and_search_use_their_own_routes() -> Result<()> {
    let (url, state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url)?;

    let page = backend.list_all(20, 10).await?;
    assert_eq!(page.count, 25);
    assert_eq!(page.documents.len(), 5);
    assert!(page.documents.iter().all(|doc| doc.highlight.is_none()));

    let hits = backend
        .search("hit", &["notes".to_string()], SortMode::Date, 0, 10)
        .await?;
    assert_eq!(hits.count, 1);
    assert_eq!(hits.documents[0].highlight.as_deref(), Some("<b>hit</b>"));

    assert_eq!(*state.listings.lock().unwrap(), vec![(20, 10)]);
    assert_eq!(
        *state.searches.lock().unwrap(),
        vec![("hit".to_string(), vec!["notes".to_string()], SortMode::Date)]
    );
    Ok(())
}

#[tokio::test]
async fn watch_queries_decode_backend_payloads() -> Result<()> {
    let (url, _state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url)?;

    let watches = backend.list_watches().await?;
    assert_eq!(watches[0].path, PathBuf::from("/docs"));

    let snapshot = backend.get_watch_state().await?;
    assert_eq!(snapshot.watches.len(), 1);
    assert!(!snapshot.has_finished_job());

    let recommended = backend.get_path_recommendations().await?;
    assert_eq!(recommended[0].kind, RecommendationKind::Obsidian);

    let folder = backend
        .get_containing_folder(Path::new("/docs/a/report.md"))
        .await?;
    assert_eq!(folder, PathBuf::from("/docs/a"));
    Ok(())
}

#[tokio::test]
async fn add_watch_classifies_rejections() -> Result<()> {
    let (url, _state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url)?;

    let added = backend.add_watch(Path::new("/notes")).await?;
    assert_eq!(added.path, PathBuf::from("/notes"));

    let classify = |result: Result<Watch, ClientError>| {
        result
            .map(|_| ())
            .map_err(|err| err.add_watch_classification())
    };
    assert_eq!(
        classify(backend.add_watch(Path::new("/docs")).await),
        Err(AddWatchError::WatchAlreadyExists)
    );
    assert_eq!(
        classify(backend.add_watch(Path::new("/docs/sub")).await),
        Err(AddWatchError::ParentChildRelationship)
    );
    assert_eq!(
        classify(backend.add_watch(Path::new("/garbled")).await),
        Err(AddWatchError::Other)
    );

    let crash = backend.add_watch(Path::new("/crash")).await;
    assert!(matches!(crash, Err(ClientError::Transport(_))));
    Ok(())
}

#[tokio::test]
async fn delete_watch_separates_rejections_from_server_failures() -> Result<()> {
    let (url, state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url)?;

    backend.delete_watch(Path::new("/docs")).await?;
    match backend.delete_watch(Path::new("/missing")).await {
        Err(ClientError::Rejected(reason)) => {
            assert!(reason.starts_with("404"));
            assert!(reason.contains("no watch for /missing"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(matches!(
        backend.delete_watch(Path::new("/crash")).await,
        Err(ClientError::Transport(_))
    ));
    assert_eq!(*state.deleted.lock().unwrap(), vec![PathBuf::from("/docs")]);
    Ok(())
}

#[tokio::test]
async fn push_stream_yields_watch_states_until_close() -> Result<()> {
    let (url, _state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url)?;

    let updates: Vec<WatchState> = backend.subscribe().await?.collect().await;

    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].watches[0].status, WatchStatus::Adding);
    assert_eq!(updates[1].watches[0].status, WatchStatus::Active);
    Ok(())
}

#[tokio::test]
async fn push_attach_fails_without_backend() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{addr}"))?;
    assert!(matches!(
        backend.subscribe().await,
        Err(ClientError::Push(_))
    ));
    Ok(())
}
