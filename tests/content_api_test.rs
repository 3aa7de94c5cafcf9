//! Exercises the contents API client and a full sync pass against a local
//! fake of the repository contents endpoints.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use chrono::Duration;
use serde_json::json;

use stocksync::inventory::{
    default_categories, now_millis, BlobStore, CategoryStore, InventoryManager, MemoryBlobStore,
    MemoryItemStore, NewItem,
};
use stocksync::sync::documents::{IndexDocument, PartitionDocument, PartitionItem};
use stocksync::sync::{
    AttachmentAction, AttachmentSync, ContentApiClient, RemoteContent, RemoteError, SyncAction,
    SyncConfig, SyncCredentials, SyncEngine,
};

const TOKEN: &str = "secret-token";

#[derive(Default)]
struct Repo {
    files: HashMap<String, (Vec<u8>, String)>,
    revision: u64,
    branches: Vec<String>,
}

impl Repo {
    fn write(&mut self, path: &str, content: Vec<u8>) -> String {
        self.revision += 1;
        let sha = format!("{:040x}", self.revision);
        self.files.insert(path.to_string(), (content, sha.clone()));
        sha
    }
}

type Shared = Arc<Mutex<Repo>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == format!("token {}", TOKEN))
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

async fn repo_info(
    headers: HeaderMap,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    if !authorized(&headers) {
        return message(StatusCode::UNAUTHORIZED, "Bad credentials");
    }
    if repo != "lager" {
        return message(StatusCode::NOT_FOUND, "Not Found");
    }
    Json(json!({ "full_name": format!("{}/{}", owner, repo) })).into_response()
}

async fn get_content(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return message(StatusCode::UNAUTHORIZED, "Bad credentials");
    }
    let mut repo = state.lock().unwrap();
    if let Some(branch) = query.get("ref") {
        repo.branches.push(branch.clone());
    }
    match repo.files.get(&path) {
        Some((content, sha)) => {
            // The real API wraps base64 at 60 columns
            let encoded = base64::engine::general_purpose::STANDARD.encode(content);
            let wrapped = encoded
                .as_bytes()
                .chunks(60)
                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                .collect::<Vec<_>>()
                .join("\n");
            Json(json!({
                "sha": sha,
                "path": path,
                "encoding": "base64",
                "content": wrapped,
            }))
            .into_response()
        }
        None => message(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn put_content(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if !authorized(&headers) {
        return message(StatusCode::UNAUTHORIZED, "Bad credentials");
    }
    let Some(content) = body["content"]
        .as_str()
        .and_then(|c| base64::engine::general_purpose::STANDARD.decode(c).ok())
    else {
        return message(StatusCode::BAD_REQUEST, "content must be base64");
    };
    let sha = body["sha"].as_str();

    let mut repo = state.lock().unwrap();
    if let Some(branch) = body["branch"].as_str() {
        repo.branches.push(branch.to_string());
    }
    let existing = repo.files.get(&path).map(|(_, sha)| sha.clone());
    match (existing, sha) {
        (Some(_), None) => {
            message(StatusCode::UNPROCESSABLE_ENTITY, "\"sha\" wasn't supplied.")
        }
        (Some(current), Some(given)) if current != given => {
            message(StatusCode::CONFLICT, &format!("{} does not match {}", path, given))
        }
        (None, Some(_)) => message(StatusCode::CONFLICT, "file does not exist"),
        (existing, _) => {
            let status = if existing.is_some() {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            let new_sha = repo.write(&path, content);
            (status, Json(json!({ "content": { "path": path, "sha": new_sha } }))).into_response()
        }
    }
}

async fn spawn_server() -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(Repo::default()));
    let router = Router::new()
        .route("/repos/{owner}/{repo}", get(repo_info))
        .route(
            "/repos/{owner}/{repo}/contents/{*path}",
            get(get_content).put(put_content),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn client(api: &str, repo: &str, token: &str) -> ContentApiClient {
    let config = SyncConfig {
        enabled: true,
        owner: "werkstatt".to_string(),
        repo: repo.to_string(),
        branch: "inventar".to_string(),
        api_base_url: api.to_string(),
        ..Default::default()
    };
    ContentApiClient::new(&config, SyncCredentials::new(token)).unwrap()
}

fn inventory() -> Arc<InventoryManager> {
    Arc::new(InventoryManager::new(
        Arc::new(MemoryItemStore::new()),
        Arc::new(CategoryStore::in_memory(default_categories())),
    ))
}

fn stored<T: serde::de::DeserializeOwned>(state: &Shared, path: &str) -> T {
    let repo = state.lock().unwrap();
    serde_json::from_slice(&repo.files[path].0).unwrap()
}

#[tokio::test]
async fn test_connection_checks_repository() {
    let (api, _state) = spawn_server().await;

    assert!(client(&api, "lager", TOKEN).test_connection().await.unwrap());
    assert!(!client(&api, "fehlt", TOKEN).test_connection().await.unwrap());
    assert!(matches!(
        client(&api, "lager", "wrong").test_connection().await,
        Err(RemoteError::Auth)
    ));
}

#[tokio::test]
async fn test_get_and_put_track_versions() {
    let (api, state) = spawn_server().await;
    let client = client(&api, "lager", TOKEN);

    assert!(matches!(
        client.get("categories/holz.json").await,
        Err(RemoteError::NotFound(_))
    ));

    // Longer than one wrapped line to cover the line-break stripping
    let content = "x".repeat(200).into_bytes();
    let first = client
        .put("categories/holz.json", &content, None, "Add category: holz")
        .await
        .unwrap();
    let file = client.get("categories/holz.json").await.unwrap();
    assert_eq!(file.content, content);
    assert_eq!(file.version, first);

    let second = client
        .put("categories/holz.json", b"{}", Some(&first), "Update category: holz")
        .await
        .unwrap();
    assert_ne!(first, second);

    assert!(state
        .lock()
        .unwrap()
        .branches
        .iter()
        .all(|branch| branch == "inventar"));
}

#[tokio::test]
async fn test_put_conflicts_map_to_conflict() {
    let (api, _state) = spawn_server().await;
    let client = client(&api, "lager", TOKEN);

    let first = client.put("index.json", b"{}", None, "Initial sync: index.json").await.unwrap();
    client
        .put("index.json", b"{\"a\":1}", Some(&first), "Update index.json")
        .await
        .unwrap();

    // Stale tag
    assert!(matches!(
        client.put("index.json", b"{}", Some(&first), "Update index.json").await,
        Err(RemoteError::Conflict(_))
    ));
    // Unguarded write over an existing file
    assert!(matches!(
        client.put("index.json", b"{}", None, "Update index.json").await,
        Err(RemoteError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_bad_token_is_an_auth_error() {
    let (api, _state) = spawn_server().await;
    let client = client(&api, "lager", "wrong");

    assert!(matches!(client.get("index.json").await, Err(RemoteError::Auth)));
    assert!(matches!(
        client.put("index.json", b"{}", None, "Initial sync: index.json").await,
        Err(RemoteError::Auth)
    ));
}

#[tokio::test]
async fn test_sync_pass_round_trips_through_the_api() {
    let (api, state) = spawn_server().await;
    let remote: Arc<dyn RemoteContent> = Arc::new(client(&api, "lager", TOKEN));
    let inventory = inventory();
    let engine = SyncEngine::new(Arc::clone(&remote), Arc::clone(&inventory));

    let eiche = inventory
        .create_item(NewItem {
            name: "Eichenbrett".to_string(),
            category: "holz".to_string(),
            stock: 4.0,
            unit: "m".to_string(),
            price: 12.5,
            ..Default::default()
        })
        .await
        .unwrap();

    let first = engine.smart_sync().await.unwrap();
    assert_eq!(first.index, SyncAction::Uploaded);
    assert_eq!(first.categories.len(), 7);
    assert_eq!(first.errors(), 0);

    let index: IndexDocument = stored(&state, "index.json");
    assert_eq!(index.categories.len(), 7);
    let holz: PartitionDocument = stored(&state, "categories/holz.json");
    assert_eq!(holz.item_count, 1);
    assert_eq!(holz.items[0].id, eiche.id);

    let second = engine.smart_sync().await.unwrap();
    assert_eq!(second.index, SyncAction::None);
    assert!(second.categories.is_empty());

    // Another device adds an item and bumps the documents
    let later = now_millis() + Duration::hours(1);
    {
        let mut repo = state.lock().unwrap();
        let mut holz: PartitionDocument =
            serde_json::from_slice(&repo.files["categories/holz.json"].0).unwrap();
        holz.items.push(PartitionItem {
            id: "fremd-1".to_string(),
            name: "Kiefernleiste".to_string(),
            sku: String::new(),
            stock: 10.0,
            unit: "m".to_string(),
            min: 2.0,
            max: 0.0,
            price: 1.2,
            location: String::new(),
            notes: String::new(),
            photo: String::new(),
            created_at: later,
            updated_at: later,
        });
        holz.item_count = holz.items.len();
        holz.last_modified = later;
        repo.write("categories/holz.json", serde_json::to_vec(&holz).unwrap());

        let mut index: IndexDocument =
            serde_json::from_slice(&repo.files["index.json"].0).unwrap();
        index.last_updated = later;
        for descriptor in &mut index.categories {
            if descriptor.id == "holz" {
                descriptor.last_modified = later;
                descriptor.item_count = 2;
            }
        }
        repo.write("index.json", serde_json::to_vec(&index).unwrap());
    }

    let third = engine.smart_sync().await.unwrap();
    assert_eq!(third.index, SyncAction::Downloaded);
    assert_eq!(third.downloaded(), 1);

    let items = inventory.category_items("holz").await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().any(|item| item.id == "fremd-1"));
}

#[tokio::test]
async fn test_attachment_push_and_pull() {
    let (api, state) = spawn_server().await;
    let remote: Arc<dyn RemoteContent> = Arc::new(client(&api, "lager", TOKEN));
    let inventory = inventory();

    let item = inventory
        .create_item(NewItem {
            name: "Schraube".to_string(),
            category: "holz".to_string(),
            stock: 100.0,
            unit: "Stk".to_string(),
            attachment: Some("holz/schraube".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.put("holz/schraube", b"\xff\xd8jpeg").await.unwrap();
    let sync = AttachmentSync::new(Arc::clone(&remote), blobs.clone());
    assert_eq!(sync.sync_attachment(&item).await.unwrap(), AttachmentAction::Uploaded);
    assert_eq!(state.lock().unwrap().files.len(), 1);

    // A second push overwrites the existing file
    blobs.put("holz/schraube", b"\xff\xd8jpeg2").await.unwrap();
    assert_eq!(sync.sync_attachment(&item).await.unwrap(), AttachmentAction::Uploaded);

    let fresh = Arc::new(MemoryBlobStore::new());
    let puller = AttachmentSync::new(remote, fresh.clone());
    assert_eq!(puller.pull(&item).await.unwrap(), AttachmentAction::Downloaded);
    assert_eq!(
        fresh.get("holz/schraube").await.unwrap(),
        Some(b"\xff\xd8jpeg2".to_vec())
    );
}
