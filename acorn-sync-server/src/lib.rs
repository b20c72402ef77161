//! The HTTP sync surface over a [`Grove`] (§6): `/stash`, `/toss`,
//! `/crack`, `/shake`, `/describe`, plus the `/tangle/{type}/*`
//! reconciliation endpoints an [`acorn_tangle::HttpTransport`] polls.
//! Split out of the binary so `acorn-canopy` can embed the same router
//! and Grove construction behind its own process.

use std::sync::Arc;

use acorn_core::{Tree, VersionVector};
use acorn_grove::{Grove, TypedTreeAdapter};
use acorn_trunk_file::FileTrunk;
use acorn_trunk_mem::MemoryTrunk;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

/// Named documents a freshly-started node plants by default. A real
/// deployment would derive this list from configuration; the scaffold
/// plants one general-purpose `document` tree so the HTTP surface has
/// something to exercise out of the box.
pub const DEFAULT_TYPES: &[&str] = &["document"];

/// Either a durable file trunk or a non-durable in-memory one,
/// selected once at startup from the storage path, if any.
#[derive(Debug)]
enum BackendTrunk {
    Memory(MemoryTrunk<Value>),
    File(FileTrunk<Value>),
}

impl BackendTrunk {
    fn new(storage_path: Option<&str>, type_name: &str) -> acorn_core::AcornResult<Self> {
        match storage_path {
            Some(dir) => {
                let path = std::path::Path::new(dir).join(format!("{type_name}.acorn"));
                Ok(BackendTrunk::File(FileTrunk::open(path)?))
            }
            None => Ok(BackendTrunk::Memory(MemoryTrunk::new())),
        }
    }
}

impl acorn_core::Trunk<Value> for BackendTrunk {
    fn save(&self, id: &str, nut: acorn_core::Nut<Value>) -> acorn_core::AcornResult<()> {
        match self {
            BackendTrunk::Memory(t) => t.save(id, nut),
            BackendTrunk::File(t) => t.save(id, nut),
        }
    }
    fn load(&self, id: &str) -> acorn_core::AcornResult<Option<acorn_core::Nut<Value>>> {
        match self {
            BackendTrunk::Memory(t) => t.load(id),
            BackendTrunk::File(t) => t.load(id),
        }
    }
    fn delete(&self, id: &str) -> acorn_core::AcornResult<bool> {
        match self {
            BackendTrunk::Memory(t) => t.delete(id),
            BackendTrunk::File(t) => t.delete(id),
        }
    }
    fn load_all(&self) -> acorn_core::AcornResult<Vec<acorn_core::Nut<Value>>> {
        match self {
            BackendTrunk::Memory(t) => t.load_all(),
            BackendTrunk::File(t) => t.load_all(),
        }
    }
    fn history(&self, id: &str) -> acorn_core::AcornResult<Option<Vec<acorn_core::Nut<Value>>>> {
        match self {
            BackendTrunk::Memory(t) => t.history(id),
            BackendTrunk::File(t) => t.history(id),
        }
    }
    fn capabilities(&self) -> acorn_core::TrunkCapabilities {
        match self {
            BackendTrunk::Memory(t) => t.capabilities(),
            BackendTrunk::File(t) => t.capabilities(),
        }
    }
}

/// Plants one schema-less `Tree<serde_json::Value, _>` per entry in
/// [`DEFAULT_TYPES`], so the generic HTTP surface can accept any JSON
/// body under a given type name. Fails with `StorageUnavailable` if a
/// file trunk can't be opened, so the bootstrap binary can map that to
/// its dedicated exit code (§6) instead of panicking.
pub fn build_grove(storage_path: Option<&str>) -> acorn_core::AcornResult<Grove> {
    let grove = Grove::new();
    for type_name in DEFAULT_TYPES {
        let trunk = BackendTrunk::new(storage_path, type_name)?;
        let tree: Arc<Tree<Value, BackendTrunk>> = Arc::new(Tree::new(trunk));
        grove.plant(Arc::new(TypedTreeAdapter::new(type_name, tree))).expect("default types are unique");
    }
    Ok(grove)
}

/// Server-wide state behind every handler: the planted `Grove` plus
/// whether a judge-rejected stash should surface as `409 Conflict`
/// rather than a silent no-op `200` (§6 "strict mode").
pub struct ServerState {
    pub grove: Arc<Grove>,
    pub strict: bool,
}

type AppState = Arc<ServerState>;

/// The full `/stash`, `/toss`, `/crack`, `/shake`, `/describe`,
/// `/tangle/*` router (§6), bound to `grove`. `strict` governs whether
/// `POST /stash/{type}/{id}` returns `409` when the judge rejects the
/// write instead of the default silent `200`.
pub fn router(grove: Arc<Grove>, strict: bool) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stash/{type_name}/{id}", post(stash))
        .route("/toss/{type_name}/{id}", post(toss))
        .route("/crack/{type_name}/{id}", get(crack))
        .route("/shake", get(shake_all))
        .route("/describe", get(describe))
        .route("/tangle/{type_name}/vector", get(tangle_vector))
        .route("/tangle/{type_name}/changes", post(tangle_changes))
        .route("/tangle/{type_name}/push", post(tangle_push))
        .with_state(Arc::new(ServerState { grove, strict }))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, serde::Serialize)]
struct ErrorBody {
    error: String,
}

fn error_status(err: &acorn_core::AcornError) -> StatusCode {
    match err {
        acorn_core::AcornError::NotFound(_) => StatusCode::NOT_FOUND,
        acorn_core::AcornError::PolicyDenied(_) | acorn_core::AcornError::ConflictRejected(_) => StatusCode::CONFLICT,
        acorn_core::AcornError::EmptyId => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn err_response(err: acorn_core::AcornError) -> (StatusCode, Json<ErrorBody>) {
    (error_status(&err), Json(ErrorBody { error: err.to_string() }))
}

async fn stash(
    State(state): State<AppState>,
    Path((type_name, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    if id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(ErrorBody { error: "missing id".into() })));
    }
    let applied = state.grove.try_stash(&type_name, &id, payload).map_err(err_response)?;
    if !applied && state.strict {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorBody { error: format!("judge rejected stash for {type_name}/{id}") }),
        ));
    }
    Ok(StatusCode::OK)
}

async fn toss(
    State(state): State<AppState>,
    Path((type_name, id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    let existed = state.grove.try_toss(&type_name, &id).map_err(err_response)?;
    Ok(if existed { StatusCode::OK } else { StatusCode::NOT_FOUND })
}

async fn crack(
    State(state): State<AppState>,
    Path((type_name, id)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorBody>)> {
    match state.grove.try_crack(&type_name, &id).map_err(err_response)? {
        Some(value) => Ok(Json(value)),
        None => Err((StatusCode::NOT_FOUND, Json(ErrorBody { error: "not found".into() }))),
    }
}

async fn shake_all(State(state): State<AppState>) -> impl IntoResponse {
    match state.grove.shake_all() {
        Ok(purged) => format!("shook {purged} expired entries"),
        Err(err) => format!("shake failed: {err}"),
    }
}

#[derive(Debug, serde::Serialize)]
struct DescribeResponse {
    trees: Vec<acorn_grove::TreeInfo>,
    tangles: Vec<acorn_grove::TangleStatsEntry>,
}

async fn describe(State(state): State<AppState>) -> Result<Json<DescribeResponse>, (StatusCode, Json<ErrorBody>)> {
    let trees = state.grove.get_tree_info().map_err(err_response)?;
    let tangles = state.grove.get_tangle_stats();
    Ok(Json(DescribeResponse { trees, tangles }))
}

async fn tangle_vector(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
) -> Result<Json<acorn_tangle::VectorExchange>, (StatusCode, Json<ErrorBody>)> {
    let vector = state.grove.version_vector(&type_name).map_err(err_response)?;
    Ok(Json(acorn_tangle::VectorExchange { vector }))
}

async fn tangle_changes(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
    Json(since): Json<VersionVector>,
) -> Result<Json<Vec<Value>>, (StatusCode, Json<ErrorBody>)> {
    let changes = state.grove.export_changes_json(&type_name, &since).map_err(err_response)?;
    Ok(Json(changes))
}

async fn tangle_push(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
    Json(nuts): Json<Vec<Value>>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    state.grove.import_changes_json(&type_name, nuts).map_err(err_response)?;
    Ok(StatusCode::OK)
}
