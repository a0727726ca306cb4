use axum::extract::{Path, State};
use axum::Json;
use protolab_core::error::ProtolabError;
use protolab_core::port::validate_port;
use protolab_core::project::verify_project_dir;
use protolab_core::registry::PrototypeRecord;
use protolab_core::types::{LifecycleResult, PrototypeStatus, StatusReport};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;
use crate::terminator::KillOutcome;

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError(anyhow::anyhow!("task join error: {e}"))
}

// ---------------------------------------------------------------------------
// POST /prototypes/{port}/start
// ---------------------------------------------------------------------------

/// POST /prototypes/{port}/start: launch the dev server registered on `port`.
///
/// Returns 400 for an out-of-range port.
/// Returns 404 if no prototype is registered on the port, its directory is
/// gone, or the directory has no project descriptor.
/// Returns 409 when the start guard is enabled and the port is busy.
/// Returns 500 if the dev-server command could not be spawned.
///
/// Success means the spawn was issued, not that the server is accepting
/// connections; callers poll `status`.
pub async fn start_prototype(
    State(app): State<AppState>,
    Path(raw_port): Path<String>,
) -> Result<Json<LifecycleResult>, AppError> {
    let port = validate_port(&raw_port)?;

    let registry = app.registry.clone();
    let descriptor = app.config.launcher.descriptor.clone();
    let record = tokio::task::spawn_blocking(move || -> protolab_core::Result<PrototypeRecord> {
        let record = registry
            .lookup_by_port(port)?
            .ok_or(ProtolabError::PrototypeNotFound(port))?;
        verify_project_dir(&record.directory_path, &descriptor)?;
        Ok(record)
    })
    .await
    .map_err(join_error)??;

    if app.guard.is_enabled() && app.prober.is_listening(port).await {
        return Err(ProtolabError::PortInUse(port).into());
    }
    app.guard.claim(port)?;

    if let Err(e) = app.launcher.launch(&record.directory_path, port).await {
        app.guard.release(port);
        return Err(e.into());
    }

    info!(port, id = %record.id, "prototype starting");
    Ok(Json(LifecycleResult::starting(port)))
}

// ---------------------------------------------------------------------------
// POST /prototypes/{port}/stop
// ---------------------------------------------------------------------------

/// POST /prototypes/{port}/stop: kill whatever process listens on `port`.
///
/// The registry is not consulted, so a stale or missing mapping never
/// prevents cleanup. "Nothing listening" is `{success:false}` with 200.
/// Returns 500 only when the OS lookup or kill command fails.
pub async fn stop_prototype(
    State(app): State<AppState>,
    Path(raw_port): Path<String>,
) -> Result<Json<LifecycleResult>, AppError> {
    let port = validate_port(&raw_port)?;

    let terminator = app.terminator.clone();
    let outcome = tokio::task::spawn_blocking(move || terminator.kill_by_port(port))
        .await
        .map_err(join_error)??;

    app.guard.release(port);

    match outcome {
        KillOutcome::Killed { pid } => {
            info!(port, pid, "prototype stopped");
            Ok(Json(LifecycleResult::stopped(port)))
        }
        KillOutcome::NoProcess => {
            info!(port, "stop requested but nothing is listening");
            Ok(Json(LifecycleResult::no_process(port)))
        }
    }
}

// ---------------------------------------------------------------------------
// GET /prototypes/{port}/status
// ---------------------------------------------------------------------------

/// GET /prototypes/{port}/status: `{running}` from a live port probe.
///
/// Only an invalid port is an error; probe failures read as not running.
pub async fn prototype_status(
    State(app): State<AppState>,
    Path(raw_port): Path<String>,
) -> Result<Json<StatusReport>, AppError> {
    let port = validate_port(&raw_port)?;
    let running = app.prober.is_listening(port).await;
    Ok(Json(StatusReport { running }))
}

// ---------------------------------------------------------------------------
// GET /prototypes
// ---------------------------------------------------------------------------

/// GET /prototypes: every registered prototype with its live status.
pub async fn list_prototypes(
    State(app): State<AppState>,
) -> Result<Json<Vec<PrototypeStatus>>, AppError> {
    let registry = app.registry.clone();
    let records = tokio::task::spawn_blocking(move || registry.list())
        .await
        .map_err(join_error)??;

    let probes = records.iter().map(|r| app.prober.is_listening(r.port));
    let running = futures::future::join_all(probes).await;

    let rows = records
        .into_iter()
        .zip(running)
        .map(|(r, running)| PrototypeStatus {
            id: r.id,
            port: r.port,
            directory_path: r.directory_path,
            running,
        })
        .collect();

    Ok(Json(rows))
}
