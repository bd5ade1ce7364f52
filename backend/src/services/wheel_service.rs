use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use shared::shared_wheel::{PendingSpin, SpinError, SpinOutcome, WheelSpinner};
use shared::validation::validate_label;
use shared::wheel_prefs::{all_shops, wheel_labels, PrefsAction, WheelPrefs};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};
use validator::ValidationErrors;

use crate::auth::middleware::UserId;
use crate::error::AppError;
use crate::AppState;

/// Wheels nobody has spun for this long are dropped; their rotation restarts at zero.
pub const IDLE_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// One user's wheel: cumulative rotation plus the spin in flight.
#[derive(Debug, Default)]
pub struct SpinSession {
    pub spinner: WheelSpinner,
    /// Start of the latest spin.
    pub started_at: Option<Instant>,
}

impl SpinSession {
    /// Animation time left on the spin in flight, `None` when idle.
    fn remaining(&self) -> Option<Duration> {
        let pending = self.spinner.pending()?;
        let started_at = self.started_at?;
        Some(Duration::from_millis(pending.duration_ms).saturating_sub(started_at.elapsed()))
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.started_at.map_or(true, |at| now.duration_since(at) >= IDLE_SESSION_TTL)
    }
}

#[derive(Clone, Default)]
pub struct WheelSessions {
    pub sessions: Arc<Mutex<HashMap<String, SpinSession>>>,
}

impl WheelSessions {
    pub fn new() -> Self {
        Self::default()
    }
}

fn prune_stale(sessions: &mut HashMap<String, SpinSession>, now: Instant) {
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_stale(now));
    let dropped = before - sessions.len();
    if dropped > 0 {
        debug!("Dropped {} idle wheels", dropped);
    }
}

#[derive(Debug, Serialize)]
pub struct WheelView {
    pub labels: Vec<String>,
    /// Every known shop, including excluded ones, for the management panel.
    pub shops: Vec<String>,
    pub prefs: WheelPrefs,
    pub rotation: f64,
    pub resting_angle: f64,
    pub spinning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingSpin>,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wheel))
        .route("/prefs", get(get_prefs).put(put_prefs))
        .route("/prefs/actions", post(apply_action))
        .route("/spin", post(start_spin))
        .route("/spin/complete", post(complete_spin))
}

async fn current_labels(state: &AppState, uid: &str) -> Result<(Vec<String>, Vec<String>, WheelPrefs), AppError> {
    let records = state.store.list_records(uid).await?;
    let prefs = state.store.wheel_prefs(uid).await?;
    let shops = records.iter().map(|r| &r.shop_name);
    let labels = wheel_labels(shops.clone(), &prefs);
    let all = all_shops(shops, &prefs);
    Ok((labels, all, prefs))
}

async fn get_wheel(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<WheelView>, AppError> {
    let (labels, shops, prefs) = current_labels(&state, &user_id.0).await?;

    let sessions = state.wheels.sessions.lock().await;
    let (rotation, resting_angle, pending) = match sessions.get(&user_id.0) {
        Some(session) => (
            session.spinner.rotation(),
            session.spinner.resting_angle(),
            session.spinner.pending().cloned(),
        ),
        None => (0.0, 0.0, None),
    };

    Ok(Json(WheelView {
        labels,
        shops,
        prefs,
        rotation,
        resting_angle,
        spinning: pending.is_some(),
        pending,
    }))
}

async fn get_prefs(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<WheelPrefs>, AppError> {
    Ok(Json(state.store.wheel_prefs(&user_id.0).await?))
}

async fn put_prefs(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(prefs): Json<WheelPrefs>,
) -> Result<Json<WheelPrefs>, AppError> {
    let saved = state.store.save_wheel_prefs(&user_id.0, prefs).await?;
    Ok(Json(saved))
}

async fn apply_action(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(action): Json<PrefsAction>,
) -> Result<Json<WheelPrefs>, AppError> {
    if let PrefsAction::AddCustom { name } = &action {
        validate_label(name).map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add("name", e);
            AppError::Validation(errors)
        })?;
    }

    let current = state.store.wheel_prefs(&user_id.0).await?;
    let saved = state.store.save_wheel_prefs(&user_id.0, current.apply(action)).await?;
    Ok(Json(saved))
}

async fn start_spin(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<PendingSpin>, AppError> {
    let (labels, _, _) = current_labels(&state, &user_id.0).await?;

    let now = Instant::now();
    let mut sessions = state.wheels.sessions.lock().await;
    prune_stale(&mut sessions, now);
    let session = sessions.entry(user_id.0.clone()).or_default();

    // the animation of an uncollected spin has ended, so it has landed
    if session.remaining() == Some(Duration::ZERO) {
        let outcome = session.spinner.complete()?;
        info!("🎡 {} left {} uncollected (segment {})", user_id.0, outcome.label, outcome.index);
    }

    let pending = session
        .spinner
        .start_random(labels, &mut rand::thread_rng())?
        .clone();
    session.started_at = Some(now);

    info!(
        "🎡 {} spinning over {} shops ({:.1}° -> {:.1}°)",
        user_id.0,
        pending.segments.len(),
        pending.from_rotation,
        pending.to_rotation
    );
    Ok(Json(pending))
}

async fn complete_spin(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<SpinOutcome>, AppError> {
    let mut sessions = state.wheels.sessions.lock().await;
    let session = sessions
        .get_mut(&user_id.0)
        .filter(|s| s.spinner.is_spinning())
        .ok_or(SpinError::NotSpinning)?;

    if let Some(remaining) = session.remaining().filter(|r| !r.is_zero()) {
        return Err(AppError::TooEarly {
            remaining_ms: remaining.as_millis() as u64,
        });
    }

    let outcome = session.spinner.complete()?;
    info!("🎡 {} landed on {} (segment {})", user_id.0, outcome.label, outcome.index);
    Ok(Json(outcome))
}
