use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::models::*;
use crate::{
    error::{AppError, AppResult},
    ledger::{models::*, Ledger},
    middleware::validate_request,
    notifications::{
        models::{Actor, NewNotification, NotificationEnvelope},
        NotificationStore,
    },
    reminders::ReminderScheduler,
};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub notifications: Arc<dyn NotificationStore>,
    pub scheduler: Arc<ReminderScheduler>,
    /// "postgres" or "memory"
    pub storage: &'static str,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        storage: state.storage.to_string(),
        timestamp: Utc::now(),
    })
}

/// Primary-tier endpoint used by NotificationDispatcher
/// POST /api/notifications/create
pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<NewNotification>,
) -> (StatusCode, Json<NotificationEnvelope>) {
    if request.title.trim().is_empty() || request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(NotificationEnvelope::failed("title and message are required")),
        );
    }

    match state
        .notifications
        .insert_direct(Actor::System, &request)
        .await
    {
        Ok(notification) => (
            StatusCode::CREATED,
            Json(NotificationEnvelope::created(notification)),
        ),
        Err(e) => {
            error!("Failed to create notification for {}: {}", request.user_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(NotificationEnvelope::failed(e.to_string())),
            )
        }
    }
}

/// POST /api/v1/splits
pub async fn create_split(
    State(state): State<AppState>,
    Json(request): Json<CreateSplitRequest>,
) -> AppResult<(StatusCode, Json<SplitDetails>)> {
    info!(
        "Creating split {:?} for {} ({} invitees)",
        request.name,
        request.creator_id,
        request.participants.len()
    );
    validate_request(&request)?;

    let split = state.ledger.create_split(request.into()).await?;
    Ok((StatusCode::CREATED, Json(split)))
}

/// GET /api/v1/splits/:id
pub async fn get_split(
    State(state): State<AppState>,
    Path(split_id): Path<Uuid>,
) -> AppResult<Json<SplitDetails>> {
    Ok(Json(state.ledger.get_split(split_id).await?))
}

/// POST /api/v1/splits/:id/pay
pub async fn pay_share(
    State(state): State<AppState>,
    Path(split_id): Path<Uuid>,
    Json(request): Json<ShareActionRequest>,
) -> AppResult<Json<PaymentReceipt>> {
    let receipt = state.ledger.pay_share(split_id, request.user_id).await?;
    Ok(Json(receipt))
}

/// POST /api/v1/splits/:id/accept
pub async fn accept_share(
    State(state): State<AppState>,
    Path(split_id): Path<Uuid>,
    Json(request): Json<ShareActionRequest>,
) -> AppResult<Json<ShareStatusResponse>> {
    let event_status = state.ledger.accept_share(split_id, request.user_id).await?;
    Ok(Json(ShareStatusResponse {
        split_event_id: split_id,
        user_id: request.user_id,
        event_status,
    }))
}

/// POST /api/v1/splits/:id/decline
pub async fn decline_share(
    State(state): State<AppState>,
    Path(split_id): Path<Uuid>,
    Json(request): Json<ShareActionRequest>,
) -> AppResult<Json<ShareStatusResponse>> {
    let event_status = state.ledger.decline_share(split_id, request.user_id).await?;
    Ok(Json(ShareStatusResponse {
        split_event_id: split_id,
        user_id: request.user_id,
        event_status,
    }))
}

/// GET /api/v1/wallets/:user_id
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<WalletResponse>> {
    let wallet = state.ledger.wallet(user_id).await?;
    let recent_transactions = state.ledger.transactions(user_id, page.limit()).await?;

    Ok(Json(WalletResponse {
        wallet,
        recent_transactions,
    }))
}

/// POST /api/v1/wallets/:user_id/deposit
pub async fn deposit(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<DepositRequest>,
) -> AppResult<Json<Wallet>> {
    validate_request(&request)?;
    let wallet = state
        .ledger
        .deposit(user_id, request.amount, request.description)
        .await?;
    Ok(Json(wallet))
}

/// GET /api/v1/notifications/:user_id
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<NotificationListResponse>> {
    let notifications = state.notifications.list_for_user(user_id, page.limit()).await?;
    let unread_count = state.notifications.unread_count(user_id).await?;

    Ok(Json(NotificationListResponse {
        notifications,
        unread_count,
    }))
}

/// POST /api/v1/notifications/:user_id/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path((user_id, notification_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MarkReadResponse>> {
    if !state.notifications.mark_read(user_id, notification_id).await? {
        return Err(AppError::NotFound(format!(
            "Notification {} not found",
            notification_id
        )));
    }

    Ok(Json(MarkReadResponse {
        id: notification_id,
        read: true,
    }))
}

/// Manual reminder run, ignores the hour window
/// POST /api/v1/admin/reminders/run
pub async fn run_reminders(State(state): State<AppState>) -> AppResult<Json<ReminderRunResponse>> {
    info!("🔔 Manual reminder run requested");
    let report = state.scheduler.run_now().await?;
    Ok(Json(report.into()))
}
