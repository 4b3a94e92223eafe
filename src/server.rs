use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handler::{
    accept_share, create_notification, create_split, decline_share, deposit, get_split,
    get_wallet, health_check, list_notifications, mark_notification_read, pay_share,
    run_reminders, AppState,
};

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        .route("/health", get(health_check))
        // Primary delivery tier
        .route("/api/notifications/create", post(create_notification))
        .nest(
            "/api/v1",
            Router::new()
                // Splits
                .route("/splits", post(create_split))
                .route("/splits/:id", get(get_split))
                .route("/splits/:id/pay", post(pay_share))
                .route("/splits/:id/accept", post(accept_share))
                .route("/splits/:id/decline", post(decline_share))
                // Wallets
                .route("/wallets/:user_id", get(get_wallet))
                .route("/wallets/:user_id/deposit", post(deposit))
                // Notifications
                .route("/notifications/:user_id", get(list_notifications))
                .route(
                    "/notifications/:user_id/:id/read",
                    post(mark_notification_read),
                )
                // Admin
                .route("/admin/reminders/run", post(run_reminders)),
        )
        .layer(CompressionLayer::new())
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(
    app: Router,
    bind_address: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
