use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use challengelog::identity::InMemoryIdentityProvider;
use challengelog::room::handlers;
use challengelog::shared::AppState;
use challengelog::store::InMemoryStore;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "challengelog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting game challenge log server");

    // Create shared application state with dependency injection
    // Easy to switch between implementations:
    let store = Arc::new(InMemoryStore::new());
    let identity = Arc::new(InMemoryIdentityProvider::new());

    let app_state = AppState::new(store, identity);

    let app = Router::new()
        .route("/rooms", post(handlers::create_room).get(handlers::list_rooms))
        .route("/rooms/:room_id/guests", post(handlers::add_guest))
        .route("/rooms/:room_id/leave", post(handlers::leave_room))
        .route("/rooms/:room_id/members", get(handlers::list_members))
        .route(
            "/rooms/:room_id/games",
            post(handlers::add_game).get(handlers::list_games),
        )
        .route("/games/:game_id", delete(handlers::remove_game))
        .route("/rooms/:room_id/matches", post(handlers::record_match))
        .route("/rooms/:room_id/history", get(handlers::match_history))
        .route("/rooms/:room_id/penalties", get(handlers::list_penalties))
        .route(
            "/penalties/:penalty_id/complete",
            post(handlers::complete_penalty),
        )
        .route("/rooms/:room_id/standings", get(handlers::standings))
        .route("/rooms/:room_id/breakdown", get(handlers::game_breakdown))
        .route(
            "/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route(
            "/rooms/:room_id/penalty-templates",
            post(handlers::add_template).get(handlers::list_templates),
        )
        .route(
            "/penalty-templates/:template_id",
            delete(handlers::remove_template),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // run our app with hyper, listening globally on port 3000
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!("Server running on http://localhost:3000");
    axum::serve(listener, app).await.unwrap();
}
