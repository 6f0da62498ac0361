use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomchat::{
    config::ServerConfig,
    db,
    message::{
        self,
        repository::{InMemoryMessageRepository, PostgresMessageRepository},
    },
    room::{
        self,
        repository::{InMemoryRoomRepository, PostgresRoomRepository},
    },
    session::{self, JwtAuthenticator, TokenConfig},
    websockets::{self, InMemoryConnectionManager},
    AppState, MessageRepository, RoomRepository,
};

type Stores = (
    Arc<dyn RoomRepository + Send + Sync>,
    Arc<dyn MessageRepository + Send + Sync>,
);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomchat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    info!("Starting room chat server");

    // Postgres when DATABASE_URL is set, in-memory otherwise
    let (room_repository, message_repository): Stores = match &config.database_url {
        Some(url) => {
            let pool = db::connect(url).await?;
            db::run_migrations(&pool).await?;
            (
                Arc::new(PostgresRoomRepository::new(pool.clone())),
                Arc::new(PostgresMessageRepository::new(pool)),
            )
        }
        None => {
            info!("DATABASE_URL not set, using in-memory stores");
            (
                Arc::new(InMemoryRoomRepository::new()),
                Arc::new(InMemoryMessageRepository::new()),
            )
        }
    };

    let token_config = TokenConfig::new(config.jwt_secret.clone(), config.token_expiration_days);
    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    let bind_address = config.bind_address();

    let app_state = AppState::new(
        config,
        room_repository,
        message_repository,
        Arc::new(JwtAuthenticator::new(token_config)),
        Arc::new(InMemoryConnectionManager::new()),
    );

    let protected_routes = Router::new()
        .route("/rooms", post(room::create_room).get(room::list_rooms))
        .route("/rooms/:room_id/messages", get(message::list_messages))
        .route("/rooms/:room_id/invite", post(room::invite_users))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            session::jwt_auth,
        ));

    let app = Router::new()
        .route("/", get(|| async { "Chat Server is running" }))
        .route("/ws", get(websockets::websocket_handler))
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server running on http://{}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}
