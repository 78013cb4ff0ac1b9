use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use golist_backend::{
    AppState,
    config::Config,
    middleware::log_errors,
    routes,
    store::{HttpStore, MemoryStore, RemoteStore},
    sync::SyncManager,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 选择远程存储实现
    let store: Arc<dyn RemoteStore> = match config.store_mode.as_str() {
        "memory" => {
            tracing::warn!("STORE_MODE=memory, data will not survive a restart");
            Arc::new(MemoryStore::new(config.sync_channel_capacity))
        }
        _ => Arc::new(HttpStore::new(&config)),
    };

    // 同步会话注册表
    let sync = Arc::new(SyncManager::new(store.clone()));

    let state = AppState {
        store,
        sync,
        config: config.clone(),
    };

    // 群组与列表路由，全部公开（本应用没有账号体系）
    let api_routes = Router::new()
        // 群组路由
        .route("/groups/create", post(routes::group::create_group))
        .route("/groups/by-id", get(routes::group::find_by_id))
        .route("/groups/share-link", get(routes::group::share_link))
        .route("/groups/rename", put(routes::group::rename_group))
        .route("/groups/members", put(routes::group::update_members))
        // 列表会话路由
        .route("/lists/open", post(routes::list::open_list))
        .route("/lists/close", post(routes::list::close_list))
        .route("/lists/refresh", post(routes::list::refresh_list))
        .route("/lists/view", get(routes::list::get_view))
        // 地点路由
        .route("/places/add", post(routes::list::add_place))
        .route("/places/toggle-visited", put(routes::list::toggle_visited))
        .route("/places/toggle-favorite", put(routes::list::toggle_favorite))
        .route("/places/edit", put(routes::list::edit_place))
        .route("/places/delete", post(routes::list::delete_place));

    // 创建基础路由
    let router = Router::new().nest(&config.api_base_uri, api_routes);

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        // 开发环境允许所有来源
        let cors = CorsLayer::permissive();
        router.layer(cors)
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
