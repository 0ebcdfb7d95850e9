use actix_web::{web, App, HttpServer};
use channel_feed_service::{
    config, error,
    feed::{IpfsChannelLog, IpfsContentStore, IpfsFeedPubSub, PostStore},
    ipfs::IpfsClient,
    logging,
    middleware::RequestId,
    routes,
    state::AppState,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    // One shared HTTP client for all backend traffic. No global request
    // timeout: pub/sub subscriptions are deliberately unbounded.
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| error::AppError::StartServer(format!("http client: {e}")))?;
    let ipfs = IpfsClient::new(http, &cfg.ipfs_api_url, &cfg.ipfs_gateway_url);

    let store = PostStore::new(cfg.channel_cap);
    let state = AppState {
        config: cfg.clone(),
        store,
        log: Arc::new(IpfsChannelLog::new(ipfs.clone(), cfg.feed_root.clone())),
        pubsub: Arc::new(IpfsFeedPubSub::new(ipfs.clone())),
        content: Arc::new(IpfsContentStore::new(ipfs)),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, ipfs_api=%cfg.ipfs_api_url, "starting channel-feed-service");

    // Let uploads up to the ceiling through to our own check, which returns
    // the precise 413 body.
    let payload_limit = cfg.max_upload_bytes + 1024;

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(RequestId::new())
            .app_data(web::Data::new(state.clone()))
            .app_data(web::PayloadConfig::new(payload_limit))
            .service(routes::posts::create_post)
            .service(routes::posts::get_channel_posts)
            .service(routes::feed::feed_stream)
            .service(routes::media::upload_media)
            .service(routes::media::get_media)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(e.to_string()))
}
