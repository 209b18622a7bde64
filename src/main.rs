use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use voltdesk::api::middleware::ApiKeyAuth;
use voltdesk::chat::gateway::{CompletionGateway, SupportGateway};
use voltdesk::cli::{
    commands::{Cli, Commands},
    run_cli,
};
use voltdesk::config::AppConfig;
use voltdesk::db;
use voltdesk::llm::ProviderFactory;
use voltdesk::storage::{DiskStore, FileStore};

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

async fn index() -> impl Responder {
    let html = include_str!("../static/index.html");
    HttpResponse::Ok().content_type("text/html").body(html)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        run_cli(cli.command, cli.config).await;
        return Ok(());
    }

    info!("Starting Voltdesk Support Chat Server...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match db::get_connection(&config.database) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let llm_provider = match ProviderFactory::create_default(&config) {
        Some(p) => p,
        None => {
            error!("Failed to initialize LLM provider from config");
            std::process::exit(1);
        }
    };

    let gateway: Arc<dyn CompletionGateway> =
        Arc::new(SupportGateway::new(llm_provider, db_pool.clone()));
    let store: Arc<dyn FileStore> = Arc::new(DiskStore::new(&config.storage));

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(store.clone()))
            .route("/", web::get().to(index))
            .route("/health", web::get().to(health))
            .service(voltdesk::api::routes::serve_file)
            .wrap(ApiKeyAuth)
            .wrap(Cors::permissive())
            // Specific prefixes first: the generic /api scope comes last
            .configure(voltdesk::api::routes_admin::configure)
            .configure(voltdesk::api::routes_chatbot::configure)
            .configure(voltdesk::api::routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
