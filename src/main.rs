use actix_web::{web, App, HttpServer};
use clap::Parser;
use docassist::assistant::{AssistantChat, AssistantClient};
use docassist::chat::ChatRelay;
use docassist::cli::{commands::{Cli, Commands}, run_cli};
use docassist::config::AppConfig;
use std::sync::Arc;
use tracing::{error, info, warn};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        run_cli(cli.command, cli.config).await;
        return Ok(());
    }

    info!("Starting docassist server...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let client = Arc::new(AssistantClient::new(config.assistant.clone()));
    if let Err(e) = client.require_credentials() {
        warn!("{} Routes will answer 400 until they are set.", e);
    }

    let api: Arc<dyn AssistantChat> = client.clone();
    let relay = Arc::new(ChatRelay::new(api, config.features.clone()));

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(client.clone()))
            .app_data(web::Data::new(relay.clone()))
            .configure(docassist::api::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
