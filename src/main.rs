//HTTP entry point: landing page, unidle event stream and health check
use actix_web::{middleware, web, App, HttpServer};
use envconfig::Envconfig;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod handlers;
mod unidling;

use crate::config::UnidlerConfig;
use crate::handlers::{events_handler, index_handler};
use crate::unidling::cluster::{self, KubeCluster};
use crate::unidling::orchestrator::Unidler;
use crate::unidling::readiness::TokioClock;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = UnidlerConfig::init_from_env()?;
    log::info!("Loaded config: {:?}", config);

    let client = cluster::connect(config.kubeconfig_path().as_deref()).await?;
    let unidler = web::Data::new(Unidler::new(
        Arc::new(KubeCluster::new(client)),
        Arc::new(TokioClock),
        config.unidle_settings(),
    ));
    let index_page = web::Data::new(index_handler::IndexPage::new()?);

    let addr = config.bind_addr();
    log::info!("Starting server on {}...", addr);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(unidler.clone())
            .app_data(index_page.clone())
            .route("/", web::get().to(index_handler::handle_index))
            .route("/events/", web::get().to(events_handler::handle_events))
            .route("/healthz", web::get().to(index_handler::handle_healthz))
    })
    .client_request_timeout(Duration::from_secs(5))
    .keep_alive(Duration::from_secs(120))
    .shutdown_timeout(120)
    .bind(&addr)?
    .run()
    .await?;
    Ok(())
}
