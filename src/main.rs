use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use sitecrew::biometric::ByteSimilarityScorer;
use sitecrew::clock::{Clock, SystemClock};
use sitecrew::config::Config;
use sitecrew::db::init_db;
use sitecrew::docs::ApiDoc;
use sitecrew::routes;
use sitecrew::service::{AttendanceService, PaymentService, PayrollService};
use sitecrew::store::{MySqlStore, Store};

#[get("/")]
async fn index() -> impl Responder {
    "Sitecrew attendance and payroll"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url).await?;

    let store: Arc<dyn Store> = Arc::new(MySqlStore::new(
        pool,
        Duration::from_secs(config.reference_cache_ttl_secs),
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let attendance = Data::new(AttendanceService::new(
        store.clone(),
        Arc::new(ByteSimilarityScorer),
        clock.clone(),
        config.match_policy(),
    ));
    let payroll = Data::new(PayrollService::new(store.clone(), clock.clone()));
    let payment = Data::new(PaymentService::new(store, clock));
    let config_data = Data::new(config.clone());
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard {_:.*} so the UI's JS/CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(config_data.clone())
            .app_data(attendance.clone())
            .app_data(payroll.clone())
            .app_data(payment.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
