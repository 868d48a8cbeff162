use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use raffle_tracker::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{SmsSender, TwilioService},
    handlers::{self, SmsWebhookGuard},
    middlewares::{AdminAuthMiddleware, create_cors},
    models::DrawingWindow,
    services::*,
    swagger::swagger_config,
    utils::RaffleNumberPolicy,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    let policy = RaffleNumberPolicy::new(&config.raffle.number_pattern)
        .context("Invalid raffle number pattern")?;

    // 数据库
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database connection pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    if !config.twilio.validate_signature {
        log::warn!("Twilio signature validation is disabled, /sms/raffle-check accepts unsigned requests");
    }
    if config.admin.password.is_none() && config.admin.password_hash.is_none() {
        log::warn!("No admin password configured, the admin API is locked");
    }

    let sender: Arc<dyn SmsSender> = Arc::new(TwilioService::new(config.twilio.clone()));
    let sms_guard = SmsWebhookGuard::new(&config.twilio);
    let raffle_copy = config.raffle.clone();

    let submission_service = SubmissionService::new(pool.clone(), policy.clone());
    let winner_service = WinnerService::new(
        pool.clone(),
        policy.clone(),
        DrawingWindow {
            start: config.raffle.drawing_window_start,
            end: config.raffle.drawing_window_end,
        },
        sender,
        config.raffle.winner_copy.clone(),
    );
    let submitter_service = SubmitterService::new(pool.clone(), policy);
    let audit_service = AuditService::new(pool.clone());
    let admin = config.admin.clone();

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AdminAuthMiddleware::new(admin.clone()))
            .app_data(web::Data::new(sms_guard.clone()))
            .app_data(web::Data::new(raffle_copy.clone()))
            .app_data(web::Data::new(submission_service.clone()))
            .app_data(web::Data::new(winner_service.clone()))
            .app_data(web::Data::new(submitter_service.clone()))
            .app_data(web::Data::new(audit_service.clone()))
            .configure(swagger_config)
            .configure(handlers::sms_config)
            .configure(handlers::public_config)
            .configure(handlers::admin_config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
