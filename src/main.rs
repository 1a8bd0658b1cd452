// Web server entry point
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use caption_server::settings::Settings;
use caption_server::state::AppState;
use caption_server::{api, download};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let settings = Settings::from_env();

    // One-shot bootstrap before the server starts accepting connections.
    download::ensure_model_artifact(&settings.model_url, &settings.model_path)
        .await
        .context("model bootstrap failed")?;

    let bind_addr = (settings.host.clone(), settings.port);
    let state = web::Data::new(AppState::new(settings));
    log::info!("listening on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::configure)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
