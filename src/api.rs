// API routes and handlers
use crate::models::blip::BlipCaptioner;
use crate::state::{get_or_init, AppState};
use actix_web::http::header::ContentType;
use actix_web::{get, web, HttpResponse, Responder};
use candle::Device;
use serde::Serialize;
use std::time::Instant;

/// Route patterns served by [`configure`]; the 404 listing is built from this
/// table.
pub const ROUTES: &[&str] = &["/", "/predict"];

/// Registers every route in [`ROUTES`] plus the catch-all 404 handler. Both
/// `main` and the tests build the app through here.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(home)
        .service(predict)
        .default_service(web::route().to(not_found));
}

#[derive(Serialize)]
pub struct CaptionResponse {
    pub caption: String,
    pub time: f64,
}

#[get("/")]
pub async fn home(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().body(format!(
        "Hello, World! Serving since {}.",
        state.started_at.to_rfc3339()
    ))
}

#[get("/predict")]
pub async fn predict(state: web::Data<AppState>) -> impl Responder {
    let started = Instant::now();

    // Bounded wait for the model lock; concurrent requests queue here and are
    // served one at a time.
    let mut guard = match state.captioner.acquire(state.settings.predict_wait).await {
        Some(guard) => guard,
        None => {
            return HttpResponse::ServiceUnavailable()
                .body("caption model is busy, try again later")
        }
    };

    let artifact = state.settings.model_path.clone();
    let image = state.settings.image_path.clone();
    let result = web::block(move || {
        let model = get_or_init(&mut guard, || BlipCaptioner::load(&artifact, Device::Cpu))?;
        let encoded = model.encode_image(&image)?;
        model.caption(&encoded)
    })
    .await;

    match result {
        Ok(Ok(caption)) => HttpResponse::Ok().json(CaptionResponse {
            caption,
            time: started.elapsed().as_secs_f64(),
        }),
        Ok(Err(e)) => {
            log::error!("caption request failed: {:?}", e);
            HttpResponse::InternalServerError().body("failed to generate caption")
        }
        Err(e) => {
            log::error!("caption worker failed: {:?}", e);
            HttpResponse::InternalServerError().body("failed to generate caption")
        }
    }
}

/// Catch-all for unmatched routes: lists every registered route pattern,
/// sorted.
pub async fn not_found() -> impl Responder {
    let mut routes = ROUTES.to_vec();
    routes.sort_unstable();
    let listing = routes.join("<br/>- ");
    HttpResponse::NotFound()
        .content_type(ContentType::html())
        .body(format!(
            "404 Not Found: The requested URL was not found.<br/>Available endpoints:<br/>- {}",
            listing
        ))
}
