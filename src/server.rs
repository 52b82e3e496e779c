/// HTTP server exposing dashboard panels as JSON, with WebSocket push
use actix_web::{middleware, web, App, Error, HttpRequest, HttpResponse, HttpServer};
use actix_web_actors::ws;
use std::sync::Arc;

use crate::config::DashboardConfig;
use crate::controls::ControlUpdate;
use crate::dashboard::Panel;
use crate::messages::ServerMessage;
use crate::table::Table;
use crate::websocket::{AppState, DashboardWebSocket};

/// WebSocket endpoint handler
async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let resp = ws::start(DashboardWebSocket::new(state), &req, stream)?;
    Ok(resp)
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "countries": state.dashboard.base().len(),
        "subscribers": state.subscriber_count(),
    }))
}

/// Every panel, each with its own outcome
async fn all_panels(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ServerMessage::panels(state.dashboard.render_all()))
}

/// One panel by id
async fn one_panel(path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    let panel = match path.parse::<Panel>() {
        Ok(panel) => panel,
        Err(e) => return HttpResponse::NotFound().json(ServerMessage::error(e.to_string())),
    };

    match state.dashboard.render(panel) {
        Ok(output) => HttpResponse::Ok().json(ServerMessage::Panel { panel, output }),
        Err(e) => HttpResponse::UnprocessableEntity().json(ServerMessage::rendered(panel, Err(e))),
    }
}

/// Current control values
async fn get_controls(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.dashboard.controls())
}

/// Applies a control change and returns the re-rendered affected panels
async fn update_controls(
    update: web::Json<ControlUpdate>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let affected = state.dashboard.apply(update.into_inner());
    HttpResponse::Ok().json(state.publish(&affected))
}

/// Route table, shared by the server and its tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(ws_index))
        .route("/health", web::get().to(health_check))
        .route("/api/panels", web::get().to(all_panels))
        .route("/api/panels/{panel}", web::get().to(one_panel))
        .route("/api/controls", web::get().to(get_controls))
        .route("/api/controls", web::post().to(update_controls));
}

/// Start the HTTP server with WebSocket support
pub async fn run_server(config: &DashboardConfig, base: Arc<Table>) -> std::io::Result<()> {
    let state = web::Data::new(AppState::new(base));
    let (host, port) = (config.host.as_str(), config.port);

    log::info!("happiness dashboard listening on http://{}:{}", host, port);
    log::info!("websocket: ws://{}:{}/ws", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            // CORS for development
            .wrap(
                actix_cors::Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await
}
