/// Happiness Dashboard server
///
/// Loads the happiness report CSV once, then serves every dashboard panel
/// over HTTP and WebSocket.

use happiness_dashboard::config::DashboardConfig;
use happiness_dashboard::dataset;
use happiness_dashboard::server::run_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // DATA_PATH, HOST and PORT override the defaults
    let config = DashboardConfig::from_env().map_err(std::io::Error::other)?;
    let base = dataset::initialize(&config).map_err(std::io::Error::other)?;

    run_server(&config, base).await
}
