/*!
Here we go!
*/
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    routing::{get, post},
    Router,
};
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use tokio::time::Duration;
use tower_http::services::ServeDir;

use museo::inter::{self, admin, visitor};
use museo::{config, session};

const DEFAULT_CONFIG: &str = "museo.toml";

/// Uploaded artifact images can be larger than the default body limit.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// How often the background sweep reaps idle sessions.
const SWEEP_EVERY: Duration = Duration::from_secs(60);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("museo")
        .build();
    TermLogger::init(
        museo::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ).unwrap();
    log::info!("Logging started.");

    let config_path = std::env::args().nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_owned());
    let glob = match config::load_configuration(&config_path).await {
        Ok(g) => g,
        Err(e) => {
            log::error!("Error loading configuration {:?}: {}", &config_path, &e);
            std::process::exit(1);
        },
    };
    let glob = Arc::new(glob);

    if let Err(e) = inter::init("templates") {
        log::error!("Error initializing templates: {}", &e);
        std::process::exit(1);
    }

    let _sweeper = session::spawn_sweeper(glob.sessions.clone(), SWEEP_EVERY);

    let app = Router::new()
        // public pages and account lifecycle
        .route("/", get(visitor::home))
        .route("/aboutUs", get(visitor::about_page))
        .route("/signUp", get(visitor::signup_page).post(visitor::signup))
        .route("/signIn", get(visitor::signin_page).post(visitor::signin))
        .route(
            "/forgotPassword",
            get(visitor::forgot_page).post(visitor::forgot_password)
        )
        .route("/verify", get(visitor::verify_get).post(visitor::verify_post))
        .route("/reset", get(visitor::reset_page))
        .route("/reset/:token", post(visitor::reset_password))
        .route("/logout", get(visitor::logout))
        .route("/keep-alive", get(visitor::keep_alive))
        // signed-in visitor
        .route("/account", get(visitor::account_page))
        .route(
            "/reservation",
            get(visitor::reservation_page).post(visitor::make_reservation)
        )
        .route("/reservation/:id/rebook", post(visitor::rebook_reservation))
        .route("/reservation/:id/cancel", post(visitor::cancel_reservation))
        .route("/artifacts", get(visitor::artifacts_page))
        .route("/games", get(visitor::games_page))
        .route("/score", post(visitor::post_score))
        // admin console
        .route("/admin", get(admin::users_page))
        .route("/admin/reservations", get(admin::reservations_page))
        .route("/admin/blocked", get(admin::blocked_page))
        .route("/admin/artifacts", get(admin::artifacts_page))
        .route("/admin/questions", get(admin::questions_page))
        .route("/admin/reports", get(admin::reports_page))
        .route("/admin/users/:id/update", post(admin::update_user))
        .route("/admin/users/:id/password", post(admin::set_user_password))
        .route("/admin/users/:id/score", post(admin::set_user_score))
        .route("/admin/users/:id/delete", post(admin::delete_user))
        .route("/admin/reservations/:id/date", post(admin::set_visit_date))
        .route("/admin/reservations/:id/time", post(admin::set_visit_time))
        .route("/admin/reservations/:id/contact", post(admin::set_contact))
        .route("/admin/reservations/:id/party", post(admin::set_party_size))
        .route("/admin/reservations/:id/delete", post(admin::delete_reservation))
        .route("/admin/blocked/add", post(admin::add_blocked))
        .route("/admin/blocked/:id/date", post(admin::redate_blocked))
        .route("/admin/blocked/:id/remove-time", post(admin::remove_blocked_time))
        .route("/admin/blocked/:id/delete", post(admin::delete_blocked))
        .route("/admin/artifacts/add", post(admin::add_artifact))
        .route("/admin/artifacts/:id/update", post(admin::update_artifact))
        .route("/admin/artifacts/:id/delete", post(admin::delete_artifact))
        .route("/admin/questions/add", post(admin::add_question))
        .route("/admin/questions/:id/update", post(admin::update_question))
        .route("/admin/questions/:id/delete", post(admin::delete_question))
        // assets
        .nest_service("/static", ServeDir::new("static"))
        .nest_service("/media", ServeDir::new(&glob.media_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(Extension(glob.clone()));

    log::info!("Listening on {}", &glob.addr);

    axum::Server::bind(&glob.addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
