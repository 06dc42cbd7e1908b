use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use log::{info, initialize_logger, warn};
use tokio::sync::mpsc;
use warp::Filter;

use planner::config::{get_optional_variable, get_variable, parse_variable};
use planner::db::PgDb;
use planner::environment::{Config, Environment, SafePlaceFinder, SafeTextGenerator};
use planner::generator::GeminiGenerator;
use planner::places::GooglePlaces;
use planner::routes;
use planner::urls::Urls;

const DEFAULT_GENERATOR_MODEL: &str = "gemini-2.0-flash";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port: u16 = get_variable("PLANNER_PORT")
        .parse()
        .expect("parse PLANNER_PORT as u16");
    let admin_port: u16 = get_variable("PLANNER_ADMIN_PORT")
        .parse()
        .expect("parse PLANNER_ADMIN_PORT as u16");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("PLANNER_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string)
        .await
        .expect("create database pool from PLANNER_DB_CONNECTION_STRING");
    let db = Arc::new(PgDb::new(pool));

    let urls = Arc::new(Urls::new(get_variable("PLANNER_BASE_URL")).expect("parse PLANNER_BASE_URL"));

    let timeout = Duration::from_secs(parse_variable("PLANNER_HTTP_TIMEOUT_SECONDS", 30));
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("build HTTP client");

    let places = get_optional_variable("PLANNER_PLACES_API_KEY").map(|key| {
        Arc::new(GooglePlaces::new((*logger).clone(), client.clone(), key)) as Arc<SafePlaceFinder>
    });
    if places.is_none() {
        warn!(logger, "PLANNER_PLACES_API_KEY is not set, recommendations are disabled");
    }

    let generator = get_optional_variable("PLANNER_GENERATOR_API_KEY").map(|key| {
        let model = get_optional_variable("PLANNER_GENERATOR_MODEL")
            .unwrap_or_else(|| DEFAULT_GENERATOR_MODEL.to_owned());

        Arc::new(GeminiGenerator::new((*logger).clone(), client.clone(), key, model))
            as Arc<SafeTextGenerator>
    });
    if generator.is_none() {
        warn!(logger, "PLANNER_GENERATOR_API_KEY is not set, plans use the template");
    }

    let config = Config::new(
        parse_variable("PLANNER_MINIMUM_VOTES", 2),
        parse_variable("PLANNER_CODE_ATTEMPTS", 5),
    );
    info!(logger, "Configured"; "config" => ?config);

    let environment = Environment::new(logger.clone(), db, urls, places, generator, config);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            // the receiver only goes away once shutdown has started
            let _ = termination_sender.send(()).await;
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::make_api(environment.clone());

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let routes = routes::admin::make_healthz_route(environment.clone()).or(
            routes::admin::make_termination_route(environment.clone(), terminate),
        );

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
