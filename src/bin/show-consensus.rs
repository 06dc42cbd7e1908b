use std::error::Error;

use dotenv::dotenv;
use log::{info, initialize_logger, o, warn};
use structopt::StructOpt;

use planner::code::TripCode;
use planner::config::{get_variable, parse_variable};
use planner::consensus::Consensus;
use planner::db::{Db, PgDb};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "show-consensus",
    about = "Print vote tallies and the winning places for the given trips"
)]
struct Opt {
    /// The trip codes to inspect
    codes: Vec<TripCode>,

    /// Votes required before a plan may be generated
    #[structopt(long)]
    minimum_votes: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let connection_string = get_variable("PLANNER_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string)
        .await
        .expect("create database pool from PLANNER_DB_CONNECTION_STRING");
    let db = PgDb::new(pool);

    let minimum_votes = opt
        .minimum_votes
        .unwrap_or_else(|| parse_variable("PLANNER_MINIMUM_VOTES", 2));

    for code in &opt.codes {
        let logger = logger.new(o!("code" => code.to_string()));

        let trip = match db.retrieve_trip(code).await? {
            Some(trip) => trip,
            None => {
                warn!(logger, "No such trip");
                continue;
            }
        };

        let candidates = db.recommendations(trip.id()).await?;
        let votes = db.votes(trip.id()).await?;
        let consensus = Consensus::from_votes(candidates, &votes);

        info!(
            logger,
            "{} ({} votes, ready: {})",
            trip.title(),
            consensus.total_votes(),
            consensus.is_ready(minimum_votes)
        );

        println!("{} {}", code, trip.title());

        for candidate in consensus.ranking() {
            let tally = candidate.tally();
            let marker = if consensus
                .winners()
                .iter()
                .any(|w| w.recommendation().id() == candidate.recommendation().id())
            {
                "*"
            } else {
                " "
            };

            println!(
                "{} {:>+4} (+{} / -{}) {}",
                marker,
                tally.score(),
                tally.up_count(),
                tally.down_count(),
                candidate.recommendation().details().name()
            );
        }
    }

    Ok(())
}
