use std::sync::Arc;

use log::Logger;

use crate::assembler::Assembler;
use crate::db::Db;
use crate::generator::TextGenerator;
use crate::places::PlaceFinder;
use crate::urls::Urls;

pub type SafeDb = dyn Db + Send + Sync;
pub type SafePlaceFinder = dyn PlaceFinder + Send + Sync;
pub type SafeTextGenerator = dyn TextGenerator + Send + Sync;

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<SafeDb>,
    pub urls: Arc<Urls>,
    /// Absent when no places API key is configured.
    pub places: Option<Arc<SafePlaceFinder>>,
    pub assembler: Assembler,
    pub config: Config,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<SafeDb>,
        urls: Arc<Urls>,
        places: Option<Arc<SafePlaceFinder>>,
        generator: Option<Arc<SafeTextGenerator>>,
        config: Config,
    ) -> Self {
        let assembler = Assembler::new(logger.clone(), generator);

        Self {
            logger,
            db,
            urls,
            places,
            assembler,
            config,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Votes a trip needs before a plan may be generated.
    pub(crate) minimum_votes: usize,

    /// How many random codes to try when creating a trip.
    pub(crate) code_attempts: u8,
}

impl Config {
    pub fn new(minimum_votes: usize, code_attempts: u8) -> Self {
        Self {
            minimum_votes,
            code_attempts: code_attempts.max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(2, 5)
    }
}
