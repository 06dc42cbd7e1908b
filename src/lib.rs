pub mod analysis;
pub mod assembler;
pub mod code;
pub mod config;
pub mod consensus;
pub mod dates;
pub mod db;
pub mod environment;
pub mod errors;
pub mod generator;
pub mod normalization;
pub mod participant;
pub mod places;
pub mod plan;
pub mod recommendation;
pub mod routes;
pub mod session;
pub mod snapshot;
pub mod trip;
pub mod urls;
pub mod vote;
