pub mod campaign;
pub mod cli;
pub mod config;
pub mod geoloc;
pub mod platform;
pub mod results;
pub mod scheduler;
