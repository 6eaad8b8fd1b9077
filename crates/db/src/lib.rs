pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{sample_menu, seed_sample_restaurant, SeedOptions, SeedResult};
