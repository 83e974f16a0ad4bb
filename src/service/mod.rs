pub mod bootstrap;
pub mod fixture_loader;

pub use bootstrap::{bootstrap, init_schema};
pub use fixture_loader::{FixtureOptions, FixtureStats, load_fixtures, load_fixtures_str};
