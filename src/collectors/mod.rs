pub mod refresher;
pub mod tle_fetcher;
