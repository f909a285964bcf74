pub mod chain;
pub mod config;
pub mod consts;
pub mod explorer;
pub mod reconcile;
pub mod report;
pub mod schemas;
pub mod utils;
