pub mod api;
pub mod cache;
pub mod elections;

pub use api::PolkascanClient;
