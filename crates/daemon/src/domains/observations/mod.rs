mod infoclimat_client;
mod ingest;

pub use infoclimat_client::*;
pub use ingest::*;
