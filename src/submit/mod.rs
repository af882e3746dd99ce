pub mod api_client;
pub mod encoder;
pub mod manager;
pub mod response;
pub mod types;
