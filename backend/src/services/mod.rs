pub mod asaas;
pub mod client_cache;
pub mod settings;
pub mod stripe;
