pub mod dates;
pub mod encryption;
pub mod jwt;
pub mod signature;
