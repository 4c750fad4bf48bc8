pub mod aggregate_public_key;
pub mod errors;
pub mod private_key;
pub mod public_key;
pub mod signature;
