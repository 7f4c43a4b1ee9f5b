pub mod keys;
pub mod servers;
pub mod token;
pub mod validate;
