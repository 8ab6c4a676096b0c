pub mod order_models;

pub use order_models::*;
