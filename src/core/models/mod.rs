pub mod account;
pub mod cost;
pub mod resource;
pub mod result;
