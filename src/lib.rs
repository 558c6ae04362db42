// onboard-service/src/lib.rs
pub mod models;
pub mod platform;
pub mod routes;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;
