//! Congress.gov upstream client.

pub mod client;
pub mod endpoints;

pub use client::{CongressClient, API_KEY_ENV};
