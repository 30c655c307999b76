//! WHOOP data API: authorized fetches and reshaping for the public routes.

pub mod client;
pub mod format;
pub mod models;

pub use client::WhoopApi;
