//! Listing Genius: turns a swimwear/sportswear product description into an
//! Amazon listing, a visual asset plan and a PPC launch roadmap with a single
//! schema-constrained Gemini call, and keeps the last 30 generations on disk.

pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod gemini;
pub mod history;
pub mod intake;
pub mod models;
pub mod prompt;
pub mod render;
pub mod routes;
