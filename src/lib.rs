pub mod config;
pub mod database;
pub mod geo;
pub mod models;
pub mod services;
pub mod web;
