pub mod api;
pub mod clicks;
pub mod config;
pub mod models;
pub mod qr;
pub mod redirect;
pub mod services;
pub mod storage;
