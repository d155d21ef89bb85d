// src/services/mod.rs
pub mod analysis;
pub mod calendar;
pub mod csv_source;
pub mod db;
