//! Domain model and Postgres queries for multi-resolution meter reading storage.

pub mod db;
pub mod domain;
