pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod faces;
pub mod logging;
pub mod metadata;
pub mod storage;
pub mod web;
