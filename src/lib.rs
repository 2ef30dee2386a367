//! # turnq
//!
//! A single-process turn queue: named tasks join a ranked line, wait for the
//! head, run, and release it to the next in line.
//!
//! The [`engine`] owns the line and snapshots it to a durable [`storage`]
//! backend (SQLite via [`db`]). The [`server`] exposes it over HTTP and the
//! [`client`] drives the turn-wait protocol against it.

pub mod client;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod server;
pub mod storage;
pub mod telemetry;
