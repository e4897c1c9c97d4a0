//! Listing catalog behind the imoveis website: typed listings, shape
//! normalization for drifting API payloads, search/filter/sort, the REST
//! router, admin sessions, WhatsApp contact links and the API client.

pub mod admin;
pub mod catalog;
pub mod client;
pub mod config;
pub mod contact;
pub mod error;
pub mod migration;
pub mod telemetry;
