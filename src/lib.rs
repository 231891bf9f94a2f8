//! Pantbrev — digital mortgage deed backend
//!
//! HTTP API for managing mortgage deeds between borrowers, housing
//! cooperatives, and banks, including the multi-party signing workflow.

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod notifications;
pub mod persistence;
