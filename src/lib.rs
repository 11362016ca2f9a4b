// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational JWT Guard - Multi-guard JWT authentication
//!
//! Issues and verifies signed JWTs for several independent guards that share
//! one token manager. Each token is bound to the guard that issued it through
//! the `grd` claim, and its `aud` claim can select a per-audience
//! configuration override (keys, algorithm, TTLs, required claims).
//!
//! ## Modules
//!
//! - `auth` - Token manager, guards, and the Axum boundary
//! - `api` - Demo HTTP API handlers (Axum)
//! - `config` - Settings loaded from JSON and the environment
//! - `state` - Shared application state

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
