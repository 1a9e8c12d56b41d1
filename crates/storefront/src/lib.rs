//! PetFun Storefront library.
//!
//! This crate provides the storefront backend as a library, allowing it to
//! be tested and reused: catalog reads, the session/user-bound cart
//! aggregate, and the checkout pipeline that reconciles the cart against
//! live inventory, verifies a card-payment authorization, and atomically
//! materializes an immutable order.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
