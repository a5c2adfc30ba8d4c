//! Value sources shipped with the core crate
//!
//! Network-backed sources live in their own crates (see
//! `managed-dns-ip-http`).

pub mod static_ip;

pub use static_ip::{StaticSource, StaticSourceFactory};

use crate::registry::Registry;

/// Register the built-in sources under their type names
pub fn register(registry: &mut Registry) {
    registry.register_source("static", Box::new(StaticSourceFactory));
}
