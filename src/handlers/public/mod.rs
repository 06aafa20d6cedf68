// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition and account registration.

pub mod auth;
