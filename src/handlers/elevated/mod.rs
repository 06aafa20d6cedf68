// handlers/elevated/mod.rs - Administrator handlers
//
// Mounted behind both the session middleware and the admin role check.

pub mod admin;
