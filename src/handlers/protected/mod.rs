// handlers/protected/mod.rs - Protected handlers (session token required)
//
// Mutations validate input, then go through the request bridge and map the
// worker's terminal record onto the response. Listings read directly.

pub mod api_keys;
pub mod auth;
pub mod invitations;
pub mod members;
pub mod organizations;
pub mod rag;
