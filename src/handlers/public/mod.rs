// handlers/public/mod.rs - Handlers reachable without a session
//
// Service info, health and the two ways to obtain a session: logging in
// and self-registration.

pub mod auth;
pub mod system;
