// handlers/mod.rs - HTTP handlers in two tiers
//
// Public (no session) → Protected (session required). Handlers extract,
// call one service method, and wrap the result in the success envelope.

pub mod protected;
pub mod public;
