pub mod game;
pub mod health;
pub mod identity;
pub mod playground;
pub mod simulation;
pub mod sse;
pub mod validation;
