/// OpenAPI documentation generation.
pub mod documentation;
/// Challenges, games and move validation.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Player authentication and profile management.
pub mod identity_service;
/// Playground lifecycle and membership.
pub mod playground_service;
/// Background simulation wiring.
pub mod simulation_service;
/// Server-Sent Events streaming service.
pub mod sse_service;
