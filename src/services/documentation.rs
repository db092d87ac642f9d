use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Registers the bearer scheme used by player routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Fleet Duel Back.
#[openapi(
    paths(
        crate::routes::health::health,
        crate::routes::identity::authenticate,
        crate::routes::identity::me,
        crate::routes::identity::rename,
        crate::routes::playgrounds::create_playground,
        crate::routes::playgrounds::list_playgrounds,
        crate::routes::playgrounds::get_playground,
        crate::routes::playgrounds::join_playground,
        crate::routes::playgrounds::leave_playground,
        crate::routes::playgrounds::create_challenge,
        crate::routes::playgrounds::list_challenges,
        crate::routes::games::accept_challenge,
        crate::routes::games::reject_challenge,
        crate::routes::games::get_game,
        crate::routes::games::make_move,
        crate::routes::sse::game_stream,
        crate::routes::simulation::simulation_status,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::identity::AuthenticateRequest,
            crate::dto::identity::AuthenticateResponse,
            crate::dto::identity::PlayerProfile,
            crate::dto::identity::RenamePlayerRequest,
            crate::dto::playground::PlaygroundSummary,
            crate::dto::playground::PlaygroundDetail,
            crate::dto::playground::PlaygroundMember,
            crate::dto::playground::JoinResponse,
            crate::dto::playground::LeaveResponse,
            crate::dto::game::CreateChallengeRequest,
            crate::dto::game::ChallengeSummary,
            crate::dto::game::ChallengeRejected,
            crate::dto::game::GameStarted,
            crate::dto::game::GameView,
            crate::dto::game::MakeMoveRequest,
            crate::dto::game::MoveAccepted,
            crate::dto::game::PlayerRef,
            crate::dto::sse::GameStateEvent,
            crate::dto::simulation::SimulationStatus,
            crate::state::tic_tac_toe::TicTacToeState,
            crate::state::tic_tac_toe::Mark,
            crate::state::tic_tac_toe::Winner,
            crate::state::tic_tac_toe::PlayerRole,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "identity", description = "Player authentication and profile"),
        (name = "playgrounds", description = "Playground lifecycle and membership"),
        (name = "games", description = "Challenges and tic-tac-toe play"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "simulation", description = "Simulated player diagnostics"),
    )
)]
pub struct ApiDoc;
