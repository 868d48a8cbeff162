use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::AuditCategory;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::admin::list_winners,
        handlers::admin::create_winner,
        handlers::admin::get_winner,
        handlers::admin::update_winner,
        handlers::admin::delete_winner,
        handlers::admin::claim_winner,
        handlers::admin::unclaim_winner,
        handlers::admin::notify_winner,
        handlers::admin::list_submitters,
        handlers::admin::create_submitter,
        handlers::admin::get_submitter,
        handlers::admin::update_submitter,
        handlers::admin::delete_submitter,
        handlers::admin::add_submission,
        handlers::admin::delete_submission,
        handlers::admin::list_audit,
        handlers::public::winner_board,
    ),
    components(
        schemas(
            WinningEntryResponse,
            PublicWinnerResponse,
            WinnerBoardResponse,
            CreateWinningEntryRequest,
            UpdateWinningEntryRequest,
            NotifyWinnerResponse,
            SubmitterResponse,
            SubmissionResponse,
            CreateSubmitterRequest,
            UpdateSubmitterRequest,
            AddSubmissionRequest,
            AuditRecordResponse,
            AuditCategory,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "admin", description = "Raffle administration API"),
        (name = "public", description = "Public winner board"),
    ),
    info(
        title = "Raffle Tracker API",
        version = "0.1.0",
        description = "Text-in raffle submissions, winner drawing and notification"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
