use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::session::create_session,
        handlers::session::get_session,
        handlers::session::get_dashboard,
        handlers::session::verify_pin,
        handlers::session::verify_passcode,
        handlers::ticket::create_batch,
        handlers::ticket::claim_batch,
        handlers::ticket::verify_ticket,
        handlers::ticket::mark_claimed,
        handlers::draw::lock,
        handlers::draw::reopen,
        handlers::draw::draw,
        handlers::draw::redraw,
        handlers::draw::confirm_claim,
        handlers::draw::close,
    ),
    components(
        schemas(
            SessionState,
            Language,
            Theme,
            CurrentWinner,
            CreateSessionRequest,
            CreateSessionResponse,
            SessionStatusResponse,
            DashboardResponse,
            VerifyPinRequest,
            VerifyPasscodeRequest,
            ValidResponse,
            HostRequest,
            StateChangeResponse,
            SuccessResponse,
            BatchStatus,
            CreateBatchRequest,
            CreateBatchResponse,
            ClaimBatchRequest,
            ClaimBatchResponse,
            DrawResponse,
            MarkClaimedRequest,
            BatchSummary,
            WinnerSummary,
            CredentialKind,
            QrPayload,
            TicketCredential,
            VerifyResult,
            VerifyTicketRequest,
            VerifyTicketResponse,
            ApiError,
        )
    ),
    tags(
        (name = "session", description = "Raffle session API"),
        (name = "ticket", description = "Ticket batch and verification API"),
        (name = "draw", description = "Draw lifecycle API"),
    ),
    info(
        title = "Live Raffle API",
        version = "1.0.0",
        description = "QR ticket raffle REST API documentation"
    ),
    servers(
        (url = "/api", description = "Local server")
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_all_routes() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.paths.paths.len(), 15);
        assert!(doc.paths.paths.contains_key("/session/{session_id}/confirm-claim"));
    }
}
