use axum::Json;
use axum::extract::{Form, State};
use mellon_application::InteractionCallback;
use mellon_core::{AppError, PrincipalIdentity};
use tracing::warn;

use crate::dto::{
    InteractionForm, InteractionResponse, SlackInteractionPayload, SlashCommandForm,
    SlashCommandResponse,
};
use crate::state::AppState;

const MISSING_INTENT_TEXT: &str =
    "🛡️ *Mellon:* Speak 'friend' and enter. (Please provide a reason or Ticket ID.)";
const UNKNOWN_REQUESTER_TEXT: &str =
    "🛡️ *Mellon:* I could not tell who is asking. Please run the command from your own account.";

/// Slash command intake. Always answers immediately; classification runs afterwards.
pub async fn slash_command_handler(
    State(state): State<AppState>,
    Form(form): Form<SlashCommandForm>,
) -> Json<SlashCommandResponse> {
    let text = form.text.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Json(SlashCommandResponse::ephemeral(MISSING_INTENT_TEXT));
    }

    let login = form
        .user_name
        .as_deref()
        .or(form.user_id.as_deref())
        .unwrap_or_default();
    let requester =
        match PrincipalIdentity::qualified(login, state.principal_login_domain.as_deref()) {
            Ok(requester) => requester,
            Err(error) => {
                warn!(error = %error, "slash command without a usable requester identity");
                return Json(SlashCommandResponse::ephemeral(UNKNOWN_REQUESTER_TEXT));
            }
        };

    match state.orchestrator.submit(requester, text).await {
        Ok(_) => Json(SlashCommandResponse::ephemeral(format!(
            "🪄 *Mellon* is consulting the lore regarding: _{text}_..."
        ))),
        Err(AppError::Validation(_)) => Json(SlashCommandResponse::ephemeral(MISSING_INTENT_TEXT)),
        Err(error) => {
            warn!(error = %error, "failed to record access request");
            Json(SlashCommandResponse::ephemeral(format!(
                "⚠️ *Mellon:* your request could not be recorded ({error}). Please try again."
            )))
        }
    }
}

/// Interactive button callbacks from the approval message.
pub async fn interactions_handler(
    State(state): State<AppState>,
    Form(form): Form<InteractionForm>,
) -> Json<InteractionResponse> {
    let callback = match form
        .payload
        .as_deref()
        .map(serde_json::from_str::<SlackInteractionPayload>)
    {
        Some(Ok(payload)) => InteractionCallback::from(payload),
        Some(Err(error)) => {
            warn!(error = %error, "unreadable interaction payload");
            InteractionCallback::default()
        }
        None => InteractionCallback::default(),
    };

    let reply = state.approval_gateway.handle_callback(callback).await;
    Json(InteractionResponse::from(reply))
}
