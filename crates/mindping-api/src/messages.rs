use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::debug;

use mindping_types::api::{Claims, UnseenCountResponse};
use mindping_types::events::ServerFrame;
use mindping_types::models::Message;

use crate::auth::AppState;
use crate::error::ApiError;

/// The caller's sent and received messages, newest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state
        .db
        .call(move |db| db.get_messages_for_user(claims.sub))
        .await?;
    Ok(Json(messages))
}

/// Mark one message seen and return the caller's fresh unseen count.
///
/// Only the recipient can flip the flag. Unknown ids and other people's
/// messages are ignored rather than reported.
pub async fn mark_seen(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UnseenCountResponse>, ApiError> {
    let message_id: i64 = message_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid message ID".into()))?;

    let user_id = claims.sub;
    let unseen_count = state
        .db
        .call(move |db| {
            match db.get_message(message_id)? {
                Some(message) if message.recipient_id == user_id => {
                    if db.mark_as_seen(message_id)? {
                        debug!("user {} saw message #{}", user_id, message_id);
                    }
                }
                Some(_) => debug!(
                    "user {} tried to mark message #{} they did not receive",
                    user_id, message_id
                ),
                None => debug!("mark-as-seen for unknown message #{}", message_id),
            }
            db.get_unseen_count(user_id)
        })
        .await?;

    // Keep the caller's open channel, if any, in step with the new count.
    if let Some(channel) = state.registry.lookup(claims.sub).await {
        channel.send(ServerFrame::Notifications {
            count: unseen_count,
        });
    }

    Ok(Json(UnseenCountResponse { unseen_count }))
}
