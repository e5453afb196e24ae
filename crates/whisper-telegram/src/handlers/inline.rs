use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{ChosenInlineResult, InlineQuery},
};

use whisper_core::domain::UserId;

use crate::router::AppState;

pub async fn handle_inline_query(
    _bot: Bot,
    q: InlineQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let sender = UserId(q.from.id.0 as i64);
    let answer = state.service.handle_inline_query(sender, &q.query).await;

    if let Err(e) = state.presenter.present_results(&q.id, answer).await {
        tracing::warn!(sender = sender.0, error = %e, "failed to answer inline query");
    }
    Ok(())
}

/// Telegram reports which result was posted (requires inline feedback enabled
/// in BotFather). The result id of a whisper is its delivery token.
pub async fn handle_chosen_result(
    _bot: Bot,
    r: ChosenInlineResult,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let sender = UserId(r.from.id.0 as i64);
    state
        .service
        .handle_chosen_result(sender, &r.result_id)
        .await;
    Ok(())
}
