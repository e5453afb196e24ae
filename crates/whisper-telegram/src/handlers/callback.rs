use std::sync::Arc;

use teloxide::prelude::*;

use teloxide::requests::Requester as _;

use whisper_core::domain::Requester;

use crate::parse_reveal_callback;
use crate::router::AppState;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let data = q.data.clone().unwrap_or_default();

    // Always answer the callback query, even when the data is not ours.
    let Some(token) = parse_reveal_callback(&data) else {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };

    // Identity comes from the authenticated update, never from callback data.
    let requester = Requester::new(q.from.id.0 as i64, q.from.username.clone());
    let view = state.service.reveal_view(token, &requester).await;

    if let Err(e) = state.presenter.present_disclosure(&cb_id, &view).await {
        tracing::warn!(requester = requester.id.0, error = %e, "failed to answer reveal");
        let _ = bot.answer_callback_query(cb_id).await;
    }
    Ok(())
}
