use std::{sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use whisper_core::{
    config::Config,
    persistence::JsonFileSink,
    ports::{AdminNotifier, ResultPresenter},
    service::{Collaborators, WhisperService},
};

use crate::handlers;
use crate::{TelegramLookup, TelegramNotifier, TelegramPresenter};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub service: Arc<WhisperService>,
    pub presenter: Arc<dyn ResultPresenter>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // The username is needed for reveal deep links.
    let me = bot.get_me().await?;
    let bot_username = me.username().to_string();
    tracing::info!(bot = %bot_username, "whisper bot started");
    tracing::info!(
        recency_file = %cfg.recency_file.display(),
        admins = cfg.admin_users.len(),
        notifications = cfg.admin_chat_id.is_some(),
        "configuration loaded"
    );

    let notifier = cfg
        .admin_chat_id
        .map(|id| Arc::new(TelegramNotifier::new(bot.clone(), id)) as Arc<dyn AdminNotifier>);

    let service = Arc::new(
        WhisperService::new(
            cfg.clone(),
            Collaborators {
                lookup: Arc::new(TelegramLookup::new(bot.clone())),
                sink: Arc::new(JsonFileSink::new(cfg.recency_file.clone())),
                notifier,
            },
        )
        .await?,
    );
    let sweeper = service.spawn_sweeper(SWEEP_INTERVAL);

    let state = Arc::new(AppState {
        cfg,
        service,
        presenter: Arc::new(TelegramPresenter::new(bot.clone(), bot_username)),
    });

    let handler = dptree::entry()
        .branch(Update::filter_inline_query().endpoint(handlers::handle_inline_query))
        .branch(Update::filter_chosen_inline_result().endpoint(handlers::handle_chosen_result))
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    sweeper.abort();
    Ok(())
}
