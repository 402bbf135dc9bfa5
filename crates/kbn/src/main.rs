mod server;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use kbn_core::{
    bot::NewsBot,
    config::Config,
    fetch::HttpFetcher,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    poller::run_poll_loop,
    report::ReportMailer,
    translate::TranslationPrompt,
};
use kbn_openai::OpenAiTranslator;
use kbn_smtp::SmtpMailer;
use kbn_sqlite::SqliteNewsStore;
use kbn_telegram::TelegramMessenger;

use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kbn_core::logging::init("kbn")?;

    let cfg = Config::load()?;
    let news = Arc::new(build_news_bot(&cfg).await?);
    let report = Arc::new(ReportMailer::new(
        cfg.smtp.complete(),
        Arc::new(SmtpMailer::new()),
    ));
    if cfg.smtp.complete().is_none() {
        warn!("SMTP is not fully configured; /report will answer 500");
    }

    let cancel = CancellationToken::new();

    let poll_task = match cfg.poll_loop_interval {
        Some(every) => match news.poller() {
            Ok(poller) => {
                info!(every_secs = every.as_secs(), "starting source poll loop");
                Some(tokio::spawn(run_poll_loop(
                    Arc::new(poller),
                    every,
                    cancel.clone(),
                )))
            }
            Err(e) => {
                warn!("poll loop disabled: {e}");
                None
            }
        },
        None => None,
    };

    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        stop.cancel();
    });

    server::serve(&cfg.http_bind, AppState { news, report }, cancel.clone()).await?;

    cancel.cancel();
    if let Some(task) = poll_task {
        let _ = task.await;
    }
    Ok(())
}

async fn build_news_bot(cfg: &Config) -> anyhow::Result<NewsBot> {
    let mut bot = NewsBot::new(Arc::new(HttpFetcher::new(cfg.fetch_timeout)?));

    if let Some(key) = &cfg.openai_api_key {
        let translator = OpenAiTranslator::new(
            key.clone(),
            cfg.openai_base_url.clone(),
            cfg.openai_model.clone(),
            TranslationPrompt::new(cfg.source_language.clone(), cfg.target_language.clone()),
            cfg.translate_timeout,
        )?;
        bot = bot.with_translator(Arc::new(translator));
    }

    if let Some(token) = &cfg.telegram_bot_token {
        let telegram = TelegramMessenger::from_token(token);
        if let Some(url) = &cfg.telegram_webhook_url {
            if let Err(e) = telegram.register_webhook(url).await {
                warn!("webhook registration failed: {e}");
            }
        }
        let inner: Arc<dyn MessagingPort> = Arc::new(telegram);
        bot = bot.with_messenger(Arc::new(ThrottledMessenger::new(
            inner,
            ThrottleConfig::default(),
        )));
    }

    if let Some(path) = &cfg.database_path {
        bot = bot.with_store(Arc::new(SqliteNewsStore::open(path)?));
        match (&cfg.moderator_chat, &cfg.channel) {
            (Some(moderator), Some(channel)) => {
                bot = bot.with_moderation(moderator.clone(), channel.clone());
            }
            _ => warn!("MODERATOR_CHAT_ID and TELEGRAM_CHANNEL_ID are required for moderation"),
        }
    }

    info!(
        translator = cfg.openai_api_key.is_some(),
        telegram = cfg.telegram_bot_token.is_some(),
        store_backed = bot.is_store_backed(),
        "news bot configured"
    );
    Ok(bot)
}
