//! dog_bot - Telegram bot that finds dogs in photos
//!
//! This daemon:
//! 1. Loads `config/.env` and the bot configuration
//! 2. Loads the detection model once
//! 3. Long-polls Telegram and answers every photo with an annotated copy

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dog_spotter::config::{load_env_file, DEFAULT_ENV_FILE};
use dog_spotter::detect::load_model;
use dog_spotter::telegram::{run_polling, BotHandler, TelegramClient};
use dog_spotter::{Annotator, BotConfig, Detector, Pipeline};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let env_file = std::env::var("DOG_SPOTTER_ENV_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_ENV_FILE));
    if load_env_file(&env_file)? {
        log::info!("loaded environment from {}", env_file.display());
    }

    let config = BotConfig::load()?;
    let token = config
        .bot_token
        .clone()
        .ok_or_else(|| anyhow!("BOT_TOKEN not found, check config/.env"))?;

    let model = load_model(&config.model)?;
    let detector = Detector::new(model).with_target_class(config.model.target_class.clone());
    let annotator = Annotator::from_settings(&config.render, &config.model.target_class)?;
    let handler = BotHandler::new(
        Pipeline::new(detector, annotator),
        config.telegram.max_image_bytes,
    );

    let mut client = TelegramClient::new(
        &config.telegram.api_url,
        &token,
        config.telegram.poll_timeout,
    )?;
    let me = client.get_me()?;
    log::info!(
        "bot started as @{} (looking for '{}')",
        me.username.as_deref().unwrap_or(&me.first_name),
        config.model.target_class
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("dog_bot polling for updates (Ctrl-C to stop)...");
    run_polling(&mut client, &handler, &shutdown)?;
    log::info!("dog_bot stopped");
    Ok(())
}
