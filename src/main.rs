use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ivr_relay::args::Args;
use ivr_relay::audio::Ffmpeg;
use ivr_relay::clock::ZonedClock;
use ivr_relay::config::{Secrets, load_settings};
use ivr_relay::pipeline::Pipeline;
use ivr_relay::rules::{JsonRuleStore, RuleStore};
use ivr_relay::telegram::TelegramClient;
use ivr_relay::text::TextNormalizer;
use ivr_relay::tts::GoogleTts;
use ivr_relay::upload::YemotUploader;
use ivr_relay::worker::PipelineQueue;
use ivr_relay::{bot, keep_alive};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting IVR relay");

    let (config_path, explicit) = args.config_path();
    let settings = load_settings(&config_path, explicit)?;
    info!(path = %config_path.display(), explicit, "Configuration loaded");

    let secrets = match Secrets::from_env() {
        Ok(secrets) => secrets,
        Err(e) => {
            error!(error = %e, "Cannot start without credentials");
            return Err(e.into());
        }
    };

    let channels = settings.channel_map()?;
    info!(channels = channels.len(), "Channels configured");

    if settings.keep_alive.enabled {
        let addr = settings.keep_alive.bind;
        tokio::spawn(async move {
            if let Err(e) = keep_alive::serve(addr).await {
                error!(error = %e, "Keep-alive endpoint stopped");
            }
        });
    }

    let rules: Arc<dyn RuleStore> = Arc::new(JsonRuleStore::new(
        &settings.storage.blacklist_file,
        &settings.storage.replacements_file,
    ));

    let telegram = Arc::new(TelegramClient::new(
        secrets.bot_token.clone(),
        settings.telegram.api_base.clone(),
        Duration::from_secs(settings.telegram.request_timeout_secs),
    )?);
    let tts = GoogleTts::new(
        secrets.google_api_key.clone(),
        settings.tts.endpoint.clone(),
        settings.voice.clone(),
        Duration::from_secs(settings.tts.timeout_secs),
    )?;
    let uploader = YemotUploader::new(
        secrets.ymot_token.clone(),
        settings.upload.endpoint.clone(),
        Duration::from_secs(settings.upload.timeout_secs),
    )?;
    let transcoder = &settings.transcoder;
    let ffmpeg = Ffmpeg::new(
        &transcoder.ffmpeg,
        &transcoder.ffprobe,
        transcoder.sample_rate,
        transcoder.channels,
    );

    let pipeline = Pipeline::new(
        channels,
        TextNormalizer::new(Arc::clone(&rules)),
        Arc::new(ZonedClock::new(settings.tz()?)),
        Arc::new(tts),
        Arc::new(ffmpeg),
        telegram.clone(),
        Arc::new(uploader),
        settings.audio.clone(),
        settings.storage.work_dir.clone(),
    );

    let (queue, worker) = PipelineQueue::spawn(
        Arc::new(pipeline),
        rules,
        telegram.clone(),
        settings.queue_capacity,
    );

    let result = bot::run(
        &telegram,
        &queue,
        &settings.telegram.admin_ids,
        settings.poll_timeout(),
        settings.retry_backoff(),
    )
    .await;

    queue.shutdown(worker).await;
    result
}
