use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};
use treasure_hunter_bot::bot::handlers::{handle_callback, handle_image, handle_text};
use treasure_hunter_bot::config::Settings;
use treasure_hunter_bot::gateway::Gateway;
use treasure_hunter_bot::router::Command;

/// Credential patterns masked in every log line, with their replacements
const SECRET_RULES: &[(&str, &str)] = &[
    // Bot API URLs, including file downloads
    (
        r"(https?://[^/]+/(?:file/)?bot)[0-9]+:[A-Za-z0-9_-]+",
        "${1}[TELEGRAM_TOKEN]",
    ),
    (r"[0-9]{8,10}:[A-Za-z0-9_-]{35}", "[TELEGRAM_TOKEN]"),
    (r"sk-[A-Za-z0-9_-]{16,}", "[OPENAI_KEY]"),
    (r"(?i)(authorization:\s*bearer\s+)[^\s'\x22]+", "${1}[MASKED]"),
];

/// Compiled [`SECRET_RULES`]
struct SecretMask {
    rules: Vec<(Regex, &'static str)>,
}

impl SecretMask {
    fn new() -> Result<Self, regex::Error> {
        let rules = SECRET_RULES
            .iter()
            .map(|(pattern, replacement)| Regex::new(pattern).map(|re| (re, *replacement)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    fn apply(&self, line: &str) -> String {
        self.rules
            .iter()
            .fold(line.to_string(), |acc, (re, replacement)| {
                re.replace_all(&acc, *replacement).into_owned()
            })
    }
}

/// Stderr writer that masks secrets before they leave the process
struct MaskedStderr(Arc<SecretMask>);

impl Write for MaskedStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = self.0.apply(&String::from_utf8_lossy(buf));
        io::stderr().lock().write_all(line.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Patterns must exist before the first log line
    let mask = Arc::new(SecretMask::new().map_err(|e| {
        eprintln!("Failed to compile secret patterns: {e}");
        e
    })?);
    init_logging(mask);

    info!("Starting Treasure Hunter Bot...");

    let settings = init_settings();
    let gateway = Arc::new(Gateway::from_settings(&settings));
    info!(
        model = %settings.openai_model,
        limit = settings.max_requests_per_minute,
        window_secs = settings.rate_limit_window_secs,
        "Gateway initialized"
    );

    let bot = Bot::new(settings.telegram_bot_token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![settings, gateway])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}

fn init_logging(mask: Arc<SecretMask>) {
    let make_writer = move || MaskedStderr(Arc::clone(&mask));
    let debug_mode = std::env::var("DEBUG_MODE").is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_mode {
            EnvFilter::new("treasure_hunter_bot=debug,info")
        } else {
            EnvFilter::new("treasure_hunter_bot=info,warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::filter(|msg: Message| msg.photo().is_some() || msg.document().is_some())
                        .endpoint(handle_image),
                )
                .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text)),
        )
}
