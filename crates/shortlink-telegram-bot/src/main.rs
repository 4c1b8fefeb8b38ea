use dotenvy::dotenv;
use regex::Regex;
use shortlink_core::config::CoreSettings;
use shortlink_transport_telegram::config::{BotSettings, TelegramSettings};
use shortlink_transport_telegram::runner::run_bot;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting secrets from log output
struct RedactionPatterns {
    bot_url_token: Regex,
    bare_token: Regex,
    bot_prefixed_token: Regex,
    shortener_api_param: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bot_url_token: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            bare_token: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            bot_prefixed_token: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            shortener_api_param: Regex::new(r"([?&]api=)[^&\s]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self
            .bot_url_token
            .replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self
            .bare_token
            .replace_all(&output, "[TELEGRAM_TOKEN]");
        let output = self
            .bot_prefixed_token
            .replace_all(&output, "$1[TELEGRAM_TOKEN]");
        self.shortener_api_param
            .replace_all(&output, "$1[MASKED]")
            .into_owned()
    }
}

/// Writer that masks secrets before passing each log line on.
struct RedactingWriter<W> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = self.patterns.redact(&String::from_utf8_lossy(buf));
        self.inner.write_all(redacted.as_bytes())?;
        // Report the caller's length, the redacted line may be shorter or longer
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Wraps any `MakeWriter` so every writer it hands out redacts.
struct Redacting<M> {
    inner: M,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, M> MakeWriter<'a> for Redacting<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: self.inner.make_writer(),
            patterns: Arc::clone(&self.patterns),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Compiled before logging so nothing is written unredacted
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Shortlink TG Bot...");

    let settings = init_settings();

    run_bot(settings).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = Redacting {
        inner: io::stderr,
        patterns,
    };

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "shortlink_core=info,shortlink_transport_telegram=info,shortlink_telegram_bot=info,teloxide=warn,hyper=warn,h2=error,reqwest=warn,tokio=warn,tower=warn,axum=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let core_settings = match CoreSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load shortener configuration: {}", e);
            std::process::exit(1);
        }
    };
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully.");
    Arc::new(BotSettings::new(core_settings, telegram_settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tracing_subscriber::prelude::*;

    fn patterns() -> RedactionPatterns {
        RedactionPatterns::new().expect("patterns compile")
    }

    #[test]
    fn test_redacts_telegram_token_in_api_url() {
        let line = "error sending request for url (https://api.telegram.org/bot123456789:AAEhBP0av28fakefakefakefakefakefake1/getMe)";
        let redacted = patterns().redact(line);
        assert!(!redacted.contains("AAEhBP0av28"));
        assert!(redacted.contains("[TELEGRAM_TOKEN]"));
    }

    #[test]
    fn test_redacts_shortener_api_param() {
        let line = "GET https://shortner.in/api?api=startoken123&url=https%3A%2F%2Fexample.com&format=text";
        let redacted = patterns().redact(line);
        assert!(!redacted.contains("startoken123"));
        assert!(redacted.contains("?api=[MASKED]&url="));
    }

    #[test]
    fn test_leaves_plain_lines_alone() {
        let line = "Token store initialized (3 users).";
        assert_eq!(patterns().redact(line), line);
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().expect("lock").clone()).expect("utf8")
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_reports_full_length() {
        let sink = SharedBuf::default();
        let make_writer = Redacting {
            inner: {
                let sink = sink.clone();
                move || sink.clone()
            },
            patterns: Arc::new(patterns()),
        };
        let line = b"?api=secret-token-value&format=text";
        assert_eq!(make_writer.make_writer().write(line).expect("write"), line.len());
        assert_eq!(sink.contents(), "?api=[MASKED]&format=text");
    }

    #[test]
    fn test_subscriber_output_is_redacted() {
        let sink = SharedBuf::default();
        let make_writer = Redacting {
            inner: {
                let sink = sink.clone();
                move || sink.clone()
            },
            patterns: Arc::new(patterns()),
        };
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(make_writer),
        );

        tracing::subscriber::with_default(subscriber, || {
            info!("GET https://shortner.in/api?api=startoken123&url=x&format=text");
        });

        let output = sink.contents();
        assert!(output.contains("?api=[MASKED]&url=x"), "{output}");
        assert!(!output.contains("startoken123"));
    }
}
