use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_DIRECTORY: &str = "./logs";
const LOG_FILE_PREFIX: &str = "tillvault.log";

// The appender guard has to outlive the process or buffered lines are lost.
static APPENDER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub struct Logging;

impl Logging {
    pub fn initialize() {
        let file_appender = tracing_appender::rolling::daily(LOG_DIRECTORY, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = APPENDER_GUARD.set(guard);

        let env_filter =
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(fmt::layer().with_ansi(false).with_writer(file_writer))
            .init();

        log_panics::init();
    }
}
