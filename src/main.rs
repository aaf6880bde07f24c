use clap::Parser;
use locally::core::config::{self, LocallyConfig};
use locally::tui;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;

#[derive(Parser)]
#[command(name = "locally", about = "Terminal chat client for a locally hosted model")]
struct Args {
    /// Backend base URL (overrides LOCALLY_BASE_URL and the config file)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Log verbosity written to locally.log
    #[arg(long, default_value_t = LevelFilter::Debug)]
    log_level: LevelFilter,

    /// Show the single-conversation history when starting without a selection
    #[arg(long)]
    legacy_history: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to locally.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Ok(log_file) = File::create("locally.log") {
        let _ = WriteLogger::init(args.log_level, log_config, log_file);
    }

    let file_config = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("Ignoring config file: {}", e);
            LocallyConfig::default()
        }
    };
    let resolved = config::resolve(&file_config, args.base_url.as_deref());

    log::info!("Locally starting up against {}", resolved.base_url);

    tui::run(resolved, args.legacy_history)
}
