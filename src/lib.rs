mod assets;
pub mod cli;
pub mod map;
pub mod recorder;
pub mod sensing;
pub mod settings;
pub mod store;
pub mod utils;
pub mod video;

use clap::Parser;
use cli::{Cli, Command, RecordCommand};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

pub fn run() {
    // Initialize logging (RUST_LOG overrides the default level)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if matches!(cli.command, Command::Version) {
        println!("coreshots {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            log_error!("failed to start the async runtime"; err = err);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Command::Record(RecordCommand::Start { target, no_compile }) => {
                recorder::record_start(&target.name, target.mode, no_compile).await
            }
            Command::Record(RecordCommand::Convert { target }) => {
                recorder::record_convert(&target.name, target.mode).await
            }
            Command::Version => Ok(()),
        }
    });

    if let Err(err) = result {
        log_error!("{err:#}");
        std::process::exit(1);
    }
}
