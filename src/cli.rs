use clap::{Args, Parser, Subcommand};

use crate::map::MapMode;

#[derive(Parser, Debug)]
#[command(name = "coreshots", about = "Records map screenshots and turns them into a video", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture and convert recordings
    #[command(subcommand)]
    Record(RecordCommand),
    /// Print the version
    Version,
}

#[derive(Subcommand, Debug)]
pub enum RecordCommand {
    /// Start capturing screenshots until interrupted
    Start {
        #[command(flatten)]
        target: SessionArgs,
        /// Do not compile the video when the recording stops
        #[arg(long)]
        no_compile: bool,
    },
    /// Compile the screenshots of an existing recording into a video
    Convert {
        #[command(flatten)]
        target: SessionArgs,
    },
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Name of the recording, used as the directory and video name
    pub name: String,
    /// Which map screen to look for
    #[arg(short, long, value_parser = parse_mode)]
    pub mode: MapMode,
}

fn parse_mode(value: &str) -> Result<MapMode, String> {
    value.parse::<MapMode>().map_err(|err| err.to_string())
}
