use chat_moderation::StrategyKind;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chat-relay", version, about = "Moderated WebSocket chat relay")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Listen address (overrides PORT and the config file setting)
    #[arg(long)]
    pub listen: Option<String>,

    /// Initial moderation strategy (overrides config file setting)
    #[arg(short, long)]
    pub strategy: Option<StrategyKind>,

    /// Path to a moderation policy file (overrides config file setting)
    #[arg(short, long)]
    pub policy: Option<PathBuf>,
}
