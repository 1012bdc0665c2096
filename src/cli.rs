use clap::Parser;

#[derive(Parser)]
#[command(name = "larbin")]
#[command(author, version)]
#[command(about = "A Rust-powered DLive chat-relay bot.")]
pub struct Cli {
    #[arg(short = 'i', long)]
    pub clientid: String,
    #[arg(short = 's', long)]
    pub clientsecret: String,
    #[arg(short = 'c', long)]
    pub channel: String,
    #[arg(short = 'u', long = "bot-user")]
    pub bot_user: Option<String>,
    #[arg(long)]
    pub redirect: Option<String>,
    #[arg(long)]
    pub code: Option<String>,
    #[arg(long)]
    pub store: Option<String>,
    #[arg(long = "env-store")]
    pub env_store: Option<String>,
    #[arg(long = "memory-store")]
    pub memory_store: bool,
    #[arg(long)]
    pub reauth: bool,
    #[arg(short = 'o', long = "options-file")]
    pub options_file: Option<String>,
}
