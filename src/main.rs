use anyhow::Result;
use clap::Parser;
use persona_chat::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    persona_chat::run(args).await
}
