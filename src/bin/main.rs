use clap::{Parser, Subcommand};
use dotenv::dotenv;

use thinkup::{app::*, error::*};

#[derive(Parser, Debug)]
#[command(name = "thinkup", version, about = "ThinkUp article backend")]
struct Cli {
  /// Config file, replaces conf/<RUN_MODE> and environment overrides.
  #[arg(short, long)]
  config: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run the http servers (default).
  Serve,
  /// Print a bearer token for a user id.
  Token {
    user_id: String,
    /// Days until the token expires.
    #[arg(long, default_value_t = 21)]
    days: i64,
  },
}

fn main() -> Result<()> {
  dotenv().ok();
  env_logger::init();

  let cli = Cli::parse();

  let config = AppConfig::new(cli.config.as_deref())?;

  match cli.command {
    Some(Command::Token { user_id, days }) => token::execute(config, &user_id, days)?,
    // default to 'serve' command.
    Some(Command::Serve) | None => serve::execute(config)?,
  }
  log::info!("Main finished");
  Ok(())
}
