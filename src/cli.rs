use clap::{Args, CommandFactory, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "webpane", version = crate::version::APP_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Open(OpenArgs),
    Echo(EchoArgs),
}

#[derive(Args)]
struct OpenArgs {
    #[arg(value_name = "URL")]
    url: String,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long, value_name = "DIR")]
    documents_dir: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    profile: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    chrome: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    headless: bool,
    #[arg(
        long,
        default_value_t = false,
        help = "Do not open saved downloads in the system viewer."
    )]
    no_preview: bool,
    #[arg(
        long,
        default_value_t = false,
        help = "Do not read session commands from stdin; wait for the window to close."
    )]
    no_input: bool,
}

#[derive(Args)]
struct EchoArgs {
    #[arg(value_name = "VALUE")]
    value: String,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Open(args)) => run_open(args),
        Some(Commands::Echo(args)) => run_echo(args),
        None => print_usage(),
    }
}

fn run_open(args: OpenArgs) -> Result<(), Box<dyn Error>> {
    let url = crate::require_valid_url(&args.url)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;

    let config = crate::webview::WebviewConfig {
        url,
        debug: args.debug,
        documents_dir: args.documents_dir,
        profile_dir: args.profile,
        chrome_binary: args.chrome,
        headless: args.headless,
        preview: !args.no_preview,
        interactive: !args.no_input,
    };
    crate::webview::run_webview(config)
}

fn run_echo(args: EchoArgs) -> Result<(), Box<dyn Error>> {
    let response = crate::echo(&args.value);
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

fn print_usage() -> Result<(), Box<dyn Error>> {
    Cli::command().print_help()?;
    Ok(())
}
