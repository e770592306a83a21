use crate::demo::{print_thinking_tasks, run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use school_admissions::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "School Admissions",
    about = "Run or demonstrate the school admissions service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk two learners through intake, payment and placement against an in-memory store
    Demo(DemoArgs),
    /// Print the thinking task scheduled for each observation day
    Tasks,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Tasks => {
            print_thinking_tasks();
            Ok(())
        }
    }
}
