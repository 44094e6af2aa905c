use clap::Parser;
use gatehouse::cli::{completions, delete, list, pull, run, status, stop, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Serve(args) => gatehouse::cli::serve::run(args).await,
        Commands::Status(args) => status::run(&args).await,
        Commands::Stop(args) => stop::run(&args).await,
        Commands::List(args) => list::run(&args).await,
        Commands::Pull(args) => pull::run(&args).await,
        Commands::Delete(args) => delete::run(&args).await,
        Commands::Run(args) => run::run(&args).await,
        Commands::Completions(args) => {
            completions::run(&args);
            0
        }
    };

    std::process::exit(exit_code);
}
