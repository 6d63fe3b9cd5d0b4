use clap::Parser;
use passkey_vault::cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    passkey_vault::logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Init { migrate } => passkey_vault::cli::commands::init::execute(&cli, migrate),
        Commands::Unlock => passkey_vault::cli::commands::unlock::execute(&cli),
        Commands::Status => passkey_vault::cli::commands::status::execute(&cli),
        Commands::Delete { force } => passkey_vault::cli::commands::delete::execute(&cli, force),
        Commands::Version => passkey_vault::cli::commands::version::execute(),
        Commands::Completions { ref shell } => {
            passkey_vault::cli::commands::completions::execute(shell)
        }
        #[cfg(feature = "audit-log")]
        Commands::Audit {
            last,
            ref since,
            failures,
        } => passkey_vault::cli::commands::audit_cmd::execute(
            &cli,
            last,
            since.as_deref(),
            failures,
        ),
    };

    if let Err(e) = result {
        passkey_vault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
