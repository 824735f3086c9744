use clap::Parser;

use temporal_architect::cli::{self, Args, Command};

/// Load .env file. Does not override existing environment variables.
fn load_env() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
}

fn main() {
    load_env();
    init_logging();

    let args = Args::parse();

    let config = match cli::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match args.command {
        Command::Generate {
            before,
            after,
            prompt,
            output,
        } => match cli::run_generate(&config, &before, &after, &prompt, output) {
            Ok(Some(path)) => {
                println!();
                println!("Video ready!");
                println!("  Path: {}", path.display());
            }
            Ok(None) => println!("Generation cancelled."),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Command::Config { action } => {
            cli::handle_config_action(action, &config, args.config.as_deref());
        }
    }
}
