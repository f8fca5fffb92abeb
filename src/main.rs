use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

mod commands;

/// rigpm - Package image resolver for plugin-based test-automation runtimes
#[derive(Parser)]
#[command(name = "rigpm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work with package images
    Image {
        #[command(subcommand)]
        action: ImageAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ImageAction {
    /// Resolve an image document and record the result for deployment
    Install {
        /// Path to an image document, or an inline name[:version] list
        image: String,

        /// Merge with the current installation instead of replacing it
        #[arg(long)]
        merge: bool,

        /// Never prompt; assume yes
        #[arg(long)]
        non_interactive: bool,

        /// Target operating system (defaults to the image, then the host)
        #[arg(long = "OS", alias = "os")]
        os: Option<String>,

        /// Target CPU architecture (defaults to the image, then the host)
        #[arg(long = "Architecture", alias = "architecture")]
        architecture: Option<String>,

        /// Print the resolved versions without writing the lock document
        #[arg(long)]
        dry_run: bool,

        /// Additional repository location (repeatable, wins over the image's own)
        #[arg(long)]
        repository: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Image { action } => match action {
            ImageAction::Install {
                image,
                merge,
                non_interactive,
                os,
                architecture,
                dry_run,
                repository,
            } => commands::image::run_install(
                image,
                merge,
                non_interactive,
                os,
                architecture,
                dry_run,
                repository,
            ),
        },
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "rigpm", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = e
            .downcast_ref::<rigpm::Error>()
            .map(|err| if err.is_dependency_error() { 2 } else { 1 })
            .unwrap_or(1);
        std::process::exit(code);
    }
}
