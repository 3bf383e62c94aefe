mod commands;

use arpy_core::BuildOptions;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_ARCHIVE_ERROR, EXIT_FAILURE, EXIT_MANIFEST_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "arpy",
    version,
    about = "Package source trees into single-file archives and run them in place"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Package a source directory into an archive.
    Build {
        /// Project source directory.
        source: PathBuf,
        /// Output archive path (defaults to <source-dir-name>.arpy in the current directory).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Project name.
        #[arg(short, long)]
        name: Option<String>,
        /// Project version.
        #[arg(short = 'v', long = "version")]
        version: Option<String>,
        /// Dotted name of the entry module.
        #[arg(short, long)]
        main: Option<String>,
        /// Author recorded in the manifest.
        #[arg(short, long)]
        author: Option<String>,
        /// Description recorded in the manifest.
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Run an archive's entry module.
    Run {
        /// Archive to run.
        archive: PathBuf,
        /// Arguments passed to the program as sys.argv[1:].
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show an archive's manifest, modules and packages.
    List {
        /// Archive to inspect.
        archive: PathBuf,
    },
    /// Unpack an archive into a directory.
    Extract {
        /// Archive to unpack.
        archive: PathBuf,
        /// Destination directory (defaults to the archive name without extension).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Recompute an archive's checksum and compare it with the manifest.
    Verify {
        /// Archive to verify.
        archive: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ARPY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;

    let result = match cli.command {
        Commands::Build {
            source,
            output,
            name,
            version,
            main,
            author,
            description,
        } => commands::build::run(
            &source,
            &BuildOptions {
                output,
                name,
                version,
                main,
                author,
                description,
            },
            json_output,
        ),
        Commands::Run { archive, args } => commands::run::run(&archive, &args),
        Commands::List { archive } => commands::list::run(&archive, json_output),
        Commands::Extract { archive, output } => {
            commands::extract::run(&archive, output.as_deref(), json_output)
        }
        Commands::Verify { archive } => commands::verify::run(&archive, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn exit_code_for(msg: &str) -> u8 {
    const MANIFEST_PREFIXES: [&str; 5] = [
        "manifest error:",
        "failed to parse manifest",
        "failed to read manifest",
        "failed to parse project config",
        "invalid project config",
    ];
    const ARCHIVE_PREFIXES: [&str; 4] = ["archive", "not found:", "not a directory:", "ambiguous layout:"];

    if MANIFEST_PREFIXES.iter().any(|p| msg.starts_with(p)) {
        EXIT_MANIFEST_ERROR
    } else if ARCHIVE_PREFIXES.iter().any(|p| msg.starts_with(p)) {
        EXIT_ARCHIVE_ERROR
    } else {
        EXIT_FAILURE
    }
}
