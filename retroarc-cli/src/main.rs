//! retroarc CLI - extract, modify and repack DOS game data archives.
//!
//! Supported formats: Descent HOG, Wacky Wheels DAT, Hugo DAT, Raptor
//! GLB, PCX Library, Stellar 7 RES, SkyRoads roads, Doofus G-D, plus
//! the Dangerous Dave and Dark Ages in-executable archives.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;

use commands::{cmd_add, cmd_detect, cmd_extract, cmd_info, cmd_list, cmd_remove, cmd_rename};

#[derive(Parser)]
#[command(name = "retroarc")]
#[command(author, version, about = "DOS game archive tool")]
#[command(long_about = "
retroarc reads, modifies and writes the packed data files of DOS-era
games through one uniform interface.

Examples:
  retroarc list descent.hog
  retroarc list --json wacky.dat
  retroarc extract descent.hog -o out/
  retroarc add wacky.dat newtile.dat
  retroarc remove wacky.dat OLDTILE.DAT
  retroarc rename wacky.dat OLD.DAT NEW.DAT
  retroarc detect unknown.bin
  retroarc info raptor.glb
")]
struct Cli {
    /// Force a format instead of auto-detecting (e.g. "hog-descent")
    #[arg(short = 't', long, global = true)]
    format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List contents of an archive
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },

    /// Extract files from an archive
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Include only files matching pattern (glob syntax)
        #[arg(short = 'I', long)]
        include: Vec<String>,

        /// Exclude files matching pattern (glob syntax)
        #[arg(short = 'X', long)]
        exclude: Vec<String>,

        /// Extract the stored bytes without applying any filter
        #[arg(short, long)]
        raw: bool,

        /// Prompt before overwriting existing files
        #[arg(long)]
        prompt: bool,

        /// Show a progress bar
        #[arg(short = 'P', long, default_value = "true")]
        progress: bool,
    },

    /// Add a local file to an archive
    #[command(alias = "a")]
    Add {
        /// Archive file to modify
        archive: PathBuf,

        /// Files to add
        files: Vec<PathBuf>,

        /// Name to store the file under (defaults to its filename)
        #[arg(short, long)]
        name: Option<String>,

        /// Insert before this existing entry instead of appending
        #[arg(short, long)]
        before: Option<String>,
    },

    /// Remove entries from an archive
    #[command(alias = "rm")]
    Remove {
        /// Archive file to modify
        archive: PathBuf,

        /// Entry names to remove
        names: Vec<String>,
    },

    /// Rename an entry
    Rename {
        /// Archive file to modify
        archive: PathBuf,

        /// Current entry name
        from: String,

        /// New entry name
        to: String,
    },

    /// Detect the format of a file
    Detect {
        /// File to probe
        file: PathBuf,
    },

    /// Show information about an archive and its format
    #[command(alias = "i")]
    Info {
        /// Archive file to inspect
        archive: PathBuf,
    },

    /// Generate shell completion scripts
    #[command(hide = true)]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    let format = cli.format.as_deref();

    let result = match cli.command {
        Commands::List {
            archive,
            verbose,
            json,
        } => cmd_list(&archive, format, verbose, json),
        Commands::Extract {
            archive,
            output,
            include,
            exclude,
            raw,
            prompt,
            progress,
        } => cmd_extract(
            &archive, format, &output, &include, &exclude, raw, prompt, progress,
        ),
        Commands::Add {
            archive,
            files,
            name,
            before,
        } => cmd_add(&archive, format, &files, name.as_deref(), before.as_deref()),
        Commands::Remove { archive, names } => cmd_remove(&archive, format, &names),
        Commands::Rename { archive, from, to } => cmd_rename(&archive, format, &from, &to),
        Commands::Detect { file } => cmd_detect(&file),
        Commands::Info { archive } => cmd_info(&archive, format),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "retroarc", &mut io::stdout());
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
