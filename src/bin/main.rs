use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use recswitch::config::{parse_target, Config};
use recswitch::Diagnostic;

#[derive(Parser)]
#[command(name = "recswitch")]
#[command(about = "Compiles Java records and switch expressions to class files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .java file, or every .java file under a directory
    Compile {
        /// Input file or directory
        #[arg(value_name = "FILE|DIR")]
        input: PathBuf,

        /// Output directory for .class files
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Class file version: a major version (61) or a release (17)
        #[arg(long, value_name = "VERSION")]
        target: Option<String>,

        /// Emit SourceFile and LineNumberTable
        #[arg(short = 'g', long)]
        debug: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Report diagnostics without generating classes
    Check {
        /// Input .java file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Commands::Compile { verbose: true, .. });
    let mut logger = env_logger::Builder::from_default_env();
    if verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    match &cli.command {
        Commands::Compile { input, output, target, debug, verbose } => {
            let mut config = Config::from_env()?;
            if let Some(target) = target {
                config.target_major = parse_target(target)?;
            }
            config.debug |= *debug;
            compile(input, output.as_deref(), &config, *verbose)
        }
        Commands::Check { input } => check(input),
    }
}

fn java_sources(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", input.display()))?;
        if entry.file_type().is_file() && entry.path().extension().map_or(false, |e| e == "java") {
            files.push(entry.into_path());
        }
    }
    if files.is_empty() {
        bail!("no .java files under {}", input.display());
    }
    Ok(files)
}

fn print_diagnostics(file: &Path, diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        eprintln!("{}:{}", file.display(), d);
    }
}

fn compile(input: &Path, output: Option<&Path>, config: &Config, verbose: bool) -> Result<()> {
    let output_dir = output.unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(output_dir).with_context(|| format!("creating {}", output_dir.display()))?;

    let mut failed = 0;
    for file in java_sources(input)? {
        if verbose {
            println!("Compiling {}...", file.display());
        }
        let result = recswitch::compile_file(&file, output_dir, config)
            .with_context(|| format!("compiling {}", file.display()))?;
        print_diagnostics(&file, &result.diagnostics);
        if result.has_errors() {
            failed += 1;
        } else if verbose {
            for class in &result.classes {
                println!("  wrote {}", output_dir.join(class.relative_path()).display());
            }
        }
    }
    if failed > 0 {
        bail!("{} file(s) had errors", failed);
    }
    if verbose {
        println!("Compilation successful! Output directory: {}", output_dir.display());
    }
    Ok(())
}

fn check(input: &Path) -> Result<()> {
    let source = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let diagnostics = recswitch::check(&source);
    print_diagnostics(input, &diagnostics);
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    if errors > 0 {
        bail!("{} error(s)", errors);
    }
    Ok(())
}
