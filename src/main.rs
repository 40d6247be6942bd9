#[cfg(not(feature = "cli"))]
compile_error!("The `ibdnav` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use ibd::cli;
use ibd::cli::app::{Cli, ColorMode, Commands};
use ibd::IdbError;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let writer_result: Result<Box<dyn Write>, IdbError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| IdbError::Io(format!("Cannot create {}: {}", path, e))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Space {
            file,
            verbose,
            stats,
            json,
        } => cli::space::execute(
            &cli::space::SpaceOptions {
                file,
                verbose,
                stats,
                json,
                frames: cli.frames,
                mmap: cli.mmap,
            },
            &mut writer,
        ),

        Commands::Page { file, page, json } => cli::page::execute(
            &cli::page::PageOptions {
                file,
                page,
                json,
                frames: cli.frames,
                mmap: cli.mmap,
            },
            &mut writer,
        ),

        Commands::Records {
            file,
            page,
            dir,
            json,
        } => cli::records::execute(
            &cli::records::RecordsOptions {
                file,
                page,
                dir,
                json,
                frames: cli.frames,
                mmap: cli.mmap,
            },
            &mut writer,
        ),

        Commands::Scan {
            file,
            root,
            key_len,
            key,
            stats,
            json,
        } => cli::scan::execute(
            &cli::scan::ScanOptions {
                file,
                root,
                key_len,
                key,
                stats,
                json,
                frames: cli.frames,
                mmap: cli.mmap,
            },
            &mut writer,
        ),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "ibdnav", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
