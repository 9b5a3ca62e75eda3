// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use standalone_engine::BuildMode;
use standalone_engine::json::Project;

#[derive(Parser, Debug)]
#[command(name = "standalone", version, about = "Generate and build standalone C++ projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Emit the project, then compile and optionally run it
    Build {
        /// project description in JSON
        project: PathBuf,
        /// directory to write the C++ project to
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// only write the sources
        #[arg(long)]
        no_compile: bool,
        /// run the binary after compiling it
        #[arg(long)]
        run: bool,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// capture the binary's output instead of streaming it
        #[arg(long)]
        quiet: bool,
        /// argument passed to the binary, may be repeated
        #[arg(long = "run-arg")]
        run_args: Vec<String>,
    },
    /// Print the C++ source of every code object
    Translate { project: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Debug,
    Native,
    Plain,
}

impl From<Mode> for BuildMode {
    fn from(mode: Mode) -> BuildMode {
        match mode {
            Mode::Debug => BuildMode::Debug,
            Mode::Native => BuildMode::Native,
            Mode::Plain => BuildMode::Plain,
        }
    }
}

fn load(path: &PathBuf) -> Result<Project> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Project::from_str(&contents).with_context(|| format!("loading {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Build {
            project,
            output_dir,
            no_compile,
            run,
            mode,
            quiet,
            run_args,
        } => {
            let path = project;
            let project = load(&path)?;
            let mut options = project.build.clone();
            if let Some(dir) = output_dir {
                options.project_dir = dir;
            }
            if no_compile {
                options.compile = false;
            }
            if run {
                options.run = true;
            }
            if let Some(mode) = mode {
                options.mode = mode.into();
            }
            if quiet {
                options.with_output = false;
            }
            if !run_args.is_empty() {
                options.run_args = run_args;
            }

            let mut device = project.into_device()?;
            let report = device.build(&options)?;
            info!(
                "{} files written, {} unchanged",
                report.written.len(),
                report.unchanged.len()
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Translate { project } => {
            let device = load(&project)?.into_device()?;
            for co in device.code_objects() {
                println!("// {}.cpp", co.name);
                println!("{}", co.source()?);
            }
        }
    }

    Ok(())
}
