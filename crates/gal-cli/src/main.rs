use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::rc::Rc;

use clap::{Args, Parser, Subcommand};
use gal_core::GalError;
use gal_runtime::{analyse, Manager};

mod files;
mod screen;

use files::DiskFiles;
use screen::{Screen, TerminalOutput};

#[derive(Debug, Parser)]
#[command(name = "gal-cli")]
#[command(about = "Galline script player and checker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play a script interactively in the terminal.
    Run(RunArgs),
    /// Analyse a script's reachability without running it.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    script: String,
}

#[derive(Debug, Args)]
struct CheckArgs {
    script: String,
    /// Print the full position graph, one reachable position per line.
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    };
    std::process::exit(exit_code);
}

fn emit_error(error: GalError) -> i32 {
    eprintln!("error[{}]: {}", error.code, error.message);
    1
}

fn run(cli: Cli) -> Result<i32, GalError> {
    match cli.command {
        Command::Run(args) => run_player(&args.script),
        Command::Check(args) => run_check(&args.script, args.verbose),
    }
}

fn prompt(label: &str) -> Result<Option<String>, GalError> {
    print!("{}", label);
    io::stdout()
        .flush()
        .map_err(|error| GalError::new("STDIO", format!("Cannot flush stdout: {}", error)))?;
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|error| GalError::new("STDIO", format!("Cannot read stdin: {}", error)))?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn run_player(script: &str) -> Result<i32, GalError> {
    let (files, entry) = DiskFiles::for_script(Path::new(script));
    let screen = Rc::new(RefCell::new(Screen::default()));
    let output = TerminalOutput::new(Rc::clone(&screen));
    let mut manager = Manager::new(Box::new(output), Rc::new(files));
    manager.load_file(&entry)?;

    let mut last_part = String::new();
    loop {
        for warning in manager.take_warnings() {
            eprintln!("warning: {}", warning);
        }
        // The terminal cannot actually play media, so a blocking element is
        // treated as finished at once.
        manager.notify_media_ended();
        if let Some(part) = manager.part() {
            if part != last_part {
                last_part = part.to_string();
                println!("== {} ==", last_part);
            }
        }
        if manager.is_exhausted() && !manager.is_blocked() {
            println!("(end)");
            return Ok(0);
        }
        let (choices, awaiting_input) = {
            let screen = screen.borrow();
            (screen.choices.clone(), screen.awaiting_input)
        };
        if !choices.is_empty() {
            let Some(answer) = prompt("choice> ")? else {
                return Ok(0);
            };
            if answer == "q" {
                return Ok(0);
            }
            match answer.parse::<usize>() {
                Ok(number) if (1..=choices.len()).contains(&number) => {
                    let choice = &choices[number - 1];
                    if choice.enabled {
                        manager.choose(choice.case_pos)?;
                    } else {
                        println!("That choice is locked.");
                    }
                }
                _ => println!("Pick a number between 1 and {}.", choices.len()),
            }
        } else if awaiting_input {
            let Some(answer) = prompt("input> ")? else {
                return Ok(0);
            };
            manager.submit_input(&answer)?;
        } else {
            let Some(answer) = prompt("> ")? else {
                return Ok(0);
            };
            match answer.as_str() {
                "" => manager.next()?,
                "back" => manager.previous()?,
                "q" => return Ok(0),
                _ => println!("Enter to continue, 'back' to rewind, 'q' to quit."),
            }
        }
    }
}

fn run_check(script: &str, verbose: bool) -> Result<i32, GalError> {
    let (files, entry) = DiskFiles::for_script(Path::new(script));
    let mut analyser = analyse(&entry, Rc::new(files))?;
    if verbose {
        println!("{}", analyser.summary());
    }
    let analysed = analyser
        .analysed_files()
        .iter()
        .map(|file| file.to_string())
        .collect::<Vec<_>>();
    let mut clean = true;
    for file in analysed {
        let unreachable = analyser.unreachable_lines(&file)?;
        if unreachable.is_empty() {
            continue;
        }
        clean = false;
        println!(
            "{}: unreachable lines: {}",
            file,
            unreachable
                .iter()
                .map(|line| (line + 1).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if clean {
        println!("No unreachable lines.");
        Ok(0)
    } else {
        Ok(1)
    }
}
