use std::io::{self, BufRead, Write};
use std::process;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use log::debug;

use ccr_toolkit::task::{TaskArgs, TaskDescriptor, TaskRegistry};

#[derive(Parser)]
#[command(name = "ccr-toolkit")]
#[command(about = "Spreadsheet tasks for customer-complaint reports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available tasks and their parameters
    List,

    /// Run one task
    Run {
        /// Task id, as shown by `list`
        task: String,

        /// Task parameter as name=value; repeat for each parameter
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Ask on stdin for every parameter not given with --param
        #[arg(short, long)]
        interactive: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let registry = TaskRegistry::builtin()?;

    match cli.command {
        Commands::List => {
            for task in registry.iter() {
                println!("{}  {}", task.id, task.title);
                for p in task.params {
                    let req = if p.required { "required" } else { "optional" };
                    println!("    {:<18} {:<5} {req}  {}", p.name, p.kind, p.prompt);
                }
            }
            Ok(())
        }
        Commands::Run {
            task,
            params,
            interactive,
            json,
        } => {
            let Some(descriptor) = registry.get(&task) else {
                bail!("unknown task '{task}'; run `ccr-toolkit list` to see the available tasks");
            };
            let mut args: TaskArgs = params.into_iter().collect();
            if interactive {
                prompt_for_unset(descriptor, &mut args)?;
            }
            debug!("running '{}' with {args:?}", descriptor.id);

            let outcome = descriptor.run(&args);
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if outcome.success {
                println!("{}", outcome.message);
            } else {
                eprintln!("{}", outcome.message);
            }
            if !outcome.success {
                process::exit(1);
            }
            Ok(())
        }
    }
}

fn prompt_for_unset(task: &TaskDescriptor, args: &mut TaskArgs) -> anyhow::Result<()> {
    let unset: Vec<_> = task.unset_params(args).copied().collect();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    for p in unset {
        print!("{}", p.prompt);
        io::stdout().flush().context("failed to flush stdout")?;
        let line = lines
            .next()
            .ok_or_else(|| anyhow!("stdin closed while asking for '{}'", p.name))?
            .context("failed to read stdin")?;
        args.insert(p.name.to_string(), line);
    }
    Ok(())
}
