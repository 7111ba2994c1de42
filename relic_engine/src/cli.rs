use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use relic_engine::Flavor;
use relic_engine::engine::MIN_STORE_SIZE;

#[derive(Parser, Debug)]
#[command(about = "Runs compiled or JSON scripts through a Relic interpreter", version)]
pub struct Args {
    /// Script to run, .rscr or .json (may be passed multiple times)
    #[arg(long = "script", value_name = "PATH")]
    pub scripts: Vec<PathBuf>,

    /// Directory recursively scanned for .rscr scripts, run in path order
    #[arg(long, value_name = "DIR")]
    pub script_root: Option<PathBuf>,

    /// Interpreter flavor to instantiate
    #[arg(long, value_enum, default_value_t = FlavorArg::Fortress)]
    pub flavor: FlavorArg,

    /// Persistent-script ticks to run per card before leaving it
    #[arg(long, default_value_t = 0)]
    pub ticks: u32,

    /// Render mode code (e.g. ega, vga, hercGreen); unknown codes mean default
    #[arg(long, value_name = "CODE")]
    pub render_mode: Option<String>,

    /// Target name used for save files
    #[arg(long)]
    pub target: Option<String>,

    /// Directory holding save states
    #[arg(long, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,

    /// Variable store size in bytes
    #[arg(long)]
    pub store_size: Option<usize>,

    /// Capacity of string variables, terminator included
    #[arg(long)]
    pub string_capacity: Option<usize>,

    /// Optional JSON settings file supplying defaults for the options above
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Restore this save slot before running scripts
    #[arg(long)]
    pub load_slot: Option<u16>,

    /// Write a save state to this slot after running scripts
    #[arg(long)]
    pub save_slot: Option<u16>,

    /// Description stored with --save-slot
    #[arg(long, requires = "save_slot")]
    pub save_description: Option<String>,

    /// List save states for the target and exit
    #[arg(long)]
    pub list_saves: bool,

    /// Print the flavor's opcode table and exit
    #[arg(long)]
    pub describe_opcodes: bool,

    /// Path to write the diagnostics report as JSON
    #[arg(long, value_name = "PATH")]
    pub diagnostics_json: Option<PathBuf>,

    /// Path to write the media request log as JSON
    #[arg(long, value_name = "PATH")]
    pub media_log_json: Option<PathBuf>,

    /// Enable debug logging (opcode traces)
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum FlavorArg {
    Cards,
    Fortress,
    InterV6,
    InterV7,
}

impl From<FlavorArg> for Flavor {
    fn from(value: FlavorArg) -> Self {
        match value {
            FlavorArg::Cards => Flavor::Cards,
            FlavorArg::Fortress => Flavor::Fortress,
            FlavorArg::InterV6 => Flavor::InterV6,
            FlavorArg::InterV7 => Flavor::InterV7,
        }
    }
}

#[derive(Debug)]
pub enum Command {
    Run(RunArgs),
    ListSaves(EngineArgs),
    DescribeOpcodes(EngineArgs),
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Run(args) => args.engine.verbose,
            Command::ListSaves(engine) | Command::DescribeOpcodes(engine) => engine.verbose,
        }
    }
}

/// Options that shape the engine configuration.
#[derive(Debug)]
pub struct EngineArgs {
    pub flavor: Flavor,
    pub render_mode: Option<String>,
    pub target: Option<String>,
    pub save_dir: Option<PathBuf>,
    pub store_size: Option<usize>,
    pub string_capacity: Option<usize>,
    pub settings: Option<PathBuf>,
    pub verbose: bool,
}

#[derive(Debug)]
pub struct RunArgs {
    pub engine: EngineArgs,
    pub scripts: Vec<PathBuf>,
    pub script_root: Option<PathBuf>,
    pub ticks: u32,
    pub load_slot: Option<u16>,
    pub save_slot: Option<u16>,
    pub save_description: Option<String>,
    pub diagnostics_json: Option<PathBuf>,
    pub media_log_json: Option<PathBuf>,
}

pub fn parse() -> Result<Command> {
    let args = Args::parse();
    args.into_command()
}

impl Args {
    fn into_command(self) -> Result<Command> {
        if self.list_saves && self.describe_opcodes {
            bail!("--list-saves cannot be combined with --describe-opcodes");
        }
        let has_scripts = !self.scripts.is_empty() || self.script_root.is_some();
        if (self.list_saves || self.describe_opcodes) && has_scripts {
            bail!("--list-saves and --describe-opcodes do not run scripts");
        }
        if let Some(size) = self.store_size.filter(|&size| size < MIN_STORE_SIZE) {
            bail!("--store-size {size} is too small, the save lock needs at least {MIN_STORE_SIZE}");
        }

        let engine = EngineArgs {
            flavor: self.flavor.into(),
            render_mode: self.render_mode,
            target: self.target,
            save_dir: self.save_dir,
            store_size: self.store_size,
            string_capacity: self.string_capacity,
            settings: self.settings,
            verbose: self.verbose,
        };

        if self.list_saves {
            return Ok(Command::ListSaves(engine));
        }
        if self.describe_opcodes {
            return Ok(Command::DescribeOpcodes(engine));
        }
        if !has_scripts && self.load_slot.is_none() && self.save_slot.is_none() {
            bail!("nothing to do: pass --script, --script-root, --load-slot or --save-slot");
        }

        Ok(Command::Run(RunArgs {
            engine,
            scripts: self.scripts,
            script_root: self.script_root,
            ticks: self.ticks,
            load_slot: self.load_slot,
            save_slot: self.save_slot,
            save_description: self.save_description,
            diagnostics_json: self.diagnostics_json,
            media_log_json: self.media_log_json,
        }))
    }
}
