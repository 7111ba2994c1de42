use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use relic_formats::{Operand, ScriptFile, scan_scripts};

#[derive(Parser, Debug)]
#[command(about = "Print the entries of compiled Relic scripts", version)]
struct Args {
    /// Script file to dump (may be passed multiple times)
    #[arg(long = "script", value_name = "PATH", conflicts_with = "root")]
    scripts: Vec<PathBuf>,

    /// Directory recursively scanned for .rscr files
    #[arg(long = "root", value_name = "DIR", conflicts_with = "scripts")]
    root: Option<PathBuf>,

    /// Emit JSON instead of the column view
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let paths = match args.root.as_ref() {
        Some(root) => scan_scripts(root)?,
        None => args.scripts.clone(),
    };
    if paths.is_empty() {
        bail!("no scripts to dump");
    }

    for path in paths {
        let file = ScriptFile::open(&path)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(file.script())?);
            continue;
        }
        println!(
            "{} entries in {}",
            file.script().entries.len(),
            file.path().display()
        );
        for (index, entry) in file.script().entries.iter().enumerate() {
            let var = entry
                .var
                .map(|var| var.to_string())
                .unwrap_or_else(|| String::from("-"));
            let operands: Vec<String> = entry.operands.iter().map(describe_operand).collect();
            println!(
                "{index:>4}  op {opcode:>5}  var {var:>5}  [{operands}]",
                opcode = entry.opcode,
                operands = operands.join(", ")
            );
        }
    }
    Ok(())
}

fn describe_operand(operand: &Operand) -> String {
    match operand {
        Operand::Int { value } => value.to_string(),
        Operand::Str { value } => format!("{value:?}"),
        Operand::Var { index, ty } => format!("var{index}:{ty:?}"),
    }
}
