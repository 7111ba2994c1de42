use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    rc::Rc,
};

use anyhow::{Context, Result};
use relic_engine::{
    Diagnostic, DiagnosticKind, Engine, EngineConfig, Flavor, MediaCallback, NullMedia,
    RecordingMediaCallback, RenderMode, RunReport, Settings, parse_render_mode,
};
use relic_formats::{Script, ScriptEntry, ScriptFile, scan_scripts};
use serde::Serialize;

use crate::cli::{Command, EngineArgs, RunArgs};

const DEFAULT_TARGET: &str = "relic";

#[derive(Serialize)]
struct DiagnosticsReport<'a> {
    target: &'a str,
    flavor: Flavor,
    render_mode: RenderMode,
    scripts: Vec<String>,
    report: RunReport,
    counts: BTreeMap<DiagnosticKind, usize>,
    diagnostics: &'a [Diagnostic],
}

pub fn execute(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run(args),
        Command::ListSaves(engine) => list_saves(engine),
        Command::DescribeOpcodes(engine) => describe_opcodes(engine),
    }
}

fn resolve_config(args: &EngineArgs) -> Result<EngineConfig> {
    let settings =
        Settings::from_json_file(args.settings.as_deref()).context("loading settings file")?;

    let target = args
        .target
        .clone()
        .or(settings.target)
        .unwrap_or_else(|| DEFAULT_TARGET.to_string());
    let mut config = EngineConfig::new(target, args.flavor);
    config.render_mode = match args.render_mode.as_deref() {
        Some(code) => parse_render_mode(code),
        None => settings.render_mode.unwrap_or_default(),
    };
    if let Some(dir) = args.save_dir.clone().or(settings.save_dir) {
        config.save_dir = dir;
    }
    if let Some(size) = args.store_size.or(settings.store_size) {
        config.store_size = size;
    }
    if let Some(capacity) = args.string_capacity.or(settings.string_capacity) {
        config.string_capacity = capacity;
    }
    Ok(config)
}

fn run(args: RunArgs) -> Result<()> {
    let RunArgs {
        engine: engine_args,
        scripts,
        script_root,
        ticks,
        load_slot,
        save_slot,
        save_description,
        diagnostics_json,
        media_log_json,
    } = args;

    let config = resolve_config(&engine_args)?;
    let recorder = media_log_json
        .as_ref()
        .map(|_| RecordingMediaCallback::new());
    let media: Rc<dyn MediaCallback> = match recorder.as_ref() {
        Some(recorder) => Rc::new(recorder.clone()),
        None => Rc::new(NullMedia),
    };

    let mut paths = scripts;
    if let Some(root) = script_root.as_ref() {
        paths.extend(scan_scripts(root)?);
    }
    let loaded = paths
        .iter()
        .map(|path| load_script(path))
        .collect::<Result<Vec<_>>>()?;

    let mut engine = Engine::new(config, media);
    engine.init().context("initialising engine")?;

    if let Some(slot) = load_slot {
        let header = engine.load_game_state(slot)?;
        println!("Loaded slot {slot}: {}", header.description);
    }

    let report = engine.run(&loaded, ticks)?;
    let diagnostics = engine.session_mut()?.take_diagnostics();

    println!(
        "Ran {} instructions from {} scripts: {} handled, {} diagnosed",
        report.executed,
        paths.len(),
        report.handled,
        report.diagnosed
    );
    for diagnostic in diagnostics.entries() {
        println!("  - {diagnostic}");
    }

    if let Some(slot) = save_slot {
        let description = save_description.unwrap_or_else(|| format!("slot {slot}"));
        let path = engine.save_game_state(slot, &description)?;
        println!("Saved slot {slot} to {}", path.display());
    }

    if let Some(path) = diagnostics_json.as_ref() {
        let config = engine.config();
        let payload = DiagnosticsReport {
            target: &config.target,
            flavor: config.flavor,
            render_mode: config.render_mode,
            scripts: paths.iter().map(|path| path.display().to_string()).collect(),
            report,
            counts: diagnostics.counts(),
            diagnostics: diagnostics.entries(),
        };
        write_json(path, &payload, "diagnostics report")?;
    }

    if let (Some(path), Some(recorder)) = (media_log_json.as_ref(), recorder.as_ref()) {
        write_json(path, &recorder.events(), "media log")?;
    }

    engine.shutdown();
    Ok(())
}

fn list_saves(args: EngineArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let engine = Engine::new(config, Rc::new(NullMedia));
    let saves = engine.list_saves()?;
    if saves.is_empty() {
        println!(
            "No save states for {} in {}",
            engine.config().target,
            engine.config().save_dir.display()
        );
    }
    for save in &saves {
        println!("{:>3}  {}", save.slot, save.description);
    }
    Ok(())
}

fn describe_opcodes(args: EngineArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let mut engine = Engine::new(config, Rc::new(NullMedia));
    engine.init()?;
    for (code, name) in engine.session()?.describe_opcodes() {
        println!("{code:>5}  {name}");
    }
    Ok(())
}

fn load_script(path: &Path) -> Result<Vec<ScriptEntry>> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let script = if is_json {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        Script::from_json_str(&raw).with_context(|| format!("parsing {}", path.display()))?
    } else {
        ScriptFile::open(path)?.into_script()
    };
    log::debug!("{}: {} entries", path.display(), script.entries.len());
    Ok(script.entries)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, label: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {label} to JSON"))?;
    fs::write(path, json).with_context(|| format!("writing {label} to {}", path.display()))?;
    println!("Saved {label} to {}", path.display());
    Ok(())
}
