//! Engine lifecycle: session setup, script runs, and save states.

use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{Context, Result, anyhow, ensure};
use regex::Regex;
use relic_formats::ScriptEntry;
use relic_save::{SaveHeader, SaveWriter, SectionKind, VariableSnapshot, find_section};
use serde::{Deserialize, Serialize};

use crate::diagnostics::DiagnosticLog;
use crate::dispatch::RunReport;
use crate::inter::{InterContext, InterSession, InterVersion, SystemClock, TimeSource};
use crate::media::MediaCallback;
use crate::opcodes::OpcodeTable;
use crate::render_mode::RenderMode;
use crate::stacks::{
    CardContext, CardHost, CardSession, CommonStack, FortressPuzzles, FortressStack, FortressState,
    common_layer, fortress_layer,
};
use crate::vars::{DEFAULT_STORE_SIZE, DEFAULT_STRING_CAPACITY, VariableStore};

/// Numbered variable that blocks saving and loading while non-zero.
pub const SAVE_LOCK_VAR: u16 = 50;

/// Smallest variable store that still holds the save lock.
pub const MIN_STORE_SIZE: usize = (SAVE_LOCK_VAR as usize + 1) * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    /// Card stack with only the common opcodes.
    Cards,
    Fortress,
    InterV6,
    InterV7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFeature {
    ReturnToLauncher,
    LoadDuringRuntime,
    SaveDuringRuntime,
    Subtitles,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub target: String,
    pub flavor: Flavor,
    pub render_mode: RenderMode,
    pub save_dir: PathBuf,
    pub store_size: usize,
    pub string_capacity: usize,
}

impl EngineConfig {
    pub fn new(target: impl Into<String>, flavor: Flavor) -> Self {
        EngineConfig {
            target: target.into(),
            flavor,
            render_mode: RenderMode::Default,
            save_dir: PathBuf::from("saves"),
            store_size: DEFAULT_STORE_SIZE,
            string_capacity: DEFAULT_STRING_CAPACITY,
        }
    }
}

/// Running interpreter for one flavor.
pub enum Session {
    Cards(CardSession<CommonStack>),
    Fortress(CardSession<FortressStack>),
    Inter(InterSession),
}

impl Session {
    pub fn vars(&self) -> &VariableStore {
        match self {
            Session::Cards(session) => &session.stack().card().vars,
            Session::Fortress(session) => &session.stack().card().vars,
            Session::Inter(session) => &session.context().vars,
        }
    }

    pub fn vars_mut(&mut self) -> &mut VariableStore {
        match self {
            Session::Cards(session) => &mut session.stack_mut().card_mut().vars,
            Session::Fortress(session) => &mut session.stack_mut().card_mut().vars,
            Session::Inter(session) => &mut session.context_mut().vars,
        }
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        match self {
            Session::Cards(session) => session.diagnostics(),
            Session::Fortress(session) => session.diagnostics(),
            Session::Inter(session) => session.diagnostics(),
        }
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticLog {
        match self {
            Session::Cards(session) => session.take_diagnostics(),
            Session::Fortress(session) => session.take_diagnostics(),
            Session::Inter(session) => session.take_diagnostics(),
        }
    }

    /// `(code, handler)` pairs of the active opcode table.
    pub fn describe_opcodes(&self) -> Vec<(u16, &'static str)> {
        match self {
            Session::Cards(session) => session.table().describe(),
            Session::Fortress(session) => session.table().describe(),
            Session::Inter(session) => session.table().describe(),
        }
    }

    /// Card flavors treat `entries` as the script of card resource
    /// `resource` and tick it `ticks` times before leaving; interpreter
    /// flavors ignore both.
    pub fn run(&mut self, resource: u16, entries: &[ScriptEntry], ticks: u32) -> RunReport {
        match self {
            Session::Cards(session) => session.run_card(resource, entries, ticks),
            Session::Fortress(session) => session.run_card(resource, entries, ticks),
            Session::Inter(session) => session.run(entries),
        }
    }

    fn snapshot(&self) -> StackSnapshot {
        match self {
            Session::Fortress(session) => StackSnapshot::Fortress {
                state: session.stack().state().clone(),
                puzzles: session.stack().puzzles().clone(),
            },
            Session::Cards(_) | Session::Inter(_) => StackSnapshot::Stateless,
        }
    }

    fn restore_snapshot(&mut self, snapshot: StackSnapshot) -> Result<()> {
        match (self, snapshot) {
            (Session::Fortress(session), StackSnapshot::Fortress { state, puzzles }) => {
                session.stack_mut().restore(state, puzzles);
                Ok(())
            }
            (Session::Cards(_) | Session::Inter(_), StackSnapshot::Stateless) => Ok(()),
            _ => Err(anyhow!("save state belongs to a different engine flavor")),
        }
    }
}

/// Stack-owned state written next to the variable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum StackSnapshot {
    Stateless,
    Fortress {
        state: FortressState,
        puzzles: FortressPuzzles,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveSlot {
    pub slot: u16,
    pub path: PathBuf,
    pub description: String,
}

pub struct Engine {
    config: EngineConfig,
    media: Rc<dyn MediaCallback>,
    clock: Rc<dyn TimeSource>,
    session: Option<Session>,
}

impl Engine {
    pub fn new(config: EngineConfig, media: Rc<dyn MediaCallback>) -> Self {
        Self::with_clock(config, media, Rc::new(SystemClock))
    }

    pub fn with_clock(
        config: EngineConfig,
        media: Rc<dyn MediaCallback>,
        clock: Rc<dyn TimeSource>,
    ) -> Self {
        Engine {
            config,
            media,
            clock,
            session: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Allocates the variable store and the flavor's session. Calling it
    /// again starts a fresh session.
    pub fn init(&mut self) -> Result<()> {
        ensure!(
            self.config.store_size >= MIN_STORE_SIZE,
            "variable store of {} bytes is too small, the save lock needs at least {MIN_STORE_SIZE}",
            self.config.store_size
        );
        let vars = VariableStore::new(self.config.store_size, self.config.string_capacity);
        let media = Rc::clone(&self.media);
        let session = match self.config.flavor {
            Flavor::Cards => {
                let table = OpcodeTable::layered([common_layer()]);
                Session::Cards(CardSession::new(
                    table,
                    CommonStack::new(CardContext::new(vars, media)),
                ))
            }
            Flavor::Fortress => {
                let table = OpcodeTable::layered([common_layer(), fortress_layer()]);
                Session::Fortress(CardSession::new(
                    table,
                    FortressStack::new(CardContext::new(vars, media)),
                ))
            }
            Flavor::InterV6 | Flavor::InterV7 => {
                let version = if self.config.flavor == Flavor::InterV6 {
                    InterVersion::V6
                } else {
                    InterVersion::V7
                };
                let ctx = InterContext::with_clock(vars, media, Rc::clone(&self.clock));
                Session::Inter(InterSession::new(version, ctx))
            }
        };
        log::info!(
            "initialised {:?} session for {} ({} bytes of variables, render mode {})",
            self.config.flavor,
            self.config.target,
            self.config.store_size,
            self.config.render_mode
        );
        self.session = Some(session);
        Ok(())
    }

    pub fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("engine has not been initialised"))
    }

    pub fn session_mut(&mut self) -> Result<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| anyhow!("engine has not been initialised"))
    }

    /// Runs each script in order; script `n` runs as card resource `n`.
    /// Diagnostics accumulate in the session.
    pub fn run(&mut self, scripts: &[Vec<ScriptEntry>], ticks: u32) -> Result<RunReport> {
        ensure!(
            scripts.len() <= usize::from(u16::MAX) + 1,
            "too many scripts: {} (at most {})",
            scripts.len(),
            usize::from(u16::MAX) + 1
        );
        let session = self.session_mut()?;
        let mut report = RunReport::default();
        for (resource, entries) in (0..=u16::MAX).zip(scripts) {
            report.merge(session.run(resource, entries, ticks));
        }
        log::info!(
            "ran {} instructions: {} handled, {} diagnosed",
            report.executed,
            report.handled,
            report.diagnosed
        );
        Ok(report)
    }

    pub fn has_feature(&self, feature: EngineFeature) -> bool {
        matches!(
            feature,
            EngineFeature::ReturnToLauncher
                | EngineFeature::LoadDuringRuntime
                | EngineFeature::SaveDuringRuntime
        )
    }

    fn save_lock(&self) -> Result<u32> {
        let lock = self
            .session()?
            .vars()
            .read_var(SAVE_LOCK_VAR)
            .context("reading the save lock variable")?;
        Ok(lock)
    }

    pub fn can_save_currently(&self) -> bool {
        self.save_lock().is_ok_and(|lock| lock == 0)
    }

    pub fn can_load_currently(&self) -> bool {
        self.save_lock().is_ok_and(|lock| lock == 0)
    }

    pub fn save_name(&self, slot: u16) -> String {
        format!("{}.{slot:03}", self.config.target)
    }

    pub fn save_path(&self, slot: u16) -> PathBuf {
        self.config.save_dir.join(self.save_name(slot))
    }

    pub fn save_game_state(&self, slot: u16, description: &str) -> Result<PathBuf> {
        let lock = self.save_lock()?;
        ensure!(
            lock == 0,
            "saving is not allowed right now (variable {SAVE_LOCK_VAR} is {lock})"
        );
        let session = self.session()?;

        let header = SaveHeader::new(
            self.config.target.clone(),
            slot,
            description,
            option_env!("CARGO_PKG_VERSION").map(str::to_string),
        );
        let mut writer = SaveWriter::new();
        writer
            .section(SectionKind::SaveHeader, &header)
            .context("encoding save header")?;
        writer
            .section(SectionKind::VariableStore, &session.vars().snapshot())
            .context("encoding variable store")?;
        writer
            .section(SectionKind::PuzzleStates, &session.snapshot())
            .context("encoding puzzle states")?;

        fs::create_dir_all(&self.config.save_dir)
            .with_context(|| format!("creating {}", self.config.save_dir.display()))?;
        let path = self.save_path(slot);
        fs::write(&path, writer.finish())
            .with_context(|| format!("writing save state to {}", path.display()))?;
        log::info!("saved slot {slot} to {}", path.display());
        Ok(path)
    }

    pub fn load_game_state(&mut self, slot: u16) -> Result<SaveHeader> {
        let lock = self.save_lock()?;
        ensure!(
            lock == 0,
            "loading is not allowed right now (variable {SAVE_LOCK_VAR} is {lock})"
        );
        let path = self.save_path(slot);
        let bytes =
            fs::read(&path).with_context(|| format!("reading save state {}", path.display()))?;

        let header: SaveHeader = find_section(&bytes, SectionKind::SaveHeader)
            .with_context(|| format!("decoding save header in {}", path.display()))?;
        ensure!(
            header.target == self.config.target,
            "save {} belongs to target {:?}",
            path.display(),
            header.target
        );
        let snapshot: VariableSnapshot = find_section(&bytes, SectionKind::VariableStore)
            .with_context(|| format!("decoding variable store in {}", path.display()))?;
        let stack: StackSnapshot = find_section(&bytes, SectionKind::PuzzleStates)
            .with_context(|| format!("decoding puzzle states in {}", path.display()))?;

        let session = self.session_mut()?;
        session.restore_snapshot(stack)?;
        session.vars_mut().restore(&snapshot);
        log::info!("loaded slot {slot} from {}", path.display());
        Ok(header)
    }

    /// Save files in the save directory named `<target>.NNN`, by slot.
    pub fn list_saves(&self) -> Result<Vec<SaveSlot>> {
        let dir = &self.config.save_dir;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let pattern = Regex::new(&format!(
            r"^{}\.(\d{{3,5}})$",
            regex::escape(&self.config.target)
        ))
        .context("building save name pattern")?;

        let mut slots = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
            let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
            let name = entry.file_name();
            let Some(captures) = name.to_str().and_then(|name| pattern.captures(name)) else {
                continue;
            };
            let Ok(slot) = captures[1].parse::<u16>() else {
                continue;
            };
            if captures[0] != self.save_name(slot) {
                continue;
            }
            let path = entry.path();
            match read_description(&path) {
                Ok(description) => slots.push(SaveSlot {
                    slot,
                    path,
                    description,
                }),
                Err(err) => log::warn!("skipping {}: {err:#}", path.display()),
            }
        }
        slots.sort_by_key(|slot| slot.slot);
        Ok(slots)
    }

    /// Ends the session. Puzzles are disabled before the state is dropped.
    pub fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            match &mut session {
                Session::Cards(cards) => cards.leave_card(),
                Session::Fortress(cards) => cards.leave_card(),
                Session::Inter(_) => {}
            }
            log::info!("shut down {} session", self.config.target);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_description(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let header: SaveHeader = find_section(&bytes, SectionKind::SaveHeader)?;
    Ok(header.description)
}
