//! The mechanical fortress stack.
//!
//! Layered over the common opcodes. Most of its variables are backed by
//! stack state rather than the card store, and five puzzles run while their
//! cards are shown.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Fault;
use crate::dispatch::Invocation;
use crate::media::MovieRequest;
use crate::opcodes::Layer;
use crate::puzzle::{PuzzleStack, PuzzleState};

use super::{CardContext, CardHost};

/// Symbols that open the code lock, left to right.
pub const CODE_LOCK_SOLUTION: [u16; 4] = [2, 8, 5, 1];

pub const VAR_SIRRUS_PANEL: u16 = 0;
pub const VAR_ACHENAR_PANEL: u16 = 1;
pub const VAR_ACHENAR_CRATE: u16 = 3;
pub const VAR_MYST_STAIRCASE: u16 = 4;
pub const VAR_FORTRESS_POSITION: u16 = 5;
pub const VAR_COG_VISIBLE: u16 = 6;
pub const VAR_ELEVATOR_OPEN: u16 = 7;
pub const VAR_FORTRESS_STAIRCASE: u16 = 10;
pub const VAR_ELEVATOR_ROTATION: u16 = 11;
pub const VAR_COG_POSITION: u16 = 12;
pub const VAR_BIRD_WING: u16 = 13;
pub const VAR_CODE_LOCK_EXECUTE: u16 = 15;
pub const VAR_CODE_SHAPE_FIRST: u16 = 16;
pub const VAR_CRYSTAL_YELLOW: u16 = 20;
pub const VAR_CRYSTAL_GREEN: u16 = 21;
pub const VAR_CRYSTAL_RED: u16 = 22;

const ELEVATOR_OPEN_ROTATION: u16 = 4;
const ELEVATOR_POSITIONS: u16 = 10;
const COG_POSITIONS: u16 = 6;
const BIRD_WING_FRAMES: u16 = 4;
const SIMULATOR_FRAME_PERIOD: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Crystal {
    Green = 1,
    Red = 2,
    Yellow = 3,
}

impl Crystal {
    fn var(self) -> u16 {
        match self {
            Crystal::Yellow => VAR_CRYSTAL_YELLOW,
            Crystal::Green => VAR_CRYSTAL_GREEN,
            Crystal::Red => VAR_CRYSTAL_RED,
        }
    }
}

/// Saved progress through the stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FortressState {
    pub sirrus_panel: u16,
    pub achenar_panel: u16,
    pub achenar_crate_opened: u16,
    pub staircase: u16,
    pub elevator_rotation: u16,
    pub code_shape: [u16; 4],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirdSong {
    pub wing: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CogRotation {
    pub sound: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationControls {
    pub position_sounds: [u16; 4],
    pub last_rotation: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSimulator {
    pub start_sounds: [u16; 2],
    pub position_sounds: [u16; 4],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelWatch {
    pub last_state: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FortressPuzzles {
    pub bird: PuzzleState<BirdSong>,
    pub cog_rotation: PuzzleState<CogRotation>,
    pub rotation_controls: PuzzleState<RotationControls>,
    pub rotation_simulator: PuzzleState<RotationSimulator>,
    pub panel_watch: PuzzleState<PanelWatch>,
}

#[derive(Debug)]
pub struct FortressStack {
    card: CardContext,
    state: FortressState,
    puzzles: FortressPuzzles,
    myst_staircase: bool,
    fortress_position: u16,
    crystal_lit: Option<Crystal>,
    snake_box: Option<u16>,
}

impl FortressStack {
    pub fn new(card: CardContext) -> Self {
        FortressStack {
            card,
            state: FortressState::default(),
            puzzles: FortressPuzzles::default(),
            myst_staircase: false,
            fortress_position: 0,
            crystal_lit: None,
            snake_box: None,
        }
    }

    pub fn state(&self) -> &FortressState {
        &self.state
    }

    pub fn puzzles(&self) -> &FortressPuzzles {
        &self.puzzles
    }

    /// Replaces saved progress and puzzle states, as when loading a game.
    pub fn restore(&mut self, state: FortressState, puzzles: FortressPuzzles) {
        self.state = state;
        self.puzzles = puzzles;
    }

    fn code_lock_open(&self) -> bool {
        self.state.code_shape == CODE_LOCK_SOLUTION
    }
}

impl CardHost for FortressStack {
    fn card(&self) -> &CardContext {
        &self.card
    }

    fn card_mut(&mut self) -> &mut CardContext {
        &mut self.card
    }

    fn get_var(&self, var: u16) -> u16 {
        match var {
            VAR_SIRRUS_PANEL => self.state.sirrus_panel,
            VAR_ACHENAR_PANEL => self.state.achenar_panel,
            VAR_ACHENAR_CRATE => self.state.achenar_crate_opened,
            VAR_MYST_STAIRCASE => u16::from(self.myst_staircase),
            VAR_FORTRESS_POSITION => self.fortress_position,
            VAR_COG_VISIBLE => u16::from(self.fortress_position == 0),
            VAR_ELEVATOR_OPEN => u16::from(self.state.elevator_rotation == ELEVATOR_OPEN_ROTATION),
            VAR_FORTRESS_STAIRCASE => self.state.staircase,
            VAR_ELEVATOR_ROTATION => self.state.elevator_rotation,
            VAR_CODE_LOCK_EXECUTE => {
                if self.myst_staircase {
                    0
                } else if self.code_lock_open() {
                    1
                } else {
                    2
                }
            }
            16..=19 => self.state.code_shape[usize::from(var - VAR_CODE_SHAPE_FIRST)],
            VAR_CRYSTAL_YELLOW => u16::from(self.crystal_lit == Some(Crystal::Yellow)),
            VAR_CRYSTAL_GREEN => u16::from(self.crystal_lit == Some(Crystal::Green)),
            VAR_CRYSTAL_RED => u16::from(self.crystal_lit == Some(Crystal::Red)),
            _ => self.card.var(var),
        }
    }

    fn toggle_var(&mut self, var: u16) -> Result<(), Fault> {
        match var {
            VAR_SIRRUS_PANEL => self.state.sirrus_panel ^= 1,
            VAR_ACHENAR_PANEL => self.state.achenar_panel ^= 1,
            VAR_ACHENAR_CRATE => self.state.achenar_crate_opened ^= 1,
            VAR_MYST_STAIRCASE => self.myst_staircase = !self.myst_staircase,
            VAR_FORTRESS_STAIRCASE => self.state.staircase ^= 1,
            VAR_ELEVATOR_ROTATION => {
                self.state.elevator_rotation =
                    (self.state.elevator_rotation % ELEVATOR_POSITIONS + 1) % ELEVATOR_POSITIONS
            }
            16..=19 => {
                let shape = &mut self.state.code_shape[usize::from(var - VAR_CODE_SHAPE_FIRST)];
                *shape = (*shape % 10 + 1) % 10;
            }
            _ => self.card.toggle_var(var)?,
        }
        Ok(())
    }

    fn set_var_value(&mut self, var: u16, value: u16) -> Result<bool, Fault> {
        match var {
            VAR_ELEVATOR_ROTATION => {
                let value = value % ELEVATOR_POSITIONS;
                let changed = self.state.elevator_rotation != value;
                self.state.elevator_rotation = value;
                Ok(changed)
            }
            _ => Ok(self.card.set_var(var, value)?),
        }
    }
}

impl PuzzleStack for FortressStack {
    fn run_persistent(&mut self) {
        let FortressStack {
            card,
            state,
            puzzles,
            ..
        } = self;

        puzzles.bird.tick(|bird, _| {
            bird.wing = (bird.wing % BIRD_WING_FRAMES + 1) % BIRD_WING_FRAMES;
            if let Err(err) = card.set_var(VAR_BIRD_WING, bird.wing) {
                log::warn!("bird puzzle: {err}");
            }
            card.media.redraw_area(VAR_BIRD_WING);
        });

        puzzles.cog_rotation.tick(|cog, _| {
            let position = (card.var(VAR_COG_POSITION) % COG_POSITIONS + 1) % COG_POSITIONS;
            if let Err(err) = card.set_var(VAR_COG_POSITION, position) {
                log::warn!("cog rotation puzzle: {err}");
            }
            if position == 0 {
                card.media.play_sound(cog.sound);
            }
        });

        puzzles.rotation_controls.tick(|controls, _| {
            let rotation = state.elevator_rotation;
            if controls.last_rotation.is_some_and(|last| last != rotation) {
                card.media
                    .play_sound(controls.position_sounds[usize::from(rotation % 4)]);
            }
            controls.last_rotation = Some(rotation);
        });

        puzzles.rotation_simulator.tick(|simulator, frame| {
            if frame == 0 {
                for sound in simulator.start_sounds {
                    card.media.play_sound(sound);
                }
            } else if frame % SIMULATOR_FRAME_PERIOD == 0 {
                let position = usize::from(state.elevator_rotation % 4);
                card.media.play_sound(simulator.position_sounds[position]);
            }
        });

        puzzles.panel_watch.tick(|watch, _| {
            let panel = state.sirrus_panel;
            if watch.last_state.is_some_and(|last| last != panel) {
                card.media.redraw_area(VAR_SIRRUS_PANEL);
            }
            watch.last_state = Some(panel);
        });
    }

    fn disable_persistent(&mut self) {
        self.puzzles.bird.disable();
        self.puzzles.cog_rotation.disable();
        self.puzzles.rotation_controls.disable();
        self.puzzles.rotation_simulator.disable();
        self.puzzles.panel_watch.disable();
    }

    fn armed_puzzles(&self) -> Vec<&'static str> {
        let puzzles = &self.puzzles;
        [
            ("bird", puzzles.bird.is_enabled()),
            ("cog_rotation", puzzles.cog_rotation.is_enabled()),
            ("rotation_controls", puzzles.rotation_controls.is_enabled()),
            ("rotation_simulator", puzzles.rotation_simulator.is_enabled()),
            ("panel_watch", puzzles.panel_watch.is_enabled()),
        ]
        .into_iter()
        .filter_map(|(name, armed)| armed.then_some(name))
        .collect()
    }
}

pub fn fortress_layer() -> Layer<FortressStack> {
    Layer::new("fortress")
        .op(100, "o_throne_enable_passage", o_throne_enable_passage)
        .op(104, "o_snake_box_trigger", o_snake_box_trigger)
        .op(105, "o_fortress_staircase_movie", o_fortress_staircase_movie)
        .op(121, "o_elevator_window_movie", o_elevator_window_movie)
        .op(122, "o_elevator_exit_middle", o_elevator_exit_middle)
        .op(123, "o_elevator_movie", o_elevator_movie)
        .op(124, "o_elevator_raise", o_elevator_raise)
        .op(125, "o_myst_staircase_movie", o_myst_staircase_movie)
        .op(126, "o_elevator_raise_exit", o_elevator_raise_exit)
        .op(127, "o_crystal_enter_yellow", o_crystal_enter_yellow)
        .op(128, "o_crystal_leave_yellow", o_crystal_leave_yellow)
        .op(129, "o_crystal_enter_green", o_crystal_enter_green)
        .op(130, "o_crystal_leave_green", o_crystal_leave_green)
        .op(131, "o_crystal_enter_red", o_crystal_enter_red)
        .op(132, "o_crystal_leave_red", o_crystal_leave_red)
        .op(200, "o_throne_init", o_throne_init)
        .op(201, "o_fortress_staircase_init", o_fortress_staircase_init)
        .op(202, "o_bird_init", o_bird_init)
        .op(203, "o_snake_box_init", o_snake_box_init)
        .op(204, "o_cog_rotation_init", o_cog_rotation_init)
        .op(205, "o_rotation_controls_init", o_rotation_controls_init)
        .op(206, "o_rotation_simulator_init", o_rotation_simulator_init)
        .op(209, "o_panel_watch_init", o_panel_watch_init)
        .op(300, "o_elevator_view_exit", o_elevator_view_exit)
}

fn movie(name: &str) -> String {
    format!("mech/{name}.mov")
}

fn o_throne_enable_passage(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    let var = inv.target_var()?;
    let [resource] = inv.args_exact::<1>()?;
    let enabled = stack.get_var(var) != 0;
    stack.card.media.set_resource_enabled(resource, enabled);
    Ok(())
}

fn o_snake_box_trigger(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.args_exact::<0>()?;
    let Some(resource) = stack.snake_box else {
        return Err(Fault::stub("snake box triggered before its init opcode"));
    };
    stack
        .card
        .media
        .play_movie(&MovieRequest::new(movie(&format!("snakebox{resource}")), 0, 0));
    Ok(())
}

fn o_fortress_staircase_movie(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.args_exact::<0>()?;
    let (start, end) = if stack.state.staircase != 0 {
        (840, 1680)
    } else {
        (0, 840)
    };
    let request = MovieRequest::new(movie("hhstairs"), 174, 222)
        .with_bounds(start, end)
        .blocking();
    stack.card.media.play_movie(&request);
    Ok(())
}

fn o_elevator_window_movie(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    let [start, end] = inv.args_exact::<2>()?;
    let request = MovieRequest::new(movie("ewindow"), 253, 0)
        .with_bounds(u32::from(start), u32::from(end))
        .blocking();
    stack.card.media.play_movie(&request);
    Ok(())
}

fn o_elevator_exit_middle(_stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.args_exact::<0>()?;
    Err(Fault::stub("elevator middle exit"))
}

fn o_elevator_movie(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    let [start, end] = inv.args_exact::<2>()?;
    let request = MovieRequest::new(movie("hcelev"), 205, 40)
        .with_bounds(u32::from(start), u32::from(end))
        .blocking();
    stack.card.media.play_movie(&request);
    Ok(())
}

fn o_elevator_raise(_stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    inv.args_exact::<0>()?;
    Err(Fault::stub("raise elevator"))
}

fn o_myst_staircase_movie(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.args_exact::<0>()?;
    let request = MovieRequest::new(movie("sstairs"), 199, 108).blocking();
    stack.card.media.play_movie(&request);
    Ok(())
}

fn o_elevator_raise_exit(_stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    inv.args_exact::<0>()?;
    Err(Fault::stub("raise elevator and exit"))
}

fn light_crystal(stack: &mut FortressStack, crystal: Crystal, lit: bool) {
    stack.crystal_lit = lit.then_some(crystal);
    stack.card.media.redraw_area(crystal.var());
}

fn o_crystal_enter_yellow(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    light_crystal(stack, Crystal::Yellow, true);
    Ok(())
}

fn o_crystal_leave_yellow(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    light_crystal(stack, Crystal::Yellow, false);
    Ok(())
}

fn o_crystal_enter_green(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    light_crystal(stack, Crystal::Green, true);
    Ok(())
}

fn o_crystal_leave_green(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    light_crystal(stack, Crystal::Green, false);
    Ok(())
}

fn o_crystal_enter_red(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    light_crystal(stack, Crystal::Red, true);
    Ok(())
}

fn o_crystal_leave_red(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    light_crystal(stack, Crystal::Red, false);
    Ok(())
}

fn o_throne_init(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    let var = inv.target_var()?;
    let enabled = stack.get_var(var) != 0;
    let resource = stack.card.invoking_resource;
    stack.card.media.set_resource_enabled(resource, enabled);
    Ok(())
}

fn o_fortress_staircase_init(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    let [down_a, down_b, up] = inv.args_exact::<3>()?;
    let raised = stack.state.staircase != 0;
    let media = &stack.card.media;
    media.set_resource_enabled(down_a, !raised);
    media.set_resource_enabled(down_b, !raised);
    media.set_resource_enabled(up, raised);
    Ok(())
}

fn o_bird_init(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.args_exact::<0>()?;
    stack.puzzles.bird.arm(BirdSong { wing: 0 });
    Ok(())
}

fn o_snake_box_init(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    stack.snake_box = Some(stack.card.invoking_resource);
    Ok(())
}

fn o_cog_rotation_init(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    let [sound] = inv.args_exact::<1>()?;
    stack.puzzles.cog_rotation.arm(CogRotation { sound });
    Ok(())
}

fn o_rotation_controls_init(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    let position_sounds = inv.args_exact::<4>()?;
    stack.puzzles.rotation_controls.arm(RotationControls {
        position_sounds,
        last_rotation: None,
    });
    Ok(())
}

fn o_rotation_simulator_init(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    let [start_a, start_b, p0, p1, p2, p3] = inv.args_exact::<6>()?;
    stack.puzzles.rotation_simulator.arm(RotationSimulator {
        start_sounds: [start_a, start_b],
        position_sounds: [p0, p1, p2, p3],
    });
    Ok(())
}

fn o_panel_watch_init(stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    inv.args_exact::<0>()?;
    stack.puzzles.panel_watch.arm(PanelWatch { last_state: None });
    Ok(())
}

fn o_elevator_view_exit(_stack: &mut FortressStack, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    Err(Fault::stub("elevator view exit"))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use relic_formats::ScriptEntry;

    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::media::{MediaEvent, RecordingMediaCallback};
    use crate::opcodes::OpcodeTable;
    use crate::stacks::CardSession;
    use crate::stacks::common::{OP_SET_VAR, OP_TOGGLE_VAR, common_layer};
    use crate::vars::VariableStore;

    fn session() -> (CardSession<FortressStack>, RecordingMediaCallback) {
        let recorder = RecordingMediaCallback::new();
        let card = CardContext::new(VariableStore::new(512, 16), Rc::new(recorder.clone()));
        let table = OpcodeTable::layered([common_layer(), fortress_layer()]);
        (CardSession::new(table, FortressStack::new(card)), recorder)
    }

    fn toggle(var: u16) -> ScriptEntry {
        ScriptEntry::with_args(OP_TOGGLE_VAR, Some(var), &[])
    }

    #[test]
    fn code_lock_opens_on_the_right_symbols() {
        let (mut session, _recorder) = session();
        assert_eq!(session.stack().get_var(VAR_CODE_LOCK_EXECUTE), 2);

        let mut script = Vec::new();
        for (offset, &target) in CODE_LOCK_SOLUTION.iter().enumerate() {
            for _ in 0..target {
                script.push(toggle(VAR_CODE_SHAPE_FIRST + offset as u16));
            }
        }
        session.enter_card(0, &script);
        assert_eq!(session.stack().state().code_shape, CODE_LOCK_SOLUTION);
        assert_eq!(session.stack().get_var(VAR_CODE_LOCK_EXECUTE), 1);

        session.enter_card(0, &[toggle(VAR_MYST_STAIRCASE)]);
        assert_eq!(session.stack().get_var(VAR_CODE_LOCK_EXECUTE), 0);
    }

    #[test]
    fn code_shapes_wrap_after_nine() {
        let (mut session, _recorder) = session();
        let script: Vec<_> = (0..11).map(|_| toggle(VAR_CODE_SHAPE_FIRST)).collect();
        session.enter_card(0, &script);
        assert_eq!(session.stack().get_var(VAR_CODE_SHAPE_FIRST), 1);
    }

    #[test]
    fn toggles_touch_only_their_own_variable() {
        let (mut session, _recorder) = session();
        session.enter_card(0, &[toggle(VAR_SIRRUS_PANEL)]);
        let stack = session.stack();
        assert_eq!(stack.get_var(VAR_SIRRUS_PANEL), 1);
        assert_eq!(stack.get_var(VAR_ACHENAR_PANEL), 0);
        assert_eq!(stack.get_var(VAR_ACHENAR_CRATE), 0);
        assert_eq!(stack.get_var(VAR_FORTRESS_STAIRCASE), 0);
    }

    #[test]
    fn unknown_variables_fall_back_to_the_card_store() {
        let (mut session, _recorder) = session();
        session.enter_card(0, &[ScriptEntry::with_args(OP_SET_VAR, Some(40), &[7])]);
        assert_eq!(session.stack().get_var(40), 7);
        assert_eq!(session.stack().card().vars.read_u16(80).unwrap(), 7);
    }

    #[test]
    fn crystals_light_one_at_a_time() {
        let (mut session, recorder) = session();
        let enter_yellow = ScriptEntry::with_args(127, None, &[]);
        let enter_red = ScriptEntry::with_args(131, None, &[]);
        session.enter_card(0, &[enter_yellow, enter_red]);

        let stack = session.stack();
        assert_eq!(stack.get_var(VAR_CRYSTAL_YELLOW), 0);
        assert_eq!(stack.get_var(VAR_CRYSTAL_RED), 1);
        assert_eq!(
            recorder.events(),
            vec![
                MediaEvent::RedrawArea { var: 20 },
                MediaEvent::RedrawArea { var: 22 }
            ]
        );
    }

    #[test]
    fn staircase_movie_bounds_follow_state() {
        let (mut session, recorder) = session();
        session.enter_card(0, &[
            ScriptEntry::with_args(105, None, &[]),
            toggle(VAR_FORTRESS_STAIRCASE),
            ScriptEntry::with_args(105, None, &[]),
        ]);
        let bounds: Vec<_> = recorder
            .events()
            .into_iter()
            .filter_map(|event| match event {
                MediaEvent::PlayMovie(request) => request.bounds,
                _ => None,
            })
            .collect();
        assert_eq!(bounds, vec![(0, 840), (840, 1680)]);
    }

    #[test]
    fn staircase_init_enables_matching_resources() {
        let (mut session, recorder) = session();
        session.enter_card(0, &[ScriptEntry::with_args(201, None, &[1, 2, 3])]);
        assert_eq!(
            recorder.events(),
            vec![
                MediaEvent::SetResourceEnabled {
                    resource: 1,
                    enabled: true
                },
                MediaEvent::SetResourceEnabled {
                    resource: 2,
                    enabled: true
                },
                MediaEvent::SetResourceEnabled {
                    resource: 3,
                    enabled: false
                },
            ]
        );
    }

    #[test]
    fn elevator_stubs_check_arity_before_reporting() {
        let (mut session, _recorder) = session();
        session.enter_card(0, &[
            ScriptEntry::with_args(122, None, &[]),
            ScriptEntry::with_args(122, None, &[1]),
            ScriptEntry::with_args(121, None, &[5]),
        ]);
        let diagnostics = session.diagnostics();
        assert_eq!(diagnostics.count(DiagnosticKind::Unimplemented), 1);
        assert_eq!(diagnostics.count(DiagnosticKind::UnsupportedArgumentShape), 2);
    }

    #[test]
    fn cog_rotation_plays_its_sound_on_each_turn() {
        let (mut session, recorder) = session();
        session.run_card(0, &[ScriptEntry::with_args(204, None, &[77])], 12);

        let sounds = recorder
            .events()
            .into_iter()
            .filter(|event| *event == MediaEvent::PlaySound { id: 77 })
            .count();
        assert_eq!(sounds, 2);
        assert_eq!(session.stack().get_var(VAR_COG_POSITION), 0);
        assert!(session.stack().armed_puzzles().is_empty());
    }

    #[test]
    fn rotation_controls_react_to_elevator_changes() {
        let (mut session, recorder) = session();
        session.enter_card(0, &[ScriptEntry::with_args(205, None, &[10, 11, 12, 13])]);
        session.tick();
        session.enter_card(0, &[ScriptEntry::with_args(OP_SET_VAR, Some(VAR_ELEVATOR_ROTATION), &[6])]);
        assert_eq!(recorder.events(), vec![MediaEvent::RedrawArea { var: 11 }]);
        recorder.clear();
        session.tick();
        session.tick();

        assert_eq!(recorder.events(), vec![MediaEvent::PlaySound { id: 12 }]);
    }

    #[test]
    fn rotation_simulator_plays_start_then_position_sounds() {
        let (mut session, recorder) = session();
        session.run_card(0, &[ScriptEntry::with_args(206, None, &[1, 2, 30, 31, 32, 33])], 9);
        assert_eq!(
            recorder.events(),
            vec![
                MediaEvent::PlaySound { id: 1 },
                MediaEvent::PlaySound { id: 2 },
                MediaEvent::PlaySound { id: 30 },
                MediaEvent::PlaySound { id: 30 },
            ]
        );
    }

    #[test]
    fn leaving_the_card_disables_every_puzzle() {
        let (mut session, recorder) = session();
        session.enter_card(0, &[
            ScriptEntry::with_args(202, None, &[]),
            ScriptEntry::with_args(204, None, &[5]),
            ScriptEntry::with_args(209, None, &[]),
        ]);
        assert_eq!(
            session.stack().armed_puzzles(),
            vec!["bird", "cog_rotation", "panel_watch"]
        );
        session.leave_card();
        assert!(session.stack().armed_puzzles().is_empty());

        recorder.clear();
        session.tick();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn throne_init_toggles_the_invoking_resource() {
        let (mut session, recorder) = session();
        session.enter_card(0, &[toggle(VAR_ACHENAR_PANEL)]);
        recorder.clear();
        session.enter_card(17, &[ScriptEntry::with_args(200, Some(VAR_ACHENAR_PANEL), &[])]);
        session.enter_card(18, &[ScriptEntry::with_args(200, Some(VAR_SIRRUS_PANEL), &[])]);
        assert_eq!(
            recorder.events(),
            vec![
                MediaEvent::SetResourceEnabled {
                    resource: 17,
                    enabled: true
                },
                MediaEvent::SetResourceEnabled {
                    resource: 18,
                    enabled: false
                },
            ]
        );
    }

    #[test]
    fn snake_box_plays_the_movie_of_its_init_resource() {
        let (mut session, recorder) = session();
        session.enter_card(6, &[ScriptEntry::with_args(203, None, &[])]);
        session.enter_card(9, &[ScriptEntry::with_args(104, None, &[])]);
        assert_eq!(
            recorder.events(),
            vec![MediaEvent::PlayMovie(MovieRequest::new("mech/snakebox6.mov", 0, 0))]
        );
    }

    #[test]
    fn cog_rotation_tolerates_any_stored_position() {
        let (mut session, recorder) = session();
        session.enter_card(0, &[
            ScriptEntry::with_args(OP_SET_VAR, Some(VAR_COG_POSITION), &[u16::MAX]),
            ScriptEntry::with_args(204, None, &[5]),
        ]);
        recorder.clear();
        session.tick();
        // 0xFFFF reduces to 3, so the next position is 4
        assert_eq!(session.stack().get_var(VAR_COG_POSITION), 4);
        session.tick();
        session.tick();
        assert_eq!(session.stack().get_var(VAR_COG_POSITION), 0);
        assert_eq!(recorder.events(), vec![MediaEvent::PlaySound { id: 5 }]);
    }

    #[test]
    fn restored_extreme_values_still_advance() {
        let (mut session, _recorder) = session();
        let state = FortressState {
            elevator_rotation: u16::MAX,
            code_shape: [u16::MAX, 9, 0, 0],
            ..FortressState::default()
        };
        let mut puzzles = FortressPuzzles::default();
        puzzles.bird.arm(BirdSong { wing: u16::MAX });
        session.stack_mut().restore(state, puzzles);

        session.enter_card(0, &[
            toggle(VAR_ELEVATOR_ROTATION),
            toggle(VAR_CODE_SHAPE_FIRST),
            toggle(VAR_CODE_SHAPE_FIRST + 1),
        ]);
        session.tick();

        let stack = session.stack();
        assert_eq!(stack.get_var(VAR_ELEVATOR_ROTATION), 6);
        assert_eq!(stack.get_var(VAR_CODE_SHAPE_FIRST), 6);
        assert_eq!(stack.get_var(VAR_CODE_SHAPE_FIRST + 1), 0);
        assert_eq!(stack.get_var(VAR_BIRD_WING), 0);
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn crystal_opcodes_accept_a_stray_target_variable() {
        let (mut session, recorder) = session();
        session.enter_card(0, &[ScriptEntry::with_args(129, Some(3), &[])]);
        assert_eq!(session.stack().get_var(VAR_CRYSTAL_GREEN), 1);
        assert_eq!(recorder.events(), vec![MediaEvent::RedrawArea { var: 21 }]);
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn panel_watch_redraws_when_the_panel_moves() {
        let (mut session, recorder) = session();
        session.enter_card(0, &[ScriptEntry::with_args(209, None, &[])]);
        session.tick();
        session.enter_card(0, &[toggle(VAR_SIRRUS_PANEL)]);
        recorder.clear();
        session.tick();
        session.tick();
        assert_eq!(recorder.events(), vec![MediaEvent::RedrawArea { var: 0 }]);
    }
}
