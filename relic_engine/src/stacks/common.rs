//! Opcodes every card stack inherits.

use crate::diagnostics::Fault;
use crate::dispatch::Invocation;
use crate::media::MovieRequest;
use crate::opcodes::Layer;
use crate::puzzle::PuzzleStack;

use super::{CardContext, CardHost};

pub const OP_TOGGLE_VAR: u16 = 0;
pub const OP_SET_VAR: u16 = 1;
pub const OP_ENABLE_FROM_VAR: u16 = 2;
pub const OP_PLAY_SOUND: u16 = 3;
pub const OP_PLAY_MOVIE_BLOCKING: u16 = 4;
pub const OP_REDRAW_AREA: u16 = 5;
pub const OP_NOP: u16 = 6;

pub fn common_layer<C: CardHost>() -> Layer<C> {
    Layer::new("common")
        .op(OP_TOGGLE_VAR, "o_toggle_var", o_toggle_var::<C>)
        .op(OP_SET_VAR, "o_set_var", o_set_var::<C>)
        .op(OP_ENABLE_FROM_VAR, "o_enable_from_var", o_enable_from_var::<C>)
        .op(OP_PLAY_SOUND, "o_play_sound", o_play_sound::<C>)
        .op(
            OP_PLAY_MOVIE_BLOCKING,
            "o_play_movie_blocking",
            o_play_movie_blocking::<C>,
        )
        .op(OP_REDRAW_AREA, "o_redraw_area", o_redraw_area::<C>)
        .op(OP_NOP, "o_nop", o_nop::<C>)
}

fn o_toggle_var<C: CardHost>(host: &mut C, inv: &Invocation) -> Result<(), Fault> {
    let var = inv.target_var()?;
    inv.args_exact::<0>()?;
    host.toggle_var(var)?;
    host.card().media.redraw_area(var);
    Ok(())
}

fn o_set_var<C: CardHost>(host: &mut C, inv: &Invocation) -> Result<(), Fault> {
    let var = inv.target_var()?;
    let [value] = inv.args_exact::<1>()?;
    if host.set_var_value(var, value)? {
        host.card().media.redraw_area(var);
    }
    Ok(())
}

fn o_enable_from_var<C: CardHost>(host: &mut C, inv: &Invocation) -> Result<(), Fault> {
    let var = inv.target_var()?;
    let [resource] = inv.args_exact::<1>()?;
    let enabled = host.get_var(var) != 0;
    host.card().media.set_resource_enabled(resource, enabled);
    Ok(())
}

fn o_play_sound<C: CardHost>(host: &mut C, inv: &Invocation) -> Result<(), Fault> {
    let [sound] = inv.args_exact::<1>()?;
    inv.var_unused_check();
    host.card().media.play_sound(sound);
    Ok(())
}

fn o_play_movie_blocking<C: CardHost>(host: &mut C, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    let card = host.card();
    let mut operands = inv.operands();
    let name = operands.read_string(&card.vars)?;
    let left = operands.read_val_expr(&card.vars)?;
    let top = operands.read_val_expr(&card.vars)?;
    operands.finish()?;
    card.media
        .play_movie(&MovieRequest::new(name, left, top).blocking());
    Ok(())
}

fn o_redraw_area<C: CardHost>(host: &mut C, inv: &Invocation) -> Result<(), Fault> {
    let var = inv.target_var()?;
    inv.args_exact::<0>()?;
    host.card().media.redraw_area(var);
    Ok(())
}

fn o_nop<C: CardHost>(_host: &mut C, inv: &Invocation) -> Result<(), Fault> {
    inv.var_unused_check();
    Ok(())
}

/// Stack with only the inherited opcodes and no puzzles.
#[derive(Debug)]
pub struct CommonStack {
    card: CardContext,
}

impl CommonStack {
    pub fn new(card: CardContext) -> Self {
        CommonStack { card }
    }
}

impl CardHost for CommonStack {
    fn card(&self) -> &CardContext {
        &self.card
    }

    fn card_mut(&mut self) -> &mut CardContext {
        &mut self.card
    }
}

impl PuzzleStack for CommonStack {
    fn run_persistent(&mut self) {}

    fn disable_persistent(&mut self) {}

    fn armed_puzzles(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
