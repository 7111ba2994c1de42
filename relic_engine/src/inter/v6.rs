use crate::diagnostics::Fault;
use crate::dispatch::{Invocation, store_value};
use crate::media::MovieRequest;
use crate::opcodes::Layer;
use crate::vars::{VarType, VarValue};

use super::InterContext;

pub const OP_ASSIGN: u16 = 0x01;
pub const OP_ASSIGN_STR: u16 = 0x02;
pub const OP_ADD: u16 = 0x03;
pub const OP_DRAW_0C: u16 = 0x0C;
pub const OP_LOAD_CURSOR: u16 = 0x0D;
pub const OP_PLAY_SOUND: u16 = 0x30;
pub const OP_PLAY_MOVIE: u16 = 0x31;

pub fn layer() -> Layer<InterContext> {
    Layer::new("v6")
        .op(OP_ASSIGN, "o6_assign", o6_assign)
        .op(OP_ASSIGN_STR, "o6_assign_str", o6_assign_str)
        .op(OP_ADD, "o6_add", o6_add)
        .op(OP_DRAW_0C, "o6_draw0x0C", o6_draw0x0c)
        .op(OP_LOAD_CURSOR, "o6_load_cursor", o6_load_cursor)
        .op(OP_PLAY_SOUND, "o6_play_sound", o6_play_sound)
        .op(OP_PLAY_MOVIE, "o6_play_movie", o6_play_movie)
}

/// `var = expr`, stored with the width of the variable's tag.
fn o6_assign(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let target = operands.read_var_index()?;
    let value = operands.read_val_expr(&ctx.vars)?;
    operands.finish()?;
    store_value(&mut ctx.vars, target, value as u32)
}

fn o6_assign_str(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let target = operands.read_var_index()?;
    let text = operands.read_string(&ctx.vars)?;
    operands.finish()?;
    ctx.vars
        .write(target.index, VarType::Str, &VarValue::Str(text))?;
    Ok(())
}

fn o6_add(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let target = operands.read_var_index()?;
    let delta = operands.read_val_expr(&ctx.vars)?;
    operands.finish()?;
    let current = ctx.vars.read(target.index, target.ty)?.as_u32();
    store_value(&mut ctx.vars, target, current.wrapping_add(delta as u32))
}

fn o6_draw0x0c(_ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    inv.operands().finish()?;
    Err(Fault::stub("draw 0x0C"))
}

fn o6_load_cursor(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let index = operands.read_val_expr(&ctx.vars)?;
    let file = operands.read_string(&ctx.vars)?;
    operands.finish()?;
    ctx.media.load_cursor(&file, index);
    Ok(())
}

fn o6_play_sound(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let sound = operands.read_val_expr(&ctx.vars)?;
    operands.finish()?;
    ctx.media.play_sound(sound as u16);
    Ok(())
}

fn o6_play_movie(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let name = operands.read_string(&ctx.vars)?;
    let left = operands.read_val_expr(&ctx.vars)?;
    let top = operands.read_val_expr(&ctx.vars)?;
    operands.finish()?;
    ctx.media.play_movie(&MovieRequest::new(name, left, top));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use relic_formats::{Operand, ScriptEntry};

    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::inter::{InterSession, InterVersion};
    use crate::media::{MediaEvent, RecordingMediaCallback};
    use crate::vars::VariableStore;

    fn session() -> (InterSession, RecordingMediaCallback) {
        let recorder = RecordingMediaCallback::new();
        let ctx = InterContext::new(VariableStore::new(256, 16), Rc::new(recorder.clone()));
        (InterSession::new(InterVersion::V6, ctx), recorder)
    }

    #[test]
    fn assign_and_add_respect_width() {
        let (mut session, _recorder) = session();
        let byte = Operand::var(0, VarType::Int8);
        session.run(&[
            ScriptEntry::new(OP_ASSIGN, None, vec![byte.clone(), Operand::int(250)]),
            ScriptEntry::new(OP_ADD, None, vec![byte, Operand::int(10)]),
            ScriptEntry::new(
                OP_ASSIGN,
                None,
                vec![Operand::var(4, VarType::Int32), Operand::var(0, VarType::Int8)],
            ),
        ]);
        let vars = &session.context().vars;
        assert_eq!(vars.read_u8(0).unwrap(), 4);
        assert_eq!(vars.read_u8(1).unwrap(), 0);
        assert_eq!(vars.read_u32(4).unwrap(), 4);
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn assign_string_truncates_to_capacity() {
        let (mut session, _recorder) = session();
        session.run(&[ScriptEntry::new(
            OP_ASSIGN_STR,
            None,
            vec![Operand::var(32, VarType::Str), Operand::str("a long string value")],
        )]);
        assert_eq!(
            session.context().vars.read_str(32).unwrap(),
            "a long string v"
        );
    }

    #[test]
    fn media_opcodes_forward_requests() {
        let (mut session, recorder) = session();
        session.run(&[
            ScriptEntry::new(OP_PLAY_SOUND, None, vec![Operand::int(3)]),
            ScriptEntry::new(
                OP_PLAY_MOVIE,
                None,
                vec![Operand::str("intro"), Operand::int(1), Operand::int(2)],
            ),
            ScriptEntry::new(
                OP_LOAD_CURSOR,
                None,
                vec![Operand::int(2), Operand::str("pointer.cur")],
            ),
        ]);
        assert_eq!(
            recorder.events(),
            vec![
                MediaEvent::PlaySound { id: 3 },
                MediaEvent::PlayMovie(MovieRequest::new("intro", 1, 2)),
                MediaEvent::LoadCursor {
                    file: "pointer.cur".to_string(),
                    index: 2
                },
            ]
        );
    }

    #[test]
    fn bad_operands_leave_the_store_untouched() {
        let (mut session, _recorder) = session();
        let before = session.context().vars.clone();
        session.run(&[
            ScriptEntry::new(OP_ASSIGN, None, vec![Operand::int(1), Operand::int(2)]),
            ScriptEntry::new(
                OP_ASSIGN,
                None,
                vec![Operand::var(0, VarType::Int8), Operand::int(1), Operand::int(2)],
            ),
            ScriptEntry::new(OP_DRAW_0C, None, Vec::new()),
        ]);
        assert_eq!(session.context().vars, before);
        let diagnostics = session.diagnostics();
        assert_eq!(diagnostics.count(DiagnosticKind::UnsupportedArgumentShape), 2);
        assert_eq!(diagnostics.count(DiagnosticKind::Unimplemented), 1);
    }
}
