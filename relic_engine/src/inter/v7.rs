//! Version 7 additions layered over version 6.

use crate::diagnostics::Fault;
use crate::dispatch::{Invocation, Operands, VarRef, store_value};
use crate::opcodes::Layer;
use crate::vars::{VarType, atoi};

use super::InterContext;

pub const OP_DRAW_0C: u16 = 0x0C;
pub const OP_LOAD_CURSOR: u16 = 0x0D;
pub const OP_DISPLAY_WARNING: u16 = 0x44;
pub const OP_GET_SYSTEM_PROPERTY: u16 = 0x8C;
pub const OP_LOAD_LBM: u16 = 0x90;
pub const OP_GET_INI_VALUE: u16 = 0xA1;
pub const OP_OPEN_DBASE: u16 = 0xC4;
pub const OP_OEM_TO_ANSI: u16 = 420;

/// Reported physical memory, in bytes.
const FAKE_PHYSICAL_MEMORY: u32 = 1_000_000;

pub fn layer() -> Layer<InterContext> {
    Layer::new("v7")
        .op(OP_DRAW_0C, "o7_draw0x0C", o7_draw0x0c)
        .op(OP_LOAD_CURSOR, "o7_load_cursor", o7_load_cursor)
        .op(OP_DISPLAY_WARNING, "o7_display_warning", o7_display_warning)
        .op(0x45, "o7_draw0x45", o7_draw0x45)
        .op(0x57, "o7_draw0x57", o7_draw0x57)
        .op(0x89, "o7_draw0x89", o7_draw0x89)
        .op(0x8A, "o7_draw0x8A", o7_draw0x8a)
        .op(
            OP_GET_SYSTEM_PROPERTY,
            "o7_get_system_property",
            o7_get_system_property,
        )
        .op(OP_LOAD_LBM, "o7_load_lbm", o7_load_lbm)
        .op(0x93, "o7_draw0x93", o7_draw0x93)
        .op(OP_GET_INI_VALUE, "o7_get_ini_value", o7_get_ini_value)
        .op(0xA2, "o7_draw0xA2", o7_draw0xa2)
        .op(0xA4, "o7_draw0xA4", o7_draw0xa4)
        .op(OP_OPEN_DBASE, "o7_open_dbase", o7_open_dbase)
        .op(0xC5, "o7_draw0xC5", o7_draw0xc5)
        .op(0xC6, "o7_draw0xC6", o7_draw0xc6)
        .op(OP_OEM_TO_ANSI, "o7_oem_to_ansi", o7_oem_to_ansi)
}

fn read_strings<const N: usize>(
    operands: &mut Operands<'_>,
    ctx: &InterContext,
) -> Result<[String; N], Fault> {
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for slot in out.iter_mut() {
        *slot = operands.read_string(&ctx.vars)?;
    }
    Ok(out)
}

fn o7_draw0x0c(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    inv.operands().finish()?;
    ctx.vars.write_var(17, 0)?;
    Ok(())
}

fn o7_load_cursor(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let index = operands.read_val_expr(&ctx.vars)?;
    let file = operands.read_string(&ctx.vars)?;
    operands.finish()?;
    Err(Fault::stub(format!("load cursor \"{file}\" to {index}")))
}

fn o7_display_warning(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let [_caption, _text, source, message, param] = read_strings::<5>(&mut operands, ctx)?;
    operands.finish()?;
    Err(Fault::stub(format!("warning {source}: {message} ({param})")))
}

fn o7_draw0x45(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let [first, second] = read_strings::<2>(&mut operands, ctx)?;
    operands.finish()?;
    Err(Fault::stub(format!("draw 0x45 \"{first}\", \"{second}\"")))
}

fn o7_draw0x57(_ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let first = operands.read_var_index()?;
    let second = operands.read_var_index()?;
    operands.finish()?;
    Err(Fault::stub(format!(
        "draw 0x57 {}, {}",
        first.index, second.index
    )))
}

fn o7_draw0x89(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let [first, second] = read_strings::<2>(&mut operands, ctx)?;
    let target = operands.read_var_index()?;
    operands.finish()?;
    Err(Fault::stub(format!(
        "draw 0x89 \"{first}\", \"{second}\", {}",
        target.index
    )))
}

fn o7_draw0x8a(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let [name] = read_strings::<1>(&mut operands, ctx)?;
    let first = operands.read_var_index()?;
    let second = operands.read_var_index()?;
    operands.finish()?;
    Err(Fault::stub(format!(
        "draw 0x8A \"{name}\", {}, {}",
        first.index, second.index
    )))
}

/// Stores a property value into the target variable. Unknown properties
/// store 0 and are reported.
fn o7_get_system_property(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let property = operands.read_string(&ctx.vars)?;
    let target = operands.read_var_index()?;
    operands.finish()?;

    if property.eq_ignore_ascii_case("TotalPhys") || property.eq_ignore_ascii_case("AvailPhys") {
        return store_value(&mut ctx.vars, target, FAKE_PHYSICAL_MEMORY);
    }
    if property.eq_ignore_ascii_case("TimeGMT") {
        ctx.renew_time_in_vars()?;
        return store_value(&mut ctx.vars, target, 0);
    }
    store_value(&mut ctx.vars, target, 0)?;
    Err(Fault::stub(format!("unknown system property \"{property}\"")))
}

fn o7_load_lbm(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let mut file = operands.read_string(&ctx.vars)?;
    if !file.contains('.') {
        file.push_str(".LBM");
    }
    let mut values = [0i32; 8];
    for value in values.iter_mut() {
        *value = operands.read_val_expr(&ctx.vars)?;
    }
    operands.finish()?;
    let [sprite, left, top, width, height, x, y, transparent] = values;
    Err(Fault::stub(format!(
        "load LBM \"{file}\", sprite {sprite}, {width}x{height}+{left}+{top} @ {x}+{y} ({transparent})"
    )))
}

fn o7_draw0x93(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let value = operands.read_val_expr(&ctx.vars)?;
    operands.finish()?;
    Err(Fault::stub(format!("draw 0x93 {value}")))
}

/// INI lookups always yield the supplied default, written per the target's
/// type tag.
fn o7_get_ini_value(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let [file, section, key, default] = read_strings::<4>(&mut operands, ctx)?;
    let target = operands.read_var_index()?;
    operands.finish()?;

    store_ini_default(ctx, target, &default)?;
    Err(Fault::stub(format!(
        "INI value \"{file}\":\"{section}\":\"{key}\" (\"{default}\")"
    )))
}

// 8-bit tags receive the text itself, like string slots.
fn store_ini_default(ctx: &mut InterContext, target: VarRef, default: &str) -> Result<(), Fault> {
    match target.ty {
        VarType::Str | VarType::Int8 => ctx.vars.write_str(target.index, default)?,
        VarType::Int32 => ctx.vars.write_u32(target.index, atoi(default) as u32)?,
        VarType::Int16 => ctx.vars.write_u16(target.index, atoi(default) as u16)?,
    }
    Ok(())
}

fn o7_draw0xa2(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let strings = read_strings::<4>(&mut operands, ctx)?;
    operands.finish()?;
    Err(Fault::stub(format!("draw 0xA2 {strings:?}")))
}

fn o7_draw0xa4(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let [name] = read_strings::<1>(&mut operands, ctx)?;
    let first = operands.read_val_expr(&ctx.vars)?;
    let second = operands.read_val_expr(&ctx.vars)?;
    operands.finish()?;
    Err(Fault::stub(format!("draw 0xA4 \"{name}\", {first}, {second}")))
}

fn o7_open_dbase(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let [name, id] = read_strings::<2>(&mut operands, ctx)?;
    operands.finish()?;
    Err(Fault::stub(format!("open dBase file \"{name}.dbf\" ({id})")))
}

fn o7_draw0xc5(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let [name] = read_strings::<1>(&mut operands, ctx)?;
    operands.finish()?;
    Err(Fault::stub(format!("draw 0xC5 \"{name}\"")))
}

fn o7_draw0xc6(ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    let strings = read_strings::<4>(&mut operands, ctx)?;
    let target = operands.read_var_index()?;
    operands.finish()?;
    Err(Fault::stub(format!(
        "draw 0xC6 {strings:?}, {}",
        target.index
    )))
}

fn o7_oem_to_ansi(_ctx: &mut InterContext, inv: &Invocation) -> Result<(), Fault> {
    let mut operands = inv.operands();
    operands.skip(2)?;
    operands.finish()
}
