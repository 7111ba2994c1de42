use relic_formats::{Operand, ScriptEntry};
use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticLog, Fault};
use crate::opcodes::OpcodeTable;
use crate::vars::{VarType, VarValue, VariableStore};

/// A decoded instruction handed to one handler call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub code: u16,
    pub var: Option<u16>,
    pub operands: Vec<Operand>,
}

impl Invocation {
    pub fn new(code: u16, var: Option<u16>, operands: Vec<Operand>) -> Self {
        Invocation {
            code,
            var,
            operands,
        }
    }

    pub fn with_args(code: u16, var: Option<u16>, args: &[u16]) -> Self {
        Self::from(&ScriptEntry::with_args(code, var, args))
    }

    pub fn argc(&self) -> usize {
        self.operands.len()
    }

    /// Card-style argument vector: every operand must be an integer and is
    /// truncated to 16 bits.
    pub fn args(&self) -> Result<Vec<u16>, Fault> {
        self.operands
            .iter()
            .enumerate()
            .map(|(position, operand)| match operand {
                Operand::Int { value } => Ok(*value as u16),
                _ => Err(Fault::BadOperand {
                    position,
                    expected: "integer",
                }),
            })
            .collect()
    }

    /// Like [`Invocation::args`] but rejects any other operand count.
    pub fn args_exact<const N: usize>(&self) -> Result<[u16; N], Fault> {
        if self.argc() != N {
            return Err(Fault::shape(self.argc()));
        }
        let args = self.args()?;
        let mut out = [0u16; N];
        out.copy_from_slice(&args);
        Ok(out)
    }

    pub fn target_var(&self) -> Result<u16, Fault> {
        self.var.ok_or(Fault::MissingTargetVar)
    }

    /// Notes a target variable on an opcode that ignores it.
    pub fn var_unused_check(&self) {
        if let Some(var) = self.var {
            log::debug!("opcode {}: target variable {var} is unused", self.code);
        }
    }

    pub fn operands(&self) -> Operands<'_> {
        Operands::new(&self.operands)
    }
}

impl From<&ScriptEntry> for Invocation {
    fn from(entry: &ScriptEntry) -> Self {
        Invocation {
            code: entry.opcode,
            var: entry.var,
            operands: entry.operands.clone(),
        }
    }
}

/// Variable reference read inline from an operand list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarRef {
    pub index: usize,
    pub ty: VarType,
}

/// Cursor over an invocation's operands, for handlers that consume them
/// one at a time.
#[derive(Debug, Clone)]
pub struct Operands<'a> {
    items: &'a [Operand],
    position: usize,
}

impl<'a> Operands<'a> {
    pub fn new(items: &'a [Operand]) -> Self {
        Operands { items, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.items.len() - self.position
    }

    fn next(&mut self, expected: &'static str) -> Result<&'a Operand, Fault> {
        let operand = self.items.get(self.position).ok_or(Fault::BadOperand {
            position: self.position,
            expected,
        })?;
        self.position += 1;
        Ok(operand)
    }

    fn mismatch(&self, expected: &'static str) -> Fault {
        Fault::BadOperand {
            position: self.position - 1,
            expected,
        }
    }

    /// Integer expression: a literal, or the current value of a variable.
    pub fn read_val_expr(&mut self, vars: &VariableStore) -> Result<i32, Fault> {
        match self.next("integer expression")? {
            Operand::Int { value } => Ok(*value),
            Operand::Var { index, ty } => {
                let value = vars.read(usize::from(*index), *ty)?;
                Ok(value.as_u32() as i32)
            }
            Operand::Str { .. } => Err(self.mismatch("integer expression")),
        }
    }

    pub fn read_var_index(&mut self) -> Result<VarRef, Fault> {
        match self.next("variable reference")? {
            Operand::Var { index, ty } => Ok(VarRef {
                index: usize::from(*index),
                ty: *ty,
            }),
            _ => Err(self.mismatch("variable reference")),
        }
    }

    /// String expression: a literal, or the contents of a variable.
    pub fn read_string(&mut self, vars: &VariableStore) -> Result<String, Fault> {
        match self.next("string expression")? {
            Operand::Str { value } => Ok(value.clone()),
            Operand::Var { index, ty } => {
                let value = vars.read(usize::from(*index), *ty)?;
                Ok(value.into_string())
            }
            Operand::Int { .. } => Err(self.mismatch("string expression")),
        }
    }

    pub fn skip(&mut self, count: usize) -> Result<(), Fault> {
        for _ in 0..count {
            self.next("operand")?;
        }
        Ok(())
    }

    /// Fails when operands are left over after a handler read its shape.
    pub fn finish(&self) -> Result<(), Fault> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(Fault::shape(self.items.len()))
        }
    }
}

/// Looks up and invokes handlers from one immutable table.
pub struct Dispatcher<C> {
    table: OpcodeTable<C>,
}

impl<C> Dispatcher<C> {
    pub fn new(table: OpcodeTable<C>) -> Self {
        Dispatcher { table }
    }

    pub fn table(&self) -> &OpcodeTable<C> {
        &self.table
    }

    /// Runs the handler for `invocation.code`, returning its name. Unknown
    /// codes never reach a handler.
    pub fn dispatch(&self, ctx: &mut C, invocation: &Invocation) -> Result<&'static str, Diagnostic> {
        let Some(entry) = self.table.get(invocation.code) else {
            return Err(Diagnostic::unknown_opcode(
                invocation.code,
                invocation.argc(),
            ));
        };
        log::debug!("opcode {}: {}", invocation.code, entry.name);
        (entry.handler)(ctx, invocation)
            .map(|()| entry.name)
            .map_err(|fault| Diagnostic::from_fault(invocation.code, entry.name, &fault))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub executed: usize,
    pub handled: usize,
    pub diagnosed: usize,
}

impl RunReport {
    pub fn merge(&mut self, other: RunReport) {
        self.executed += other.executed;
        self.handled += other.handled;
        self.diagnosed += other.diagnosed;
    }
}

/// Runs scripts through a dispatcher, collecting diagnostics and moving on
/// to the next instruction whenever one is raised.
pub struct Interpreter<C> {
    dispatcher: Dispatcher<C>,
    diagnostics: DiagnosticLog,
}

impl<C> Interpreter<C> {
    pub fn new(table: OpcodeTable<C>) -> Self {
        Interpreter {
            dispatcher: Dispatcher::new(table),
            diagnostics: DiagnosticLog::new(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<C> {
        &self.dispatcher
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticLog {
        std::mem::take(&mut self.diagnostics)
    }

    /// Returns true when the handler completed without a diagnostic.
    pub fn step(&mut self, ctx: &mut C, invocation: &Invocation) -> bool {
        match self.dispatcher.dispatch(ctx, invocation) {
            Ok(_) => true,
            Err(diagnostic) => {
                self.diagnostics.record(diagnostic);
                false
            }
        }
    }

    pub fn run(&mut self, ctx: &mut C, entries: &[ScriptEntry]) -> RunReport {
        let mut report = RunReport::default();
        for entry in entries {
            let invocation = Invocation::from(entry);
            report.executed += 1;
            if self.step(ctx, &invocation) {
                report.handled += 1;
            } else {
                report.diagnosed += 1;
            }
        }
        report
    }
}

/// Writes `value` with the width implied by `ty`: 8-bit tags store a byte,
/// 16-bit tags a word, everything else a full 32-bit value.
pub fn store_value(vars: &mut VariableStore, target: VarRef, value: u32) -> Result<(), Fault> {
    let ty = match target.ty {
        VarType::Int8 => VarType::Int8,
        VarType::Int16 => VarType::Int16,
        VarType::Int32 | VarType::Str => VarType::Int32,
    };
    vars.write(target.index, ty, &VarValue::Int(value))?;
    Ok(())
}
