//! Card stacks: scene scripts driven by a layered opcode table plus
//! persistent puzzles that tick while a card is shown.

use std::rc::Rc;

use relic_formats::ScriptEntry;

use crate::diagnostics::{DiagnosticLog, Fault};
use crate::dispatch::{Interpreter, RunReport};
use crate::media::MediaCallback;
use crate::opcodes::OpcodeTable;
use crate::puzzle::PuzzleStack;
use crate::vars::{VarError, VariableStore};

pub mod common;
pub mod fortress;

pub use common::{CommonStack, common_layer};
pub use fortress::{FortressPuzzles, FortressStack, FortressState, fortress_layer};

/// State shared by every card stack.
#[derive(Debug)]
pub struct CardContext {
    pub vars: VariableStore,
    pub media: Rc<dyn MediaCallback>,
    /// Resource whose script is currently running.
    pub invoking_resource: u16,
}

impl CardContext {
    pub fn new(vars: VariableStore, media: Rc<dyn MediaCallback>) -> Self {
        CardContext {
            vars,
            media,
            invoking_resource: 0,
        }
    }

    /// Card variable `var` lives in the 16-bit slot at `var * 2`. Variables
    /// past the end of the store read as 0.
    pub fn var(&self, var: u16) -> u16 {
        self.vars.read_u16(card_slot(var)).unwrap_or(0)
    }

    /// Returns true when the stored value changed.
    pub fn set_var(&mut self, var: u16, value: u16) -> Result<bool, VarError> {
        let slot = card_slot(var);
        let previous = self.vars.read_u16(slot)?;
        self.vars.write_u16(slot, value)?;
        Ok(previous != value)
    }

    pub fn toggle_var(&mut self, var: u16) -> Result<(), VarError> {
        let slot = card_slot(var);
        let value = self.vars.read_u16(slot)?;
        self.vars.write_u16(slot, value ^ 1)
    }
}

fn card_slot(var: u16) -> usize {
    usize::from(var) * 2
}

/// Variable access as seen by card opcodes. Stacks override individual
/// variables and fall back to the card store for the rest.
pub trait CardHost {
    fn card(&self) -> &CardContext;
    fn card_mut(&mut self) -> &mut CardContext;

    fn get_var(&self, var: u16) -> u16 {
        self.card().var(var)
    }

    fn toggle_var(&mut self, var: u16) -> Result<(), Fault> {
        self.card_mut().toggle_var(var)?;
        Ok(())
    }

    /// Returns true when the area bound to `var` needs a redraw.
    fn set_var_value(&mut self, var: u16, value: u16) -> Result<bool, Fault> {
        Ok(self.card_mut().set_var(var, value)?)
    }
}

/// Runs cards of one stack: entry script, persistent ticks, then exit.
pub struct CardSession<S> {
    interpreter: Interpreter<S>,
    stack: S,
}

impl<S: CardHost + PuzzleStack> CardSession<S> {
    pub fn new(table: OpcodeTable<S>, stack: S) -> Self {
        CardSession {
            interpreter: Interpreter::new(table),
            stack,
        }
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    pub fn table(&self) -> &OpcodeTable<S> {
        self.interpreter.dispatcher().table()
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        self.interpreter.diagnostics()
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticLog {
        self.interpreter.take_diagnostics()
    }

    /// Runs a script on behalf of `resource`, which opcodes such as the
    /// init handlers see as the invoking resource.
    pub fn enter_card(&mut self, resource: u16, entries: &[ScriptEntry]) -> RunReport {
        self.stack.card_mut().invoking_resource = resource;
        self.interpreter.run(&mut self.stack, entries)
    }

    pub fn tick(&mut self) {
        self.stack.run_persistent();
    }

    pub fn leave_card(&mut self) {
        let armed = self.stack.armed_puzzles();
        if !armed.is_empty() {
            log::debug!("leaving card, disabling {}", armed.join(", "));
        }
        self.stack.disable_persistent();
    }

    pub fn run_card(&mut self, resource: u16, entries: &[ScriptEntry], ticks: u32) -> RunReport {
        let report = self.enter_card(resource, entries);
        for _ in 0..ticks {
            self.tick();
        }
        self.leave_card();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::NullMedia;

    #[test]
    fn card_variables_use_sixteen_bit_slots() {
        let mut card = CardContext::new(VariableStore::new(16, 4), Rc::new(NullMedia));
        assert!(card.set_var(3, 0x1234).unwrap());
        assert!(!card.set_var(3, 0x1234).unwrap());
        assert_eq!(card.vars.read_u16(6).unwrap(), 0x1234);

        card.toggle_var(3).unwrap();
        assert_eq!(card.var(3), 0x1235);
    }

    #[test]
    fn unknown_card_variables_read_zero() {
        let mut card = CardContext::new(VariableStore::new(8, 4), Rc::new(NullMedia));
        assert_eq!(card.var(400), 0);
        assert!(card.set_var(400, 1).is_err());
        assert!(card.toggle_var(400).is_err());
    }
}
