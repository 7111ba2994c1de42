//! Expression-operand interpreters, one opcode layer per engine version.

use std::rc::Rc;

use relic_formats::ScriptEntry;
use serde::{Deserialize, Serialize};

use crate::diagnostics::DiagnosticLog;
use crate::dispatch::{Interpreter, RunReport};
use crate::media::MediaCallback;
use crate::opcodes::{Layer, OpcodeTable};
use crate::vars::{VarError, VariableStore};

pub mod clock;
pub mod v6;
pub mod v7;

pub use clock::{FixedClock, SystemClock, TimeSource, WallClock};

pub struct InterContext {
    pub vars: VariableStore,
    pub media: Rc<dyn MediaCallback>,
    pub clock: Rc<dyn TimeSource>,
}

impl InterContext {
    pub fn new(vars: VariableStore, media: Rc<dyn MediaCallback>) -> Self {
        Self::with_clock(vars, media, Rc::new(SystemClock))
    }

    pub fn with_clock(
        vars: VariableStore,
        media: Rc<dyn MediaCallback>,
        clock: Rc<dyn TimeSource>,
    ) -> Self {
        InterContext { vars, media, clock }
    }

    /// Refreshes the wall-clock variables from the time source.
    pub fn renew_time_in_vars(&mut self) -> Result<(), VarError> {
        self.clock.now().store(&mut self.vars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterVersion {
    V6,
    V7,
}

impl InterVersion {
    /// Layers making up this version, oldest first.
    pub fn layers(self) -> Vec<Layer<InterContext>> {
        match self {
            InterVersion::V6 => vec![v6::layer()],
            InterVersion::V7 => vec![v6::layer(), v7::layer()],
        }
    }

    pub fn table(self) -> OpcodeTable<InterContext> {
        OpcodeTable::layered(self.layers())
    }
}

pub struct InterSession {
    interpreter: Interpreter<InterContext>,
    ctx: InterContext,
    version: InterVersion,
}

impl InterSession {
    pub fn new(version: InterVersion, ctx: InterContext) -> Self {
        InterSession {
            interpreter: Interpreter::new(version.table()),
            ctx,
            version,
        }
    }

    pub fn version(&self) -> InterVersion {
        self.version
    }

    pub fn context(&self) -> &InterContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut InterContext {
        &mut self.ctx
    }

    pub fn table(&self) -> &OpcodeTable<InterContext> {
        self.interpreter.dispatcher().table()
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        self.interpreter.diagnostics()
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticLog {
        self.interpreter.take_diagnostics()
    }

    pub fn run(&mut self, entries: &[ScriptEntry]) -> RunReport {
        self.interpreter.run(&mut self.ctx, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v7_overrides_part_of_v6() {
        let table = InterVersion::V7.table();
        assert_eq!(table.layers(), &["v6", "v7"]);
        let overridden: Vec<u16> = table.overrides().iter().map(|o| o.code).collect();
        assert_eq!(overridden, vec![0x0C, 0x0D]);
        assert!(table.contains(v7::OP_OEM_TO_ANSI));
        assert!(!InterVersion::V6.table().contains(v7::OP_OEM_TO_ANSI));
    }
}
