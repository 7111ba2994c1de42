//! Scripted adventure-engine core: a variable store, layered opcode
//! tables, a non-fatal dispatcher, persistent puzzles and the engine
//! lifecycle around them.

pub mod diagnostics;
pub mod dispatch;
pub mod engine;
pub mod inter;
pub mod media;
pub mod opcodes;
pub mod puzzle;
pub mod render_mode;
pub mod settings;
pub mod stacks;
pub mod vars;

pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLog, Fault};
pub use dispatch::{Dispatcher, Interpreter, Invocation, Operands, RunReport};
pub use engine::{Engine, EngineConfig, EngineFeature, Flavor, SaveSlot, Session};
pub use media::{MediaCallback, MediaEvent, MovieRequest, NullMedia, RecordingMediaCallback};
pub use opcodes::{Handler, Layer, OpcodeEntry, OpcodeTable};
pub use puzzle::{PuzzleStack, PuzzleState};
pub use render_mode::{RenderMode, parse_render_mode, render_mode_code, render_mode_description};
pub use settings::Settings;
pub use vars::{VarError, VarType, VarValue, VariableStore};
