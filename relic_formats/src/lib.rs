pub mod script;

pub use script::{
    NO_VAR, Operand, SCRIPT_EXTENSION, SCRIPT_MAGIC, SCRIPT_VERSION, Script, ScriptEntry,
    ScriptFile, VarType, scan_scripts,
};
