use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::MmapOptions;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Bytes that open every compiled script ("RSCR").
pub const SCRIPT_MAGIC: [u8; 4] = *b"RSCR";

/// Container revision produced by [`Script::to_bytes`].
pub const SCRIPT_VERSION: u16 = 1;

/// Target-variable value meaning "this entry has no target variable".
pub const NO_VAR: u16 = 0xFFFF;

/// File extension used for compiled scripts on disk.
pub const SCRIPT_EXTENSION: &str = "rscr";

const OPERAND_INT: u8 = 0x01;
const OPERAND_STR: u8 = 0x02;
const OPERAND_VAR: u8 = 0x03;

/// Width tag attached to a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    Int8,
    Int16,
    Int32,
    Str,
}

impl VarType {
    pub fn code(self) -> u8 {
        match self {
            VarType::Int8 => 1,
            VarType::Int16 => 2,
            VarType::Int32 => 3,
            VarType::Str => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(VarType::Int8),
            2 => Some(VarType::Int16),
            3 => Some(VarType::Int32),
            4 => Some(VarType::Str),
            _ => None,
        }
    }

    /// Bytes occupied by an integer of this width; strings report zero.
    pub fn width(self) -> usize {
        match self {
            VarType::Int8 => 1,
            VarType::Int16 => 2,
            VarType::Int32 => 4,
            VarType::Str => 0,
        }
    }
}

/// One decoded operand of a script entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operand {
    Int { value: i32 },
    Str { value: String },
    Var { index: u16, ty: VarType },
}

impl Operand {
    pub fn int(value: i32) -> Self {
        Operand::Int { value }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Operand::Str {
            value: value.into(),
        }
    }

    pub fn var(index: u16, ty: VarType) -> Self {
        Operand::Var { index, ty }
    }
}

/// A single scripted instruction as stored in a script container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub opcode: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var: Option<u16>,
    #[serde(default)]
    pub operands: Vec<Operand>,
}

impl ScriptEntry {
    pub fn new(opcode: u16, var: Option<u16>, operands: Vec<Operand>) -> Self {
        Self {
            opcode,
            var,
            operands,
        }
    }

    /// Entry whose operands are all plain integers, as card scripts use.
    pub fn with_args(opcode: u16, var: Option<u16>, args: &[u16]) -> Self {
        let operands = args.iter().map(|&arg| Operand::int(i32::from(arg))).collect();
        Self::new(opcode, var, operands)
    }
}

/// Ordered list of script entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub entries: Vec<ScriptEntry>,
}

impl Script {
    pub fn new(entries: Vec<ScriptEntry>) -> Self {
        Self { entries }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() >= 8, "script is too small to contain a header");
        ensure!(bytes[..4] == SCRIPT_MAGIC, "script missing RSCR signature");

        let mut cursor = Cursor::new(&bytes[4..]);
        let version = cursor.read_u16::<LittleEndian>()?;
        if version != SCRIPT_VERSION {
            bail!("unsupported script version {version}");
        }
        let count = cursor.read_u16::<LittleEndian>()? as usize;

        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            let entry = read_entry(&mut cursor)
                .with_context(|| format!("reading script entry {index}"))?;
            entries.push(entry);
        }

        let consumed = cursor.position() as usize;
        let trailing = bytes.len() - 4 - consumed;
        ensure!(trailing == 0, "script has {trailing} trailing bytes");

        Ok(Script { entries })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing JSON script")
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let count = u16::try_from(self.entries.len()).context("too many script entries")?;
        let mut out = Vec::new();
        out.extend_from_slice(&SCRIPT_MAGIC);
        out.write_u16::<LittleEndian>(SCRIPT_VERSION)?;
        out.write_u16::<LittleEndian>(count)?;
        for (index, entry) in self.entries.iter().enumerate() {
            write_entry(&mut out, entry)
                .with_context(|| format!("encoding script entry {index}"))?;
        }
        Ok(out)
    }
}

fn read_entry(cursor: &mut Cursor<&[u8]>) -> Result<ScriptEntry> {
    let opcode = cursor.read_u16::<LittleEndian>()?;
    let var = match cursor.read_u16::<LittleEndian>()? {
        NO_VAR => None,
        var => Some(var),
    };
    let argc = cursor.read_u8()?;
    let mut operands = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        operands.push(read_operand(cursor)?);
    }
    Ok(ScriptEntry {
        opcode,
        var,
        operands,
    })
}

fn read_operand(cursor: &mut Cursor<&[u8]>) -> Result<Operand> {
    let tag = cursor.read_u8()?;
    match tag {
        OPERAND_INT => Ok(Operand::Int {
            value: cursor.read_i32::<LittleEndian>()?,
        }),
        OPERAND_STR => {
            let len = cursor.read_u16::<LittleEndian>()? as usize;
            let mut raw = vec![0u8; len];
            cursor
                .read_exact(&mut raw)
                .context("string operand truncated")?;
            Ok(Operand::Str {
                value: String::from_utf8_lossy(&raw).into_owned(),
            })
        }
        OPERAND_VAR => {
            let code = cursor.read_u8()?;
            let ty = VarType::from_code(code)
                .with_context(|| format!("unknown variable type tag {code}"))?;
            let index = cursor.read_u16::<LittleEndian>()?;
            Ok(Operand::Var { index, ty })
        }
        other => bail!("unknown operand tag {other:#04x}"),
    }
}

fn write_entry<W: Write>(out: &mut W, entry: &ScriptEntry) -> Result<()> {
    if entry.var == Some(NO_VAR) {
        bail!("target variable {NO_VAR:#06x} is reserved");
    }
    let argc = u8::try_from(entry.operands.len()).context("more than 255 operands")?;
    out.write_u16::<LittleEndian>(entry.opcode)?;
    out.write_u16::<LittleEndian>(entry.var.unwrap_or(NO_VAR))?;
    out.write_u8(argc)?;
    for operand in &entry.operands {
        match operand {
            Operand::Int { value } => {
                out.write_u8(OPERAND_INT)?;
                out.write_i32::<LittleEndian>(*value)?;
            }
            Operand::Str { value } => {
                let len = u16::try_from(value.len()).context("string operand too long")?;
                out.write_u8(OPERAND_STR)?;
                out.write_u16::<LittleEndian>(len)?;
                out.write_all(value.as_bytes())?;
            }
            Operand::Var { index, ty } => {
                out.write_u8(OPERAND_VAR)?;
                out.write_u8(ty.code())?;
                out.write_u16::<LittleEndian>(*index)?;
            }
        }
    }
    Ok(())
}

/// Compiled script loaded from disk.
#[derive(Debug)]
pub struct ScriptFile {
    path: PathBuf,
    script: Script,
}

impl ScriptFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = File::open(&path_buf)
            .with_context(|| format!("opening script at {}", path_buf.display()))?;
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .with_context(|| format!("memory-mapping script {}", path_buf.display()))?;

        let script = Script::from_bytes(&mmap)
            .with_context(|| format!("parsing script {}", path_buf.display()))?;

        Ok(ScriptFile {
            path: path_buf,
            script,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn into_script(self) -> Script {
        self.script
    }
}

/// Recursively collects compiled scripts under `root`, sorted by path.
pub fn scan_scripts(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(root).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                eprintln!(
                    "[relic_formats] warning: failed to traverse {}: {err}",
                    root.display()
                );
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = entry.path().extension() else {
            continue;
        };
        if ext.eq_ignore_ascii_case(SCRIPT_EXTENSION) {
            found.push(entry.path().to_path_buf());
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{NamedTempFile, tempdir};

    fn sample_script() -> Script {
        Script::new(vec![
            ScriptEntry::with_args(105, Some(10), &[3, 4]),
            ScriptEntry::new(
                0xA1,
                None,
                vec![
                    Operand::str("game.ini"),
                    Operand::int(-2),
                    Operand::var(40, VarType::Int16),
                ],
            ),
        ])
    }

    #[test]
    fn decodes_hand_built_entry() {
        let mut data = Vec::new();
        data.extend_from_slice(b"RSCR");
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        // opcode 204, no target variable, one int operand
        data.extend_from_slice(&204u16.to_le_bytes());
        data.extend_from_slice(&0xFFFFu16.to_le_bytes());
        data.push(1);
        data.push(0x01);
        data.extend_from_slice(&7i32.to_le_bytes());

        let script = Script::from_bytes(&data).unwrap();
        assert_eq!(script.entries.len(), 1);
        let entry = &script.entries[0];
        assert_eq!(entry.opcode, 204);
        assert_eq!(entry.var, None);
        assert_eq!(entry.operands, vec![Operand::int(7)]);
    }

    #[test]
    fn rejects_unknown_operand_tag() {
        let mut data = Vec::new();
        data.extend_from_slice(b"RSCR");
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.push(1);
        data.push(0x09);

        let err = Script::from_bytes(&data).unwrap_err();
        assert!(format!("{err:#}").contains("unknown operand tag"));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = sample_script().to_bytes().unwrap();
        bytes.push(0);
        assert!(Script::from_bytes(&bytes).is_err());
    }

    #[test]
    fn opens_encoded_file_from_disk() {
        let script = sample_script();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&script.to_bytes().unwrap()).unwrap();

        let loaded = ScriptFile::open(file.path()).unwrap();
        assert_eq!(loaded.script(), &script);
    }

    #[test]
    fn parses_json_scripts() {
        let text = r#"{"entries":[{"opcode":1,"var":4,"operands":[{"kind":"int","value":9}]},{"opcode":2}]}"#;
        let script = Script::from_json_str(text).unwrap();
        assert_eq!(script.entries[0], ScriptEntry::with_args(1, Some(4), &[9]));
        assert!(script.entries[1].operands.is_empty());
    }

    #[test]
    fn scan_finds_nested_scripts_only() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("cards");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("b.rscr"), b"").unwrap();
        fs::write(dir.path().join("a.RSCR"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let found = scan_scripts(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.RSCR", "b.rscr"]);
    }
}
