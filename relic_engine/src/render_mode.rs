//! Display render modes selectable by users and settings files.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    #[default]
    Default,
    HerculesGreen,
    HerculesAmber,
    Cga,
    Ega,
    Vga,
    Amiga,
    FmTowns,
    Pc9821,
    Pc9801,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderModeDescription {
    pub code: Option<&'static str>,
    pub label: Option<&'static str>,
    pub id: RenderMode,
}

const fn mode(code: &'static str, label: &'static str, id: RenderMode) -> RenderModeDescription {
    RenderModeDescription {
        code: Some(code),
        label: Some(label),
        id,
    }
}

/// Known render modes in display order. The last row is the terminator.
pub static RENDER_MODES: [RenderModeDescription; 10] = [
    mode("hercGreen", "Hercules Green", RenderMode::HerculesGreen),
    mode("hercAmber", "Hercules Amber", RenderMode::HerculesAmber),
    mode("cga", "CGA", RenderMode::Cga),
    mode("ega", "EGA", RenderMode::Ega),
    mode("vga", "VGA", RenderMode::Vga),
    mode("amiga", "Amiga", RenderMode::Amiga),
    mode("fmtowns", "FM-Towns", RenderMode::FmTowns),
    mode("pc9821", "PC-9821 (256 Colors)", RenderMode::Pc9821),
    mode("pc9801", "PC-9801 (16 Colors)", RenderMode::Pc9801),
    RenderModeDescription {
        code: None,
        label: None,
        id: RenderMode::Default,
    },
];

fn entries() -> impl Iterator<Item = &'static RenderModeDescription> {
    RENDER_MODES.iter().take_while(|entry| entry.code.is_some())
}

/// Case-insensitive lookup; empty or unknown codes give [`RenderMode::Default`].
pub fn parse_render_mode(code: &str) -> RenderMode {
    if code.is_empty() {
        return RenderMode::Default;
    }
    entries()
        .find(|entry| entry.code.is_some_and(|known| known.eq_ignore_ascii_case(code)))
        .map(|entry| entry.id)
        .unwrap_or_default()
}

pub fn render_mode_code(id: RenderMode) -> Option<&'static str> {
    entries().find(|entry| entry.id == id).and_then(|entry| entry.code)
}

pub fn render_mode_description(id: RenderMode) -> Option<&'static str> {
    entries().find(|entry| entry.id == id).and_then(|entry| entry.label)
}

impl RenderMode {
    pub fn code(self) -> Option<&'static str> {
        render_mode_code(self)
    }

    pub fn description(self) -> Option<&'static str> {
        render_mode_description(self)
    }
}

impl FromStr for RenderMode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_render_mode(s))
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code().unwrap_or("default"))
    }
}

impl Serialize for RenderMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code().unwrap_or(""))
    }
}

impl<'de> Deserialize<'de> for RenderMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(parse_render_mode(&code))
    }
}
