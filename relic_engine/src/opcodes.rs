//! Opcode tables built from ordered layers.
//!
//! A layer is one interpreter version's list of registrations. Tables are
//! assembled by applying layers oldest first, so a derived version adds new
//! codes or replaces inherited handlers without restating the base set.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::diagnostics::Fault;
use crate::dispatch::Invocation;

pub type Handler<C> = fn(&mut C, &Invocation) -> Result<(), Fault>;

pub struct OpcodeEntry<C> {
    pub code: u16,
    pub name: &'static str,
    pub handler: Handler<C>,
}

impl<C> Clone for OpcodeEntry<C> {
    fn clone(&self) -> Self {
        OpcodeEntry {
            code: self.code,
            name: self.name,
            handler: self.handler,
        }
    }
}

impl<C> fmt::Debug for OpcodeEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcodeEntry")
            .field("code", &self.code)
            .field("name", &self.name)
            .finish()
    }
}

/// Ordered registrations contributed by one interpreter version.
pub struct Layer<C> {
    label: &'static str,
    entries: Vec<OpcodeEntry<C>>,
}

impl<C> Layer<C> {
    pub fn new(label: &'static str) -> Self {
        Layer {
            label,
            entries: Vec::new(),
        }
    }

    pub fn op(mut self, code: u16, name: &'static str, handler: Handler<C>) -> Self {
        self.entries.push(OpcodeEntry {
            code,
            name,
            handler,
        });
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn entries(&self) -> &[OpcodeEntry<C>] {
        &self.entries
    }
}

/// Record of a registration that replaced an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Override {
    pub code: u16,
    pub replaced: &'static str,
    pub by: &'static str,
    pub layer: &'static str,
}

pub struct OpcodeTable<C> {
    entries: BTreeMap<u16, OpcodeEntry<C>>,
    layers: Vec<&'static str>,
    overrides: Vec<Override>,
}

impl<C> Default for OpcodeTable<C> {
    fn default() -> Self {
        OpcodeTable {
            entries: BTreeMap::new(),
            layers: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

impl<C> OpcodeTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table by applying `layers` in order.
    pub fn layered<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer<C>>,
    {
        let mut table = Self::new();
        for layer in layers {
            table.apply(layer);
        }
        table
    }

    pub fn apply(&mut self, layer: Layer<C>) {
        let label = layer.label;
        for entry in layer.entries {
            self.insert(entry, label);
        }
        self.layers.push(label);
    }

    /// Registers one handler outside any layer. Returns the name of the
    /// handler it replaced, if any.
    pub fn register(
        &mut self,
        code: u16,
        handler: Handler<C>,
        name: &'static str,
    ) -> Option<&'static str> {
        self.insert(
            OpcodeEntry {
                code,
                name,
                handler,
            },
            "direct",
        )
    }

    fn insert(&mut self, entry: OpcodeEntry<C>, layer: &'static str) -> Option<&'static str> {
        let code = entry.code;
        let by = entry.name;
        let replaced = self.entries.insert(code, entry).map(|old| old.name);
        if let Some(replaced) = replaced {
            self.overrides.push(Override {
                code,
                replaced,
                by,
                layer,
            });
        }
        replaced
    }

    pub fn get(&self, code: u16) -> Option<&OpcodeEntry<C>> {
        self.entries.get(&code)
    }

    pub fn contains(&self, code: u16) -> bool {
        self.entries.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn layers(&self) -> &[&'static str] {
        &self.layers
    }

    pub fn overrides(&self) -> &[Override] {
        &self.overrides
    }

    /// `(code, handler name)` pairs in code order.
    pub fn describe(&self) -> Vec<(u16, &'static str)> {
        self.entries
            .values()
            .map(|entry| (entry.code, entry.name))
            .collect()
    }
}
