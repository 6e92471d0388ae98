// registry.rs — Dispatch registry
//
// Two append-only tables filled during one compilation pass:
//   - the A table, keyed by A-tag, seeded from the placeholder entries of the
//     seed table literal and then holding one A→B function per declaration;
//   - the B table, keyed by B constructor, holding one B→A registration per
//     declaration.
// Generated functions look entries up only when they run, by which time the
// pass has finished and both tables are complete.

use std::collections::HashMap;

use serde::Serialize;

use crate::ast::{Mode, Span};
use crate::driver::CompileError;
use crate::node::CompiledNode;

// ── Data types ──────────────────────────────────────────────────────────────

/// Index of a compiled node, allocated in registration (source) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// One row of the A-tag table.
#[derive(Debug, Clone, PartialEq)]
pub enum ATableEntry {
    /// Placeholder present in the seed literal before the pass started.
    Seed { tag: String, span: Span },
    /// A→B function compiled from a declaration.
    Compiled { tag: String, node: NodeId },
}

impl ATableEntry {
    pub fn tag(&self) -> &str {
        match self {
            ATableEntry::Seed { tag, .. } | ATableEntry::Compiled { tag, .. } => tag,
        }
    }
}

/// One row of the B-constructor table.
#[derive(Debug, Clone, PartialEq)]
pub struct BTableEntry {
    pub ctor: String,
    pub node: NodeId,
    /// An earlier declaration already registered this constructor; lookups
    /// keep resolving to that one.
    pub shadowed: bool,
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    pub id: NodeId,
    pub shadowed: bool,
}

// ── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Registry {
    a_table: Vec<ATableEntry>,
    b_table: Vec<BTableEntry>,
    nodes: Vec<CompiledNode>,
    by_tag: HashMap<String, usize>,
    by_ctor: HashMap<String, NodeId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry whose A table starts with the given placeholder tags.
    pub fn seeded<I>(seeds: I) -> Result<Self, CompileError>
    where
        I: IntoIterator<Item = (String, Span)>,
    {
        let mut registry = Registry::new();
        for (tag, span) in seeds {
            registry.seed(&tag, span)?;
        }
        Ok(registry)
    }

    /// Append a placeholder A-table entry.
    pub fn seed(&mut self, tag: &str, span: Span) -> Result<(), CompileError> {
        if let Some(first) = self.tag_span(tag) {
            return Err(CompileError::DuplicateTag {
                tag: tag.to_string(),
                span,
                first,
            });
        }
        self.by_tag.insert(tag.to_string(), self.a_table.len());
        self.a_table.push(ATableEntry::Seed {
            tag: tag.to_string(),
            span,
        });
        Ok(())
    }

    /// Append a compiled node: one A-table entry under its tag and one
    /// B-table entry under its constructor.
    pub fn register(&mut self, node: CompiledNode) -> Result<Registered, CompileError> {
        if let Some(first) = self.tag_span(&node.a_tag) {
            return Err(CompileError::DuplicateTag {
                tag: node.a_tag.clone(),
                span: node.span,
                first,
            });
        }

        let id = NodeId(self.nodes.len() as u32);
        let shadowed = self.by_ctor.contains_key(&node.b_ctor);
        if !shadowed {
            self.by_ctor.insert(node.b_ctor.clone(), id);
        }

        self.by_tag.insert(node.a_tag.clone(), self.a_table.len());
        self.a_table.push(ATableEntry::Compiled {
            tag: node.a_tag.clone(),
            node: id,
        });
        self.b_table.push(BTableEntry {
            ctor: node.b_ctor.clone(),
            node: id,
            shadowed,
        });
        self.nodes.push(node);

        Ok(Registered { id, shadowed })
    }

    /// The compiled node registered under an A-tag. Seed placeholders have
    /// no compiled function and yield `None`.
    pub fn lookup(&self, tag: &str) -> Option<&CompiledNode> {
        match &self.a_table[*self.by_tag.get(tag)?] {
            ATableEntry::Compiled { node, .. } => Some(self.node(*node)),
            ATableEntry::Seed { .. } => None,
        }
    }

    /// The compiled node whose B→A function handles a constructor.
    pub fn lookup_ctor(&self, ctor: &str) -> Option<&CompiledNode> {
        self.by_ctor.get(ctor).map(|id| self.node(*id))
    }

    /// Source span of whatever currently owns `tag`.
    pub fn tag_span(&self, tag: &str) -> Option<Span> {
        match &self.a_table[*self.by_tag.get(tag)?] {
            ATableEntry::Seed { span, .. } => Some(*span),
            ATableEntry::Compiled { node, .. } => Some(self.node(*node).span),
        }
    }

    pub fn node(&self, id: NodeId) -> &CompiledNode {
        &self.nodes[id.0 as usize]
    }

    /// Compiled nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &CompiledNode> {
        self.nodes.iter()
    }

    pub fn a_table(&self) -> &[ATableEntry] {
        &self.a_table
    }

    pub fn b_table(&self) -> &[BTableEntry] {
        &self.b_table
    }

    pub fn len_a(&self) -> usize {
        self.a_table.len()
    }

    pub fn len_b(&self) -> usize {
        self.b_table.len()
    }

    /// Serializable view of both tables, for `--emit manifest`.
    pub fn manifest(&self) -> Manifest {
        let a_to_b = self
            .a_table
            .iter()
            .map(|entry| match entry {
                ATableEntry::Seed { tag, .. } => AEntryManifest {
                    tag: tag.clone(),
                    seed: true,
                    ctor: None,
                    fields: Vec::new(),
                },
                ATableEntry::Compiled { tag, node } => {
                    let node = self.node(*node);
                    AEntryManifest {
                        tag: tag.clone(),
                        seed: false,
                        ctor: Some(node.b_ctor.clone()),
                        fields: node
                            .fields
                            .iter()
                            .map(|f| FieldManifest {
                                a: f.a_field.name.clone(),
                                mode: f.mode,
                                b: f.b_field.name.clone(),
                            })
                            .collect(),
                    }
                }
            })
            .collect();

        let b_to_a = self
            .b_table
            .iter()
            .map(|entry| BEntryManifest {
                ctor: entry.ctor.clone(),
                tag: self.node(entry.node).a_tag.clone(),
                shadowed: entry.shadowed,
            })
            .collect();

        Manifest { a_to_b, b_to_a }
    }
}

// ── Manifest ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub a_to_b: Vec<AEntryManifest>,
    pub b_to_a: Vec<BEntryManifest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AEntryManifest {
    pub tag: String,
    pub seed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctor: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldManifest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldManifest {
    pub a: String,
    pub mode: Mode,
    pub b: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BEntryManifest {
    pub ctor: String,
    pub tag: String,
    pub shadowed: bool,
}

// ── Tests ───────────────────────────────────────────────────────────────────
