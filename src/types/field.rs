//! Protocol field trees.

use std::io;

use serde::Serialize;

use crate::intern::NameHandle;

/// One node of a layer's protocol-field tree.
///
/// A node is either a *leaf* carrying the field's raw text value, or an
/// *internal* node carrying an ordered list of child fields; the body enum
/// makes that exactly-one-of choice structural. Child order matches the order
/// fields appeared in the export document.
#[derive(Debug, Clone, Serialize)]
pub struct FieldNode {
    name: NameHandle,
    #[serde(rename = "value")]
    body: FieldBody,
}

/// Body of a [`FieldNode`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FieldBody {
    Leaf(String),
    Internal(Vec<FieldNode>),
}

impl FieldNode {
    pub fn leaf(name: NameHandle, value: String) -> Self {
        Self { name, body: FieldBody::Leaf(value) }
    }

    pub fn internal(name: NameHandle, children: Vec<FieldNode>) -> Self {
        Self { name, body: FieldBody::Internal(children) }
    }

    /// Interned field name.
    pub fn name(&self) -> &NameHandle {
        &self.name
    }

    pub fn body(&self) -> &FieldBody {
        &self.body
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, FieldBody::Leaf(_))
    }

    /// Raw text value, for leaf nodes.
    pub fn value(&self) -> Option<&str> {
        match &self.body {
            FieldBody::Leaf(value) => Some(value),
            FieldBody::Internal(_) => None,
        }
    }

    /// Child fields in document order; empty for leaf nodes.
    pub fn children(&self) -> &[FieldNode] {
        match &self.body {
            FieldBody::Leaf(_) => &[],
            FieldBody::Internal(children) => children,
        }
    }

    /// Write the subtree in indented `name: value` form.
    pub fn dump<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        self.dump_indent(w, 0)
    }

    fn dump_indent<W: io::Write>(&self, w: &mut W, indent: usize) -> io::Result<()> {
        let pad = "  ".repeat(indent);
        match &self.body {
            FieldBody::Leaf(value) => writeln!(w, "{pad}{}: {value}", self.name)?,
            FieldBody::Internal(children) => {
                writeln!(w, "{pad}{}:", self.name)?;
                for child in children {
                    child.dump_indent(w, indent + 1)?;
                }
            }
        }
        Ok(())
    }
}
