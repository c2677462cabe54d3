#![deny(warnings)]

use crate::grammar::{Nonterminal, Terminal};
use serde_json::json;
use std::cmp::Ordering;
use std::sync::Arc;
use std::{fmt, hash};

/// A constituent: either a finished subtree or a bare input token.
/// Subtrees are shared; once built they are never mutated, so the same
/// child can safely back several candidate parents.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum TreeNode<T: Terminal> {
    Node(Arc<Tree<T>>),
    Leaf(T),
}

impl<T: Terminal> TreeNode<T> {
    /// Score this constituent contributes to a parent. Tokens are
    /// certain, so they contribute nothing in log space.
    pub fn log_prob(&self) -> f64 {
        match self {
            TreeNode::Node(tree) => tree.log_prob,
            TreeNode::Leaf(_) => 0.0,
        }
    }
}

/// One derivation step: a category over an ordered list of children,
/// scored by the natural log of the product of the governing
/// production's probability and every child subtree's probability.
#[derive(Clone, Debug)]
pub struct Tree<T: Terminal> {
    pub symbol: Nonterminal,
    pub children: Vec<TreeNode<T>>,
    pub log_prob: f64,
}

// Trees are deduped by symbol and children only (ie: not log_prob).
// Shape is identity; probability only ranks.
impl<T: Terminal> PartialEq for Tree<T> {
    fn eq(&self, other: &Tree<T>) -> bool {
        self.symbol == other.symbol && self.children == other.children
    }
}

impl<T: Terminal> Eq for Tree<T> {}

impl<T: Terminal> hash::Hash for Tree<T> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.children.hash(state);
    }
}

impl<T: Terminal> Ord for Tree<T> {
    fn cmp(&self, other: &Tree<T>) -> Ordering {
        self.symbol
            .cmp(&other.symbol)
            .then_with(|| self.children.cmp(&other.children))
    }
}

impl<T: Terminal> PartialOrd for Tree<T> {
    fn partial_cmp(&self, other: &Tree<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Terminal> Tree<T> {
    pub fn new(symbol: Nonterminal, children: Vec<TreeNode<T>>, log_prob: f64) -> Self {
        Tree { symbol, children, log_prob }
    }

    /// The yield: left-to-right sequence of terminal leaves.
    pub fn leaves(&self) -> Vec<T> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<T>) {
        for child in &self.children {
            match child {
                TreeNode::Node(sub) => sub.collect_leaves(out),
                TreeNode::Leaf(tok) => out.push(*tok),
            }
        }
    }

    /// Indented debugging rendition. Two spaces per nesting level, one
    /// child per line, quoted leaves, closing paren annotated with the
    /// log-probability at 3 significant digits. Deterministic, not
    /// machine-parseable; `to_json` is the structured form.
    pub fn stringify(&self, nest: usize) -> String {
        let pad = "  ".repeat(nest);
        let mut out = format!("{}{}(\n", pad, self.symbol);
        let mut first = true;
        for child in &self.children {
            if !first {
                out.push_str(",\n");
            }
            first = false;
            match child {
                TreeNode::Node(sub) => out.push_str(&sub.stringify(nest + 1)),
                TreeNode::Leaf(tok) => {
                    out.push_str(&format!("{}  '{}'", pad, tok));
                }
            }
        }
        out.push('\n');
        out.push_str(&format!("{}) [{}]", pad, sigdigits(self.log_prob)));
        out
    }

    /// Nested `{label, children, log_prob}` records; terminal children
    /// become one-element strings.
    pub fn to_json(&self) -> serde_json::Value {
        let children: Vec<serde_json::Value> = self
            .children
            .iter()
            .map(|child| match child {
                TreeNode::Node(sub) => sub.to_json(),
                TreeNode::Leaf(tok) => json!(tok.to_string()),
            })
            .collect();
        json!({
            "label": self.symbol.name(),
            "children": children,
            "log_prob": self.log_prob,
        })
    }
}

impl<T: Terminal> fmt::Display for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.stringify(0))
    }
}

// Rounded to 3 significant digits, the way iostreams' setprecision
// renders. Zero and non-finite values print as-is ("-inf" stays a
// legitimate always-losing score, never a formatting failure).
fn sigdigits(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return format!("{}", value);
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (2 - magnitude).max(0) as usize;
    format!("{:.*}", decimals, value)
}

///////////////////////////////////////////////////////////////////////////////
