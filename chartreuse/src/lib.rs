#![deny(warnings)]

mod grammar;
pub use crate::grammar::{Grammar, GrammarBuilder, Nonterminal, Production, Symbol, Terminal};

mod leftcorner;
pub use crate::leftcorner::LeftcornerRelations;

mod trees;
pub use crate::trees::{Tree, TreeNode};

mod parser;
pub use crate::parser::ViterbiParser;
