#![deny(warnings)]

use crate::leftcorner::LeftcornerRelations;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::{fmt, hash};

/// Anything usable as an atomic input token: a finite-alphabet element
/// that can be copied around, ordered, hashed and printed.
pub trait Terminal: Copy + Ord + hash::Hash + fmt::Debug + fmt::Display {}
impl<T: Copy + Ord + hash::Hash + fmt::Debug + fmt::Display> Terminal for T {}

/// A named grammar category. Identity and ordering are the name alone;
/// clones share the underlying string so symbols are cheap to spread
/// through productions, chart keys and trees.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nonterminal(Arc<str>);

impl Nonterminal {
    pub fn new(name: impl AsRef<str>) -> Self {
        Nonterminal(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One slot of a production's right hand side, or a chart-cell tag.
/// Nonterminals order before terminals.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol<T: Terminal> {
    NonTerm(Nonterminal),
    Term(T),
}

impl<T: Terminal> Symbol<T> {
    pub fn nonterm(name: impl AsRef<str>) -> Self {
        Symbol::NonTerm(Nonterminal::new(name))
    }

    pub fn terminal(token: T) -> Self {
        Symbol::Term(token)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Term(_))
    }

    pub fn as_nonterm(&self) -> Option<&Nonterminal> {
        match self {
            Symbol::NonTerm(cat) => Some(cat),
            Symbol::Term(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&T> {
        match self {
            Symbol::NonTerm(_) => None,
            Symbol::Term(tok) => Some(tok),
        }
    }
}

impl<T: Terminal> fmt::Debug for Symbol<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::NonTerm(cat) => write!(f, "NonTerm({})", cat),
            Symbol::Term(tok) => write!(f, "Term({:?})", tok),
        }
    }
}

impl<T: Terminal> fmt::Display for Symbol<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::NonTerm(cat) => write!(f, "{}", cat),
            Symbol::Term(tok) => write!(f, "'{}'", tok),
        }
    }
}

/// One rewrite rule: `lhs -> rhs` with probability `prob` in (0, 1].
/// An empty `rhs` is an epsilon production. `prob` is taken on faith;
/// out-of-range values rank oddly but never break anything.
#[derive(Clone)]
pub struct Production<T: Terminal> {
    pub lhs: Nonterminal,
    pub rhs: Vec<Symbol<T>>,
    pub prob: f64,
}

// Productions are deduped and ordered by lhs+rhs only (ie: not prob).
// Two rules that expand the same way are the same rule for container
// purposes even when their probabilities differ.
impl<T: Terminal> PartialEq for Production<T> {
    fn eq(&self, other: &Production<T>) -> bool {
        self.lhs == other.lhs && self.rhs == other.rhs
    }
}

impl<T: Terminal> Eq for Production<T> {}

impl<T: Terminal> hash::Hash for Production<T> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.lhs.hash(state);
        self.rhs.hash(state);
    }
}

impl<T: Terminal> Ord for Production<T> {
    fn cmp(&self, other: &Production<T>) -> Ordering {
        self.lhs
            .cmp(&other.lhs)
            .then_with(|| self.rhs.cmp(&other.rhs))
    }
}

impl<T: Terminal> PartialOrd for Production<T> {
    fn partial_cmp(&self, other: &Production<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Terminal> fmt::Display for Production<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rhs = self
            .rhs
            .iter()
            .map(|sym| sym.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{} -> {}", self.lhs, rhs)
    }
}

impl<T: Terminal> fmt::Debug for Production<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} @ {}", self, self.prob)
    }
}

/// A probabilistic context-free grammar, immutable once built. Besides
/// the start symbol and the production list it carries derived lookup
/// indexes and the leftcorner relations, all computed once from the
/// production list and exposed read-only. The chart parser walks the
/// plain production list; the indexes and leftcorners exist for
/// optimized expansion strategies layered on top.
pub struct Grammar<T: Terminal> {
    start: Nonterminal,
    productions: Vec<Production<T>>,
    categories: BTreeSet<Nonterminal>,
    by_lhs: HashMap<Nonterminal, Vec<Production<T>>>,
    by_first: HashMap<Symbol<T>, Vec<Production<T>>>,
    empties: HashMap<Nonterminal, Production<T>>,
    lexical: HashMap<T, BTreeSet<Production<T>>>,
    leftcorners: LeftcornerRelations<T>,
}

impl<T: Terminal> Grammar<T> {
    /// Build a grammar from a start symbol and its productions. The
    /// production list keeps its insertion order, which later breaks
    /// ties during chart enumeration. An empty list is a degenerate
    /// grammar that derives nothing.
    pub fn new(start: Nonterminal, productions: Vec<Production<T>>) -> Self {
        let categories: BTreeSet<_> = productions.iter().map(|p| p.lhs.clone()).collect();

        let mut by_lhs: HashMap<Nonterminal, Vec<Production<T>>> = HashMap::new();
        let mut by_first: HashMap<Symbol<T>, Vec<Production<T>>> = HashMap::new();
        let mut empties: HashMap<Nonterminal, Production<T>> = HashMap::new();
        let mut lexical: HashMap<T, BTreeSet<Production<T>>> = HashMap::new();

        for prod in &productions {
            by_lhs.entry(prod.lhs.clone()).or_default().push(prod.clone());
            match prod.rhs.first() {
                Some(first) => by_first.entry(first.clone()).or_default().push(prod.clone()),
                // At most one epsilon production per lhs, last write wins
                None => {
                    empties.insert(prod.lhs.clone(), prod.clone());
                }
            }
            for sym in &prod.rhs {
                if let Symbol::Term(tok) = sym {
                    lexical.entry(*tok).or_default().insert(prod.clone());
                }
            }
        }

        let leftcorners = LeftcornerRelations::new(&categories, &productions);
        log::debug!(
            "grammar built: {} productions, {} categories, start {}",
            productions.len(),
            categories.len(),
            start
        );

        Grammar {
            start,
            productions,
            categories,
            by_lhs,
            by_first,
            empties,
            lexical,
            leftcorners,
        }
    }

    pub fn start(&self) -> &Nonterminal {
        &self.start
    }

    /// All productions, in insertion order.
    pub fn productions(&self) -> &[Production<T>] {
        &self.productions
    }

    /// Every category appearing as a left hand side.
    pub fn categories(&self) -> &BTreeSet<Nonterminal> {
        &self.categories
    }

    /// Productions whose left hand side is `cat`.
    pub fn productions_for(&self, cat: &Nonterminal) -> &[Production<T>] {
        self.by_lhs.get(cat).map_or(&[], Vec::as_slice)
    }

    /// Productions whose (nonempty) right hand side starts with `sym`.
    pub fn productions_starting_with(&self, sym: &Symbol<T>) -> &[Production<T>] {
        self.by_first.get(sym).map_or(&[], Vec::as_slice)
    }

    /// The epsilon production registered for `cat`, if any.
    pub fn empty_production(&self, cat: &Nonterminal) -> Option<&Production<T>> {
        self.empties.get(cat)
    }

    /// Every production mentioning `token` anywhere in its right hand
    /// side, deduped by shape.
    pub fn lexical_productions(&self, token: &T) -> impl Iterator<Item = &Production<T>> {
        self.lexical.get(token).into_iter().flatten()
    }

    /// Leftcorner reachability preprocessing. Available for
    /// leftcorner-filtered expansion strategies; the bundled chart
    /// parser does not consult it.
    pub fn leftcorner_relations(&self) -> &LeftcornerRelations<T> {
        &self.leftcorners
    }
}

/// Assembles productions with a little less ceremony. No validation
/// happens here: unknown categories, unnormalized probability mass or
/// unreachable rules are all the caller's business.
pub struct GrammarBuilder<T: Terminal> {
    productions: Vec<Production<T>>,
}

impl<T: Terminal> Default for GrammarBuilder<T> {
    fn default() -> Self {
        GrammarBuilder { productions: Vec::new() }
    }
}

impl<T: Terminal> GrammarBuilder<T> {
    pub fn rule(mut self, lhs: impl AsRef<str>, rhs: &[Symbol<T>], prob: f64) -> Self {
        self.productions.push(Production {
            lhs: Nonterminal::new(lhs),
            rhs: rhs.to_vec(),
            prob,
        });
        self
    }

    pub fn into_grammar(self, start: impl AsRef<str>) -> Grammar<T> {
        Grammar::new(Nonterminal::new(start), self.productions)
    }
}

///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Grammar, GrammarBuilder, Nonterminal, Production, Symbol};
    use std::collections::HashSet;

    fn nt(name: &str) -> Symbol<char> {
        Symbol::nonterm(name)
    }

    fn t(tok: char) -> Symbol<char> {
        Symbol::terminal(tok)
    }

    fn grammar() -> Grammar<char> {
        GrammarBuilder::default()
            .rule("S", &[nt("A"), nt("R")], 1.0)
            .rule("A", &[t('A')], 1.0)
            .rule("R", &[nt("R"), nt("B")], 0.5)
            .rule("R", &[nt("B")], 0.5)
            .rule("B", &[t('B')], 1.0)
            .into_grammar("S")
    }

    #[test]
    fn production_identity_ignores_prob() {
        let lo = Production { lhs: Nonterminal::new("R"), rhs: vec![nt("B")], prob: 0.1 };
        let hi = Production { lhs: Nonterminal::new("R"), rhs: vec![nt("B")], prob: 0.9 };
        assert_eq!(lo, hi);
        let mut set = HashSet::new();
        set.insert(lo);
        set.insert(hi);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn production_order_ignores_prob() {
        let a = Production { lhs: Nonterminal::new("A"), rhs: vec![t('a')], prob: 0.9 };
        let b = Production { lhs: Nonterminal::new("B"), rhs: Vec::new(), prob: 0.1 };
        assert!(a < b);
        let b2 = Production { lhs: Nonterminal::new("B"), rhs: Vec::new(), prob: 0.7 };
        assert_eq!(b.cmp(&b2), std::cmp::Ordering::Equal);
    }

    #[test]
    fn categories_and_lhs_index() {
        let g = grammar();
        let cats: Vec<_> = g.categories().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(cats, vec!["A", "B", "R", "S"]);
        assert_eq!(g.productions_for(&Nonterminal::new("R")).len(), 2);
        assert_eq!(g.productions_for(&Nonterminal::new("S")).len(), 1);
        assert!(g.productions_for(&Nonterminal::new("Z")).is_empty());
    }

    #[test]
    fn first_symbol_index() {
        let g = grammar();
        assert_eq!(g.productions_starting_with(&nt("R")).len(), 1);
        // Both R -> R B and R -> B are reachable from their first symbols
        assert_eq!(g.productions_starting_with(&nt("B")).len(), 1);
        assert_eq!(g.productions_starting_with(&t('A')).len(), 1);
        assert!(g.productions_starting_with(&t('z')).is_empty());
    }

    #[test]
    fn epsilon_index_last_write_wins() {
        let g = GrammarBuilder::default()
            .rule("E", &[], 0.25)
            .rule("E", &[], 0.75)
            .rule("S", &[nt("E"), t('x')], 1.0)
            .into_grammar("S");
        let eps = g.empty_production(&Nonterminal::new("E")).unwrap();
        assert!(eps.rhs.is_empty());
        assert_eq!(eps.prob, 0.75);
        assert!(g.empty_production(&Nonterminal::new("S")).is_none());
    }

    #[test]
    fn lexical_index_dedupes_by_shape() {
        let g = GrammarBuilder::default()
            .rule("S", &[t('x'), nt("S")], 0.3)
            .rule("S", &[t('x'), nt("S")], 0.6)
            .rule("S", &[t('x')], 0.1)
            .into_grammar("S");
        // Duplicate shapes collapse; distinct shapes don't
        assert_eq!(g.lexical_productions(&'x').count(), 2);
        assert_eq!(g.lexical_productions(&'y').count(), 0);
    }

    #[test]
    fn degenerate_grammar() {
        let g: Grammar<char> = Grammar::new(Nonterminal::new("S"), Vec::new());
        assert!(g.productions().is_empty());
        assert!(g.categories().is_empty());
        assert_eq!(g.start().name(), "S");
    }
}
