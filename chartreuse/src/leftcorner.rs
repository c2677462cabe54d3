#![deny(warnings)]

use crate::grammar::{Nonterminal, Production, Symbol, Terminal};
use std::collections::{BTreeSet, HashMap};

/// Leftcorner reachability, computed once per grammar: which categories
/// and terminals can appear as the very first symbol of some expansion
/// of a category. Kept as a stable part of the grammar contract for
/// leftcorner-filtered parsing strategies; nothing here feeds back into
/// the chart parser's exhaustive matching.
pub struct LeftcornerRelations<T: Terminal> {
    immediate_categories: HashMap<Nonterminal, BTreeSet<Nonterminal>>,
    immediate_terminals: HashMap<Nonterminal, BTreeSet<T>>,
    closure: HashMap<Nonterminal, BTreeSet<Nonterminal>>,
    parents: HashMap<Nonterminal, BTreeSet<Nonterminal>>,
    terminals: HashMap<Nonterminal, BTreeSet<T>>,
}

impl<T: Terminal> LeftcornerRelations<T> {
    pub(crate) fn new(
        categories: &BTreeSet<Nonterminal>,
        productions: &[Production<T>],
    ) -> Self {
        // Immediate graph: the first rhs symbol of every nonempty
        // production, bucketed by kind. Every category is also its own
        // reflexive leftcorner.
        let mut immediate_categories: HashMap<Nonterminal, BTreeSet<Nonterminal>> = categories
            .iter()
            .map(|cat| (cat.clone(), BTreeSet::from([cat.clone()])))
            .collect();
        let mut immediate_terminals: HashMap<Nonterminal, BTreeSet<T>> = categories
            .iter()
            .map(|cat| (cat.clone(), BTreeSet::new()))
            .collect();

        for prod in productions {
            match prod.rhs.first() {
                Some(Symbol::NonTerm(cat)) => {
                    immediate_categories
                        .entry(prod.lhs.clone())
                        .or_default()
                        .insert(cat.clone());
                }
                Some(Symbol::Term(tok)) => {
                    immediate_terminals
                        .entry(prod.lhs.clone())
                        .or_default()
                        .insert(*tok);
                }
                None => {}
            }
        }

        let closure = transitive_closure(&immediate_categories);
        let parents = invert(&closure);

        // Terminal leftcorners of a category: the immediate terminals of
        // everything in its closure.
        let terminals = categories
            .iter()
            .map(|cat| {
                let mut reachable = BTreeSet::new();
                if let Some(cats) = closure.get(cat) {
                    for lc in cats {
                        if let Some(toks) = immediate_terminals.get(lc) {
                            reachable.extend(toks.iter().copied());
                        }
                    }
                }
                (cat.clone(), reachable)
            })
            .collect();

        LeftcornerRelations {
            immediate_categories,
            immediate_terminals,
            closure,
            parents,
            terminals,
        }
    }

    /// Categories that can start some single expansion step of `cat`
    /// (reflexive: always contains `cat` itself).
    pub fn immediate_leftcorners(&self, cat: &Nonterminal) -> Option<&BTreeSet<Nonterminal>> {
        self.immediate_categories.get(cat)
    }

    /// Terminals that can start some single expansion step of `cat`.
    pub fn immediate_leftcorner_terminals(&self, cat: &Nonterminal) -> Option<&BTreeSet<T>> {
        self.immediate_terminals.get(cat)
    }

    /// Reflexive-transitive closure of the immediate category graph.
    pub fn leftcorners(&self, cat: &Nonterminal) -> Option<&BTreeSet<Nonterminal>> {
        self.closure.get(cat)
    }

    /// Inverse of the closure: the categories that `cat` is a
    /// leftcorner of.
    pub fn leftcorner_parents(&self, cat: &Nonterminal) -> Option<&BTreeSet<Nonterminal>> {
        self.parents.get(cat)
    }

    /// Terminals reachable as the first symbol of any full expansion.
    pub fn leftcorner_terminals(&self, cat: &Nonterminal) -> Option<&BTreeSet<T>> {
        self.terminals.get(cat)
    }
}

// Worklist closure over a finite category graph. Each category drains
// an agenda seeded with its immediate neighbors; popping a neighbor
// merges whatever is known about it so far (its full closure when
// already resolved, otherwise its raw neighbors keep the exploration
// going). Terminates because the category set is finite and settled
// nodes never re-enter an agenda.
fn transitive_closure(
    graph: &HashMap<Nonterminal, BTreeSet<Nonterminal>>,
) -> HashMap<Nonterminal, BTreeSet<Nonterminal>> {
    let mut agendas = graph.clone();
    let mut closure: HashMap<Nonterminal, BTreeSet<Nonterminal>> = graph
        .keys()
        .map(|cat| (cat.clone(), BTreeSet::from([cat.clone()])))
        .collect();

    let cats: BTreeSet<Nonterminal> = graph.keys().cloned().collect();
    for cat in &cats {
        while let Some(next) = agendas.get_mut(cat).and_then(BTreeSet::pop_first) {
            let resolved = closure.get(&next).cloned().unwrap_or_default();
            let pending = agendas.get(&next).cloned().unwrap_or_default();

            let reach = closure.entry(cat.clone()).or_default();
            reach.insert(next);
            reach.extend(resolved);
            let settled = reach.clone();

            let agenda = agendas.entry(cat.clone()).or_default();
            agenda.extend(pending);
            for done in &settled {
                agenda.remove(done);
            }
        }
    }

    closure
}

// Reverse every edge; seeded so every category has an entry even when
// nothing reaches it.
fn invert(
    graph: &HashMap<Nonterminal, BTreeSet<Nonterminal>>,
) -> HashMap<Nonterminal, BTreeSet<Nonterminal>> {
    let mut inverted: HashMap<Nonterminal, BTreeSet<Nonterminal>> = graph
        .keys()
        .map(|cat| (cat.clone(), BTreeSet::new()))
        .collect();
    for (cat, reach) in graph {
        for target in reach {
            inverted.entry(target.clone()).or_default().insert(cat.clone());
        }
    }
    inverted
}

///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use crate::grammar::{Grammar, GrammarBuilder, Nonterminal, Symbol};
    use std::collections::BTreeSet;

    fn nt(name: &str) -> Symbol<char> {
        Symbol::nonterm(name)
    }

    fn t(tok: char) -> Symbol<char> {
        Symbol::terminal(tok)
    }

    fn cats(names: &[&str]) -> BTreeSet<Nonterminal> {
        names.iter().map(Nonterminal::new).collect()
    }

    // S -> A 'x'; A -> B 'y'; B -> 'b'; C -> 'c'
    fn chain() -> Grammar<char> {
        GrammarBuilder::default()
            .rule("S", &[nt("A"), t('x')], 1.0)
            .rule("A", &[nt("B"), t('y')], 1.0)
            .rule("B", &[t('b')], 1.0)
            .rule("C", &[t('c')], 1.0)
            .into_grammar("S")
    }

    #[test]
    fn immediate_graph() {
        let g = chain();
        let lc = g.leftcorner_relations();
        assert_eq!(
            lc.immediate_leftcorners(&Nonterminal::new("S")),
            Some(&cats(&["S", "A"]))
        );
        // Reflexive even with no category leftcorners
        assert_eq!(
            lc.immediate_leftcorners(&Nonterminal::new("B")),
            Some(&cats(&["B"]))
        );
        assert_eq!(
            lc.immediate_leftcorner_terminals(&Nonterminal::new("B")),
            Some(&BTreeSet::from(['b']))
        );
        assert!(lc.immediate_leftcorners(&Nonterminal::new("Z")).is_none());
    }

    #[test]
    fn closure_follows_chains() {
        let g = chain();
        let lc = g.leftcorner_relations();
        assert_eq!(
            lc.leftcorners(&Nonterminal::new("S")),
            Some(&cats(&["S", "A", "B"]))
        );
        assert_eq!(
            lc.leftcorners(&Nonterminal::new("A")),
            Some(&cats(&["A", "B"]))
        );
        assert_eq!(lc.leftcorners(&Nonterminal::new("C")), Some(&cats(&["C"])));
    }

    #[test]
    fn closure_handles_cycles() {
        // S -> A 'x'; A -> S 'y' | 'a'
        let g: Grammar<char> = GrammarBuilder::default()
            .rule("S", &[nt("A"), t('x')], 0.5)
            .rule("A", &[nt("S"), t('y')], 0.5)
            .rule("A", &[t('a')], 0.5)
            .into_grammar("S");
        let lc = g.leftcorner_relations();
        assert_eq!(
            lc.leftcorners(&Nonterminal::new("S")),
            Some(&cats(&["S", "A"]))
        );
        assert_eq!(
            lc.leftcorners(&Nonterminal::new("A")),
            Some(&cats(&["S", "A"]))
        );
    }

    #[test]
    fn parents_invert_the_closure() {
        let g = chain();
        let lc = g.leftcorner_relations();
        assert_eq!(
            lc.leftcorner_parents(&Nonterminal::new("B")),
            Some(&cats(&["S", "A", "B"]))
        );
        assert_eq!(
            lc.leftcorner_parents(&Nonterminal::new("S")),
            Some(&cats(&["S"]))
        );
    }

    #[test]
    fn terminal_leftcorners_union_the_closure() {
        let g = chain();
        let lc = g.leftcorner_relations();
        assert_eq!(
            lc.leftcorner_terminals(&Nonterminal::new("S")),
            Some(&BTreeSet::from(['b']))
        );
        assert_eq!(
            lc.leftcorner_terminals(&Nonterminal::new("C")),
            Some(&BTreeSet::from(['c']))
        );
    }
}
