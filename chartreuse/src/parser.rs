#![deny(warnings)]

use crate::grammar::{Grammar, Production, Symbol, Terminal};
use crate::trees::{Tree, TreeNode};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Bottom-up chart parser with bounded per-span retention: an
/// approximate Viterbi k-best decoder. Owns an immutable grammar and
/// keeps no state between calls; each `parse` builds and discards its
/// own chart, so one parser can serve any number of sequential calls
/// and the grammar itself is safely shareable across threads.
pub struct ViterbiParser<T: Terminal> {
    grammar: Grammar<T>,
}

// A chart cell holds everything covering exactly [begin, end) under a
// symbol: token leaves for terminal tags, candidate trees for category
// tags. Sparse, so a map rather than a dense triangle. Buckets are
// ordered by tree shape, so enumeration order (and with it score
// tie-breaking) is identical on every call.
type CellKey<T> = (usize, usize, Symbol<T>);

struct Chart<T: Terminal> {
    cells: HashMap<CellKey<T>, BTreeSet<TreeNode<T>>>,
}

impl<T: Terminal> Chart<T> {
    fn new() -> Self {
        Chart { cells: HashMap::new() }
    }

    fn seed(&mut self, tokens: &[T]) {
        for (i, tok) in tokens.iter().enumerate() {
            self.cells.insert(
                (i, i + 1, Symbol::Term(*tok)),
                BTreeSet::from([TreeNode::Leaf(*tok)]),
            );
        }
    }

    /// Every list of children that matches `rhs` exactly over
    /// [begin, end): an empty rhs accepts only an empty subspan; a
    /// nonempty rhs claims a prefix for its first symbol at every
    /// possible split and recurses on the rest. Driven purely by
    /// already-resolved cells, never forward-looking, so it bottoms out.
    fn match_rhs(&self, rhs: &[Symbol<T>], begin: usize, end: usize) -> Vec<Vec<TreeNode<T>>> {
        if begin >= end && rhs.is_empty() {
            return vec![Vec::new()];
        }
        if begin >= end || rhs.is_empty() {
            return Vec::new();
        }
        let (first, rest) = (&rhs[0], &rhs[1..]);
        let mut childlists = Vec::new();
        for split in begin..=end {
            let Some(heads) = self.cells.get(&(begin, split, first.clone())) else {
                continue;
            };
            for tail in self.match_rhs(rest, split, end) {
                for head in heads {
                    let mut children = Vec::with_capacity(1 + tail.len());
                    children.push(head.clone());
                    children.extend(tail.iter().cloned());
                    childlists.push(children);
                }
            }
        }
        childlists
    }

    /// Insert under the bounded top-k rule; true when the cell changed.
    /// A shape already present wins regardless of score; below capacity
    /// anything goes; at capacity the candidate must strictly beat the
    /// current minimum, which gets evicted (ties among minimal
    /// incumbents fall to the shape-smallest, so truncation picks the
    /// same survivors every run).
    fn insert_bounded(&mut self, key: CellKey<T>, node: TreeNode<T>, top_k: usize) -> bool {
        let bucket = self.cells.entry(key).or_default();
        if bucket.contains(&node) {
            return false;
        }
        if bucket.len() < top_k {
            bucket.insert(node);
            return true;
        }
        let weakest = bucket
            .iter()
            .min_by(|a, b| a.log_prob().total_cmp(&b.log_prob()))
            .cloned();
        match weakest {
            Some(loser) if loser.log_prob() < node.log_prob() => {
                bucket.remove(&loser);
                bucket.insert(node);
                true
            }
            _ => false,
        }
    }
}

impl<T: Terminal> ViterbiParser<T> {
    pub fn new(grammar: Grammar<T>) -> Self {
        ViterbiParser { grammar }
    }

    pub fn grammar(&self) -> &Grammar<T> {
        &self.grammar
    }

    /// The single best derivation per span (`parse_top_k` with k = 1).
    pub fn parse(&self, tokens: &[T]) -> HashSet<Arc<Tree<T>>> {
        self.parse_top_k(tokens, 1)
    }

    /// Up to `top_k` highest-scoring derivations of `tokens` rooted at
    /// the start symbol. Retention is bounded per chart cell, which
    /// makes this an approximation of the sentence-level k-best set: a
    /// tree evicted for scoring low within its span might have combined
    /// into a better whole-sentence derivation, and it will not come
    /// back. No derivation is not an error; the result is just empty.
    /// `top_k` of zero is not rejected, it just retains nothing useful.
    pub fn parse_top_k(&self, tokens: &[T], top_k: usize) -> HashSet<Arc<Tree<T>>> {
        let mut chart = self.fill_chart(tokens, top_k);
        let n = tokens.len();
        match chart.cells.remove(&(0, n, Symbol::NonTerm(self.grammar.start().clone()))) {
            Some(bucket) => bucket
                .into_iter()
                .filter_map(|node| match node {
                    TreeNode::Node(tree) => Some(tree),
                    TreeNode::Leaf(_) => None,
                })
                .collect(),
            None => HashSet::new(),
        }
    }

    fn fill_chart(&self, tokens: &[T], top_k: usize) -> Chart<T> {
        let mut chart = Chart::new();
        chart.seed(tokens);

        // Spans by strictly increasing length: any dependency on a
        // shorter sub-range is already resolved by the time it's
        // needed; only same-span chains need the inner fixpoint.
        let n = tokens.len();
        for length in 1..=n {
            for begin in 0..=n - length {
                self.fill_span(&mut chart, begin, begin + length, top_k);
            }
        }
        log::debug!("chart over {} tokens settled into {} cells", n, chart.cells.len());
        chart
    }

    /// Widest category bucket left in a settled chart. Terminal cells
    /// hold exactly their seeded leaf, so only category cells count.
    #[cfg(test)]
    pub(crate) fn widest_category_cell(&self, tokens: &[T], top_k: usize) -> usize {
        self.fill_chart(tokens, top_k)
            .cells
            .iter()
            .filter(|((_, _, symbol), _)| !symbol.is_terminal())
            .map(|(_, bucket)| bucket.len())
            .max()
            .unwrap_or(0)
    }

    /// Saturate one span: instantiate every production against the
    /// frozen chart, fold the candidates back in, and repeat until a
    /// full pass changes nothing. The fixpoint is what lets unary and
    /// epsilon chains stack up within a single span.
    fn fill_span(&self, chart: &mut Chart<T>, begin: usize, end: usize, top_k: usize) {
        let mut passes = 0;
        loop {
            passes += 1;
            let mut changed = false;
            for (production, children) in self.instantiations(chart, begin, end) {
                let log_prob = production.prob.ln()
                    + children.iter().map(TreeNode::log_prob).sum::<f64>();
                let tree = Tree::new(production.lhs.clone(), children, log_prob);
                let key = (begin, end, Symbol::NonTerm(production.lhs.clone()));
                if chart.insert_bounded(key, TreeNode::Node(Arc::new(tree)), top_k) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        log::trace!("span ({}, {}) settled after {} passes", begin, end, passes);
    }

    /// All ways any production's rhs matches over [begin, end) given
    /// the chart as it stands. Productions are tried in grammar
    /// insertion order, which is also the arrival order that breaks
    /// score ties on insertion.
    fn instantiations<'g>(
        &'g self,
        chart: &Chart<T>,
        begin: usize,
        end: usize,
    ) -> Vec<(&'g Production<T>, Vec<TreeNode<T>>)> {
        let mut result = Vec::new();
        for production in self.grammar.productions() {
            for children in chart.match_rhs(&production.rhs, begin, end) {
                result.push((production, children));
            }
        }
        result
    }
}
