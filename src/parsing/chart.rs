//! An Earley recognizer over grounded (feature-free) grammars.
use ahash::AHashSet;
use bitvec::prelude::*;
use tinyvec::TinyVec;

///Constant feature assignments as `(feature, value)` ids, sorted by feature.
pub(crate) type Bundle = TinyVec<[(u32, u32); 2]>;

///A right-hand side mention of a category, e.g. `NP[AGR='sg']`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Reference {
    pub name: u32,
    pub constraint: Bundle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GroundSymbol {
    Terminal(String),
    Reference(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroundProduction {
    pub lhs: u32,
    pub bundle: Bundle,
    pub rhs: Vec<GroundSymbol>,
    ///Index of the production of the source grammar this was grounded from.
    pub source: usize,
}

///A constraint is satisfied if every feature it names is either absent from the bundle or has
///the same value there.
pub(crate) fn compatible(constraint: &Bundle, bundle: &Bundle) -> bool {
    constraint.iter().all(|(feature, value)| {
        bundle
            .iter()
            .filter(|(f, _)| f == feature)
            .all(|(_, v)| v == value)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Item {
    production: usize,
    dot: usize,
    origin: usize,
}

impl Item {
    fn advance(self) -> Self {
        Item {
            dot: self.dot + 1,
            ..self
        }
    }
}

#[derive(Debug, Default)]
struct ItemSet {
    items: Vec<Item>,
    seen: AHashSet<Item>,
}

impl ItemSet {
    fn push(&mut self, item: Item) {
        if self.seen.insert(item) {
            self.items.push(item);
        }
    }
}

///Recognizes token sequences against a grounded grammar.
///
///The parser is immutable after construction and can be shared across threads.
#[derive(Debug, Clone)]
pub struct ChartParser {
    start: u32,
    productions: Vec<GroundProduction>,
    ///For each reference, the productions it can expand to.
    expansions: Vec<BitVec>,
    nullable: BitVec,
    ///Source indices of the start symbol's productions, ascending.
    start_sources: Vec<usize>,
}

impl ChartParser {
    pub(crate) fn new(
        start: u32,
        productions: Vec<GroundProduction>,
        references: Vec<Reference>,
        start_sources: Vec<usize>,
    ) -> Self {
        let expansions: Vec<BitVec> = references
            .iter()
            .map(|r| {
                productions
                    .iter()
                    .map(|p| p.lhs == r.name && compatible(&r.constraint, &p.bundle))
                    .collect()
            })
            .collect();

        let mut nullable_production = bitvec![0; productions.len()];
        let mut nullable = bitvec![0; references.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for (i, p) in productions.iter().enumerate() {
                if nullable_production[i] {
                    continue;
                }
                let empty = p.rhs.iter().all(|s| match s {
                    GroundSymbol::Terminal(_) => false,
                    GroundSymbol::Reference(r) => nullable[*r],
                });
                if empty {
                    nullable_production.set(i, true);
                    changed = true;
                }
            }
            for (r, e) in expansions.iter().enumerate() {
                if !nullable[r] && e.iter_ones().any(|p| nullable_production[p]) {
                    nullable.set(r, true);
                    changed = true;
                }
            }
        }

        ChartParser {
            start,
            productions,
            expansions,
            nullable,
            start_sources,
        }
    }

    ///The number of productions of the start symbol in the source grammar.
    pub fn n_start_productions(&self) -> usize {
        self.start_sources.len()
    }

    ///The number of grounded productions.
    pub fn n_productions(&self) -> usize {
        self.productions.len()
    }

    pub fn accepts(&self, tokens: &[&str]) -> bool {
        self.complete_parses(tokens).next().is_some()
    }

    ///Which of the start symbol's source productions (in grammar order) head a complete parse of
    ///`tokens`.
    pub fn accepted_productions(&self, tokens: &[&str]) -> BitVec {
        let mut accepted = bitvec![0; self.start_sources.len()];
        for source in self.complete_parses(tokens) {
            if let Ok(i) = self.start_sources.binary_search(&source) {
                accepted.set(i, true);
            }
        }
        accepted
    }

    ///Whether `production` could begin at position `i`, looking only at its first symbol.
    fn can_start(&self, production: usize, i: usize, tokens: &[&str]) -> bool {
        match self.productions[production].rhs.first() {
            Some(GroundSymbol::Terminal(t)) => tokens.get(i).is_some_and(|x| *x == t.as_str()),
            _ => true,
        }
    }

    fn complete_parses(&self, tokens: &[&str]) -> impl Iterator<Item = usize> + '_ {
        let chart = self.chart(tokens);
        let last = chart.and_then(|mut chart| chart.pop());
        last.into_iter().flat_map(move |set| {
            set.items.into_iter().filter_map(move |item| {
                let p = &self.productions[item.production];
                (item.origin == 0 && item.dot == p.rhs.len() && p.lhs == self.start)
                    .then_some(p.source)
            })
        })
    }

    ///Fills the Earley chart, or gives up as soon as some token cannot be scanned.
    fn chart(&self, tokens: &[&str]) -> Option<Vec<ItemSet>> {
        let n = tokens.len();
        let mut chart: Vec<ItemSet> = (0..=n).map(|_| ItemSet::default()).collect();
        for (p, production) in self.productions.iter().enumerate() {
            if production.lhs == self.start && self.can_start(p, 0, tokens) {
                chart[0].push(Item {
                    production: p,
                    dot: 0,
                    origin: 0,
                });
            }
        }

        for i in 0..=n {
            let mut j = 0;
            while j < chart[i].items.len() {
                let item = chart[i].items[j];
                j += 1;
                match self.productions[item.production].rhs.get(item.dot) {
                    None => {
                        let advanced: Vec<Item> = chart[item.origin]
                            .items
                            .iter()
                            .filter(|waiting| self.waits_for(waiting, item.production))
                            .map(|waiting| waiting.advance())
                            .collect();
                        for x in advanced {
                            chart[i].push(x);
                        }
                    }
                    Some(GroundSymbol::Terminal(t)) => {
                        if i < n && tokens[i] == t.as_str() {
                            chart[i + 1].push(item.advance());
                        }
                    }
                    Some(GroundSymbol::Reference(r)) => {
                        for p in self.expansions[*r].iter_ones() {
                            if self.can_start(p, i, tokens) {
                                chart[i].push(Item {
                                    production: p,
                                    dot: 0,
                                    origin: i,
                                });
                            }
                        }
                        if self.nullable[*r] {
                            chart[i].push(item.advance());
                        }
                    }
                }
            }
            if i < n && chart[i + 1].items.is_empty() {
                return None;
            }
        }
        Some(chart)
    }

    fn waits_for(&self, item: &Item, completed: usize) -> bool {
        match self.productions[item.production].rhs.get(item.dot) {
            Some(GroundSymbol::Reference(r)) => self.expansions[*r][completed],
            _ => false,
        }
    }
}
