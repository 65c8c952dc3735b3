//! Exhaustive enumeration of the sentences of a grammar.
//!
//! Enumeration ignores features, so every variant of a template yields the same sentences. The
//! leftmost non-terminal is always expanded first, trying productions in grammar order, which
//! makes the first constituent vary slowest. Sentences of the variants therefore line up
//! position by position, which is what lets agreeing and disagreeing sentences be paired later.
use ahash::{AHashMap, AHashSet};

use crate::grammar::{FeatureGrammar, Production, Symbol};

#[derive(Debug, Clone)]
struct Frame<'g> {
    prefix: Vec<&'g str>,
    ///Symbols still to expand, the leftmost last, with their derivation depth.
    pending: Vec<(&'g Symbol, usize)>,
}

///A lazy, deterministic iterator over the distinct sentences of a grammar.
#[derive(Debug, Clone)]
pub struct Sentences<'g> {
    grammar: &'g FeatureGrammar,
    productions: AHashMap<&'g str, Vec<&'g Production>>,
    stack: Vec<Frame<'g>>,
    seen: AHashSet<Vec<&'g str>>,
    cap: usize,
    max_depth: usize,
    yielded: usize,
    pruned: usize,
    truncated: bool,
    exhausted: bool,
}

impl<'g> Sentences<'g> {
    ///Enumerates at most `cap` sentences, abandoning derivations deeper than `max_depth`.
    pub fn new(grammar: &'g FeatureGrammar, cap: usize, max_depth: usize) -> Self {
        let mut productions: AHashMap<&str, Vec<&Production>> = AHashMap::new();
        for p in grammar.productions() {
            productions.entry(p.lhs.name.as_str()).or_default().push(p);
        }
        let mut sentences = Sentences {
            grammar,
            productions,
            stack: vec![],
            seen: AHashSet::new(),
            cap,
            max_depth,
            yielded: 0,
            pruned: 0,
            truncated: false,
            exhausted: false,
        };
        sentences.restart();
        sentences
    }

    ///Starts over from the first sentence.
    pub fn restart(&mut self) {
        self.stack.clear();
        self.seen.clear();
        self.yielded = 0;
        self.pruned = 0;
        self.truncated = false;
        self.exhausted = false;
        if let Some(productions) = self.productions.get(self.grammar.start()) {
            for p in productions.iter().rev().copied() {
                self.stack.push(Frame {
                    prefix: vec![],
                    pending: p.rhs.iter().rev().map(|s| (s, 1)).collect(),
                });
            }
        }
    }

    pub fn grammar(&self) -> &'g FeatureGrammar {
        self.grammar
    }

    ///Whether the cap stopped enumeration while sentences remained.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    ///How many derivations were abandoned at the depth limit.
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn search(&mut self) -> Option<Vec<&'g str>> {
        'frames: while let Some(mut frame) = self.stack.pop() {
            loop {
                match frame.pending.pop() {
                    None => {
                        if self.seen.insert(frame.prefix.clone()) {
                            return Some(frame.prefix);
                        }
                        continue 'frames;
                    }
                    Some((Symbol::Terminal(t), _)) => frame.prefix.push(t.as_str()),
                    Some((Symbol::NonTerminal(c), depth)) => {
                        if depth >= self.max_depth {
                            self.pruned += 1;
                            continue 'frames;
                        }
                        let Some(productions) = self.productions.get(c.name.as_str()) else {
                            continue 'frames;
                        };
                        for p in productions.iter().rev().copied() {
                            let mut pending = frame.pending.clone();
                            pending.extend(p.rhs.iter().rev().map(|s| (s, depth + 1)));
                            self.stack.push(Frame {
                                prefix: frame.prefix.clone(),
                                pending,
                            });
                        }
                        continue 'frames;
                    }
                }
            }
        }
        None
    }
}

impl<'g> Iterator for Sentences<'g> {
    type Item = Vec<&'g str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        if self.yielded >= self.cap {
            self.truncated = self.search().is_some();
            self.exhausted = true;
            return None;
        }
        match self.search() {
            Some(sentence) => {
                self.yielded += 1;
                Some(sentence)
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammars::{DYCK_LANGUAGE, TOY_AGREEMENT};
    use anyhow::Result;

    fn joined(sentences: Sentences) -> Vec<String> {
        sentences.map(|s| s.join(" ")).collect()
    }

    #[test]
    fn odometer_order() -> Result<()> {
        let g = FeatureGrammar::parse(TOY_AGREEMENT)?;
        assert_eq!(
            joined(Sentences::new(&g, 100, 10)),
            [
                "cat * sleeps ^",
                "cat * sleep ^",
                "dog * sleeps ^",
                "dog * sleep ^",
                "cats * sleeps ^",
                "cats * sleep ^",
                "dogs * sleeps ^",
                "dogs * sleep ^",
            ]
        );
        Ok(())
    }

    #[test]
    fn cap_and_truncation() -> Result<()> {
        let g = FeatureGrammar::parse(TOY_AGREEMENT)?;
        let mut sentences = Sentences::new(&g, 3, 10);
        assert_eq!(sentences.by_ref().count(), 3);
        assert!(sentences.truncated());

        let mut sentences = Sentences::new(&g, 8, 10);
        assert_eq!(sentences.by_ref().count(), 8);
        assert!(!sentences.truncated());

        let mut sentences = Sentences::new(&g, 100, 10);
        let first: Vec<_> = sentences.by_ref().take(5).collect();
        sentences.restart();
        let again: Vec<_> = sentences.take(5).collect();
        assert_eq!(first, again);
        Ok(())
    }

    #[test]
    fn duplicates_are_skipped() -> Result<()> {
        let g = FeatureGrammar::parse("S -> A | B\nA -> 'x' | 'y'\nB -> 'y' | 'z'")?;
        assert_eq!(joined(Sentences::new(&g, 100, 10)), ["x", "y", "z"]);
        Ok(())
    }

    #[test]
    fn recursion_is_depth_limited() -> Result<()> {
        let g = FeatureGrammar::parse(DYCK_LANGUAGE)?;
        let mut sentences = Sentences::new(&g, 1000, 4);
        let all: Vec<String> = sentences.by_ref().map(|s| s.concat()).collect();
        assert!(sentences.pruned() > 0);
        assert!(!sentences.truncated());
        assert_eq!(all.len(), 26);
        assert!(all.contains(&String::new()));
        assert!(all.contains(&"()()".to_string()));
        assert!(all.contains(&"(())".to_string()));
        for s in all.iter() {
            let mut depth = 0i32;
            for c in s.chars() {
                depth += if c == '(' { 1 } else { -1 };
                assert!(depth >= 0);
            }
            assert_eq!(depth, 0);
        }
        Ok(())
    }
}
