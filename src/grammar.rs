//! Feature grammars written in a small, NLTK-compatible rule language.
//!
//! ```text
//! % start S
//! S -> NP[AGR='sg'] '*' VP[AGR='sg'] '^'
//! VP[AGR=?a] -> V[AGR=?a]
//! NP[AGR='sg'] -> 'de vrouw' | 'de man'
//! ```
//!
//! A constraint such as `[AGR='sg']` on a right-hand side symbol unifies with any production of
//! that category whose left-hand side either has the same value or does not mention the feature.
//! Variables (`?a`) are shared across a single production.
use std::fmt::Display;

use ahash::AHashMap;
use chumsky::prelude::*;
use chumsky::text::{ident, inline_whitespace};
use petgraph::{
    algo::is_cyclic_directed,
    graph::{DiGraph, NodeIndex},
    visit::Dfs,
};

use crate::errors::{GenerationError, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureValue {
    Constant(String),
    Variable(String),
}

///A non-terminal together with its feature constraints, e.g. `NP[AGR='sg']`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    pub name: String,
    pub features: Vec<(String, FeatureValue)>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Category {
            name: name.into(),
            features: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(String),
    NonTerminal(Category),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: Category,
    pub rhs: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGrammar {
    start: String,
    productions: Vec<Production>,
}

enum Line {
    Start(String),
    Rule(Category, Vec<Vec<Symbol>>),
}

type ParserExtra<'src> = extra::Err<Rich<'src, char>>;

fn quoted<'src>() -> impl Parser<'src, &'src str, String, ParserExtra<'src>> + Clone {
    let single = any()
        .and_is(none_of(['\'', '\n']))
        .repeated()
        .to_slice()
        .delimited_by(just('\''), just('\''));
    let double = any()
        .and_is(none_of(['"', '\n']))
        .repeated()
        .to_slice()
        .delimited_by(just('"'), just('"'));
    choice((single, double))
        .map(|x: &str| x.to_string())
        .labelled("quoted terminal")
}

fn category_parser<'src>() -> impl Parser<'src, &'src str, Category, ParserExtra<'src>> + Clone {
    let value = choice((
        just('?')
            .ignore_then(ident())
            .map(|x: &str| FeatureValue::Variable(x.to_string()))
            .labelled("feature variable"),
        quoted().map(FeatureValue::Constant),
        ident()
            .map(|x: &str| FeatureValue::Constant(x.to_string()))
            .labelled("feature value"),
    ));

    let feature = ident()
        .then_ignore(just('=').padded())
        .then(value)
        .map(|(name, value): (&str, FeatureValue)| (name.to_string(), value))
        .padded()
        .labelled("feature");

    let features = feature
        .separated_by(just(','))
        .collect::<Vec<_>>()
        .delimited_by(just('['), just(']'))
        .labelled("feature list");

    ident()
        .labelled("category name")
        .then(features.or_not())
        .map(|(name, features): (&str, Option<Vec<_>>)| Category {
            name: name.to_string(),
            features: features.unwrap_or_default(),
        })
}

fn line_parser<'src>() -> impl Parser<'src, &'src str, Line, ParserExtra<'src>> {
    let symbol = choice((
        quoted().map(Symbol::Terminal),
        category_parser().map(Symbol::NonTerminal),
    ));

    //Symbols may abut, as in `NP[AGR='sg']'*'`.
    let sequence = inline_whitespace()
        .ignore_then(symbol)
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(inline_whitespace())
        .labelled("right-hand side");

    let production = category_parser()
        .then_ignore(inline_whitespace())
        .then_ignore(just("->").labelled("arrow"))
        .then(sequence.separated_by(just('|')).at_least(1).collect::<Vec<_>>())
        .map(|(lhs, alternatives)| Line::Rule(lhs, alternatives));

    let directive = just('%')
        .ignore_then(just("start").padded())
        .ignore_then(ident())
        .map(|x: &str| Line::Start(x.to_string()))
        .labelled("start directive");

    choice((directive, production)).then_ignore(end())
}

fn node_for<'a>(
    graph: &mut DiGraph<&'a str, ()>,
    nodes: &mut AHashMap<&'a str, NodeIndex>,
    name: &'a str,
) -> NodeIndex {
    *nodes.entry(name).or_insert_with(|| graph.add_node(name))
}

impl FeatureGrammar {
    ///Parses rule text, one production (or `|`-separated group of productions) per line.
    ///
    ///Blank lines and lines starting with `#` are skipped. Without a `% start` directive the
    ///left-hand side of the first production is the start symbol.
    pub fn parse(text: &str) -> Result<Self> {
        let parser = line_parser();
        let mut start = None;
        let mut productions = vec![];

        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parsed = parser
                .parse(line)
                .into_result()
                .map_err(|errors| GenerationError::GrammarSyntax {
                    line: i + 1,
                    message: errors
                        .into_iter()
                        .map(|x| x.to_string())
                        .collect::<Vec<_>>()
                        .join("; "),
                })?;
            match parsed {
                Line::Start(symbol) => {
                    if start.is_some() {
                        return Err(GenerationError::GrammarSyntax {
                            line: i + 1,
                            message: "the start symbol is declared twice".to_string(),
                        });
                    }
                    start = Some(symbol);
                }
                Line::Rule(lhs, alternatives) => {
                    productions.extend(alternatives.into_iter().map(|rhs| Production {
                        lhs: lhs.clone(),
                        rhs,
                    }))
                }
            }
        }

        let start = match start {
            Some(start) => start,
            None => productions
                .first()
                .map(|p| p.lhs.name.clone())
                .ok_or_else(|| GenerationError::GrammarSyntax {
                    line: 0,
                    message: "the grammar has no productions".to_string(),
                })?,
        };
        Ok(FeatureGrammar { start, productions })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    ///Productions whose left-hand side is `name`, ignoring features.
    pub fn productions_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Production> {
        self.productions.iter().filter(move |p| p.lhs.name == name)
    }

    fn dependency_graph(&self) -> (DiGraph<&str, ()>, AHashMap<&str, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut nodes = AHashMap::new();
        node_for(&mut graph, &mut nodes, self.start.as_str());
        for production in self.productions.iter() {
            let lhs = node_for(&mut graph, &mut nodes, production.lhs.name.as_str());
            for symbol in production.rhs.iter() {
                if let Symbol::NonTerminal(c) = symbol {
                    let rhs = node_for(&mut graph, &mut nodes, c.name.as_str());
                    graph.update_edge(lhs, rhs, ());
                }
            }
        }
        (graph, nodes)
    }

    ///Checks that every non-terminal reachable from the start symbol has at least one
    ///production. Unreachable rules may reference anything.
    pub fn validate(&self) -> Result<()> {
        let (graph, nodes) = self.dependency_graph();
        let mut dfs = Dfs::new(&graph, nodes[self.start.as_str()]);
        while let Some(nx) = dfs.next(&graph) {
            let name = graph[nx];
            if self.productions_for(name).next().is_none() {
                return Err(GenerationError::UndefinedNonterminal(name.to_string()));
            }
        }
        Ok(())
    }

    ///Whether some category can (indirectly) contain itself, in which case the language may be
    ///infinite and enumeration relies on its depth limit.
    pub fn is_recursive(&self) -> bool {
        is_cyclic_directed(&self.dependency_graph().0)
    }
}

impl Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureValue::Constant(x) => write!(f, "'{x}'"),
            FeatureValue::Variable(x) => write!(f, "?{x}"),
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.features.is_empty() {
            write!(f, "[")?;
            for (i, (name, value)) in self.features.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name}={value}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Terminal(x) => write!(f, "'{x}'"),
            Symbol::NonTerminal(c) => write!(f, "{c}"),
        }
    }
}

impl Display for Production {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ->", self.lhs)?;
        for symbol in self.rhs.iter() {
            write!(f, " {symbol}")?;
        }
        Ok(())
    }
}

impl Display for FeatureGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "% start {}", self.start)?;
        for production in self.productions.iter() {
            writeln!(f, "{production}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammars::TOY_AGREEMENT;
    use anyhow::Result;

    fn constant(name: &str, value: &str) -> (String, FeatureValue) {
        (name.to_string(), FeatureValue::Constant(value.to_string()))
    }

    #[test]
    fn parse_rules() -> Result<()> {
        let g = FeatureGrammar::parse(
            "% start S
            S -> NP[AGR='sg']'*' VP[AGR=sg] '^'
            VP[AGR=?a] -> V[AGR=?a]
            NP[AGR='sg'] -> 'de vrouw' | \"de man\"
            V[AGR='sg'] -> 'slaapt'",
        )?;
        assert_eq!(g.start(), "S");
        assert_eq!(g.productions().len(), 5);
        assert_eq!(
            g.productions()[0].rhs,
            vec![
                Symbol::NonTerminal(Category {
                    name: "NP".to_string(),
                    features: vec![constant("AGR", "sg")]
                }),
                Symbol::Terminal("*".to_string()),
                Symbol::NonTerminal(Category {
                    name: "VP".to_string(),
                    features: vec![constant("AGR", "sg")]
                }),
                Symbol::Terminal("^".to_string()),
            ]
        );
        assert_eq!(
            g.productions()[1].lhs.features,
            vec![("AGR".to_string(), FeatureValue::Variable("a".to_string()))]
        );
        let names: Vec<_> = g.productions_for("NP").flat_map(|p| p.rhs.clone()).collect();
        assert_eq!(
            names,
            vec![
                Symbol::Terminal("de vrouw".to_string()),
                Symbol::Terminal("de man".to_string())
            ]
        );
        Ok(())
    }

    #[test]
    fn default_start_and_empty_productions() -> Result<()> {
        let g = FeatureGrammar::parse("A -> B 'x'\nB -> \nB -> 'y'")?;
        assert_eq!(g.start(), "A");
        assert!(g.productions()[1].rhs.is_empty());
        Ok(())
    }

    #[test]
    fn display_round_trip() -> Result<()> {
        let g = FeatureGrammar::parse(TOY_AGREEMENT)?;
        let again = FeatureGrammar::parse(&g.to_string())?;
        assert_eq!(g, again);
        Ok(())
    }

    #[test]
    fn syntax_errors_have_line_numbers() {
        let err = FeatureGrammar::parse("S -> NP\n\nNP[AGR='sg' -> 'x'").unwrap_err();
        assert!(matches!(err, GenerationError::GrammarSyntax { line: 3, .. }));

        let err = FeatureGrammar::parse("% start S\n% start T\nS -> 'x'").unwrap_err();
        assert!(matches!(err, GenerationError::GrammarSyntax { line: 2, .. }));

        assert!(FeatureGrammar::parse("\n# nothing here\n").is_err());
    }

    #[test]
    fn validation() -> Result<()> {
        let g = FeatureGrammar::parse("S -> NP VP\nNP -> 'x'\nUNUSED -> MISSING")?;
        assert!(matches!(
            g.validate(),
            Err(GenerationError::UndefinedNonterminal(x)) if x == "VP"
        ));

        let g = FeatureGrammar::parse("S -> NP\nNP -> 'x'\nUNUSED -> MISSING")?;
        g.validate()?;
        assert!(!g.is_recursive());

        let g = FeatureGrammar::parse("S -> 'a' S | 'b'")?;
        g.validate()?;
        assert!(g.is_recursive());
        Ok(())
    }
}
