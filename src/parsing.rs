//! Compilation of feature grammars into recognizers.
//!
//! Feature constraints are compiled away by grounding: every variable of a production is replaced
//! by each constant its feature takes anywhere in the grammar, so the [`ChartParser`] only ever
//! compares interned constant bundles.
use ahash::AHashMap;
use itertools::Itertools;
use tracing::debug;

use crate::errors::{GenerationError, Result};
use crate::grammar::{Category, FeatureGrammar, FeatureValue, Symbol};
use crate::templates::GrammarSpec;
use crate::VariantKey;
use chart::{Bundle, GroundProduction, GroundSymbol, Reference};

pub mod chart;
pub use chart::ChartParser;

///A feature grammar together with the recognizer built from it.
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    grammar: FeatureGrammar,
    parser: ChartParser,
}

impl CompiledGrammar {
    ///Compiles the grammar of a single variant of a template.
    pub fn compile(spec: &GrammarSpec, key: &VariantKey) -> Result<Self> {
        let start = spec.start_rule(key).ok_or_else(|| {
            GenerationError::InvalidConfig(format!(
                "template `{}` has no variant {key}",
                spec.template().name
            ))
        })?;
        CompiledGrammar::from_text(&format!("% start S\n{start}\n{}", spec.body()))
    }

    ///Compiles one grammar whose start productions are the start rules of every variant of the
    ///template, in variant order.
    pub fn compile_unified(spec: &GrammarSpec) -> Result<Self> {
        let starts = spec.variants().iter().map(|(_, rule)| rule).join("\n");
        CompiledGrammar::from_text(&format!("% start S\n{starts}\n{}", spec.body()))
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let grammar = FeatureGrammar::parse(text)?;
        CompiledGrammar::new(grammar)
    }

    pub fn new(grammar: FeatureGrammar) -> Result<Self> {
        grammar.validate()?;
        let parser = ground(&grammar)?;
        debug!(
            productions = grammar.productions().len(),
            grounded = parser.n_productions(),
            "compiled grammar"
        );
        Ok(CompiledGrammar { grammar, parser })
    }

    pub fn grammar(&self) -> &FeatureGrammar {
        &self.grammar
    }

    pub fn parser(&self) -> &ChartParser {
        &self.parser
    }

    pub fn accepts(&self, tokens: &[&str]) -> bool {
        self.parser.accepts(tokens)
    }
}

#[derive(Debug, Default)]
struct Interner {
    ids: AHashMap<String, u32>,
    names: Vec<String>,
}

impl Interner {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }
}

struct Grounder {
    categories: Interner,
    features: Interner,
    values: Interner,
    ///Constants each feature takes somewhere in the grammar, in order of first use.
    domains: AHashMap<u32, Vec<u32>>,
    references: Vec<Reference>,
    reference_ids: AHashMap<Reference, usize>,
}

impl Grounder {
    fn new(grammar: &FeatureGrammar) -> Self {
        let mut grounder = Grounder {
            categories: Interner::default(),
            features: Interner::default(),
            values: Interner::default(),
            domains: AHashMap::new(),
            references: vec![],
            reference_ids: AHashMap::new(),
        };
        let categories = grammar.productions().iter().flat_map(|p| {
            std::iter::once(&p.lhs).chain(p.rhs.iter().filter_map(|s| match s {
                Symbol::NonTerminal(c) => Some(c),
                Symbol::Terminal(_) => None,
            }))
        });
        for category in categories {
            for (feature, value) in category.features.iter() {
                if let FeatureValue::Constant(v) = value {
                    let f = grounder.features.intern(feature);
                    let v = grounder.values.intern(v);
                    let domain = grounder.domains.entry(f).or_default();
                    if !domain.contains(&v) {
                        domain.push(v);
                    }
                }
            }
        }
        grounder
    }

    fn bundle(&mut self, category: &Category, assignment: &AHashMap<&str, u32>) -> Bundle {
        let mut pairs: Vec<(u32, u32)> = category
            .features
            .iter()
            .filter_map(|(feature, value)| {
                let v = match value {
                    FeatureValue::Constant(v) => self.values.intern(v),
                    FeatureValue::Variable(x) => *assignment.get(x.as_str())?,
                };
                Some((self.features.intern(feature), v))
            })
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs.into_iter().collect()
    }

    fn reference(&mut self, category: &Category, assignment: &AHashMap<&str, u32>) -> usize {
        let reference = Reference {
            name: self.categories.intern(&category.name),
            constraint: self.bundle(category, assignment),
        };
        if let Some(id) = self.reference_ids.get(&reference) {
            return *id;
        }
        let id = self.references.len();
        self.references.push(reference.clone());
        self.reference_ids.insert(reference, id);
        id
    }

    ///The values a variable can take: every constant of every feature it is bound to.
    fn variable_domain(&mut self, features: &[&str]) -> Result<Vec<u32>> {
        let mut domain = vec![];
        for feature in features {
            let f = self.features.intern(feature);
            for v in self.domains.get(&f).into_iter().flatten() {
                if !domain.contains(v) {
                    domain.push(*v);
                }
            }
        }
        if domain.is_empty() {
            return Err(GenerationError::UnboundFeature(
                features.first().copied().unwrap_or_default().to_string(),
            ));
        }
        Ok(domain)
    }
}

///Variables of a production in order of first occurrence, with every feature each one is bound to.
fn variables<'a>(categories: &[&'a Category]) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut variables: Vec<(&'a str, Vec<&'a str>)> = vec![];
    for category in categories {
        for (feature, value) in category.features.iter() {
            if let FeatureValue::Variable(x) = value {
                match variables.iter_mut().find(|(name, _)| *name == x.as_str()) {
                    Some((_, features)) => {
                        if !features.contains(&feature.as_str()) {
                            features.push(feature.as_str());
                        }
                    }
                    None => variables.push((x.as_str(), vec![feature.as_str()])),
                }
            }
        }
    }
    variables
}

fn ground(grammar: &FeatureGrammar) -> Result<ChartParser> {
    let mut grounder = Grounder::new(grammar);
    let mut productions = vec![];

    for (source, production) in grammar.productions().iter().enumerate() {
        let categories: Vec<&Category> = std::iter::once(&production.lhs)
            .chain(production.rhs.iter().filter_map(|s| match s {
                Symbol::NonTerminal(c) => Some(c),
                Symbol::Terminal(_) => None,
            }))
            .collect();
        let variables = variables(&categories);
        let domains = variables
            .iter()
            .map(|(_, features)| grounder.variable_domain(features))
            .collect::<Result<Vec<_>>>()?;

        let assignments: Vec<Vec<u32>> = if domains.is_empty() {
            vec![vec![]]
        } else {
            domains.into_iter().multi_cartesian_product().collect()
        };

        for values in assignments {
            let assignment: AHashMap<&str, u32> = variables
                .iter()
                .map(|(name, _)| *name)
                .zip(values)
                .collect();
            let lhs = grounder.categories.intern(&production.lhs.name);
            let bundle = grounder.bundle(&production.lhs, &assignment);
            let rhs = production
                .rhs
                .iter()
                .map(|s| match s {
                    Symbol::Terminal(t) => GroundSymbol::Terminal(t.clone()),
                    Symbol::NonTerminal(c) => {
                        GroundSymbol::Reference(grounder.reference(c, &assignment))
                    }
                })
                .collect();
            productions.push(GroundProduction {
                lhs,
                bundle,
                rhs,
                source,
            });
        }
    }

    let start = grounder.categories.intern(grammar.start());
    let start_sources = grammar
        .productions()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.lhs.name == grammar.start())
        .map(|(i, _)| i)
        .collect();
    Ok(ChartParser::new(
        start,
        productions,
        grounder.references,
        start_sources,
    ))
}
