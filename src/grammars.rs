//! This module defines the rule text shared by every template, and a few small grammars that are
//! useful in testing or otherwise.

///Phrase-level rules shared by all templates. The lexical rules (`NP`, `V`, `P`, ...) are
///rendered from the vocabulary and appended to these.
pub const STRUCTURAL_RULES: &str = "VP[AGR=?a] -> V[AGR=?a]
VP_intrans[AGR=?a] -> V_intrans[AGR=?a]
PP[AGR=?a] -> P NP_pos[AGR=?a]
PP_pn -> P PN
REL_poss[AGR=?a] -> REL_pn NP_obj[AGR=?a] VP_intrans[AGR=?a]";

///A two-noun, two-verb agreement grammar.
pub const TOY_AGREEMENT: &str = "% start S
S -> NP[AGR=?a] '*' VP[AGR=?a] '^'
VP[AGR=?a] -> V[AGR=?a]
NP[AGR='sg'] -> 'cat' | 'dog'
NP[AGR='pl'] -> 'cats' | 'dogs'
V[AGR='sg'] -> 'sleeps'
V[AGR='pl'] -> 'sleep'";

///Noun phrases with a prepositional modifier whose number is independent of the head's.
pub const TOY_ATTRACTOR: &str = "% start S
S -> NP[AGR=?a] PP VP[AGR=?a]
PP -> 'near' NP
NP[AGR='sg'] -> 'the' N[AGR='sg']
NP[AGR='pl'] -> 'the' N[AGR='pl']
N[AGR='sg'] -> 'key'
N[AGR='pl'] -> 'keys'
VP[AGR='sg'] -> 'is'
VP[AGR='pl'] -> 'are'";

///The [Dyck language](https://en.wikipedia.org/wiki/Dyck_language) or the language of balanced
///parentheses, which is infinite.
pub const DYCK_LANGUAGE: &str = "S -> '(' S ')' S |";
