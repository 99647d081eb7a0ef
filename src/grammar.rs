use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::probability::RuleProbabilities;

/// Index of an interned nonterminal. Ids follow the lexicographic order of
/// the symbol names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl SymbolId {
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// One right-hand side Y Z of a binary rule, with ln q(X -> Y Z).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BinaryAlternative {
  pub left: SymbolId,
  pub right: SymbolId,
  pub log_prob: f64,
}

/// Read-only grammar the parser runs against. Probabilities are kept as
/// natural logs so long sentences don't underflow.
#[derive(Debug, Clone)]
pub struct Grammar {
  symbols: Vec<String>,
  ids: HashMap<String, SymbolId>,
  /// word -> (preterminal, ln q(X -> word)), ordered by symbol id
  lexicon: HashMap<String, Vec<(SymbolId, f64)>>,
  /// X -> its alternatives, ordered by X and then by (Y, Z). Symbols with
  /// no binary rule have no entry.
  binary: Vec<(SymbolId, Vec<BinaryAlternative>)>,
}

impl Grammar {
  pub fn new(probs: &RuleProbabilities) -> Self {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for (key, _) in probs.unary_rules() {
      names.insert(&key.symbol);
    }
    for (key, _) in probs.binary_rules() {
      names.insert(&key.symbol);
      names.insert(&key.left);
      names.insert(&key.right);
    }

    let symbols = names.into_iter().map(str::to_string).collect::<Vec<_>>();
    let ids = symbols
      .iter()
      .enumerate()
      .map(|(idx, name)| (name.clone(), SymbolId(idx as u32)))
      .collect::<HashMap<_, _>>();

    let mut lexicon: HashMap<String, Vec<(SymbolId, f64)>> = HashMap::new();
    // unary rules iterate sorted by symbol first, so each word's list comes
    // out in id order. Zero-probability rules are left out entirely.
    for (key, q) in probs.unary_rules().filter(|(_, q)| *q > 0.0) {
      let id = ids[&key.symbol];
      lexicon
        .entry(key.word.clone())
        .or_default()
        .push((id, q.ln()));
    }

    let mut binary: Vec<(SymbolId, Vec<BinaryAlternative>)> = Vec::new();
    for (key, q) in probs.binary_rules().filter(|(_, q)| *q > 0.0) {
      let parent = ids[&key.symbol];
      let alt = BinaryAlternative {
        left: ids[&key.left],
        right: ids[&key.right],
        log_prob: q.ln(),
      };
      match binary.last_mut() {
        Some((last, alts)) if *last == parent => alts.push(alt),
        _ => binary.push((parent, vec![alt])),
      }
    }

    Self {
      symbols,
      ids,
      lexicon,
      binary,
    }
  }

  /// Number of nonterminals
  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }

  pub fn id(&self, symbol: &str) -> Option<SymbolId> {
    self.ids.get(symbol).copied()
  }

  pub fn symbol(&self, id: SymbolId) -> &str {
    &self.symbols[id.index()]
  }

  pub fn symbol_ids(&self) -> impl Iterator<Item = SymbolId> {
    (0..self.symbols.len() as u32).map(SymbolId)
  }

  /// Preterminals that can emit `word`, with their log probabilities.
  pub fn preterminals(&self, word: &str) -> &[(SymbolId, f64)] {
    self.lexicon.get(word).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn binary_parents(&self) -> &[(SymbolId, Vec<BinaryAlternative>)] {
    &self.binary
  }

  pub fn binary_rule_count(&self) -> usize {
    self.binary.iter().map(|(_, alts)| alts.len()).sum()
  }

  pub fn lexicon_len(&self) -> usize {
    self.lexicon.len()
  }
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "//** nonterminals:")?;
    for nt in self.symbols.iter() {
      write!(f, " {}", nt)?;
    }
    writeln!(f)?;

    for (parent, alts) in self.binary.iter() {
      for alt in alts {
        writeln!(
          f,
          "{} -> {} {} ({:.4})",
          self.symbol(*parent),
          self.symbol(alt.left),
          self.symbol(alt.right),
          alt.log_prob.exp()
        )?;
      }
    }

    let mut words = self.lexicon.keys().collect::<Vec<_>>();
    words.sort();
    for word in words {
      for (id, log_prob) in self.preterminals(word) {
        writeln!(f, "{} -> {} ({:.4})", self.symbol(*id), word, log_prob.exp())?;
      }
    }

    Ok(())
  }
}
