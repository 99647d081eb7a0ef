use std::collections::BTreeMap;
use std::io::{self, Write};

use tracing::warn;

use crate::counts::GrammarCounts;
use crate::rules::{BinaryKey, UnaryKey};

/// Maximum-likelihood rule probabilities, q(X -> a) = count(X -> a) / count(X).
///
/// These are plain probabilities. The parser converts them to logs when it
/// compiles its grammar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleProbabilities {
  unary: BTreeMap<UnaryKey, f64>,
  binary: BTreeMap<BinaryKey, f64>,
}

impl RuleProbabilities {
  /// Rules whose parent was never counted get no entry.
  pub fn compute(counts: &GrammarCounts) -> Self {
    let mut probs = Self::default();

    for (key, count) in counts.binary_rules() {
      match mle(count, counts.nonterminal_count(&key.symbol)) {
        Some(q) => {
          probs.binary.insert(key.clone(), q);
        }
        None => warn!(rule = %key, "parent has no count, dropping rule"),
      }
    }

    for (key, count) in counts.unary_rules() {
      match mle(count, counts.nonterminal_count(&key.symbol)) {
        Some(q) => {
          probs.unary.insert(key.clone(), q);
        }
        None => warn!(rule = %key, "parent has no count, dropping rule"),
      }
    }

    probs
  }

  pub fn unary_prob(&self, symbol: &str, word: &str) -> Option<f64> {
    self.unary.get(&UnaryKey::new(symbol, word)).copied()
  }

  pub fn binary_prob(&self, symbol: &str, left: &str, right: &str) -> Option<f64> {
    self.binary.get(&BinaryKey::new(symbol, left, right)).copied()
  }

  pub fn unary_rules(&self) -> impl Iterator<Item = (&UnaryKey, f64)> {
    self.unary.iter().map(|(k, q)| (k, *q))
  }

  pub fn binary_rules(&self) -> impl Iterator<Item = (&BinaryKey, f64)> {
    self.binary.iter().map(|(k, q)| (k, *q))
  }

  /// Total probability of every rule headed by `symbol`.
  pub fn mass(&self, symbol: &str) -> f64 {
    let unary: f64 = self
      .unary
      .iter()
      .filter(|(k, _)| k.symbol == symbol)
      .map(|(_, q)| q)
      .sum();
    let binary: f64 = self
      .binary
      .iter()
      .filter(|(k, _)| k.symbol == symbol)
      .map(|(_, q)| q)
      .sum();
    unary + binary
  }

  pub fn is_empty(&self) -> bool {
    self.unary.is_empty() && self.binary.is_empty()
  }

  /// Writes BINARYRULE records, then UNARYRULE records, each led by its
  /// probability.
  pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
    for (key, q) in self.binary_rules() {
      writeln!(out, "{} {}", q, key)?;
    }
    for (key, q) in self.unary_rules() {
      writeln!(out, "{} {}", q, key)?;
    }
    Ok(())
  }
}

fn mle(count: u64, parent: u64) -> Option<f64> {
  if parent == 0 {
    None
  } else {
    Some(count as f64 / parent as f64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TREEBANK: &str = r#"["S", ["NP", "dog"], ["VP", "barks"]]
["S", ["NP", "cat"], ["VP", ["V", "sees"], ["NP", "dog"]]]
["NP", ["D", "the"], ["N", "dog"]]
"#;

  #[test]
  fn test_mle() {
    let counts = GrammarCounts::from_treebank(TREEBANK.as_bytes()).unwrap();
    let probs = RuleProbabilities::compute(&counts);

    assert_eq!(probs.binary_prob("S", "NP", "VP"), Some(1.0));
    assert_eq!(probs.binary_prob("NP", "D", "N"), Some(0.25));
    assert_eq!(probs.unary_prob("NP", "dog"), Some(0.5));
    assert_eq!(probs.unary_prob("NP", "cat"), Some(0.25));
    assert_eq!(probs.unary_prob("VP", "barks"), Some(0.5));
    assert_eq!(probs.unary_prob("VP", "dog"), None);
  }

  #[test]
  fn test_rules_sum_to_one() {
    let counts = GrammarCounts::from_treebank(TREEBANK.as_bytes()).unwrap();
    let probs = RuleProbabilities::compute(&counts);
    for (symbol, count) in counts.nonterminals() {
      assert!(count > 0);
      let mass = probs.mass(symbol);
      assert!((mass - 1.0).abs() < 1e-9, "{} has mass {}", symbol, mass);
    }
  }

  #[test]
  fn test_uncounted_parent_is_dropped() {
    let mut counts = GrammarCounts::new();
    counts.add_nonterminal("S", 2);
    counts.add_unary(UnaryKey::new("S", "a"), 2);
    counts.add_unary(UnaryKey::new("X", "a"), 3);
    counts.add_binary(BinaryKey::new("Y", "S", "S"), 1);

    let probs = RuleProbabilities::compute(&counts);
    assert_eq!(probs.unary_prob("S", "a"), Some(1.0));
    assert_eq!(probs.unary_prob("X", "a"), None);
    assert_eq!(probs.binary_prob("Y", "S", "S"), None);
    assert_eq!(probs.mass("X"), 0.0);
  }

  #[test]
  fn test_write_params() {
    let mut counts = GrammarCounts::new();
    counts.add_nonterminal("S", 4);
    counts.add_nonterminal("NP", 1);
    counts.add_binary(BinaryKey::new("S", "NP", "NP"), 1);
    counts.add_unary(UnaryKey::new("S", "a"), 3);
    counts.add_unary(UnaryKey::new("NP", "b"), 1);

    let mut out = Vec::new();
    RuleProbabilities::compute(&counts).write(&mut out).unwrap();
    assert_eq!(
      String::from_utf8(out).unwrap(),
      "0.25 BINARYRULE S NP NP\n1 UNARYRULE NP b\n0.75 UNARYRULE S a\n"
    );
  }
}
