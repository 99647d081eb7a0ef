use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use crate::bracketed::read_trees;
use crate::error::{GrammarFileError, TreeError};
use crate::rules::{BinaryKey, Record, UnaryKey};
use crate::syntree::ParseTree;
use crate::Err;

/// Raw occurrence counts gathered from a treebank.
///
/// Maps are ordered so that writing the counts out is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarCounts {
  nonterminals: BTreeMap<String, u64>,
  unary: BTreeMap<UnaryKey, u64>,
  binary: BTreeMap<BinaryKey, u64>,
}

impl GrammarCounts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_trees<'a, I>(trees: I) -> Self
  where
    I: IntoIterator<Item = &'a ParseTree>,
  {
    let mut counts = Self::new();
    for tree in trees {
      counts.ingest_tree(tree);
    }
    counts
  }

  /// Counts every tree of a one-tree-per-line treebank.
  pub fn from_treebank<R: BufRead>(reader: R) -> Result<Self, Err> {
    let trees = read_trees(reader)?;
    Ok(Self::from_trees(&trees))
  }

  /// Counts every node of `tree`: the symbol of each node, plus the unary
  /// rule of each leaf or the binary rule of each branch.
  pub fn ingest_tree(&mut self, tree: &ParseTree) {
    match tree {
      ParseTree::Leaf { symbol, word } => {
        self.add_nonterminal(symbol, 1);
        self.add_unary(UnaryKey::new(symbol.as_str(), word.as_str()), 1);
      }
      ParseTree::Binary {
        symbol,
        left,
        right,
      } => {
        self.add_nonterminal(symbol, 1);
        self.add_binary(BinaryKey::new(symbol.as_str(), left.symbol(), right.symbol()), 1);
        self.ingest_tree(left);
        self.ingest_tree(right);
      }
    }
  }

  /// Reads and counts a single bracketed tree. A malformed tree adds
  /// nothing.
  pub fn ingest_str(&mut self, line: &str) -> Result<(), TreeError> {
    let tree = line.parse::<ParseTree>()?;
    self.ingest_tree(&tree);
    Ok(())
  }

  pub fn add_nonterminal(&mut self, symbol: &str, count: u64) {
    let total = self.nonterminals.entry(symbol.to_string()).or_insert(0);
    *total = total.saturating_add(count);
  }

  pub fn add_unary(&mut self, key: UnaryKey, count: u64) {
    let total = self.unary.entry(key).or_insert(0);
    *total = total.saturating_add(count);
  }

  pub fn add_binary(&mut self, key: BinaryKey, count: u64) {
    let total = self.binary.entry(key).or_insert(0);
    *total = total.saturating_add(count);
  }

  pub fn nonterminal_count(&self, symbol: &str) -> u64 {
    self.nonterminals.get(symbol).copied().unwrap_or(0)
  }

  pub fn unary_count(&self, symbol: &str, word: &str) -> u64 {
    self
      .unary
      .get(&UnaryKey::new(symbol, word))
      .copied()
      .unwrap_or(0)
  }

  pub fn binary_count(&self, symbol: &str, left: &str, right: &str) -> u64 {
    self
      .binary
      .get(&BinaryKey::new(symbol, left, right))
      .copied()
      .unwrap_or(0)
  }

  pub fn nonterminals(&self) -> impl Iterator<Item = (&str, u64)> {
    self.nonterminals.iter().map(|(s, c)| (s.as_str(), *c))
  }

  pub fn unary_rules(&self) -> impl Iterator<Item = (&UnaryKey, u64)> {
    self.unary.iter().map(|(k, c)| (k, *c))
  }

  pub fn binary_rules(&self) -> impl Iterator<Item = (&BinaryKey, u64)> {
    self.binary.iter().map(|(k, c)| (k, *c))
  }

  pub fn is_empty(&self) -> bool {
    self.nonterminals.is_empty() && self.unary.is_empty() && self.binary.is_empty()
  }

  /// Writes NONTERMINAL, then UNARYRULE, then BINARYRULE records.
  pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
    for (symbol, count) in self.nonterminals() {
      writeln!(out, "{} {}", count, Record::Nonterminal(symbol.to_string()))?;
    }
    for (key, count) in self.unary_rules() {
      writeln!(out, "{} {}", count, key)?;
    }
    for (key, count) in self.binary_rules() {
      writeln!(out, "{} {}", count, key)?;
    }
    Ok(())
  }

  /// Loads a count file written by `write`. Blank lines are skipped and
  /// repeated records add up, saturating at `u64::MAX`.
  pub fn read<R: BufRead>(reader: R) -> Result<Self, Err> {
    let mut counts = Self::new();
    for (idx, line) in reader.lines().enumerate() {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }

      let bad_line = |message: String| GrammarFileError {
        line: idx + 1,
        message,
      };
      let (value, record) = Record::parse_line(&line).map_err(bad_line)?;
      let count = parse_count(value).map_err(bad_line)?;

      match record {
        Record::Nonterminal(symbol) => counts.add_nonterminal(&symbol, count),
        Record::Unary(key) => counts.add_unary(key, count),
        Record::Binary(key) => counts.add_binary(key, count),
      }
    }
    Ok(counts)
  }
}

/// Counts are whole numbers, written either as `5` or `5.0`.
fn parse_count(value: &str) -> Result<u64, String> {
  if let Ok(count) = value.parse::<u64>() {
    return Ok(count);
  }
  match value.parse::<f64>() {
    Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
    _ => Err(format!("bad count {:?}", value)),
  }
}
