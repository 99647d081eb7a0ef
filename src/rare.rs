use std::collections::HashMap;
use std::io::{BufRead, Write};

use tracing::{debug, info};

use crate::config::ParserConfig;
use crate::counts::GrammarCounts;
use crate::error::TreeError;
use crate::syntree::ParseTree;
use crate::Err;

/// How often each word was emitted, summed over every preterminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
  frequencies: HashMap<String, u64>,
}

impl Vocabulary {
  pub fn build(counts: &GrammarCounts) -> Self {
    let mut frequencies: HashMap<String, u64> = HashMap::new();
    for (key, count) in counts.unary_rules() {
      *frequencies.entry(key.word.clone()).or_insert(0) += count;
    }
    Self { frequencies }
  }

  pub fn frequency(&self, word: &str) -> u64 {
    self.frequencies.get(word).copied().unwrap_or(0)
  }

  pub fn contains(&self, word: &str) -> bool {
    self.frequencies.contains_key(word)
  }

  pub fn len(&self) -> usize {
    self.frequencies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frequencies.is_empty()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordClass {
  Known,
  Rare,
}

/// Collapses rare and unseen words onto one sentinel token. Training trees
/// and decoded sentences must go through the same filter.
#[derive(Debug, Clone)]
pub struct RareWordFilter {
  vocabulary: Vocabulary,
  threshold: u64,
  token: String,
}

impl RareWordFilter {
  pub fn new(counts: &GrammarCounts, config: &ParserConfig) -> Self {
    let filter = Self {
      vocabulary: Vocabulary::build(counts),
      threshold: config.rare_threshold,
      token: config.rare_token.clone(),
    };
    debug!(
      vocabulary = filter.vocabulary.len(),
      threshold = filter.threshold,
      "built rare word filter"
    );
    filter
  }

  pub fn vocabulary(&self) -> &Vocabulary {
    &self.vocabulary
  }

  pub fn token(&self) -> &str {
    &self.token
  }

  /// Unseen words are rare whatever the threshold.
  pub fn classify(&self, word: &str) -> WordClass {
    if !self.vocabulary.contains(word) || self.vocabulary.frequency(word) < self.threshold {
      WordClass::Rare
    } else {
      WordClass::Known
    }
  }

  pub fn is_rare(&self, word: &str) -> bool {
    self.classify(word) == WordClass::Rare
  }

  /// The word itself if known, the sentinel otherwise.
  pub fn substitute<'a>(&'a self, word: &'a str) -> &'a str {
    match self.classify(word) {
      WordClass::Known => word,
      WordClass::Rare => &self.token,
    }
  }

  /// Rare words in the vocabulary, sorted.
  pub fn rare_words(&self) -> Vec<&str> {
    let mut words = self
      .vocabulary
      .frequencies
      .keys()
      .map(String::as_str)
      .filter(|w| self.is_rare(w))
      .collect::<Vec<_>>();
    words.sort_unstable();
    words
  }

  /// Same tree with every rare leaf word swapped for the sentinel.
  pub fn replace(&self, tree: &ParseTree) -> ParseTree {
    tree.map_words(&|word: &str| self.substitute(word).to_string())
  }

  /// Rewrites a one-tree-per-line treebank, returning how many trees were
  /// written.
  pub fn replace_treebank<R: BufRead, W: Write>(&self, reader: R, out: &mut W) -> Result<usize, Err> {
    let mut written = 0;
    for (idx, line) in reader.lines().enumerate() {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      let tree = line
        .parse::<ParseTree>()
        .map_err(|e: TreeError| e.at_line(idx + 1))?;
      writeln!(out, "{}", self.replace(&tree))?;
      written += 1;
    }
    info!(trees = written, token = %self.token, "replaced rare words");
    Ok(written)
  }
}
