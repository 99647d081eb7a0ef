use std::fmt;
use std::io::{BufRead, Write};

use tracing::{debug, info, warn};

use crate::config::ParserConfig;
use crate::counts::GrammarCounts;
use crate::error::ParseError;
use crate::grammar::{Grammar, SymbolId};
use crate::probability::RuleProbabilities;
use crate::rare::RareWordFilter;
use crate::syntree::ParseTree;
use crate::Err;

/// Written in place of a tree for sentences that don't parse.
pub const NO_PARSE_MARKER: &str = "[]";

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Backpointer {
  /// Base case, X -> word at a single position
  Terminal,
  /// X -> Y Z with Y over i..=split and Z over split+1..=j
  Split {
    left: SymbolId,
    right: SymbolId,
    split: usize,
  },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Cell {
  pub log_prob: f64,
  pub back: Backpointer,
}

/// Best derivations per (start, end, symbol), over inclusive spans. A cell
/// with no derivation is `None`, never a zero probability.
#[derive(Debug, Clone)]
pub struct Chart {
  len: usize,
  symbols: usize,
  cells: Vec<Option<Cell>>,
}

impl Chart {
  pub fn new(len: usize, symbols: usize) -> Self {
    let spans = len * (len + 1) / 2;
    Self {
      len,
      symbols,
      cells: vec![None; spans * symbols],
    }
  }

  /// Sentence length
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  fn offset(&self, i: usize, j: usize, x: SymbolId) -> usize {
    debug_assert!(i <= j && j < self.len, "bad span {}..{}", i, j);
    let span = j * (j + 1) / 2 + i;
    span * self.symbols + x.index()
  }

  pub fn get(&self, i: usize, j: usize, x: SymbolId) -> Option<&Cell> {
    self.cells[self.offset(i, j, x)].as_ref()
  }

  fn set(&mut self, i: usize, j: usize, x: SymbolId, cell: Cell) {
    let offset = self.offset(i, j, x);
    self.cells[offset] = Some(cell);
  }

  /// Live cells over i..=j as (symbol, cell), in symbol order.
  pub fn cells_at(&self, i: usize, j: usize) -> impl Iterator<Item = (SymbolId, &Cell)> {
    let start = self.offset(i, j, SymbolId(0));
    self.cells[start..start + self.symbols]
      .iter()
      .enumerate()
      .filter_map(|(idx, c)| c.as_ref().map(|c| (SymbolId(idx as u32), c)))
  }

  pub fn live_cells(&self) -> usize {
    self.cells.iter().filter(|c| c.is_some()).count()
  }

  pub fn display<'a>(&'a self, grammar: &'a Grammar) -> ChartDisplay<'a> {
    ChartDisplay {
      chart: self,
      grammar,
    }
  }
}

pub struct ChartDisplay<'a> {
  chart: &'a Chart,
  grammar: &'a Grammar,
}

impl fmt::Display for ChartDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let g = self.grammar;
    for width in 1..=self.chart.len() {
      for i in 0..=self.chart.len() - width {
        let j = i + width - 1;
        for (x, cell) in self.chart.cells_at(i, j) {
          write!(f, "{}..{}: {} {:.6}", i, j, g.symbol(x), cell.log_prob)?;
          match cell.back {
            Backpointer::Terminal => writeln!(f)?,
            Backpointer::Split { left, right, split } => {
              writeln!(f, " -> {} {} @{}", g.symbol(left), g.symbol(right), split)?
            }
          }
        }
      }
    }
    Ok(())
  }
}

/// A best parse and its log probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
  pub tree: ParseTree,
  pub log_prob: f64,
}

impl Derivation {
  pub fn probability(&self) -> f64 {
    self.log_prob.exp()
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
  pub parsed: usize,
  pub failed: usize,
}

/// Viterbi CKY over a binarized PCFG.
///
/// The parser holds no per-sentence state, so one parser can be shared by
/// several threads decoding different sentences.
#[derive(Debug, Clone)]
pub struct CkyParser {
  grammar: Grammar,
  filter: RareWordFilter,
  root: Option<SymbolId>,
  config: ParserConfig,
}

impl CkyParser {
  /// Estimates probabilities from `counts` and builds the rare-word filter
  /// from the same counts.
  pub fn new(counts: &GrammarCounts, config: ParserConfig) -> Self {
    let probs = RuleProbabilities::compute(counts);
    let filter = RareWordFilter::new(counts, &config);
    Self::from_parts(&probs, filter, config)
  }

  pub fn from_parts(probs: &RuleProbabilities, filter: RareWordFilter, config: ParserConfig) -> Self {
    let grammar = Grammar::new(probs);
    let root = grammar.id(&config.root);
    if root.is_none() {
      warn!(root = %config.root, "root symbol not in grammar, every parse will use the fallback");
    }
    debug!(
      nonterminals = grammar.len(),
      binary_rules = grammar.binary_rule_count(),
      words = grammar.lexicon_len(),
      "compiled grammar"
    );
    Self {
      grammar,
      filter,
      root,
      config,
    }
  }

  pub fn grammar(&self) -> &Grammar {
    &self.grammar
  }

  pub fn filter(&self) -> &RareWordFilter {
    &self.filter
  }

  pub fn config(&self) -> &ParserConfig {
    &self.config
  }

  /// The tokens as the chart sees them, with rare and unseen words replaced.
  pub fn normalize<'a>(&'a self, tokens: &[&'a str]) -> Vec<&'a str> {
    tokens.iter().map(|&t| self.filter.substitute(t)).collect()
  }

  /// Fills the chart bottom-up. For each span the loop order is parent
  /// symbol, then split point, then (Y, Z); only a strictly better
  /// candidate replaces the current best, so ties go to the first one found.
  pub fn parse_chart(&self, tokens: &[&str]) -> Chart {
    let words = self.normalize(tokens);
    let n = words.len();
    debug!(sentence = %words.join(" "), n, "filling chart");

    let mut chart = Chart::new(n, self.grammar.len());

    for (i, word) in words.iter().enumerate() {
      for &(x, log_prob) in self.grammar.preterminals(word) {
        chart.set(
          i,
          i,
          x,
          Cell {
            log_prob,
            back: Backpointer::Terminal,
          },
        );
      }
    }

    for width in 2..=n {
      for i in 0..=n - width {
        let j = i + width - 1;
        for (x, alts) in self.grammar.binary_parents() {
          let mut best: Option<Cell> = None;
          for split in i..j {
            for alt in alts {
              let (Some(left), Some(right)) = (
                chart.get(i, split, alt.left),
                chart.get(split + 1, j, alt.right),
              ) else {
                continue;
              };
              let candidate = alt.log_prob + left.log_prob + right.log_prob;
              if best.is_none_or(|b| candidate > b.log_prob) {
                best = Some(Cell {
                  log_prob: candidate,
                  back: Backpointer::Split {
                    left: alt.left,
                    right: alt.right,
                    split,
                  },
                });
              }
            }
          }
          if let Some(cell) = best {
            chart.set(i, j, *x, cell);
          }
        }
      }
    }

    debug!(live_cells = chart.live_cells(), "chart filled");
    chart
  }

  /// The configured root if it covers the sentence, otherwise the most
  /// probable symbol that does.
  fn select_root(&self, chart: &Chart) -> Result<SymbolId, ParseError> {
    let last = chart.len() - 1;
    if let Some(root) = self.root {
      if chart.get(0, last, root).is_some() {
        return Ok(root);
      }
    }

    let mut best = None;
    let mut best_log_prob = f64::NEG_INFINITY;
    for (x, cell) in chart.cells_at(0, last) {
      if cell.log_prob > best_log_prob {
        best = Some(x);
        best_log_prob = cell.log_prob;
      }
    }

    match best {
      Some(x) => {
        debug!(root = %self.config.root, fallback = self.grammar.symbol(x), "root missing, using fallback");
        Ok(x)
      }
      None => Err(ParseError::NoParse { len: chart.len() }),
    }
  }

  fn traceback(&self, chart: &Chart, tokens: &[&str], i: usize, j: usize, x: SymbolId) -> ParseTree {
    let symbol = self.grammar.symbol(x);
    match chart.get(i, j, x).map(|c| c.back) {
      Some(Backpointer::Split { left, right, split }) => ParseTree::binary(
        symbol,
        self.traceback(chart, tokens, i, split, left),
        self.traceback(chart, tokens, split + 1, j, right),
      ),
      _ => {
        debug_assert_eq!(i, j, "multi-word span without a backpointer");
        ParseTree::leaf(symbol, tokens[i])
      }
    }
  }

  /// Best parse of a tokenized sentence. Leaves carry the original tokens,
  /// not their rare-word substitutes.
  pub fn parse_tokens(&self, tokens: &[&str]) -> Result<Derivation, ParseError> {
    if tokens.is_empty() {
      return Err(ParseError::EmptySentence);
    }

    let chart = self.parse_chart(tokens);
    let root = self.select_root(&chart)?;
    let last = tokens.len() - 1;
    let log_prob = chart
      .get(0, last, root)
      .map(|c| c.log_prob)
      .ok_or(ParseError::NoParse { len: tokens.len() })?;

    Ok(Derivation {
      tree: self.traceback(&chart, tokens, 0, last, root),
      log_prob,
    })
  }

  /// Splits on whitespace and parses.
  pub fn parse(&self, sentence: &str) -> Result<Derivation, ParseError> {
    let tokens = sentence.split_whitespace().collect::<Vec<_>>();
    self.parse_tokens(&tokens)
  }

  /// Parses one sentence per line, writing one tree per line. Sentences
  /// that don't parse get `NO_PARSE_MARKER` so output lines stay aligned
  /// with input lines.
  pub fn parse_batch<R: BufRead, W: Write>(&self, reader: R, out: &mut W) -> Result<BatchSummary, Err> {
    let mut summary = BatchSummary::default();
    for (idx, line) in reader.lines().enumerate() {
      let line = line?;
      match self.parse(&line) {
        Ok(derivation) => {
          writeln!(out, "{}", derivation.tree)?;
          summary.parsed += 1;
        }
        Err(err) => {
          warn!(line = idx + 1, %err, "sentence failed to parse");
          writeln!(out, "{}", NO_PARSE_MARKER)?;
          summary.failed += 1;
        }
      }
    }
    info!(parsed = summary.parsed, failed = summary.failed, "batch decoded");
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rules::{BinaryKey, UnaryKey};

  fn config() -> ParserConfig {
    ParserConfig::default().with_root("S")
  }

  fn dog_barks_counts() -> GrammarCounts {
    let mut counts = GrammarCounts::new();
    counts.add_nonterminal("S", 5);
    counts.add_nonterminal("NP", 5);
    counts.add_nonterminal("VP", 5);
    counts.add_binary(BinaryKey::new("S", "NP", "VP"), 5);
    counts.add_unary(UnaryKey::new("NP", "dog"), 5);
    counts.add_unary(UnaryKey::new("VP", "barks"), 5);
    counts
  }

  #[test]
  fn test_single_word() {
    let mut counts = GrammarCounts::new();
    counts.add_nonterminal("S", 10);
    counts.add_unary(UnaryKey::new("S", "a"), 10);
    let parser = CkyParser::new(&counts, config());

    let d = parser.parse("a").unwrap();
    assert_eq!(d.tree, ParseTree::leaf("S", "a"));
    assert_eq!(d.tree.to_string(), r#"["S", "a"]"#);
    assert_eq!(d.probability(), 1.0);

    assert_eq!(parser.parse("b"), Err(ParseError::NoParse { len: 1 }));
  }

  #[test]
  fn test_binary_sentence() {
    let parser = CkyParser::new(&dog_barks_counts(), config());
    let d = parser.parse("dog barks").unwrap();
    assert_eq!(
      d.tree,
      ParseTree::binary("S", ParseTree::leaf("NP", "dog"), ParseTree::leaf("VP", "barks"))
    );
    assert!((d.probability() - 1.0).abs() < 1e-12);
  }

  #[test]
  fn test_no_parse_and_empty() {
    let parser = CkyParser::new(&dog_barks_counts(), config());
    assert_eq!(parser.parse("barks dog"), Err(ParseError::NoParse { len: 2 }));
    assert_eq!(parser.parse("   "), Err(ParseError::EmptySentence));
  }

  #[test]
  fn test_only_unknown_word_is_replaced() {
    let mut counts = dog_barks_counts();
    counts.add_nonterminal("VP", 5);
    counts.add_unary(UnaryKey::new("VP", "_RARE_"), 5);
    let parser = CkyParser::new(&counts, config());

    assert_eq!(parser.normalize(&["dog", "meows"]), vec!["dog", "_RARE_"]);

    let d = parser.parse("dog meows").unwrap();
    assert_eq!(
      d.tree,
      ParseTree::binary("S", ParseTree::leaf("NP", "dog"), ParseTree::leaf("VP", "meows"))
    );
    assert!((d.probability() - 0.5).abs() < 1e-12);
  }

  fn ambiguous_counts() -> GrammarCounts {
    // S -> S S | x
    let mut counts = GrammarCounts::new();
    counts.add_nonterminal("S", 10);
    counts.add_binary(BinaryKey::new("S", "S", "S"), 5);
    counts.add_unary(UnaryKey::new("S", "x"), 5);
    counts
  }

  #[test]
  fn test_ties_keep_earliest_pair() {
    let mut counts = GrammarCounts::new();
    counts.add_nonterminal("S", 4);
    counts.add_nonterminal("A", 2);
    counts.add_nonterminal("B", 2);
    counts.add_nonterminal("C", 4);
    counts.add_binary(BinaryKey::new("S", "B", "C"), 2);
    counts.add_binary(BinaryKey::new("S", "A", "C"), 2);
    counts.add_unary(UnaryKey::new("A", "w"), 2);
    counts.add_unary(UnaryKey::new("B", "w"), 2);
    counts.add_unary(UnaryKey::new("C", "w"), 4);
    let parser = CkyParser::new(&counts, config());

    let d = parser.parse("w w").unwrap();
    assert_eq!(
      d.tree,
      ParseTree::binary("S", ParseTree::leaf("A", "w"), ParseTree::leaf("C", "w"))
    );
    assert!((d.probability() - 0.5).abs() < 1e-12);
  }

  #[test]
  fn test_ties_keep_earliest_split() {
    // S -> Z P at split 0 and S -> P Z at split 1 score the same. (P, Z)
    // sorts before (Z, P), so only the split order picks the left one.
    let mut counts = GrammarCounts::new();
    counts.add_nonterminal("S", 2);
    counts.add_nonterminal("P", 1);
    counts.add_nonterminal("Z", 5);
    counts.add_binary(BinaryKey::new("S", "Z", "P"), 1);
    counts.add_binary(BinaryKey::new("S", "P", "Z"), 1);
    counts.add_binary(BinaryKey::new("P", "Z", "Z"), 1);
    counts.add_unary(UnaryKey::new("Z", "w"), 5);
    let parser = CkyParser::new(&counts, config());
    let g = parser.grammar();

    let chart = parser.parse_chart(&["w", "w", "w"]);
    let (at_first, at_second) = (
      chart.get(0, 1, g.id("P").unwrap()).map(|c| c.log_prob),
      chart.get(1, 2, g.id("P").unwrap()).map(|c| c.log_prob),
    );
    assert_eq!(at_first, at_second);
    assert_eq!(
      chart.get(0, 2, g.id("S").unwrap()).map(|c| c.back),
      Some(Backpointer::Split {
        left: g.id("Z").unwrap(),
        right: g.id("P").unwrap(),
        split: 0,
      })
    );

    let w = || ParseTree::leaf("Z", "w");
    let d = parser.parse("w w w").unwrap();
    assert_eq!(d.tree, ParseTree::binary("S", w(), ParseTree::binary("P", w(), w())));
    assert!((d.probability() - 0.5).abs() < 1e-12);
  }

  #[test]
  fn test_parse_is_deterministic() {
    let parser = CkyParser::new(&ambiguous_counts(), config());
    let sentence = "x x x x x x";
    let first = parser.parse(sentence).unwrap().tree.to_string();
    for _ in 0..5 {
      assert_eq!(parser.parse(sentence).unwrap().tree.to_string(), first);
    }
  }

  #[test]
  fn test_better_derivation_wins() {
    let mut counts = GrammarCounts::new();
    counts.add_nonterminal("S", 4);
    counts.add_nonterminal("A", 4);
    counts.add_nonterminal("B", 4);
    counts.add_binary(BinaryKey::new("S", "A", "A"), 1);
    counts.add_binary(BinaryKey::new("S", "B", "B"), 3);
    counts.add_unary(UnaryKey::new("A", "w"), 4);
    counts.add_unary(UnaryKey::new("B", "w"), 4);
    let parser = CkyParser::new(&counts, config());

    let d = parser.parse("w w").unwrap();
    assert_eq!(
      d.tree,
      ParseTree::binary("S", ParseTree::leaf("B", "w"), ParseTree::leaf("B", "w"))
    );
    assert!((d.probability() - 0.75).abs() < 1e-12);
  }

  #[test]
  fn test_root_fallback_picks_most_probable() {
    let mut counts = dog_barks_counts();
    counts.add_nonterminal("FRAG", 4);
    counts.add_binary(BinaryKey::new("FRAG", "VP", "NP"), 1);
    counts.add_binary(BinaryKey::new("FRAG", "NP", "NP"), 3);
    let parser = CkyParser::new(&counts, config());

    let d = parser.parse("barks dog").unwrap();
    assert_eq!(d.tree.symbol(), "FRAG");
    assert!((d.probability() - 0.25).abs() < 1e-12);

    // configured root that the grammar has never seen
    let parser = CkyParser::new(&counts, ParserConfig::default().with_root("SBARQ"));
    assert_eq!(parser.parse("dog barks").unwrap().tree.symbol(), "S");
  }

  #[test]
  fn test_long_sentence_does_not_underflow() {
    let mut counts = GrammarCounts::new();
    counts.add_nonterminal("S", 1000);
    counts.add_binary(BinaryKey::new("S", "S", "S"), 1);
    counts.add_unary(UnaryKey::new("S", "x"), 999);
    let parser = CkyParser::new(&counts, config());

    let sentence = vec!["x"; 200].join(" ");
    let d = parser.parse(&sentence).unwrap();
    let expected = 199.0 * 0.001f64.ln() + 200.0 * 0.999f64.ln();
    assert!((d.log_prob - expected).abs() < 1e-6, "{}", d.log_prob);
    // the same product in linear space is below the smallest f64
    assert_eq!(d.probability(), 0.0);
    assert_eq!(d.tree.len(), 200);
  }

  #[test]
  fn test_leaves_reproduce_tokens() {
    let mut counts = ambiguous_counts();
    counts.add_unary(UnaryKey::new("S", "_RARE_"), 5);
    counts.add_nonterminal("S", 5);
    let parser = CkyParser::new(&counts, config());

    let tokens = ["x", "y", "x", "zebra"];
    let d = parser.parse_tokens(&tokens).unwrap();
    assert_eq!(d.tree.words(), tokens.to_vec());
  }

  #[test]
  fn test_chart_cells() {
    let parser = CkyParser::new(&dog_barks_counts(), config());
    let chart = parser.parse_chart(&["dog", "barks"]);
    let g = parser.grammar();

    assert!(chart.get(0, 0, g.id("NP").unwrap()).is_some());
    assert!(chart.get(0, 0, g.id("VP").unwrap()).is_none());
    assert_eq!(
      chart.get(0, 1, g.id("S").unwrap()).map(|c| c.back),
      Some(Backpointer::Split {
        left: g.id("NP").unwrap(),
        right: g.id("VP").unwrap(),
        split: 0,
      })
    );
    assert_eq!(chart.live_cells(), 3);

    let shown = chart.display(g).to_string();
    assert!(shown.contains("0..1: S 0.000000 -> NP VP @0"), "{}", shown);
  }

  #[test]
  fn test_batch_marks_failures() {
    let parser = CkyParser::new(&dog_barks_counts(), config());
    let input = "dog barks\nbarks dog\n\ndog barks\n";
    let mut out = Vec::new();
    let summary = parser.parse_batch(input.as_bytes(), &mut out).unwrap();

    assert_eq!(summary, BatchSummary { parsed: 2, failed: 2 });
    let tree = r#"["S", ["NP", "dog"], ["VP", "barks"]]"#;
    assert_eq!(
      String::from_utf8(out).unwrap(),
      format!("{}\n[]\n[]\n{}\n", tree, tree)
    );
  }
}
