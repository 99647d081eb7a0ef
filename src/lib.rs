pub mod bracketed;
pub mod cky;
pub mod config;
pub mod counts;
pub mod error;
pub mod grammar;
pub mod probability;
pub mod rare;
pub mod rules;
pub mod syntree;

use tracing::info;

pub use crate::cky::{BatchSummary, CkyParser, Derivation};
pub use crate::config::ParserConfig;
pub use crate::counts::GrammarCounts;
pub use crate::error::{Err, GrammarFileError, ParseError, TreeError};
pub use crate::grammar::Grammar;
pub use crate::probability::RuleProbabilities;
pub use crate::rare::RareWordFilter;
pub use crate::syntree::ParseTree;

/// Counts `trees`, then counts them again with rare words replaced by the
/// sentinel. The second set of counts is what the parser should be built
/// from.
pub fn train(trees: &[ParseTree], config: &ParserConfig) -> GrammarCounts {
  let raw = GrammarCounts::from_trees(trees);
  let filter = RareWordFilter::new(&raw, config);
  let replaced = trees.iter().map(|t| filter.replace(t)).collect::<Vec<_>>();
  info!(
    trees = trees.len(),
    rare_words = filter.rare_words().len(),
    "trained grammar counts"
  );
  GrammarCounts::from_trees(&replaced)
}

#[test]
fn test_train_collapses_rare_words() {
  let trees = [
    r#"["S", ["NP", "dog"], ["VP", "barks"]]"#,
    r#"["S", ["NP", "cat"], ["VP", "barks"]]"#,
    r#"["S", ["NP", "dog"], ["VP", "sleeps"]]"#,
  ]
  .iter()
  .map(|s| s.parse::<ParseTree>().unwrap())
  .collect::<Vec<_>>();

  let config = ParserConfig::default().with_root("S").with_rare_threshold(2);
  let counts = train(&trees, &config);

  assert_eq!(counts.unary_count("NP", "dog"), 2);
  assert_eq!(counts.unary_count("VP", "barks"), 2);
  assert_eq!(counts.unary_count("NP", "cat"), 0);
  assert_eq!(counts.unary_count("NP", "_RARE_"), 1);
  assert_eq!(counts.unary_count("VP", "_RARE_"), 1);
  assert_eq!(counts.nonterminal_count("NP"), 3);

  let parser = CkyParser::new(&counts, config);
  let d = parser.parse("dog purrs").unwrap();
  assert_eq!(d.tree.to_string(), r#"["S", ["NP", "dog"], ["VP", "purrs"]]"#);
}
