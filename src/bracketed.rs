/// Reading of bracketed trees, one per line:
/// `["S", ["NP", "dog"], ["VP", "barks"]]`
use std::io::BufRead;
use std::str::FromStr;

use serde_json::Value;

use crate::error::TreeError;
use crate::syntree::ParseTree;
use crate::Err;

impl TryFrom<Value> for ParseTree {
  type Error = TreeError;

  /// `[symbol, word]` is a leaf and `[symbol, [..], [..]]` a binary node.
  /// Anything else is malformed.
  fn try_from(value: Value) -> Result<Self, Self::Error> {
    let items = match value {
      Value::Array(items) => items,
      other => {
        return Err(TreeError::malformed(format!(
          "expected a node, got {}",
          other
        )));
      }
    };

    let arity = items.len();
    let mut iter = items.into_iter();
    let symbol = match iter.next() {
      Some(Value::String(symbol)) => symbol,
      Some(_) => return Err(TreeError::malformed("node symbol must be a string")),
      None => return Err(TreeError::malformed("empty node")),
    };

    match (iter.next(), iter.next(), iter.next()) {
      (Some(Value::String(word)), None, None) => Ok(ParseTree::leaf(symbol, word)),
      (Some(left @ Value::Array(_)), Some(right @ Value::Array(_)), None) => Ok(
        ParseTree::binary(symbol, left.try_into()?, right.try_into()?),
      ),
      _ => Err(TreeError::malformed(format!(
        "{} has {} children, needs one word or two subtrees",
        symbol,
        arity - 1
      ))),
    }
  }
}

/// Nesting deeper than serde_json's recursion limit is a syntax error.
impl FromStr for ParseTree {
  type Err = TreeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    serde_json::from_str::<Value>(s)
      .map_err(|e| TreeError::syntax(e.to_string()))?
      .try_into()
  }
}

/// Reads one tree per line, skipping blank lines. Stops at the first bad
/// tree, reporting its 1-based line number.
pub fn read_trees<R: BufRead>(reader: R) -> Result<Vec<ParseTree>, Err> {
  let mut trees = Vec::new();
  for (idx, line) in reader.lines().enumerate() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    let tree = line
      .parse::<ParseTree>()
      .map_err(|e| e.at_line(idx + 1))?;
    trees.push(tree);
  }
  Ok(trees)
}
