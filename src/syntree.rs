use std::fmt;

/// A binarized parse tree. Leaves are preterminals over a single word, every
/// other node has exactly two children.
#[derive(Debug, Clone)]
pub enum ParseTree {
  Leaf {
    symbol: String,
    word: String,
  },
  Binary {
    symbol: String,
    left: Box<ParseTree>,
    right: Box<ParseTree>,
  },
}

impl ParseTree {
  pub fn leaf(symbol: impl Into<String>, word: impl Into<String>) -> Self {
    Self::Leaf {
      symbol: symbol.into(),
      word: word.into(),
    }
  }

  pub fn binary(symbol: impl Into<String>, left: ParseTree, right: ParseTree) -> Self {
    Self::Binary {
      symbol: symbol.into(),
      left: Box::new(left),
      right: Box::new(right),
    }
  }

  pub fn symbol(&self) -> &str {
    match self {
      Self::Leaf { symbol, .. } | Self::Binary { symbol, .. } => symbol,
    }
  }

  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf { .. })
  }

  pub fn is_branch(&self) -> bool {
    matches!(self, Self::Binary { .. })
  }

  pub fn get_leaf(&self) -> Option<(&str, &str)> {
    match self {
      Self::Leaf { symbol, word } => Some((symbol, word)),
      _ => None,
    }
  }

  pub fn get_branch(&self) -> Option<(&str, &ParseTree, &ParseTree)> {
    match self {
      Self::Binary {
        symbol,
        left,
        right,
      } => Some((symbol, left, right)),
      _ => None,
    }
  }

  /// The leaf words, left to right.
  pub fn words(&self) -> Vec<&str> {
    let mut words = Vec::new();
    self.collect_words(&mut words);
    words
  }

  fn collect_words<'a>(&'a self, out: &mut Vec<&'a str>) {
    match self {
      Self::Leaf { word, .. } => out.push(word),
      Self::Binary { left, right, .. } => {
        left.collect_words(out);
        right.collect_words(out);
      }
    }
  }

  /// Number of leaves
  pub fn len(&self) -> usize {
    match self {
      Self::Leaf { .. } => 1,
      Self::Binary { left, right, .. } => left.len() + right.len(),
    }
  }

  /// Never true, a tree always covers at least one word.
  pub fn is_empty(&self) -> bool {
    false
  }

  /// Rebuilds the tree with every leaf word passed through `f`. Symbols and
  /// shape are kept.
  pub fn map_words<F>(&self, f: &F) -> ParseTree
  where
    F: Fn(&str) -> String,
  {
    match self {
      Self::Leaf { symbol, word } => Self::leaf(symbol.clone(), f(word)),
      Self::Binary {
        symbol,
        left,
        right,
      } => Self::binary(symbol.clone(), left.map_words(f), right.map_words(f)),
    }
  }
}

impl PartialEq for ParseTree {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (
        Self::Leaf {
          symbol: s1,
          word: w1,
        },
        Self::Leaf {
          symbol: s2,
          word: w2,
        },
      ) => s1 == s2 && w1 == w2,
      (
        Self::Binary {
          symbol: s1,
          left: l1,
          right: r1,
        },
        Self::Binary {
          symbol: s2,
          left: l2,
          right: r2,
        },
      ) => s1 == s2 && l1 == l2 && r1 == r2,
      (Self::Leaf { .. }, Self::Binary { .. }) | (Self::Binary { .. }, Self::Leaf { .. }) => false,
    }
  }
}

impl Eq for ParseTree {}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
  // a str always serializes
  let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
  f.write_str(&quoted)
}

/// Writes the bracketed array form, `["S", ["NP", "dog"], ["VP", "barks"]]`.
impl fmt::Display for ParseTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf { symbol, word } => {
        write!(f, "[")?;
        write_quoted(f, symbol)?;
        write!(f, ", ")?;
        write_quoted(f, word)?;
        write!(f, "]")
      }
      Self::Binary {
        symbol,
        left,
        right,
      } => {
        write!(f, "[")?;
        write_quoted(f, symbol)?;
        write!(f, ", {}, {}]", left, right)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dog_barks() -> ParseTree {
    ParseTree::binary(
      "S",
      ParseTree::leaf("NP", "dog"),
      ParseTree::leaf("VP", "barks"),
    )
  }

  #[test]
  fn test_display_bracketed() {
    assert_eq!(
      dog_barks().to_string(),
      r#"["S", ["NP", "dog"], ["VP", "barks"]]"#
    );
    assert_eq!(
      ParseTree::leaf(".", "\"").to_string(),
      r#"[".", "\""]"#
    );
  }

  #[test]
  fn test_words_in_order() {
    let tree = ParseTree::binary(
      "S",
      dog_barks(),
      ParseTree::leaf(".", "!"),
    );
    assert_eq!(tree.words(), vec!["dog", "barks", "!"]);
    assert_eq!(tree.len(), 3);
  }

  #[test]
  fn test_structural_equality() {
    assert_eq!(dog_barks(), dog_barks());
    assert_ne!(
      dog_barks(),
      ParseTree::binary("S", ParseTree::leaf("VP", "barks"), ParseTree::leaf("NP", "dog"))
    );
    assert_ne!(ParseTree::leaf("S", "dog"), dog_barks());
  }

  #[test]
  fn test_map_words_keeps_shape() {
    let mapped = dog_barks().map_words(&|w: &str| w.to_uppercase());
    assert_eq!(
      mapped,
      ParseTree::binary("S", ParseTree::leaf("NP", "DOG"), ParseTree::leaf("VP", "BARKS"))
    );
  }
}
