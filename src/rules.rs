use std::fmt;

pub const NONTERMINAL: &str = "NONTERMINAL";
pub const UNARY_RULE: &str = "UNARYRULE";
pub const BINARY_RULE: &str = "BINARYRULE";

/// X -> w
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnaryKey {
  pub symbol: String,
  pub word: String,
}

impl UnaryKey {
  pub fn new(symbol: impl Into<String>, word: impl Into<String>) -> Self {
    Self {
      symbol: symbol.into(),
      word: word.into(),
    }
  }
}

impl fmt::Display for UnaryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {}", UNARY_RULE, self.symbol, self.word)
  }
}

/// X -> Y Z
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinaryKey {
  pub symbol: String,
  pub left: String,
  pub right: String,
}

impl BinaryKey {
  pub fn new(symbol: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
    Self {
      symbol: symbol.into(),
      left: left.into(),
      right: right.into(),
    }
  }
}

impl fmt::Display for BinaryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {} {}", BINARY_RULE, self.symbol, self.left, self.right)
  }
}

/// One line of a persisted grammar, minus its leading count or probability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
  Nonterminal(String),
  Unary(UnaryKey),
  Binary(BinaryKey),
}

impl Record {
  /// Splits `<value> KIND fields...` into the raw value and the record.
  pub fn parse_line(line: &str) -> Result<(&str, Record), String> {
    let parts = line.split_whitespace().collect::<Vec<_>>();
    let record = match parts.as_slice() {
      [_, kind, symbol] if *kind == NONTERMINAL => Record::Nonterminal(symbol.to_string()),
      [_, kind, symbol, word] if *kind == UNARY_RULE => Record::Unary(UnaryKey::new(*symbol, *word)),
      [_, kind, symbol, left, right] if *kind == BINARY_RULE => {
        Record::Binary(BinaryKey::new(*symbol, *left, *right))
      }
      [] => return Err("empty record".to_string()),
      [_] => return Err(format!("missing record kind: {}", line)),
      [_, kind, ..] => return Err(format!("bad {} record: {}", kind, line)),
    };
    Ok((parts[0], record))
  }
}

impl fmt::Display for Record {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Nonterminal(s) => write!(f, "{} {}", NONTERMINAL, s),
      Self::Unary(key) => write!(f, "{}", key),
      Self::Binary(key) => write!(f, "{}", key),
    }
  }
}

#[test]
fn test_parse_record_lines() {
  assert_eq!(
    Record::parse_line("10 NONTERMINAL S"),
    Ok(("10", Record::Nonterminal("S".to_string())))
  );
  assert_eq!(
    Record::parse_line("0.25 UNARYRULE NP dog"),
    Ok(("0.25", Record::Unary(UnaryKey::new("NP", "dog"))))
  );
  assert_eq!(
    Record::parse_line("5 BINARYRULE S NP VP"),
    Ok(("5", Record::Binary(BinaryKey::new("S", "NP", "VP"))))
  );

  assert!(Record::parse_line("").is_err());
  assert!(Record::parse_line("5").is_err());
  assert!(Record::parse_line("5 UNARYRULE NP").is_err());
  assert!(Record::parse_line("5 TERNARYRULE S A B C").is_err());
}

#[test]
fn test_record_display() {
  assert_eq!(
    Record::Binary(BinaryKey::new("S", "NP", "VP")).to_string(),
    "BINARYRULE S NP VP"
  );
  assert_eq!(Record::Unary(UnaryKey::new("NP", "dog")).to_string(), "UNARYRULE NP dog");
  assert_eq!(Record::Nonterminal("S".into()).to_string(), "NONTERMINAL S");
}
