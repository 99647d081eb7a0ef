use thiserror::Error;

/// Problems reading a bracketed training tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
  /// A node that is neither `[symbol, word]` nor `[symbol, left, right]`.
  #[error("malformed tree node: {message}")]
  MalformedTree { message: String },

  /// The line isn't well-formed bracketed text at all.
  #[error("bracket syntax: {message}")]
  Syntax { message: String },

  #[error("line {line}: {source}")]
  AtLine {
    line: usize,
    #[source]
    source: Box<TreeError>,
  },
}

impl TreeError {
  pub fn malformed(message: impl Into<String>) -> Self {
    Self::MalformedTree {
      message: message.into(),
    }
  }

  pub fn syntax(message: impl Into<String>) -> Self {
    Self::Syntax {
      message: message.into(),
    }
  }

  pub fn at_line(self, line: usize) -> Self {
    Self::AtLine {
      line,
      source: Box::new(self),
    }
  }
}

/// A bad record in a persisted count file.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("grammar file line {line}: {message}")]
pub struct GrammarFileError {
  pub line: usize,
  pub message: String,
}

/// Decoding failures. These are per-sentence and never abort a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("no nonterminal spans the whole sentence ({len} tokens)")]
  NoParse { len: usize },

  #[error("cannot parse an empty sentence")]
  EmptySentence,
}

/// Boxed static error type
pub type Err = Box<dyn std::error::Error + 'static>;
