pub const DEFAULT_ROOT: &str = "SBARQ";
pub const DEFAULT_RARE_TOKEN: &str = "_RARE_";
pub const DEFAULT_RARE_THRESHOLD: u64 = 5;

/// Settings shared by the rare-word filter and the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
  /// Preferred symbol for the whole-sentence span.
  pub root: String,
  /// Words seen fewer times than this are rare.
  pub rare_threshold: u64,
  /// Sentinel that stands in for every rare or unseen word.
  pub rare_token: String,
}

impl Default for ParserConfig {
  fn default() -> Self {
    Self {
      root: DEFAULT_ROOT.to_string(),
      rare_threshold: DEFAULT_RARE_THRESHOLD,
      rare_token: DEFAULT_RARE_TOKEN.to_string(),
    }
  }
}

impl ParserConfig {
  pub fn with_root(mut self, root: impl Into<String>) -> Self {
    self.root = root.into();
    self
  }

  pub fn with_rare_threshold(mut self, threshold: u64) -> Self {
    self.rare_threshold = threshold;
    self
  }

  pub fn with_rare_token(mut self, token: impl Into<String>) -> Self {
    self.rare_token = token.into();
    self
  }
}

#[test]
fn test_builder_overrides_defaults() {
  let config = ParserConfig::default()
    .with_root("S")
    .with_rare_threshold(2)
    .with_rare_token("<unk>");

  assert_eq!(config.root, "S");
  assert_eq!(config.rare_threshold, 2);
  assert_eq!(config.rare_token, "<unk>");
  assert_eq!(ParserConfig::default().root, DEFAULT_ROOT);
}
