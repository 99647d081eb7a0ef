use std::env;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::process;

use tracing_subscriber::EnvFilter;

use pcfg_cky::{CkyParser, Err, GrammarCounts, ParserConfig, RareWordFilter, RuleProbabilities};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} COMMAND [options]

Commands:
  count TREES              Count rules in a treebank (one tree per line)
  rare TREES COUNTS        Replace rare words in TREES using COUNTS
  params COUNTS            Print rule probabilities derived from COUNTS
  parse COUNTS SENTENCES   Print the best parse of each sentence

Options:
  -h, --help               Print this message
  -r, --root SYMBOL        Preferred root symbol (default SBARQ)
  -t, --threshold N        Words seen fewer than N times are rare (default 5)
      --rare-token TOKEN   Sentinel for rare words (default _RARE_)
  -c, --chart              Print each parse chart to stderr
  -v, --verbose            Log debug output to stderr (RUST_LOG overrides)",
    prog_name
  )
}

enum Command {
  Count { trees: String },
  Rare { trees: String, counts: String },
  Params { counts: String },
  Parse { counts: String, sentences: String },
}

struct Args {
  command: Command,
  config: ParserConfig,
  print_chart: bool,
  verbose: bool,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    let mut iter = v.into_iter();
    let prog_name = match iter.next() {
      Some(name) => name,
      None => return Err(Self::make_error_message("bad argument vector", "pcfg-cky")),
    };

    let mut config = ParserConfig::default();
    let mut print_chart = false;
    let mut verbose = false;
    let mut positional = Vec::new();

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-v" || o == "--verbose" {
        verbose = true;
      } else if o == "-r" || o == "--root" {
        let root = iter
          .next()
          .ok_or_else(|| Self::make_error_message("--root needs a symbol", &prog_name))?;
        config = config.with_root(root);
      } else if o == "-t" || o == "--threshold" {
        let threshold = iter
          .next()
          .and_then(|t| t.parse::<u64>().ok())
          .ok_or_else(|| Self::make_error_message("--threshold needs a number", &prog_name))?;
        config = config.with_rare_threshold(threshold);
      } else if o == "--rare-token" {
        let token = iter
          .next()
          .ok_or_else(|| Self::make_error_message("--rare-token needs a token", &prog_name))?;
        config = config.with_rare_token(token);
      } else if o.starts_with('-') {
        return Err(Self::make_error_message(&format!("unknown option {}", o), &prog_name));
      } else {
        positional.push(o);
      }
    }

    let mut positional = positional.into_iter();
    let command = match (positional.next().as_deref(), positional.next(), positional.next()) {
      (Some("count"), Some(trees), None) => Command::Count { trees },
      (Some("rare"), Some(trees), Some(counts)) => Command::Rare { trees, counts },
      (Some("params"), Some(counts), None) => Command::Params { counts },
      (Some("parse"), Some(counts), Some(sentences)) => Command::Parse { counts, sentences },
      (None, _, _) => return Err(Self::make_error_message("missing command", &prog_name)),
      _ => return Err(Self::make_error_message("invalid arguments", &prog_name)),
    };
    if positional.next().is_some() {
      return Err(Self::make_error_message("too many arguments", &prog_name));
    }

    Ok(Self {
      command,
      config,
      print_chart,
      verbose,
    })
  }
}

fn init_logging(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

fn read_counts(path: &str) -> Result<GrammarCounts, Err> {
  GrammarCounts::read(BufReader::new(File::open(path)?))
}

fn parse(counts: &str, sentences: &str, config: ParserConfig, print_chart: bool) -> Result<(), Err> {
  let parser = CkyParser::new(&read_counts(counts)?, config);
  let text = fs::read_to_string(sentences)?;

  if print_chart {
    for line in text.lines() {
      let tokens = line.split_whitespace().collect::<Vec<_>>();
      let chart = parser.parse_chart(&tokens);
      eprintln!("chart for {:?}:\n{}", line, chart.display(parser.grammar()));
    }
  }

  let stdout = io::stdout();
  let mut out = BufWriter::new(stdout.lock());
  let summary = parser.parse_batch(text.as_bytes(), &mut out)?;
  out.flush()?;
  if summary.failed > 0 {
    eprintln!("{} of {} sentences had no parse", summary.failed, summary.parsed + summary.failed);
  }
  Ok(())
}

fn main() -> Result<(), Err> {
  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  init_logging(opts.verbose);

  let stdout = io::stdout();
  let mut out = BufWriter::new(stdout.lock());

  match opts.command {
    Command::Count { trees } => {
      let counts = GrammarCounts::from_treebank(BufReader::new(File::open(trees)?))?;
      counts.write(&mut out)?;
    }
    Command::Rare { trees, counts } => {
      let filter = RareWordFilter::new(&read_counts(&counts)?, &opts.config);
      filter.replace_treebank(BufReader::new(File::open(trees)?), &mut out)?;
    }
    Command::Params { counts } => {
      RuleProbabilities::compute(&read_counts(&counts)?).write(&mut out)?;
    }
    Command::Parse { counts, sentences } => {
      drop(out);
      return parse(&counts, &sentences, opts.config, opts.print_chart);
    }
  }

  out.flush()?;
  Ok(())
}
