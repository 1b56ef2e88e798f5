use sssomt::{ProcessingMetrics, TransformError};
use std::path::Path;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

/// Compiled rules of a ruleset that read cleanly (stdout).
pub fn print_ruleset(path: &Path, rules: &[String], color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Ruleset: {}", path.display()), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    if rules.is_empty() {
        println!("{}", palette.dim("  No rules"));
    }
    for (idx, rule) in rules.iter().enumerate() {
        println!("  {} {}", palette.paint(format!("[{idx}]"), ansi::GRAY), palette.paint(rule, ansi::BLUE));
    }
    println!("\n  {}", palette.paint(format!("✓ {} rule(s)", rules.len()), ansi::GREEN));
    println!();
}

/// Diagnostics of a ruleset that failed to read (stderr).
pub fn print_errors(path: &Path, errors: &[TransformError], color: bool) {
    let palette = ansi::Palette::new(color);
    eprintln!("\n{}", palette.bold(palette.paint(format!("⚙  Ruleset: {}", path.display()), ansi::CYAN)));

    eprintln!("\n{}", palette.paint("━━━ Errors ━━━", ansi::GRAY));
    for error in errors {
        eprintln!("  {} {}", palette.paint("✗", ansi::RED), error);
    }
    eprintln!("\n  {}", palette.paint(format!("{} error(s), ruleset rejected", errors.len()), ansi::RED));
    eprintln!();
}

/// Per-rule counters and timing of a run (stderr, stdout carries the data).
pub fn print_run(metrics: &ProcessingMetrics, color: bool) {
    let palette = ansi::Palette::new(color);

    eprintln!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    if metrics.rules.is_empty() {
        eprintln!("{}", palette.dim("  No rule selected"));
    }
    for (idx, rule) in metrics.rules.iter().enumerate() {
        eprintln!("  {} {}", palette.paint(format!("[{idx}]"), ansi::GRAY), palette.paint(&rule.rule, ansi::BLUE));
        eprintln!(
            "      {} {}  {} {}  {} {}  {}",
            palette.dim("matched:"),
            palette.paint(rule.matched.to_string(), ansi::YELLOW),
            palette.dim("dropped:"),
            palette.paint(rule.dropped.to_string(), ansi::YELLOW),
            palette.dim("produced:"),
            palette.paint(rule.produced.to_string(), ansi::YELLOW),
            palette.dim(format!("{:?}", rule.duration)),
        );
    }

    eprintln!("\n{}", palette.paint("━━━ Summary ━━━", ansi::GRAY));
    eprintln!(
        "  Mappings: {} → {}  │  Dropped: {}  │  Products: {}",
        palette.paint(metrics.mappings_in.to_string(), ansi::CYAN),
        palette.paint(metrics.mappings_out.to_string(), ansi::CYAN),
        palette.paint(metrics.dropped.to_string(), ansi::YELLOW),
        palette.paint(metrics.products.to_string(), ansi::GREEN),
    );
    eprintln!("  Total: {}", palette.paint(format!("{:?}", metrics.total), ansi::GREEN));
    eprintln!();
}
