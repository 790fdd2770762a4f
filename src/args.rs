use clap::Parser;
use std::path::PathBuf;

// https://stackoverflow.com/questions/74068168/clap-rs-not-printing-colors-during-help
fn get_styles() -> clap::builder::Styles {
    let cyan = anstyle::Color::Ansi(anstyle::AnsiColor::Cyan);
    let green = anstyle::Color::Ansi(anstyle::AnsiColor::Green);
    let yellow = anstyle::Color::Ansi(anstyle::AnsiColor::Yellow);

    clap::builder::Styles::styled()
        .placeholder(anstyle::Style::new().fg_color(Some(yellow)))
        .usage(anstyle::Style::new().fg_color(Some(cyan)).bold())
        .header(
            anstyle::Style::new()
                .fg_color(Some(cyan))
                .bold()
                .underline(),
        )
        .literal(anstyle::Style::new().fg_color(Some(green)))
}

// https://docs.rs/clap/latest/clap/struct.Command.html#method.help_template
const APPLET_TEMPLATE: &str = "\
{before-help}
{about-with-newline}
{usage-heading} {usage}

{all-args}
{after-help}";

#[derive(Parser, Debug, Clone)]
#[command(
    // Read from `Cargo.toml`
    author, version, about,
    long_about = None,
    next_line_help = true,
    help_template = APPLET_TEMPLATE,
    styles=get_styles(),
)]
pub struct Arguments {
    /// Path to the data file.
    #[arg(help = "Path to the data file (csv, tsv, json, parquet)")]
    pub path: Option<PathBuf>,

    /// Alternate way to pass the input file.
    #[arg(short, long, help = "Input file (same as the positional FILE)")]
    pub input: Option<PathBuf>,

    /// Read rows from stdin.
    #[arg(long, help = "Read rows from stdin", conflicts_with = "stdin2")]
    pub stdin: bool,

    /// Read a leading line count N and then N rows from stdin.
    #[arg(long, help = "Read a line count and then that many rows from stdin")]
    pub stdin2: bool,

    /// Cell delimiter for delimited files and stdin.
    #[arg(short, long, help = "Cell delimiter character")]
    pub delimiter: Option<char>,

    /// Override filetype detection.
    #[arg(
        short = 't',
        long = "filetype",
        help = "Override filetype detection",
        value_parser = ["tsv", "csv", "json", "xlsx", "ods", "pkl"],
    )]
    pub filetype: Option<String>,

    /// Generate an N-row demo table served through the refresh callback.
    #[arg(long, help = "Generate an N-row demo table (exercises refresh)")]
    pub generate: Option<usize>,

    /// Restore a saved engine snapshot.
    #[arg(long, help = "Restore a saved state snapshot")]
    pub load: Option<PathBuf>,
}

impl Arguments {
    /// Build Arguments struct
    pub fn build() -> Arguments {
        Arguments::parse()
    }

    /// The effective input path: positional wins over `-i`.
    pub fn source(&self) -> Option<&PathBuf> {
        self.path.as_ref().or(self.input.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_arguments_positional_file() {
        let args = Arguments::parse_from(["rowpick", "/tmp/data.csv"]);
        assert_eq!(args.path, Some(PathBuf::from("/tmp/data.csv")));
        assert_eq!(args.source(), Some(&PathBuf::from("/tmp/data.csv")));
        assert_eq!(args.delimiter, None);
        assert!(!args.stdin);
    }

    #[test]
    fn test_arguments_with_short_options() {
        let args = Arguments::parse_from([
            "rowpick",
            "-d",
            "|",
            "-t",
            "tsv",
            "-i",
            "my_file.txt",
        ]);
        assert_eq!(args.delimiter, Some('|'));
        assert_eq!(args.filetype.as_deref(), Some("tsv"));
        assert_eq!(args.source(), Some(&PathBuf::from("my_file.txt")));
    }

    #[test]
    fn test_arguments_stdin_flags_conflict() {
        assert!(Arguments::try_parse_from(["rowpick", "--stdin", "--stdin2"]).is_err());
        let args = Arguments::parse_from(["rowpick", "--stdin2"]);
        assert!(args.stdin2);
    }

    #[test]
    fn test_arguments_generate_and_load() {
        let args = Arguments::parse_from(["rowpick", "--generate", "500"]);
        assert_eq!(args.generate, Some(500));

        let args = Arguments::parse_from(["rowpick", "--load", "state.rps"]);
        assert_eq!(args.load, Some(PathBuf::from("state.rps")));
    }

    #[test]
    fn test_arguments_rejects_unknown_filetype() {
        assert!(Arguments::try_parse_from(["rowpick", "-t", "sqlite"]).is_err());
    }
}
