//! unexam CLI - exam PDF to question table

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use unexam::render::{figure_layout, to_csv, to_json, FigureFit, JsonFormat};
use unexam::{
    ExamExtractor, ExtractOptions, GlyphSource, LopdfSource, PageSelection, QuestionTable,
    Thresholds,
};

#[derive(Parser)]
#[command(name = "unexam")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Turn exam and answer-key PDFs into a question table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the question table from a question PDF and an answer PDF
    Extract {
        /// Question PDF
        #[arg(value_name = "QUESTIONS")]
        questions: PathBuf,

        /// Answer-key PDF
        #[arg(value_name = "ANSWERS")]
        answers: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Directory for rendered figures
        #[arg(long, value_name = "DIR", default_value = "figures")]
        figures: PathBuf,

        /// Skip figure rendering
        #[arg(long, conflicts_with = "figures")]
        no_figures: bool,

        /// Threshold overrides (JSON)
        #[arg(long, value_name = "FILE", env = "UNEXAM_THRESHOLDS")]
        thresholds: Option<PathBuf>,

        /// Page range of the question PDF (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Treat unreadable pages as empty instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Print the script-normalized text of a question PDF
    Text {
        /// Question PDF
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Threshold overrides (JSON)
        #[arg(long, value_name = "FILE", env = "UNEXAM_THRESHOLDS")]
        thresholds: Option<PathBuf>,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,
    },

    /// Print the parsed answer key
    Answers {
        /// Answer-key PDF
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Threshold overrides (JSON)
        #[arg(long, value_name = "FILE", env = "UNEXAM_THRESHOLDS")]
        thresholds: Option<PathBuf>,
    },

    /// Print figure scale and row height for a table's figures
    Layout {
        /// Table JSON written by `extract`
        #[arg(value_name = "TABLE")]
        table: PathBuf,
    },

    /// Show document information
    Info {
        /// PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Threshold overrides (JSON)
        #[arg(long, value_name = "FILE", env = "UNEXAM_THRESHOLDS")]
        thresholds: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// JSON array of rows
    Json,
    /// Comma-separated values with a header row
    Csv,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Extract {
            questions,
            answers,
            output,
            format,
            compact,
            figures,
            no_figures,
            thresholds,
            pages,
            lenient,
        }) => cmd_extract(ExtractArgs {
            questions: &questions,
            answers: &answers,
            output: output.as_deref(),
            format,
            compact,
            figures: figure_dir(figures, no_figures),
            thresholds: thresholds.as_deref(),
            pages: pages.as_deref(),
            lenient,
        }),
        Some(Commands::Text {
            input,
            output,
            thresholds,
            pages,
        }) => cmd_text(
            &input,
            output.as_deref(),
            thresholds.as_deref(),
            pages.as_deref(),
        ),
        Some(Commands::Answers { input, thresholds }) => {
            cmd_answers(&input, thresholds.as_deref())
        }
        Some(Commands::Layout { table }) => cmd_layout(&table),
        Some(Commands::Info { input, thresholds }) => cmd_info(&input, thresholds.as_deref()),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!(
                "{}",
                "Usage: unexam extract <QUESTIONS> <ANSWERS> [--figures DIR | --no-figures]".yellow()
            );
            println!("       unexam --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

struct ExtractArgs<'a> {
    questions: &'a Path,
    answers: &'a Path,
    output: Option<&'a Path>,
    format: OutputFormat,
    compact: bool,
    figures: Option<PathBuf>,
    thresholds: Option<&'a Path>,
    pages: Option<&'a str>,
    lenient: bool,
}

/// Figures go to `figures` unless `--no-figures` is given.
fn figure_dir(figures: PathBuf, no_figures: bool) -> Option<PathBuf> {
    (!no_figures).then_some(figures)
}

fn load_thresholds(path: Option<&Path>) -> Result<Thresholds, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Thresholds::from_json_file(path)?),
        None => Ok(Thresholds::default()),
    }
}

fn parse_pages(pages: Option<&str>) -> Result<PageSelection, Box<dyn std::error::Error>> {
    match pages {
        Some(range) => PageSelection::parse(range)
            .map_err(|e| format!("Invalid page range: {}", e).into()),
        None => Ok(PageSelection::All),
    }
}

fn write_output(output: Option<&Path>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("{} {}", "Saved to".green(), path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cmd_extract(args: ExtractArgs<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = ExtractOptions::new()
        .with_thresholds(load_thresholds(args.thresholds)?)
        .with_pages(parse_pages(args.pages)?);
    if let Some(dir) = args.figures {
        options = options.with_figure_dir(dir);
    }
    if args.lenient {
        options = options.lenient();
    }
    let extractor = ExamExtractor::new(options)?;

    let pb = ProgressBar::new(4);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    pb.set_message("Loading question PDF...");
    let questions = LopdfSource::open(args.questions)?;
    pb.inc(1);

    pb.set_message("Loading answer PDF...");
    let answers = LopdfSource::open(args.answers)?;
    pb.inc(1);

    pb.set_message("Extracting questions and figures...");
    let result = extractor.extract(&questions, &answers)?;
    pb.inc(1);

    pb.set_message("Writing table...");
    let content = match args.format {
        OutputFormat::Json => {
            let format = if args.compact {
                JsonFormat::Compact
            } else {
                JsonFormat::Pretty
            };
            to_json(&result.table, format)?
        }
        OutputFormat::Csv => to_csv(&result.table),
    };
    pb.inc(1);
    pb.finish_and_clear();

    write_output(args.output, &content)?;

    let stats = &result.stats;
    eprintln!(
        "{} {} questions, {} figures, {}/{} pages",
        "Extracted".green().bold(),
        stats.question_count,
        stats.figure_count,
        stats.pages_processed,
        stats.page_count
    );
    if stats.pages_skipped > 0 {
        eprintln!(
            "{} {} unreadable page(s) skipped",
            "Warning:".yellow().bold(),
            stats.pages_skipped
        );
    }
    if !result.table.missing.is_empty() {
        eprintln!(
            "{} missing question numbers: {:?}",
            "Warning:".yellow().bold(),
            result.table.missing
        );
    }

    Ok(())
}

fn cmd_text(
    input: &Path,
    output: Option<&Path>,
    thresholds: Option<&Path>,
    pages: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = ExtractOptions::new()
        .with_thresholds(load_thresholds(thresholds)?)
        .with_pages(parse_pages(pages)?);
    let extractor = ExamExtractor::new(options)?;
    let text = extractor.normalized_text(&LopdfSource::open(input)?)?;
    write_output(output, &text)
}

fn cmd_answers(input: &Path, thresholds: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let options = ExtractOptions::new().with_thresholds(load_thresholds(thresholds)?);
    let extractor = ExamExtractor::new(options)?;
    let key = extractor.answer_key(&LopdfSource::open(input)?)?;

    println!("{}", "Answer Key".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for (number, letter) in key.iter() {
        println!("{:>3}. {}", number, letter);
    }
    println!();
    println!("{}: {}", "Answers".bold(), key.to_letter_string());

    Ok(())
}

fn cmd_layout(table: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = fs::read_to_string(table)?;
    let table: QuestionTable = serde_json::from_str(&json)?;
    let layout = figure_layout(&table, &FigureFit::default());
    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}

fn cmd_info(input: &Path, thresholds: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let thresholds = load_thresholds(thresholds)?;
    let source = LopdfSource::open(input)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), source.version());
    println!("{}: {}", "Pages".bold(), source.page_count());

    println!();
    println!("{}", "Page Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let mut total_glyphs = 0;
    let mut total_images = 0;
    for page_index in 0..source.page_count() {
        let (width, height) = source.page_size(page_index)?;
        let glyphs = match source.page_glyphs(page_index) {
            Ok(glyphs) => glyphs.len(),
            Err(e) => {
                println!("{} {}: {}", "Page".bold(), page_index + 1, e.to_string().red());
                continue;
            }
        };
        let images = source.page_images(page_index).map_or(0, |images| images.len());
        total_glyphs += glyphs;
        total_images += images;
        println!(
            "{} {}: {:.0}x{:.0} pt, {} glyphs, {} images",
            "Page".bold(),
            page_index + 1,
            width,
            height,
            glyphs,
            images
        );
    }

    println!();
    println!("{}: {}", "Glyphs".bold(), total_glyphs);
    println!("{}: {}", "Images".bold(), total_images);

    let text = source.plain_text(&thresholds)?;
    println!("{}: {}", "Words".bold(), text.split_whitespace().count());

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "unexam".cyan().bold(), env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_figure_dir(args: &[&str]) -> Option<PathBuf> {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Commands::Extract {
                figures, no_figures, ..
            }) => figure_dir(figures, no_figures),
            _ => panic!("expected extract command"),
        }
    }

    #[test]
    fn test_figures_rendered_by_default() {
        let dir = extract_figure_dir(&["unexam", "extract", "TEST.pdf", "ANSWER.pdf"]);
        assert_eq!(dir, Some(PathBuf::from("figures")));
    }

    #[test]
    fn test_figures_directory_override() {
        let dir = extract_figure_dir(&[
            "unexam",
            "extract",
            "TEST.pdf",
            "ANSWER.pdf",
            "--figures",
            "out/crops",
        ]);
        assert_eq!(dir, Some(PathBuf::from("out/crops")));
    }

    #[test]
    fn test_no_figures_flag() {
        let dir = extract_figure_dir(&["unexam", "extract", "TEST.pdf", "ANSWER.pdf", "--no-figures"]);
        assert_eq!(dir, None);

        let conflict = Cli::try_parse_from([
            "unexam",
            "extract",
            "TEST.pdf",
            "ANSWER.pdf",
            "--no-figures",
            "--figures",
            "x",
        ]);
        assert!(conflict.is_err());
    }
}
