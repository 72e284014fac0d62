// ============================================================================
// PerlerPad CLI: headless rendering and conversion of bead projects
// ============================================================================
//
// Usage examples:
//   perlerpad --input heart.json --output heart.png
//   perlerpad -i heart.json -o heart.pbp                 (format from output ext)
//   perlerpad -i designs/*.json --output-dir png/ --labels --palette mard.json
//   perlerpad -i heart.pbp --stats
//
// No window is opened in CLI mode. Each project is rendered with the same
// renderer the editor uses, on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::io::{self, ProjectFormat};
use crate::palette::Palette;
use crate::project::Project;
use crate::render::{BackgroundImage, GridRenderer, RenderConfig, Theme};
use crate::settings::DEFAULT_CELL_SIZE;

/// How long a render waits for `--background` to decode.
const BACKGROUND_TIMEOUT: Duration = Duration::from_secs(30);

/// PerlerPad headless renderer.
#[derive(Parser, Debug)]
#[command(
    name = "perlerpad",
    about = "PerlerPad headless bead pattern renderer",
    long_about = "Render PerlerPad projects (.json / .pbp) to PNG, convert between\n\
                  project formats, or print bead counts without opening the GUI.\n\n\
                  Example:\n  \
                  perlerpad --input heart.json --output heart.png --labels\n  \
                  perlerpad -i designs/*.json --output-dir out/ --format pbp"
)]
pub struct CliArgs {
    /// Input project file(s). Glob patterns accepted (e.g. "designs/*.json").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, json, pbp.
    /// When omitted, inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Logical pixels per cell.
    #[arg(long, default_value_t = DEFAULT_CELL_SIZE, value_name = "PX")]
    pub cell_size: f32,

    /// Device pixel ratio of the rendered image.
    #[arg(long, default_value_t = 1.0)]
    pub scale: f32,

    /// light or dark.
    #[arg(long, default_value = "light")]
    pub theme: String,

    /// Draw palette IDs inside cells (needs --palette and cells >= 16px).
    #[arg(long)]
    pub labels: bool,

    /// Draw the every-tenth-cell guide lines.
    #[arg(long)]
    pub guides: bool,

    /// Palette JSON ({ group: { id: "#hex" } }) for IDs and labels.
    #[arg(short, long, value_name = "PALETTE.json")]
    pub palette: Option<PathBuf>,

    /// Reference image drawn under the cells.
    #[arg(long, value_name = "IMAGE")]
    pub background: Option<PathBuf>,

    /// Background opacity, 0-100.
    #[arg(long, default_value_t = 50.0, value_name = "0-100")]
    pub opacity: f32,

    /// Print a per-color bead count instead of (or as well as) writing output.
    #[arg(long)]
    pub stats: bool,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

/// What gets written for each input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Png,
    Project(ProjectFormat),
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Project(f) => f.extension(),
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let theme: Theme = match args.theme.parse() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let palette = match &args.palette {
        Some(path) => match Palette::load(path) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("error: could not read palette '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Palette::default(),
    };
    let palette = Arc::new(palette);

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let format = parse_format(args.format.as_deref(), args.output.as_deref());
    // --stats alone only reports; an explicit destination still writes.
    let write_output = !args.stats || args.output.is_some() || args.output_dir.is_some();

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let project = match load(input_path, &palette) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
                continue;
            }
        };

        if args.stats {
            print_stats(&project, &palette);
        }
        if !write_output {
            continue;
        }

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match write_one(&project, &output_path, format, &args, theme, &palette) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing
// ============================================================================

fn load(input: &Path, palette: &Palette) -> Result<Project, String> {
    let file = io::load_project(input).map_err(|e| format!("load failed: {}", e))?;
    let mut project =
        Project::from_file(file, palette).map_err(|e| format!("load failed: {}", e))?;
    project.path = Some(input.to_path_buf());
    Ok(project)
}

fn write_one(
    project: &Project,
    output: &Path,
    format: OutputFormat,
    args: &CliArgs,
    theme: Theme,
    palette: &Arc<Palette>,
) -> Result<(), String> {
    match format {
        OutputFormat::Project(_) => io::save_project(&project.to_file(palette), output)
            .map_err(|e| format!("save failed: {}", e)),
        OutputFormat::Png => {
            let config = render_config(project, args, theme);
            let mut renderer = GridRenderer::configure(config)
                .map_err(|e| format!("render failed: {}", e))?
                .with_palette(Arc::clone(palette));
            renderer.render_full(project.grid());
            if renderer.background_loading()
                && !renderer.wait_background(project.grid(), BACKGROUND_TIMEOUT)
            {
                eprintln!("  warning: background image did not load in time");
            }
            io::export_image(&renderer.into_image(), output)
                .map_err(|e| format!("save failed: {}", e))
        }
    }
}

fn render_config(project: &Project, args: &CliArgs, theme: Theme) -> RenderConfig {
    let mut config = RenderConfig::new(project.width(), project.height(), args.cell_size);
    if args.guides {
        config = config.with_standard_guides();
    }
    config.device_pixel_ratio = args.scale;
    config.theme = theme;
    config.show_labels = args.labels;
    config.background_image = args.background.as_ref().map(|path| BackgroundImage {
        source: path.to_string_lossy().into_owned(),
        opacity_percent: args.opacity.clamp(0.0, 100.0),
    });
    config
}

fn print_stats(project: &Project, palette: &Palette) {
    let stats = project.color_stats(palette);
    println!(
        "  {} ({}x{}): {} beads",
        project.name,
        project.width(),
        project.height(),
        stats.total
    );
    for (color, count) in &stats.entries {
        match palette.color_id(color) {
            Some(id) => println!("    {:<8} {:<9} {}", id, color, count),
            None => println!("    {:<8} {:<9} {}", "-", color, count),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// `--format` wins, then the output extension; PNG otherwise.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> OutputFormat {
    let from_name = |name: &str| match name.to_lowercase().as_str() {
        "json" => OutputFormat::Project(ProjectFormat::Json),
        "pbp" => OutputFormat::Project(ProjectFormat::Pbp),
        _ => OutputFormat::Png,
    };

    if let Some(f) = format_arg {
        return from_name(f);
    }
    output
        .and_then(|out| out.extension())
        .and_then(|e| e.to_str())
        .map(from_name)
        .unwrap_or(OutputFormat::Png)
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: OutputFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_comes_from_flag_then_extension() {
        assert_eq!(
            parse_format(Some("PBP"), Some(Path::new("x.png"))),
            OutputFormat::Project(ProjectFormat::Pbp)
        );
        assert_eq!(
            parse_format(None, Some(Path::new("out/x.json"))),
            OutputFormat::Project(ProjectFormat::Json)
        );
        assert_eq!(parse_format(None, None), OutputFormat::Png);
    }

    #[test]
    fn output_path_never_overwrites_the_input() {
        let json = OutputFormat::Project(ProjectFormat::Json);
        assert_eq!(
            build_output_path(Path::new("d/heart.json"), None, None, json),
            Some(PathBuf::from("d/heart_out.json"))
        );
        assert_eq!(
            build_output_path(Path::new("d/heart.json"), None, Some(Path::new("png")), OutputFormat::Png),
            Some(PathBuf::from("png/heart.png"))
        );
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = CliArgs::try_parse_from(["perlerpad", "-i", "a.json", "--labels"]);
        let Ok(args) = args else { panic!("args should parse") };
        assert_eq!(args.cell_size, DEFAULT_CELL_SIZE);
        assert!(args.labels);
        assert!(!args.guides);
        assert_eq!(args.theme, "light");
    }
}
