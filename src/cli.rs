// ============================================================================
// HubEdit CLI - headless editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   hubedit -i photo.jpg --preset vintage -o out.png
//   hubedit -i photo.png --crop 10,10,200,150 --resize 800x600 --flip h
//   hubedit -i shots/*.png --brightness 120 --emboss --output-dir processed/
//   hubedit -i card.png --text "Hello" --text-x 20 --text-y 20 --color "#ff0"
//
// Each file runs through one Editor session, in a fixed order:
// filters -> crop -> resize -> flips -> emboss -> text -> export (PNG).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::CropRegion;
use crate::editor::{EditCommand, Editor, Outcome};
use crate::io;
use crate::ops::filters::{FilterPreset, FilterState};
use crate::ops::text::{DEFAULT_FONT_SIZE, DEFAULT_POSITION, TextOverlayPatch, parse_hex_color};
use crate::ops::transform::{FlipAxis, Interpolation};
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// HubEdit headless image editor.
///
/// Apply filters, crops, resizes, flips, emboss and text to images and export
/// the result as PNG.
#[derive(Parser, Debug)]
#[command(
    name = "hubedit",
    version,
    about = "HubEdit headless raster editor",
    long_about = "Apply the editor's filters and destructive operations to image files\n\
                  without a UI. Accepts JPG, PNG, GIF, WebP and BMP; always writes PNG.\n\n\
                  Example:\n  \
                  hubedit --input photo.jpg --preset vintage --output result.png\n  \
                  hubedit -i *.png --crop 0,0,512,512 --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path for single-file input (default: edited-image.png).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Files keep their stem and get
    /// a .png extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Declared MIME type of the input(s). Inferred from the extension when
    /// omitted.
    #[arg(long, value_name = "TYPE")]
    pub mime: Option<String>,

    /// Filter preset: original, vintage, "black & white", "high contrast",
    /// warm, cool, dramatic, soft. Individual filter flags override it.
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Brightness in percent (0-200, 100 = unchanged).
    #[arg(long, value_name = "PCT")]
    pub brightness: Option<f32>,

    /// Contrast in percent (0-200, 100 = unchanged).
    #[arg(long, value_name = "PCT")]
    pub contrast: Option<f32>,

    /// Saturation in percent (0-200, 100 = unchanged).
    #[arg(long, value_name = "PCT")]
    pub saturation: Option<f32>,

    /// Hue rotation in degrees (-180..180).
    #[arg(long, value_name = "DEG", allow_negative_numbers = true)]
    pub hue: Option<f32>,

    /// Blur radius in pixels (0-10).
    #[arg(long, value_name = "PX")]
    pub blur: Option<f32>,

    /// Sepia in percent (0-200).
    #[arg(long, value_name = "PCT")]
    pub sepia: Option<f32>,

    /// Grayscale in percent (0-200).
    #[arg(long, value_name = "PCT")]
    pub grayscale: Option<f32>,

    /// Invert in percent (0-200).
    #[arg(long, value_name = "PCT")]
    pub invert: Option<f32>,

    /// Opacity in percent (0-200, 100 = unchanged).
    #[arg(long, value_name = "PCT")]
    pub opacity: Option<f32>,

    /// Crop rectangle "x,y,width,height". Clamped into the image.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_crop, allow_hyphen_values = true)]
    pub crop: Option<CropRegion>,

    /// Resize to exact dimensions "WxH" (aspect lock off).
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub resize: Option<(u32, u32)>,

    /// Resize width; height follows unless --no-aspect-lock.
    #[arg(long, value_name = "PX")]
    pub width: Option<u32>,

    /// Resize height; width follows unless --no-aspect-lock.
    #[arg(long, value_name = "PX")]
    pub height: Option<u32>,

    /// Let --width and --height change independently.
    #[arg(long)]
    pub no_aspect_lock: bool,

    /// Resampling filter: nearest, bilinear, bicubic, lanczos3.
    #[arg(long, value_name = "MODE", value_parser = parse_interpolation)]
    pub interpolation: Option<Interpolation>,

    /// Mirror the image: h (horizontal) or v (vertical). Repeatable.
    #[arg(long, value_name = "AXIS", value_parser = parse_flip)]
    pub flip: Vec<FlipAxis>,

    /// Apply the emboss convolution.
    #[arg(long)]
    pub emboss: bool,

    /// Burn in a line of text. Repeatable; lines stack downwards.
    #[arg(long, value_name = "TEXT")]
    pub text: Vec<String>,

    /// Left edge of the first text line.
    #[arg(long, value_name = "PX", allow_negative_numbers = true)]
    pub text_x: Option<f32>,

    /// Top edge of the first text line.
    #[arg(long, value_name = "PX", allow_negative_numbers = true)]
    pub text_y: Option<f32>,

    /// Font size in pixels.
    #[arg(long, value_name = "PX")]
    pub font_size: Option<f32>,

    /// Text colour: #rgb, #rrggbb or #rrggbbaa.
    #[arg(long, value_name = "HEX")]
    pub color: Option<String>,

    /// Font family (falls back to a system sans-serif).
    #[arg(long, value_name = "FAMILY")]
    pub font: Option<String>,

    #[arg(long)]
    pub bold: bool,

    #[arg(long)]
    pub italic: bool,

    /// Print per-file progress and mirror the session log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Edit plan - arguments validated once, replayed per file
// ============================================================================

/// The edits requested on the command line, already parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct EditPlan {
    pub filters: FilterState,
    pub crop: Option<CropRegion>,
    pub resize: Option<ResizeRequest>,
    pub flips: Vec<FlipAxis>,
    pub emboss: bool,
    pub texts: Vec<TextOverlayPatch>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeRequest {
    Exact(u32, u32),
    Edges { width: Option<u32>, height: Option<u32>, lock_aspect: bool },
}

impl EditPlan {
    pub fn from_args(args: &CliArgs) -> Result<Self, String> {
        let mut filters = match &args.preset {
            Some(name) => FilterPreset::from_name(name).map_err(|e| e.to_string())?.filters(),
            None => FilterState::default(),
        };
        if let Some(v) = args.brightness { filters = filters.with_brightness(v); }
        if let Some(v) = args.contrast { filters = filters.with_contrast(v); }
        if let Some(v) = args.saturation { filters = filters.with_saturation(v); }
        if let Some(v) = args.hue { filters = filters.with_hue(v); }
        if let Some(v) = args.blur { filters = filters.with_blur(v); }
        if let Some(v) = args.sepia { filters = filters.with_sepia(v); }
        if let Some(v) = args.grayscale { filters = filters.with_grayscale(v); }
        if let Some(v) = args.invert { filters = filters.with_invert(v); }
        if let Some(v) = args.opacity { filters = filters.with_opacity(v); }

        let resize = match (args.resize, args.width, args.height) {
            (Some((w, h)), _, _) => Some(ResizeRequest::Exact(w, h)),
            (None, None, None) => None,
            (None, width, height) => Some(ResizeRequest::Edges {
                width,
                height,
                lock_aspect: !args.no_aspect_lock,
            }),
        };

        let color = match &args.color {
            Some(hex) => Some(parse_hex_color(hex).map_err(|e| e.to_string())?),
            None => None,
        };
        let x = args.text_x.unwrap_or(DEFAULT_POSITION.0);
        let y = args.text_y.unwrap_or(DEFAULT_POSITION.1);
        let size = args.font_size.unwrap_or(DEFAULT_FONT_SIZE).max(1.0);
        let texts = args
            .text
            .iter()
            .enumerate()
            .map(|(i, line)| TextOverlayPatch {
                text: Some(line.clone()),
                x: Some(x),
                y: Some(y + i as f32 * size * 1.25),
                font_size: Some(size),
                color,
                font_family: args.font.clone(),
                bold: Some(args.bold),
                italic: Some(args.italic),
            })
            .collect();

        Ok(Self {
            filters,
            crop: args.crop,
            resize,
            flips: args.flip.clone(),
            emboss: args.emboss,
            texts,
        })
    }

    /// Replay the plan on a loaded editor in the fixed CLI order.
    pub fn apply(&self, editor: &mut Editor) -> crate::error::Result<()> {
        // Baked up front so later steps see the filtered pixels.
        if !self.filters.is_identity() {
            editor.handle(EditCommand::SetFilters(self.filters))?;
            editor.handle(EditCommand::BakeFilters)?;
        }

        if let Some(region) = self.crop {
            editor.handle(EditCommand::SetCropRegion(CropRegion { active: true, ..region }))?;
            editor.handle(EditCommand::ApplyCrop)?;
        }

        match self.resize {
            Some(ResizeRequest::Exact(w, h)) => {
                editor.handle(EditCommand::SetAspectLock(false))?;
                editor.handle(EditCommand::SetResizeWidth(w))?;
                editor.handle(EditCommand::SetResizeHeight(h))?;
                editor.handle(EditCommand::ApplyResize)?;
            }
            Some(ResizeRequest::Edges { width, height, lock_aspect }) => {
                editor.handle(EditCommand::SetAspectLock(lock_aspect))?;
                if let Some(w) = width {
                    editor.handle(EditCommand::SetResizeWidth(w))?;
                }
                if let Some(h) = height {
                    editor.handle(EditCommand::SetResizeHeight(h))?;
                }
                editor.handle(EditCommand::ApplyResize)?;
            }
            None => {}
        }

        for axis in &self.flips {
            editor.handle(EditCommand::Flip(*axis))?;
        }

        if self.emboss {
            editor.handle(EditCommand::Emboss)?;
        }

        for patch in &self.texts {
            if let Outcome::TextAdded(id) = editor.handle(EditCommand::AddText)? {
                editor.handle(EditCommand::UpdateText(id, patch.clone()))?;
            }
        }

        Ok(())
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    run_with_settings(args, EditorSettings::load())
}

/// [`run`] with explicit settings instead of the user's settings file.
pub fn run_with_settings(args: CliArgs, mut settings: EditorSettings) -> ExitCode {
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

    let plan = match EditPlan::from_args(&args) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(interp) = args.interpolation {
        settings.interpolation = interp;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();
        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            multi,
            &settings.export_filename,
        ) else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, args.mime.as_deref(), &plan, &settings) {
            Ok((w, h)) => {
                log_info!("cli: {} -> {} ({}x{})", input_path.display(), output_path.display(), w, h);
                if args.verbose || multi {
                    println!(
                        "  → {} {}x{} ({:.0}ms)",
                        output_path.display(),
                        w,
                        h,
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("cli: {} failed: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

/// Load, edit and export one file. Returns the exported dimensions.
fn run_one(
    input:    &Path,
    output:   &Path,
    mime:     Option<&str>,
    plan:     &EditPlan,
    settings: &EditorSettings,
) -> Result<(u32, u32), String> {
    // -- Step 1: Load ----------------------------------------------------
    let bytes = std::fs::read(input).map_err(|e| format!("could not read input: {}", e))?;
    let mime = mime
        .map(str::to_string)
        .or_else(|| io::mime_from_extension(input).map(str::to_string));

    let mut editor = Editor::new(settings.clone());
    editor
        .handle(EditCommand::Load { bytes, mime })
        .map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Edit ----------------------------------------------------
    plan.apply(&mut editor).map_err(|e| format!("edit failed: {}", e))?;

    // -- Step 3: Export --------------------------------------------------
    let exported = editor
        .export()
        .map_err(|e| format!("export failed: {}", e))?
        .ok_or_else(|| "nothing to export".to_string())?;
    io::write_bytes(&exported.png, output).map_err(|e| format!("save failed: {}", e))?;

    Ok((exported.width, exported.height))
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

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, single-file input)
/// 2. `--output-dir` (batch directory, input stem + `.png`)
/// 3. single input: the export filename in the working directory
/// 4. batch without a directory: next to the input as `<stem>_edited.png`
fn build_output_path(
    input:           &Path,
    output:          Option<&Path>,
    output_dir:      Option<&Path>,
    multi:           bool,
    export_filename: &str,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    if !multi {
        return Some(PathBuf::from(export_filename));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_edited.png", stem)))
}

fn parse_crop(s: &str) -> Result<CropRegion, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected x,y,width,height but got '{}'", s));
    }
    let mut v = [0i64; 4];
    for (slot, part) in v.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| format!("'{}' is not a whole number", part))?;
    }
    Ok(CropRegion::new(v[0], v[1], v[2], v[3]))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT but got '{}'", s))?;
    let w = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
    let h = h.trim().parse().map_err(|_| format!("bad height '{}'", h))?;
    Ok((w, h))
}

fn parse_interpolation(s: &str) -> Result<Interpolation, String> {
    s.parse().map_err(|e: crate::error::EditorError| e.to_string())
}

fn parse_flip(s: &str) -> Result<FlipAxis, String> {
    s.parse()
}
