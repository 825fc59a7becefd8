//! bitsprite CLI - Convert PNG/BMP images to packed 1-bit C headers

use bitsprite::header::{self, ConversionArtifact};
use bitsprite::{
    BitspriteError, ConvertOptions, Converter, SpriteGrid, ThresholdMode, ThresholdScope,
};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bitsprite", about = "Convert PNG or BMP images to 1-bit bitmap C headers")]
struct Args {
    /// Input PNG or BMP file
    input: PathBuf,
    /// Output header file
    output: PathBuf,
    /// C array name (default: derived from output filename)
    array_name: Option<String>,
    /// Target width in pixels [default: 144]
    #[arg(short, long)]
    width: Option<u32>,
    /// Target height in pixels [default: 168]
    #[arg(short = 'H', long)]
    height: Option<u32>,
    /// Black/white cut (0-255, pixels above it become white) or "auto" for Otsu
    #[arg(short, long, allow_negative_numbers = true)]
    threshold: Option<String>,
    /// Compute the automatic threshold per sprite frame instead of per sheet
    #[arg(long)]
    per_frame_threshold: bool,
    /// Don't resize the image (use original dimensions)
    #[arg(long)]
    no_resize: bool,
    /// Number of sprite columns (creates sprite sheet)
    #[arg(long, allow_negative_numbers = true)]
    sprite_cols: Option<i64>,
    /// Number of sprite rows (creates sprite sheet)
    #[arg(long, allow_negative_numbers = true)]
    sprite_rows: Option<i64>,
    /// Per-frame resize width for sprite sheets [default: width / cols]
    #[arg(long)]
    frame_width: Option<u32>,
    /// Per-frame resize height for sprite sheets [default: height / rows]
    #[arg(long)]
    frame_height: Option<u32>,
    /// JSON file with conversion options; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Save the first converted frame as a PNG
    #[arg(short, long)]
    preview: Option<PathBuf>,
    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn options(&self) -> Result<ConvertOptions, BitspriteError> {
        let mut options = match &self.config {
            Some(path) => ConvertOptions::from_json_file(path)?,
            None => ConvertOptions::default(),
        };

        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        if let Some(threshold) = &self.threshold {
            options.threshold = threshold.parse::<ThresholdMode>()?;
        }
        if self.per_frame_threshold {
            options.threshold_scope = ThresholdScope::PerFrame;
        }
        if self.no_resize {
            options.resize = false;
        }
        if let Some(grid) = SpriteGrid::from_parts(self.sprite_cols, self.sprite_rows)? {
            options.sprite = Some(grid);
        }
        if self.frame_width.is_some() {
            options.frame_width = self.frame_width;
        }
        if self.frame_height.is_some() {
            options.frame_height = self.frame_height;
        }

        options.validate()?;
        Ok(options)
    }

    fn base_name(&self) -> Result<String, BitspriteError> {
        match &self.array_name {
            Some(name) if header::is_identifier(name) => Ok(name.clone()),
            Some(name) => Err(BitspriteError::InvalidName(name.clone())),
            None => Ok(header::base_name_from_path(&self.output)),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn main() -> Result<(), BitspriteError> {
    let args = Args::parse();

    let default_filter = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let options = args.options()?;
    let base_name = args.base_name()?;

    info!("Input: {}", args.input.display());
    info!("Output: {}", args.output.display());
    info!("Base array name: {base_name}");
    if let Some(grid) = options.sprite {
        info!("Sprite sheet mode: {}x{} frames", grid.cols, grid.rows);
    }
    if options.resize {
        info!("Target size: {}x{}", options.width, options.height);
    } else {
        info!("No resizing (using original dimensions)");
    }
    if let ThresholdMode::Fixed(level) = options.threshold {
        info!("Custom threshold: {level}");
    }

    let image = bitsprite::load_image(&args.input)?;
    let converter = Converter::from_options(options);
    let frames = converter.binarize(&image)?;

    if let Some(preview) = &args.preview {
        frames[0].to_gray_image().save(preview)?;
        info!("Preview of first frame saved to {}", preview.display());
    }

    let artifact = ConversionArtifact::new(
        base_name,
        file_name(&args.input),
        converter.options().sprite,
        bitsprite::pack_all(&frames),
    )?;
    let output_name = file_name(&args.output);
    header::write_artifact(&args.output, &header::emit(&artifact, &output_name))?;

    info!(
        "Conversion complete: {} frame(s) of {}x{}, {} bytes total",
        artifact.frame_count(),
        artifact.frame_width(),
        artifact.frame_height(),
        artifact.total_bytes()
    );
    let names = artifact.array_names();
    match artifact.grid() {
        Some(_) => info!(
            "Usage: #include \"{output_name}\" then drawBitmap(x, y, {upper}_FRAME_WIDTH, {upper}_FRAME_HEIGHT, {}_frames[currentFrame])",
            artifact.base_name(),
            upper = artifact.base_name().to_uppercase()
        ),
        None => info!(
            "Usage: #include \"{output_name}\" then drawBitmap(x, y, {upper}_WIDTH, {upper}_HEIGHT, {})",
            names[0],
            upper = artifact.base_name().to_uppercase()
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["bitsprite", "in.png", "out.h"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_threshold_flag_out_of_range() {
        for level in ["300", "-1", "dark"] {
            let err = parse(&["--threshold", level]).options().unwrap_err();
            assert!(matches!(err, BitspriteError::InvalidThreshold(ref got) if got == level));
        }
    }

    #[test]
    fn test_threshold_flag_values() {
        assert_eq!(parse(&["-t", "100"]).options().unwrap().threshold, ThresholdMode::Fixed(100));
        assert_eq!(parse(&["-t", "auto"]).options().unwrap().threshold, ThresholdMode::Auto);
        assert_eq!(parse(&[]).options().unwrap().threshold, ThresholdMode::Auto);
    }

    #[test]
    fn test_sprite_flags_need_each_other() {
        let err = parse(&["--sprite-cols", "4"]).options().unwrap_err();
        assert!(matches!(err, BitspriteError::InvalidGrid(_)));
        let err = parse(&["--sprite-cols", "-2", "--sprite-rows", "1"]).options().unwrap_err();
        assert!(matches!(err, BitspriteError::InvalidGrid(_)));

        let options = parse(&["--sprite-cols", "4", "--sprite-rows", "2"]).options().unwrap();
        assert_eq!(options.sprite, Some(SpriteGrid { cols: 4, rows: 2 }));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(parse(&[]).base_name().unwrap(), "out");
        assert_eq!(parse(&["hero"]).base_name().unwrap(), "hero");
        assert!(matches!(parse(&["9lives"]).base_name(), Err(BitspriteError::InvalidName(_))));
    }
}
