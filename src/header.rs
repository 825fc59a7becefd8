//! C header emission for packed bitmaps.

use crate::frame::SpriteGrid;
use crate::pack::PackedBitmap;
use crate::{BitspriteError, Result};
use log::info;
use std::fmt;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const BYTES_PER_LINE: usize = 12;

/// Turns an arbitrary name into a C identifier: every non-alphanumeric
/// character becomes `_` and a leading digit gets an `img_` prefix.
pub fn sanitize_identifier(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    match sanitized.chars().next() {
        None => "img".to_string(),
        Some(c) if c.is_ascii_digit() => format!("img_{sanitized}"),
        Some(_) => sanitized,
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Array base name derived from an output file's stem.
pub fn base_name_from_path(path: &Path) -> String {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    sanitize_identifier(&stem)
}

/// Everything that goes into one header: the packed frames plus the metadata
/// read off them.
#[derive(Debug, Clone)]
pub struct ConversionArtifact {
    base_name: String,
    source_name: String,
    grid: Option<SpriteGrid>,
    frames: Vec<PackedBitmap>,
}

impl ConversionArtifact {
    /// Frame width and height come from the frames themselves, so they must
    /// all agree; a grid must account for every frame.
    pub fn new(
        base_name: impl Into<String>,
        source_name: impl Into<String>,
        grid: Option<SpriteGrid>,
        frames: Vec<PackedBitmap>,
    ) -> Result<Self> {
        let base_name = base_name.into();
        if !is_identifier(&base_name) {
            return Err(BitspriteError::InvalidName(base_name));
        }

        let first = frames
            .first()
            .ok_or_else(|| BitspriteError::InvalidGrid("no frames to emit".to_string()))?;
        if let Some(odd) = frames
            .iter()
            .find(|f| (f.width(), f.height()) != (first.width(), first.height()))
        {
            return Err(BitspriteError::InvalidDimensions { width: odd.width(), height: odd.height() });
        }

        let expected = grid.map_or(1, |g| g.frame_count());
        if frames.len() != expected {
            return Err(BitspriteError::InvalidGrid(format!(
                "expected {expected} frames, got {}",
                frames.len()
            )));
        }

        Ok(Self { base_name, source_name: source_name.into(), grid, frames })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn grid(&self) -> Option<SpriteGrid> {
        self.grid
    }

    pub fn frames(&self) -> &[PackedBitmap] {
        &self.frames
    }

    pub fn frame_width(&self) -> u32 {
        self.frames[0].width()
    }

    pub fn frame_height(&self) -> u32 {
        self.frames[0].height()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.frames.iter().map(PackedBitmap::len).sum()
    }

    /// C array names in frame order.
    pub fn array_names(&self) -> Vec<String> {
        match self.grid {
            None => vec![self.base_name.clone()],
            Some(_) => (0..self.frames.len())
                .map(|i| format!("{}_frame_{i}", self.base_name))
                .collect(),
        }
    }
}

/// Renders the header text. `output_name` is the file name the header will be
/// included by; its stem becomes the include guard.
pub fn emit(artifact: &ConversionArtifact, output_name: &str) -> String {
    HeaderFile { artifact, output_name }.to_string()
}

struct HeaderFile<'a> {
    artifact: &'a ConversionArtifact,
    output_name: &'a str,
}

impl HeaderFile<'_> {
    fn write_banner(&self, f: &mut fmt::Formatter<'_>, upper: &str, names: &[String]) -> fmt::Result {
        let a = self.artifact;
        writeln!(f, "/*")?;
        writeln!(f, " * Auto-generated from {}", a.source_name)?;
        match a.grid {
            Some(grid) => {
                writeln!(f, " * Sprite sheet: {}x{} frames", grid.cols, grid.rows)?;
                writeln!(f, " * Frame size: {}x{} pixels", a.frame_width(), a.frame_height())?;
                writeln!(f, " * Total frames: {}", a.frame_count())?;
            }
            None => writeln!(f, " * Image size: {}x{} pixels", a.frame_width(), a.frame_height())?,
        }
        writeln!(f, " * Format: 1-bit packed bitmap, MSB first (0=black, 1=white)")?;
        writeln!(f, " *")?;
        writeln!(f, " * Usage:")?;
        writeln!(f, " *   #include \"{}\"", self.output_name)?;
        match a.grid {
            Some(_) => {
                writeln!(f, " *   display.drawBitmap(x, y, {upper}_FRAME_WIDTH, {upper}_FRAME_HEIGHT,")?;
                writeln!(f, " *                      {}_frames[currentFrame]);", a.base_name)?;
            }
            None => writeln!(
                f,
                " *   display.drawBitmap(x, y, {upper}_WIDTH, {upper}_HEIGHT, {});",
                names[0]
            )?,
        }
        writeln!(f, " */")
    }
}

impl fmt::Display for HeaderFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.artifact;
        let upper = a.base_name.to_uppercase();
        let names = a.array_names();
        let stem = Path::new(self.output_name)
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        let guard = format!("{}_H", sanitize_identifier(&stem).to_uppercase());

        self.write_banner(f, &upper, &names)?;
        writeln!(f)?;
        writeln!(f, "#ifndef {guard}")?;
        writeln!(f, "#define {guard}")?;
        writeln!(f)?;
        writeln!(f, "#include <stdint.h>")?;
        writeln!(f)?;

        match a.grid {
            Some(grid) => {
                writeln!(f, "// Sprite sheet information")?;
                writeln!(f, "#define {upper}_FRAME_WIDTH {}", a.frame_width())?;
                writeln!(f, "#define {upper}_FRAME_HEIGHT {}", a.frame_height())?;
                writeln!(f, "#define {upper}_FRAME_COUNT {}", a.frame_count())?;
                writeln!(f, "#define {upper}_SPRITE_COLS {}", grid.cols)?;
                writeln!(f, "#define {upper}_SPRITE_ROWS {}", grid.rows)?;
            }
            None => {
                writeln!(f, "// Image dimensions")?;
                writeln!(f, "#define {upper}_WIDTH {}", a.frame_width())?;
                writeln!(f, "#define {upper}_HEIGHT {}", a.frame_height())?;
                writeln!(f, "#define {upper}_FRAME_COUNT {}", a.frame_count())?;
            }
        }
        writeln!(f)?;

        for (i, (frame, name)) in a.frames.iter().zip(&names).enumerate() {
            match a.grid {
                Some(_) => writeln!(f, "// Frame {i} bitmap data ({} bytes)", frame.len())?,
                None => writeln!(f, "// Bitmap data ({} bytes)", frame.len())?,
            }
            writeln!(f, "const uint8_t {name}[] = {{")?;
            let lines: Vec<String> = frame
                .bytes()
                .chunks(BYTES_PER_LINE)
                .map(|chunk| {
                    let literals: Vec<String> = chunk.iter().map(|b| format!("0x{b:02x}")).collect();
                    format!("  {}", literals.join(", "))
                })
                .collect();
            if !lines.is_empty() {
                writeln!(f, "{}", lines.join(",\n"))?;
            }
            writeln!(f, "}};")?;
            writeln!(f)?;
        }

        if a.grid.is_some() {
            writeln!(f, "// Frame table")?;
            writeln!(f, "const uint8_t *const {}_frames[] = {{", a.base_name)?;
            for name in &names {
                writeln!(f, "  {name},")?;
            }
            writeln!(f, "}};")?;
            writeln!(f)?;
        }

        writeln!(f, "#endif // {guard}")
    }
}

/// Writes `contents` to `path` through a temporary file in the same
/// directory, so the destination is either fully replaced or left as it was.
pub fn write_artifact(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;

    info!("Header file generated: {} ({} bytes of text)", path.display(), contents.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::pack;
    use crate::threshold::apply_threshold;
    use image::{GrayImage, Luma};
    use std::fs;
    use tempfile::tempdir;

    fn bitmap(width: u32, height: u32, value: u8) -> PackedBitmap {
        pack(&apply_threshold(&GrayImage::from_pixel(width, height, Luma([value])), 128))
    }

    /// Pulls the hex literals of array `name` back out of emitted text.
    fn array_bytes(text: &str, name: &str) -> Vec<u8> {
        let open = format!("const uint8_t {name}[] = {{");
        let start = text.find(&open).unwrap() + open.len();
        let end = start + text[start..].find("};").unwrap();
        text[start..end]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| u8::from_str_radix(s.trim_start_matches("0x"), 16).unwrap())
            .collect()
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("splash"), "splash");
        assert_eq!(sanitize_identifier("my-sprite sheet"), "my_sprite_sheet");
        assert_eq!(sanitize_identifier("8ball"), "img_8ball");
        assert_eq!(sanitize_identifier(""), "img");
        assert_eq!(sanitize_identifier("héllo"), "h_llo");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("splash"));
        assert!(is_identifier("_frame_2"));
        assert!(!is_identifier("2frame"));
        assert!(!is_identifier("my-sprite"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_base_name_from_path() {
        assert_eq!(base_name_from_path(Path::new("out/player-run.h")), "player_run");
        assert_eq!(base_name_from_path(Path::new("3d.h")), "img_3d");
    }

    #[test]
    fn test_emit_single_image() {
        let artifact = ConversionArtifact::new("splash", "splash.png", None, vec![bitmap(10, 2, 255)]).unwrap();
        let text = emit(&artifact, "splash.h");

        assert!(text.contains("#ifndef SPLASH_H\n#define SPLASH_H\n"));
        assert!(text.contains("#include <stdint.h>"));
        assert!(text.contains("#define SPLASH_WIDTH 10\n"));
        assert!(text.contains("#define SPLASH_HEIGHT 2\n"));
        assert!(text.contains("#define SPLASH_FRAME_COUNT 1\n"));
        assert!(text.contains("// Bitmap data (4 bytes)"));
        assert!(text.contains("const uint8_t splash[] = {\n  0xff, 0xc0, 0xff, 0xc0\n};"));
        assert!(text.contains(" * Auto-generated from splash.png"));
        assert!(text.trim_end().ends_with("#endif // SPLASH_H"));
        assert!(!text.contains("_frames[]"));
    }

    #[test]
    fn test_emit_wraps_lines() {
        let artifact = ConversionArtifact::new("wide", "wide.bmp", None, vec![bitmap(104, 1, 0)]).unwrap();
        let text = emit(&artifact, "wide.h");
        let body: Vec<&str> = text.lines().skip_while(|l| !l.starts_with("const uint8_t wide")).skip(1).take(2).collect();
        assert_eq!(body[0].matches("0x").count(), 12);
        assert!(body[0].ends_with("0x00,"));
        assert_eq!(body[1], "  0x00");
        assert_eq!(array_bytes(&text, "wide"), vec![0u8; 13]);
    }

    #[test]
    fn test_emit_sprite_sheet() {
        let grid = SpriteGrid::new(2, 1).unwrap();
        let frames = vec![bitmap(8, 2, 0), bitmap(8, 2, 255)];
        let artifact = ConversionArtifact::new("hero", "hero.png", Some(grid), frames).unwrap();
        assert_eq!(artifact.frames().len(), 2);
        assert_eq!(artifact.frames()[1].bytes(), &[0xff, 0xff]);
        let text = emit(&artifact, "hero-sprites.h");

        assert!(text.contains("#ifndef HERO_SPRITES_H"));
        assert!(text.contains("#define HERO_FRAME_WIDTH 8\n"));
        assert!(text.contains("#define HERO_FRAME_HEIGHT 2\n"));
        assert!(text.contains("#define HERO_FRAME_COUNT 2\n"));
        assert!(text.contains("#define HERO_SPRITE_COLS 2\n"));
        assert!(text.contains("#define HERO_SPRITE_ROWS 1\n"));
        assert!(text.contains("// Frame 1 bitmap data (2 bytes)"));
        assert!(text.contains("const uint8_t *const hero_frames[] = {\n  hero_frame_0,\n  hero_frame_1,\n};"));
        assert_eq!(array_bytes(&text, "hero_frame_0"), vec![0x00, 0x00]);
        assert_eq!(array_bytes(&text, "hero_frame_1"), vec![0xff, 0xff]);
    }

    #[test]
    fn test_emit_is_deterministic() {
        let artifact = ConversionArtifact::new("a", "a.png", None, vec![bitmap(9, 9, 200)]).unwrap();
        assert_eq!(emit(&artifact, "a.h"), emit(&artifact, "a.h"));
    }

    #[test]
    fn test_artifact_validation() {
        assert!(matches!(
            ConversionArtifact::new("bad-name", "x.png", None, vec![bitmap(8, 8, 0)]),
            Err(BitspriteError::InvalidName(_))
        ));
        assert!(matches!(
            ConversionArtifact::new("x", "x.png", None, vec![]),
            Err(BitspriteError::InvalidGrid(_))
        ));
        let grid = SpriteGrid::new(2, 2).unwrap();
        assert!(matches!(
            ConversionArtifact::new("x", "x.png", Some(grid), vec![bitmap(8, 8, 0)]),
            Err(BitspriteError::InvalidGrid(_))
        ));
        let grid = SpriteGrid::new(2, 1).unwrap();
        assert!(matches!(
            ConversionArtifact::new("x", "x.png", Some(grid), vec![bitmap(8, 8, 0), bitmap(8, 4, 0)]),
            Err(BitspriteError::InvalidDimensions { width: 8, height: 4 })
        ));
    }

    #[test]
    fn test_write_artifact_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.h");
        fs::write(&path, "old").unwrap();
        write_artifact(&path, "new contents").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new contents");

        // Only the header itself is left behind
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("out.h")]);
    }

    #[test]
    fn test_write_artifact_missing_dir_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.h");
        assert!(matches!(write_artifact(&path, "x"), Err(BitspriteError::Io(_))));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_artifact_keeps_existing_file_on_failure() {
        let dir = tempdir().unwrap();
        // A directory in place of the header cannot be replaced by a file
        let path = dir.path().join("taken.h");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "kept").unwrap();
        assert!(write_artifact(&path, "x").is_err());
        assert_eq!(fs::read_to_string(path.join("keep")).unwrap(), "kept");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
