//! Image values passed between pipeline stages
//!
//! Every stage takes its input by reference or by value and returns a new
//! image, so no two stages ever share a mutable buffer.

use crate::error::{EnhanceError, Result};
use crate::options::PipelineOptions;
use crate::preprocessing::StageRecord;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use serde::Serialize;
use std::io::Cursor;

/// Largest rotation accepted as a plausible document skew, in degrees
pub const MAX_SKEW_DEGREES: f32 = 45.0;

/// Pixel value used for ink in a [`BinaryImage`]
pub const INK: u8 = 0;
/// Pixel value used for background in a [`BinaryImage`]
pub const BACKGROUND: u8 = 255;

/// Decoded image exactly as it came out of storage
#[derive(Debug, Clone)]
pub struct RawImage {
    image: DynamicImage,
    format: Option<ImageFormat>,
}

impl RawImage {
    pub fn new(image: DynamicImage, format: Option<ImageFormat>) -> Self {
        Self { image, format }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    /// Bits per channel (8 for RGB8, 16 for L16, 32 for Rgb32F)
    pub fn bit_depth(&self) -> u16 {
        let color = self.image.color();
        color.bits_per_pixel() / u16::from(color.channel_count())
    }

    /// Container format detected while loading, if any
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn describe(&self) -> SourceInfo {
        SourceInfo {
            width: self.width(),
            height: self.height(),
            channels: self.channels(),
            bit_depth: self.bit_depth(),
            format: self.format.map(|f| format!("{:?}", f).to_lowercase()),
        }
    }
}

/// Single-channel 8-bit image
#[derive(Debug, Clone, PartialEq)]
pub struct GrayscaleImage(GrayImage);

impl GrayscaleImage {
    pub fn new(image: GrayImage) -> Self {
        Self(image)
    }

    pub fn from_pixel(width: u32, height: u32, value: u8) -> Self {
        Self(GrayImage::from_pixel(width, height, Luma([value])))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.0.get_pixel(x, y).0[0]
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_gray(self) -> GrayImage {
        self.0
    }

    /// True when every pixel is either [`INK`] or [`BACKGROUND`]
    pub fn is_two_level(&self) -> bool {
        self.0.pixels().all(|p| p.0[0] == INK || p.0[0] == BACKGROUND)
    }
}

/// Two-level image: every pixel is [`INK`] (0) or [`BACKGROUND`] (255).
///
/// Binarization always leaves ink as the minority class: a thresholding rule
/// that marks more than half of the pixels as ink is inverted before the
/// image is wrapped, so light text on a dark page still comes out as
/// black-on-white. Later morphology keeps the orientation even if bolding
/// pushes ink past half of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryImage(GrayImage);

impl BinaryImage {
    /// Wrap a thresholded buffer, enforcing the minority-ink convention.
    ///
    /// Returns `None` if any pixel is not 0 or 255.
    pub fn from_thresholded(image: GrayImage) -> Option<Self> {
        let mut ink = 0usize;
        for p in image.pixels() {
            match p.0[0] {
                INK => ink += 1,
                BACKGROUND => {}
                _ => return None,
            }
        }
        let total = image.width() as usize * image.height() as usize;
        let mut image = image;
        if ink * 2 > total {
            image
                .pixels_mut()
                .for_each(|p| p.0[0] = BACKGROUND - p.0[0]);
        }
        Some(Self(image))
    }

    /// Wrap a two-level buffer as-is, without reorienting it. Used for
    /// operations on an existing binary image, such as morphology, where
    /// ink may legitimately grow past half of the page.
    pub(crate) fn from_levels(image: GrayImage) -> Option<Self> {
        if image.pixels().all(|p| p.0[0] == INK || p.0[0] == BACKGROUND) {
            Some(Self(image))
        } else {
            None
        }
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y).0[0] == INK
    }

    pub fn ink_count(&self) -> usize {
        self.0.pixels().filter(|p| p.0[0] == INK).count()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_grayscale(self) -> GrayscaleImage {
        GrayscaleImage(self.0)
    }
}

/// Estimated document rotation in degrees; positive means the content is
/// rotated clockwise.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct SkewAngle(f32);

impl SkewAngle {
    pub const ZERO: SkewAngle = SkewAngle(0.0);

    /// `None` for non-finite angles or angles beyond ±[`MAX_SKEW_DEGREES`]
    pub fn from_degrees(degrees: f32) -> Option<Self> {
        if degrees.is_finite() && degrees.abs() <= MAX_SKEW_DEGREES {
            Some(Self(degrees))
        } else {
            None
        }
    }

    pub fn degrees(self) -> f32 {
        self.0
    }

    pub fn radians(self) -> f32 {
        self.0.to_radians()
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

/// Description of the loaded source image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bit_depth: u16,
    pub format: Option<String>,
}

/// What ran during a pipeline run and with which parameters
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub source: SourceInfo,
    /// Options the pipeline was built from; `None` for hand-assembled
    /// pipelines
    pub options: Option<PipelineOptions>,
    pub stages: Vec<StageRecord>,
    /// Rotation removed by skew correction, when that stage ran
    pub skew_angle: Option<SkewAngle>,
    pub total_time_ms: u64,
}

impl Provenance {
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// Pipeline output: the processed pixels plus how they were produced
#[derive(Debug, Clone)]
pub struct EnhancedImage {
    image: GrayscaleImage,
    binary: bool,
    source_format: Option<ImageFormat>,
    provenance: Provenance,
}

impl EnhancedImage {
    pub(crate) fn new(
        image: GrayscaleImage,
        binary: bool,
        source_format: Option<ImageFormat>,
        provenance: Provenance,
    ) -> Self {
        Self {
            image,
            binary,
            source_format,
            provenance,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &GrayscaleImage {
        &self.image
    }

    /// Pixel buffer handed to OCR engines
    pub fn pixels(&self) -> &GrayImage {
        self.image.as_gray()
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// The output as a [`BinaryImage`] when binarization ran
    pub fn to_binary(&self) -> Option<BinaryImage> {
        if self.binary {
            Some(BinaryImage(self.image.as_gray().clone()))
        } else {
            None
        }
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn into_parts(self) -> (GrayscaleImage, Provenance) {
        (self.image, self.provenance)
    }

    /// Encode the pixels in the given container format
    pub fn encode(&self, format: ImageFormat) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(self.image.as_gray().clone())
            .write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| EnhanceError::EncodeError(e.to_string()))?;
        Ok(buf)
    }

    /// Encode in the source's format when it can hold 8-bit grayscale, PNG
    /// otherwise
    pub fn encode_as_source(&self) -> Result<Vec<u8>> {
        let format = match self.source_format {
            Some(
                f @ (ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::Pnm),
            ) => f,
            _ => ImageFormat::Png,
        };
        self.encode(format)
    }
}
