use document_enhancer::accuracy::word_accuracy;
use document_enhancer::engine::{OcrEngine, OcrResult};
use document_enhancer::loader::{self, LoadLimits};
use document_enhancer::options::{
    AdaptiveWeighting, Binarization, ContrastOptions, Morphology, PipelineOptions, SkewOptions,
};
use document_enhancer::preprocessing::steps::deskew::estimate_skew;
use document_enhancer::preprocessing::steps::grayscale::to_grayscale;
use document_enhancer::preprocessing::{Pipeline, Stage, StageContext};
use document_enhancer::search::{BestImageSearch, Candidate};
use document_enhancer::{enhance, EnhanceError, GrayscaleImage, RawImage};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use serde_json::{Map, Value};
use std::io::Cursor;

fn encode_png(image: DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn load_png(image: DynamicImage) -> RawImage {
    loader::load(&encode_png(image), LoadLimits::default()).unwrap()
}

/// Off-white page with dashed dark "text lines", slightly tinted
fn document(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let in_line = y >= 30 && y < height - 20 && (y - 30) % 25 < 3;
        let in_word = x >= 30 && x < width - 30 && x % 40 < 32;
        if in_line && in_word {
            Rgb([25, 20, 30])
        } else {
            Rgb([235, 230, 220])
        }
    })
}

fn rotated_document(degrees: f32) -> RawImage {
    let page = DynamicImage::ImageRgb8(document(300, 200)).to_luma8();
    let rotated = rotate_about_center(
        &page,
        degrees.to_radians(),
        Interpolation::Bilinear,
        Luma([232]),
    );
    load_png(DynamicImage::ImageLuma8(rotated))
}

fn is_two_level(image: &GrayscaleImage) -> bool {
    image.as_gray().pixels().all(|p| p.0[0] == 0 || p.0[0] == 255)
}

#[test]
fn test_dimensions_preserved_without_skew_correction() {
    let raw = load_png(DynamicImage::ImageRgb8(document(173, 121)));
    let options = PipelineOptions {
        skew_correction: SkewOptions {
            enabled: false,
            ..Default::default()
        },
        sharpen: true,
        ..Default::default()
    }
    .with_morphology(Morphology::CloseOpen { radius: 1 });

    let enhanced = enhance(&raw, &options).unwrap();
    assert_eq!((enhanced.width(), enhanced.height()), (173, 121));
    assert!(enhanced.is_binary());
}

#[test]
fn test_disabled_stages_give_plain_grayscale() {
    let raw = load_png(DynamicImage::ImageRgb8(document(120, 90)));
    let enhanced = enhance(&raw, &PipelineOptions::grayscale_only()).unwrap();

    assert_eq!(enhanced.image(), &to_grayscale(&raw));
    assert_eq!(enhanced.provenance().stage_names(), vec!["grayscale"]);
}

#[test]
fn test_binarization_is_idempotent_through_pipeline() {
    let raw = load_png(DynamicImage::ImageRgb8(document(160, 120)));
    let methods = [
        Binarization::Global,
        Binarization::Fixed { threshold: 120 },
        Binarization::adaptive(15),
        Binarization::Adaptive {
            block_size: 21,
            offset: 5,
            weighting: AdaptiveWeighting::Gaussian,
        },
        Binarization::Adaptive {
            block_size: 25,
            offset: 0,
            weighting: AdaptiveWeighting::Sauvola,
        },
    ];

    for method in methods {
        let options = PipelineOptions::grayscale_only().with_binarization(method);
        let once = enhance(&raw, &options).unwrap();
        let again = RawImage::new(DynamicImage::ImageLuma8(once.pixels().clone()), None);
        let twice = enhance(&again, &options).unwrap();
        assert_eq!(once.image(), twice.image(), "{:?} is not idempotent", method);
    }
}

#[test]
fn test_skew_is_recovered_and_removed() {
    let raw = rotated_document(4.0);
    let options = PipelineOptions {
        skew_correction: SkewOptions {
            enabled: true,
            max_angle: 15.0,
        },
        ..PipelineOptions::grayscale_only()
    };

    let enhanced = enhance(&raw, &options).unwrap();
    let applied = enhanced.provenance().skew_angle.unwrap();
    assert!(
        (applied.degrees() - 4.0).abs() <= 1.0,
        "Expected ~4 degrees, got {}",
        applied.degrees()
    );

    let residual = estimate_skew(enhanced.image(), 15.0);
    assert!(
        residual.degrees().abs() <= 1.0,
        "Residual skew {} after correction",
        residual.degrees()
    );
}

#[test]
fn test_flat_image_survives_normalization() {
    let raw = RawImage::new(
        DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 30, Luma([77]))),
        None,
    );
    let options = PipelineOptions {
        contrast_normalization: ContrastOptions::default(),
        ..PipelineOptions::grayscale_only()
    };

    let enhanced = enhance(&raw, &options).unwrap();
    assert!(enhanced.pixels().pixels().all(|p| p.0[0] == 77));
}

#[test]
fn test_adaptive_reads_unevenly_lit_page() {
    // Background brightens from 60 to 250; strokes are 50 levels darker
    let page = GrayImage::from_fn(240, 60, |x, y| {
        let bg = 60.0 + x as f32 * 190.0 / 239.0;
        let stroke = (20..23).contains(&y) && x % 24 < 18;
        let value = if stroke { bg - 50.0 } else { bg };
        Luma([value.round() as u8])
    });
    let raw = RawImage::new(DynamicImage::ImageLuma8(page), None);

    let options = PipelineOptions::grayscale_only().with_binarization(Binarization::adaptive(15));
    let binary = enhance(&raw, &options).unwrap().to_binary().unwrap();

    for x in [5, 30, 200, 230] {
        assert!(binary.is_ink(x, 21), "stroke at x={} missed", x);
        assert!(!binary.is_ink(x, 40), "background at x={} marked as ink", x);
    }
}

#[test]
fn test_even_block_size_is_rejected() {
    let raw = load_png(DynamicImage::ImageRgb8(document(60, 60)));
    let options = PipelineOptions::default().with_binarization(Binarization::adaptive(10));
    assert!(matches!(
        enhance(&raw, &options),
        Err(EnhanceError::ConfigurationError(_))
    ));
}

#[test]
fn test_loader_rejects_bad_input() {
    assert!(matches!(
        loader::load(&[], LoadLimits::default()),
        Err(EnhanceError::DecodeError(_))
    ));
    assert!(matches!(
        loader::load(b"definitely not an image", LoadLimits::default()),
        Err(EnhanceError::DecodeError(_))
    ));

    let bytes = encode_png(DynamicImage::ImageRgb8(document(120, 80)));
    assert!(matches!(
        loader::load(&bytes, LoadLimits { max_dimension: 100 }),
        Err(EnhanceError::InvalidDimensionsError {
            width: 120,
            height: 80,
            max: 100
        })
    ));
}

struct Explode;

impl Stage for Explode {
    fn name(&self) -> &'static str {
        "explode"
    }

    fn params(&self) -> Map<String, Value> {
        Map::new()
    }

    fn apply(
        &self,
        _image: GrayscaleImage,
        _ctx: &mut StageContext,
    ) -> document_enhancer::Result<GrayscaleImage> {
        Err(EnhanceError::ProcessingError {
            stage: "explode".to_string(),
            params: String::new(),
            message: "always fails".to_string(),
        })
    }
}

#[test]
fn test_failing_stage_returns_no_image() {
    let raw = load_png(DynamicImage::ImageRgb8(document(60, 60)));
    let result = Pipeline::from_stages(vec![Box::new(Explode)]).run(&raw);

    match result {
        Err(err @ EnhanceError::ProcessingError { .. }) => {
            assert_eq!(err.stage(), Some("explode"))
        }
        other => panic!("expected a processing error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_morphology_keeps_output_binary() {
    let raw = load_png(DynamicImage::ImageRgb8(document(160, 120)));
    for morphology in [
        Morphology::Bold,
        Morphology::Open { radius: 1 },
        Morphology::Close { radius: 2 },
        Morphology::OpenClose { radius: 1 },
    ] {
        let options = PipelineOptions::default().with_morphology(morphology);
        let enhanced = enhance(&raw, &options).unwrap();
        assert!(enhanced.is_binary());
        assert!(is_two_level(enhanced.image()), "{:?}", morphology);
    }
}

#[test]
fn test_encoded_output_loads_back() {
    let raw = load_png(DynamicImage::ImageRgb8(document(90, 70)));
    let enhanced = enhance(&raw, &PipelineOptions::default()).unwrap();

    let bytes = enhanced.encode_as_source().unwrap();
    let reloaded = loader::load(&bytes, LoadLimits::default()).unwrap();
    assert_eq!(reloaded.format(), Some(ImageFormat::Png));
    assert_eq!(reloaded.width(), enhanced.width());
    assert_eq!(reloaded.channels(), 1);
}

#[test]
fn test_identical_text_is_fully_accurate() {
    assert_eq!(word_accuracy("Invoice 42 total due", "Invoice 42 total due"), 100.0);
}

/// Reads the page perfectly only once it is binary and its strokes are
/// thick enough
struct PickyReader;

impl OcrEngine for PickyReader {
    fn name(&self) -> &'static str {
        "picky"
    }

    fn description(&self) -> &'static str {
        "prefers bold binary pages"
    }

    fn recognize(&self, image: &GrayImage) -> document_enhancer::Result<OcrResult> {
        let binary = image.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255);
        let ink = image.pixels().filter(|p| p.0[0] == 0).count();
        let text = match (binary, ink > 1800) {
            (true, true) => "total due 42",
            (true, false) => "total due",
            _ => "tota",
        };
        Ok(OcrResult::from_text(text, 0.5))
    }
}

#[test]
fn test_search_prefers_what_the_engine_reads_best() {
    let raw = load_png(DynamicImage::ImageRgb8(document(200, 150)));
    let base = PipelineOptions::grayscale_only();
    let candidates = vec![
        Candidate::new("plain", base),
        Candidate::new("otsu", base.with_binarization(Binarization::Global)),
        Candidate::new(
            "otsu+bold",
            base.with_binarization(Binarization::Global)
                .with_morphology(Morphology::Bold),
        ),
    ];

    let engine = PickyReader;
    let outcome = BestImageSearch::new(&engine)
        .with_candidates(candidates)
        .with_reference("total due 42")
        .with_workers(2)
        .run(&raw)
        .unwrap()
        .unwrap();

    assert_eq!(outcome.label, "otsu+bold");
    assert_eq!(outcome.score, 100.0);
}
