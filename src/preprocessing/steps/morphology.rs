use crate::error::{EnhanceError, Result};
use crate::options::Morphology;
use crate::types::BinaryImage;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, erode, open};

/// Clean up or thicken ink in a binary image.
///
/// imageproc treats bright pixels as the foreground while ink here is dark,
/// so every ink operation maps to its dual on the page: growing ink erodes
/// the page, opening ink closes the page.
pub fn apply(image: &BinaryImage, operation: Morphology) -> Result<BinaryImage> {
    let page = image.as_gray();
    let result = match operation {
        Morphology::None => page.clone(),
        Morphology::Bold => erode(page, Norm::LInf, 1),
        Morphology::Open { radius } => open_ink(page, radius),
        Morphology::Close { radius } => close_ink(page, radius),
        Morphology::OpenClose { radius } => close_ink(&open_ink(page, radius), radius),
        Morphology::CloseOpen { radius } => open_ink(&close_ink(page, radius), radius),
    };

    BinaryImage::from_levels(result).ok_or_else(|| EnhanceError::ProcessingError {
        stage: "morphology".to_string(),
        params: format!("{:?}", operation),
        message: "morphology produced a third intensity level".to_string(),
    })
}

fn open_ink(page: &GrayImage, radius: u8) -> GrayImage {
    close(page, Norm::LInf, radius)
}

fn close_ink(page: &GrayImage, radius: u8) -> GrayImage {
    open(page, Norm::LInf, radius)
}
