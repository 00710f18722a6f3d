//! Sub-image extraction from a capture.
//!
//! Regions are re-validated against the capture's own dimensions rather than
//! the window's last-known size: a partially off-screen window legitimately
//! produces a capture smaller than its recorded bounds.

use image::{ImageBuffer, Rgba};

use crate::capture::CaptureResult;
use crate::coords::{MIN_REGION_HEIGHT, MIN_REGION_WIDTH};
use crate::error::{Error, Result};
use crate::geometry::WindowRegion;

/// An owned crop of a capture, together with the (possibly clamped) region
/// it actually covers.
#[derive(Clone, Debug)]
pub struct SubImage {
    pub image: ImageBuffer<Rgba<u8>, Vec<u8>>,
    /// The region extracted, after clamping against the capture.
    pub region: WindowRegion,
}

impl SubImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Crops `region` out of `capture`.
///
/// The region is clamped so it never exceeds the capture bounds; if the
/// clamped area drops below the minimum usable size the extraction fails
/// with [`Error::RegionTooSmall`] instead of returning an unusably tiny
/// image.
pub fn extract(capture: &CaptureResult, region: &WindowRegion) -> Result<SubImage> {
    if !capture.is_well_formed() {
        return Err(Error::CaptureBackendFailed(
            "capture buffer does not match its dimensions".into(),
        ));
    }

    let cap_w = capture.width as i32;
    let cap_h = capture.height as i32;

    let left = region.x().clamp(0, cap_w);
    let top = region.y().clamp(0, cap_h);
    let right = (region.x() + region.width() as i32).clamp(0, cap_w);
    let bottom = (region.y() + region.height() as i32).clamp(0, cap_h);

    let width = (right - left).max(0) as u32;
    let height = (bottom - top).max(0) as u32;

    if width < MIN_REGION_WIDTH || height < MIN_REGION_HEIGHT {
        return Err(Error::RegionTooSmall { width, height });
    }

    let full: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(capture.width, capture.height, capture.pixels.clone())
            .ok_or_else(|| {
                Error::CaptureBackendFailed("capture buffer rejected by image layer".into())
            })?;

    let image = image::imageops::crop_imm(&full, left as u32, top as u32, width, height).to_image();
    let region = WindowRegion::new(left, top, width, height)?;

    Ok(SubImage { image, region })
}
