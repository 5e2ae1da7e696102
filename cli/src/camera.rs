use std::path::{Path, PathBuf};

use shapecheck_core::{CapabilityError, Camera, CaptureRequest, PhotoData};

/// Camera whose every frame is a fixed image: a file from disk or a generated test card.
#[derive(Debug)]
pub struct StillCamera {
    path: Option<PathBuf>,
    deny: bool,
}

/// Stream handed out by [`StillCamera`], holds the frame for its lifetime.
#[derive(Debug)]
pub struct StillStream {
    frame: PhotoData,
}

impl StillCamera {
    pub fn new(path: Option<PathBuf>, deny: bool) -> Self {
        Self { path, deny }
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("pgm") => "image/x-portable-graymap",
        _ => "application/octet-stream",
    }
}

/// Binary PGM gradient of the requested size.
fn test_card(request: CaptureRequest) -> PhotoData {
    let (width, height) = (usize::from(request.width), usize::from(request.height));
    let mut bytes = format!("P5\n{} {}\n255\n", width, height).into_bytes();
    bytes.extend((0..height).flat_map(|y| (0..width).map(move |x| ((x + y) % 256) as u8)));
    PhotoData::new("image/x-portable-graymap", bytes)
}

impl Camera for StillCamera {
    type Stream = StillStream;

    fn acquire_stream(&mut self, request: CaptureRequest) -> Result<StillStream, CapabilityError> {
        if self.deny {
            return Err(CapabilityError::Denied);
        }
        let frame = match &self.path {
            Some(path) => match std::fs::read(path) {
                Ok(bytes) => PhotoData::new(mime_for(path), bytes),
                Err(err) => {
                    log::error!("Could not read {}: {}", path.display(), err);
                    return Err(CapabilityError::Unavailable);
                }
            },
            None => test_card(request),
        };
        log::debug!("camera stream opened, {}x{}", request.width, request.height);
        Ok(StillStream { frame })
    }

    fn capture_frame(&mut self, stream: &StillStream) -> PhotoData {
        stream.frame.clone()
    }

    fn release_stream(&mut self, _stream: StillStream) {
        log::debug!("camera stream released");
    }
}
