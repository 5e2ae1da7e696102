use core::fmt;
use serde::{Deserialize, Serialize};

use crate::CapabilityError;

/// Preview resolution asked from the camera.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub width: u16,
    pub height: u16,
}

impl CaptureRequest {
    pub const PREVIEW: CaptureRequest = CaptureRequest {
        width: 320,
        height: 180,
    };
}

/// Encoded still image of the operator, opaque to the captcha.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoData {
    mime: String,
    bytes: Vec<u8>,
}

impl PhotoData {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for PhotoData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoData")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Device camera as seen by the captcha session.
///
/// A stream is exclusively owned by the session between `acquire_stream` and
/// `release_stream`; the session releases it right after the selfie is taken or on
/// teardown.
pub trait Camera {
    type Stream;

    fn acquire_stream(
        &mut self,
        request: CaptureRequest,
    ) -> core::result::Result<Self::Stream, CapabilityError>;

    fn capture_frame(&mut self, stream: &Self::Stream) -> PhotoData;

    fn release_stream(&mut self, stream: Self::Stream);
}
