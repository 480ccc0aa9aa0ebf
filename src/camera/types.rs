use serde::{Deserialize, Serialize};
use std::fmt;

/// A preview size advertised by the camera device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height. Zero-height sizes report 0.0.
    pub fn aspect_ratio(self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        f64::from(self.width) / f64::from(self.height)
    }

    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The preview size the caller would like the device to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub width: u32,
    pub height: u32,
}

impl TargetSpec {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(self) -> f64 {
        self.resolution().aspect_ratio()
    }

    pub fn resolution(self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// The default target when either dimension is zero, `self` otherwise.
    pub fn or_default(self) -> Self {
        if self.width == 0 || self.height == 0 {
            Self::default()
        } else {
            self
        }
    }
}

impl Default for TargetSpec {
    /// Square 640x640, the size the host scripts lay their preview out for.
    fn default() -> Self {
        Self::new(640, 640)
    }
}

/// Raw preview pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// YUV 4:2:0 semi-planar: full Y plane followed by interleaved V/U pairs.
    Nv21,
}

impl PixelFormat {
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Nv21 => 12,
        }
    }

    /// Exact byte length of one frame at the given size.
    ///
    /// Chroma planes round odd dimensions up, so this equals
    /// `width * height * bits_per_pixel / 8` whenever both are even.
    pub fn frame_len(self, width: u32, height: u32) -> usize {
        match self {
            Self::Nv21 => {
                let w = width as usize;
                let h = height as usize;
                w * h + 2 * w.div_ceil(2) * h.div_ceil(2)
            }
        }
    }
}

/// Focus modes the bridge knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    Auto,
    ContinuousPicture,
}

/// Scene modes the bridge knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneMode {
    Auto,
    Barcode,
}

/// Parameters applied to the device in a single configuration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewParameters {
    pub size: Resolution,
    pub pixel_format: PixelFormat,
    pub focus_mode: Option<FocusMode>,
    pub scene_mode: Option<SceneMode>,
}

/// The format actually configured on the device for the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiatedFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl NegotiatedFormat {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn frame_len(&self) -> usize {
        self.pixel_format.frame_len(self.width, self.height)
    }
}

/// Handle to a preview surface attached to the host view hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Lifecycle notifications for a preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Created(SurfaceId),
    Changed { width: u32, height: u32 },
    Destroyed,
}
