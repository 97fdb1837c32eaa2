/// Default file name of the FER-style emotion classifier.
pub const EMOTION_MODEL_NAME: &str = "emotion_fer_48x48.onnx";

/// File name of OpenCV's stock frontal-face Haar cascade.
pub const CASCADE_NAME: &str = "haarcascade_frontalface_default.xml";

pub const CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_frontalface_default.xml";

/// Where OpenCV packages usually install their cascades.
pub const SYSTEM_CASCADE_DIRS: &[&str] = &[
    "/usr/share/opencv4/haarcascades",
    "/usr/local/share/opencv4/haarcascades",
    "/opt/homebrew/share/opencv4/haarcascades",
    "/usr/share/opencv/haarcascades",
];

/// Spatial side of the classifier's square grayscale input.
pub const FACE_INPUT_SIZE: usize = 48;

pub const DEFAULT_SCALE_FACTOR: f64 = 1.1;
pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;
pub const DEFAULT_MIN_SIZE: u32 = 30;

/// Tolerance when checking that a distribution sums to one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
