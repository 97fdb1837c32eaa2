use crate::capture::domain::frame_source::{CaptureError, CaptureHandle, FrameSource, VideoSource};
use crate::shared::frame::{Frame, PixelLayout};

/// Opens capture devices and stored media via ffmpeg-next.
///
/// Devices go through libavdevice (`v4l2` on Linux, `avfoundation` on
/// macOS, `vfwcap` on Windows); files go through libavformat. Decoded
/// frames are converted to RGB24.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegFrameSource;

impl FfmpegFrameSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let open_err = |reason: String| CaptureError::Open {
            source_name: source.to_string(),
            reason,
        };

        ffmpeg_next::init().map_err(|e| open_err(e.to_string()))?;

        let ictx = match source {
            VideoSource::File(path) => {
                ffmpeg_next::format::input(path).map_err(|e| open_err(e.to_string()))?
            }
            VideoSource::Device(index) => open_device(*index).map_err(open_err)?,
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| open_err("no video stream found".into()))?;
        let video_stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| open_err(e.to_string()))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| open_err(e.to_string()))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| open_err(e.to_string()))?;

        log::debug!("Opened {source} ({width}x{height})");

        Ok(Box::new(FfmpegCapture {
            state: Some(DecodeState {
                ictx,
                decoder,
                scaler,
                width,
                height,
                video_stream_index,
            }),
            frame_index: 0,
        }))
    }
}

fn open_device(index: u32) -> Result<ffmpeg_next::format::context::Input, String> {
    let (format_name, url) = device_url(index)?;
    ffmpeg_next::device::register_all();

    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == format_name)
        .ok_or_else(|| format!("input device format '{format_name}' not available"))?;

    let ctx = ffmpeg_next::format::open_with(
        &url,
        &ffmpeg_next::format::Format::Input(format),
        ffmpeg_next::Dictionary::new(),
    )
    .map_err(|e| e.to_string())?;

    match ctx {
        ffmpeg_next::format::context::Context::Input(input) => Ok(input),
        _ => Err(format!("{url} did not open as an input")),
    }
}

/// Platform device demuxer and URL for a camera index.
fn device_url(index: u32) -> Result<(&'static str, String), String> {
    #[cfg(target_os = "linux")]
    {
        Ok(("v4l2", format!("/dev/video{index}")))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(("avfoundation", format!("{index}:none")))
    }
    #[cfg(target_os = "windows")]
    {
        Ok(("vfwcap", index.to_string()))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Err(format!("no capture device support for index {index} on this platform"))
    }
}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
}

/// Live decode context; `state` is `None` once released.
struct FfmpegCapture {
    state: Option<DecodeState>,
    frame_index: usize,
}

// Safety: a capture handle is owned by one session and only used from the
// thread that currently owns it. The raw pointers inside ffmpeg types are
// never shared.
unsafe impl Send for FfmpegCapture {}

impl CaptureHandle for FfmpegCapture {
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let Some(state) = self.state.as_mut() else {
            return Err(CaptureError::Read("capture released".into()));
        };

        let frame = decode_next(state, self.frame_index)?;
        if frame.is_some() {
            self.frame_index += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) {
        // Dropping the input context closes the device or file.
        self.state = None;
    }
}

fn decode_next(state: &mut DecodeState, index: usize) -> Result<Option<Frame>, CaptureError> {
    if let Some(frame) = try_receive(state, index)? {
        return Ok(Some(frame));
    }

    loop {
        let Some((stream, packet)) = state.ictx.packets().next() else {
            // Flush decoders that buffer the last frame
            let _ = state.decoder.send_eof();
            return try_receive(state, index);
        };
        if stream.index() != state.video_stream_index {
            continue;
        }
        if state.decoder.send_packet(&packet).is_err() {
            continue;
        }
        if let Some(frame) = try_receive(state, index)? {
            return Ok(Some(frame));
        }
    }
}

fn try_receive(state: &mut DecodeState, index: usize) -> Result<Option<Frame>, CaptureError> {
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    if state.decoder.receive_frame(&mut decoded).is_err() {
        return Ok(None);
    }
    let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
    state
        .scaler
        .run(&decoded, &mut rgb_frame)
        .map_err(|e| CaptureError::Read(e.to_string()))?;
    let pixels = extract_rgb_pixels(&rgb_frame, state.width, state.height);
    Ok(Some(Frame::new(
        pixels,
        state.width,
        state.height,
        PixelLayout::Rgb,
        index,
    )))
}

/// Copies RGB24 rows out of a possibly padded ffmpeg frame.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
