use std::io::{Read as _, Write as _};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use crate::assets::color::Color;
use crate::assets::media::is_ffmpeg_on_path;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{GeoError, GeoResult};
use crate::foundation::json::ensure_parent_dir;
use crate::foundation::math::mul_div255_u16;
use crate::render::frame::FrameRGBA;

/// Where and how [`FfmpegSink`] writes its MP4.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    pub out_path: PathBuf,
    /// Replace an existing file at `out_path`.
    pub overwrite: bool,
    /// Opaque color that translucent pixels are flattened onto.
    pub background: Color,
}

impl FfmpegSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            background: Color::BLACK,
        }
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }
}

/// Streams raw RGBA frames into a spawned `ffmpeg`, producing H.264 + AAC in an MP4.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
        }
    }

    fn command(&self, cfg: &SinkConfig) -> GeoResult<Command> {
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
        ]);

        match cfg.audio.as_ref() {
            Some(audio) => {
                if audio.sample_rate == 0 || audio.channels == 0 {
                    return Err(GeoError::validation(
                        "audio sample_rate and channels must be non-zero",
                    ));
                }
                cmd.args([
                    "-f",
                    "f32le",
                    "-ar",
                    &audio.sample_rate.to_string(),
                    "-ac",
                    &audio.channels.to_string(),
                    "-i",
                ])
                .arg(&audio.path)
                .args([
                    "-c:v",
                    "libx264",
                    "-pix_fmt",
                    "yuv420p",
                    "-c:a",
                    "aac",
                    "-shortest",
                    "-movflags",
                    "+faststart",
                ]);
            }
            None => {
                cmd.args([
                    "-an",
                    "-c:v",
                    "libx264",
                    "-pix_fmt",
                    "yuv420p",
                    "-movflags",
                    "+faststart",
                ]);
            }
        }
        cmd.arg(&self.opts.out_path);
        Ok(cmd)
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> GeoResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(GeoError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(GeoError::validation("video width/height must be non-zero"));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(GeoError::validation(
                "video width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(GeoError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(GeoError::render(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut child = self
            .command(&cfg)?
            .spawn()
            .map_err(|e| GeoError::render(format!("failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GeoError::render("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| GeoError::render("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        tracing::info!(
            out = %self.opts.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            audio = cfg.audio.is_some(),
            "ffmpeg encoder started"
        );
        self.scratch = vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> GeoResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| GeoError::render("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(GeoError::render(format!(
                "frame {} pushed after frame {}",
                idx.0, last.0
            )));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(GeoError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.premultiplied {
            flatten_premul_over_bg(&mut self.scratch, &frame.data, self.opts.background)?;
        } else {
            flatten_straight_over_bg(&mut self.scratch, &frame.data, self.opts.background)?;
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| GeoError::render("ffmpeg sink is already finalized"))?;
        stdin
            .write_all(&self.scratch)
            .map_err(|e| GeoError::render(format!("failed to write frame to ffmpeg: {e}")))
    }

    fn end(&mut self) -> GeoResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| GeoError::render("ffmpeg sink not started"))?;
        let status = child
            .wait()
            .map_err(|e| GeoError::render(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| GeoError::render("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| GeoError::render(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        self.cfg = None;

        if !status.success() {
            return Err(GeoError::render(format!(
                "ffmpeg exited with status {status}: {}",
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        tracing::info!(out = %self.opts.out_path.display(), "ffmpeg encoder finished");
        Ok(())
    }
}

fn check_buffers(dst: &[u8], src: &[u8]) -> GeoResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(GeoError::validation(
            "frame data must be width*height*4 bytes",
        ));
    }
    Ok(())
}

/// Composite premultiplied RGBA8 over an opaque background.
fn flatten_premul_over_bg(dst: &mut [u8], src: &[u8], bg: Color) -> GeoResult<()> {
    check_buffers(dst, src)?;
    let bg = [u16::from(bg.r), u16::from(bg.g), u16::from(bg.b)];
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let inv = 255 - u16::from(s[3]);
        for ((dc, sc), bc) in d.iter_mut().zip(s).zip(bg) {
            *dc = (u16::from(*sc) + mul_div255_u16(bc, inv)).min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

/// Composite straight-alpha RGBA8 over an opaque background.
fn flatten_straight_over_bg(dst: &mut [u8], src: &[u8], bg: Color) -> GeoResult<()> {
    check_buffers(dst, src)?;
    let bg = [u16::from(bg.r), u16::from(bg.g), u16::from(bg.b)];
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        for ((dc, sc), bc) in d.iter_mut().zip(s).zip(bg) {
            *dc = (mul_div255_u16(u16::from(*sc), a) + mul_div255_u16(bc, 255 - a)).min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}
