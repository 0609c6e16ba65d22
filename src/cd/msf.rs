use crate::cd::{FRAMES_PER_SECOND, LEAD_IN_FRAMES};
use std::cmp::Ordering;
use std::fmt::{Display, Write};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const NANOS_PER_SECOND: u128 = 1_000_000_000;
const FORMAT_ESCAPE: char = '\\';
/// Widest sub-second run computed exactly; `74 * 10^17` still fits a `u64`.
const MAX_FRACTION_DIGITS: usize = 17;

#[derive(Debug, Error, PartialEq)]
pub enum MsfError {
    #[error("Minutes out of range, total frames must fit 32 bits: {0}")]
    MinutesOutOfRange(u32),

    #[error("Seconds out of range (0-59): {0}")]
    SecondsOutOfRange(u32),

    #[error("Frames out of range (0-74): {0}")]
    FramesOutOfRange(u32),

    #[error("Duration must be a finite, non-negative number of seconds: {0}")]
    InvalidDuration(f64),

    #[error("Invalid MSF format: {0}")]
    InvalidFormat(String),
}

pub type MsfResult<T> = Result<T, MsfError>;

/// Disc time in minutes, seconds and frames (75 frames per second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MSF {
    minutes: u32,
    seconds: u8,
    frames: u8,
}

impl MSF {
    pub const ZERO: MSF = MSF {
        minutes: 0,
        seconds: 0,
        frames: 0,
    };

    pub fn new(minutes: u32, seconds: u32, frames: u32) -> MsfResult<Self> {
        if seconds >= 60 {
            return Err(MsfError::SecondsOutOfRange(seconds));
        }
        if frames >= FRAMES_PER_SECOND {
            return Err(MsfError::FramesOutOfRange(frames));
        }

        let total = (minutes as u64 * 60 + seconds as u64) * FRAMES_PER_SECOND as u64 + frames as u64;
        if total > u32::MAX as u64 {
            return Err(MsfError::MinutesOutOfRange(minutes));
        }

        Ok(Self {
            minutes,
            seconds: seconds as u8,
            frames: frames as u8,
        })
    }

    pub fn from_frames(total_frames: u32) -> Self {
        let total_seconds = total_frames / FRAMES_PER_SECOND;
        Self {
            minutes: total_seconds / 60,
            seconds: (total_seconds % 60) as u8,
            frames: (total_frames % FRAMES_PER_SECOND) as u8,
        }
    }

    /// Rounds to the nearest frame.
    pub fn from_duration(duration: Duration) -> Self {
        let scaled = duration.as_nanos() * FRAMES_PER_SECOND as u128;
        let frames = (scaled + NANOS_PER_SECOND / 2) / NANOS_PER_SECOND;
        Self::from_frames(frames.min(u32::MAX as u128) as u32)
    }

    /// Rounds to the nearest frame, rejecting negative and non-finite input.
    pub fn from_secs_f64(seconds: f64) -> MsfResult<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(MsfError::InvalidDuration(seconds));
        }

        let frames = (seconds * FRAMES_PER_SECOND as f64).round();
        Ok(Self::from_frames(frames.min(u32::MAX as f64) as u32))
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn seconds(&self) -> u32 {
        self.seconds as u32
    }

    pub fn frames(&self) -> u32 {
        self.frames as u32
    }

    pub fn total_frames(&self) -> u32 {
        (self.minutes * 60 + self.seconds as u32) * FRAMES_PER_SECOND + self.frames as u32
    }

    pub fn to_lba(&self) -> u32 {
        self.total_frames().saturating_sub(LEAD_IN_FRAMES)
    }

    pub fn to_duration(&self) -> Duration {
        let nanos = self.total_frames() as u128 * NANOS_PER_SECOND / FRAMES_PER_SECOND as u128;
        Duration::from_nanos(nanos as u64)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.total_frames() as f64 / FRAMES_PER_SECOND as f64
    }

    pub fn is_zero(&self) -> bool {
        self.total_frames() == 0
    }

    /// Formats the time with a pattern.
    ///
    /// Runs of `m`, `s` and `f` print minutes, seconds and frames zero-padded to
    /// the run length. A run of `0` right after a `.` prints the sub-second part
    /// with as many decimal digits as the run is long. `\` copies the next
    /// character as-is; every other character is copied literally.
    ///
    /// ```
    /// use cuesheet_io::cd::msf::MSF;
    ///
    /// let time = MSF::new(3, 25, 39).unwrap();
    /// assert_eq!(time.format("mm:ss:ff"), "03:25:39");
    /// assert_eq!(time.format("m\\m ss.000"), "3m 25.520");
    /// ```
    pub fn format(&self, pattern: &str) -> String {
        let chars: Vec<char> = pattern.chars().collect();
        let mut out = String::with_capacity(pattern.len() + 4);
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c == FORMAT_ESCAPE {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
                continue;
            }

            let mut run = 1;
            while chars.get(i + run) == Some(&c) {
                run += 1;
            }

            // Writing to a String cannot fail
            let _ = match c {
                'm' => write!(out, "{:0run$}", self.minutes),
                's' => write!(out, "{:0run$}", self.seconds),
                'f' => write!(out, "{:0run$}", self.frames),
                '0' if i > 0 && chars[i - 1] == '.' => {
                    let width = run.min(MAX_FRACTION_DIGITS);
                    let written = write!(out, "{:0width$}", self.fraction_digits(width));
                    out.extend(std::iter::repeat_n('0', run - width));
                    written
                }
                _ => {
                    out.extend(std::iter::repeat_n(c, run));
                    Ok(())
                }
            };

            i += run;
        }

        out
    }

    /// Sub-second part truncated to `width` decimal digits, `width <= MAX_FRACTION_DIGITS`.
    fn fraction_digits(&self, width: usize) -> u64 {
        let scale = 10u64.pow(width as u32);
        self.frames as u64 * scale / FRAMES_PER_SECOND as u64
    }
}

impl Ord for MSF {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_frames().cmp(&other.total_frames())
    }
}

impl PartialOrd for MSF {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for MSF {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.minutes, self.seconds, self.frames
        )
    }
}

impl FromStr for MSF {
    type Err = MsfError;

    fn from_str(msf_str: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = msf_str.split(':').collect();
        if parts.len() != 3 {
            return Err(MsfError::InvalidFormat(msf_str.to_string()));
        }

        let field = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| MsfError::InvalidFormat(msf_str.to_string()))
        };

        MSF::new(field(parts[0])?, field(parts[1])?, field(parts[2])?)
    }
}

impl From<Duration> for MSF {
    fn from(duration: Duration) -> Self {
        MSF::from_duration(duration)
    }
}

impl From<MSF> for Duration {
    fn from(msf: MSF) -> Self {
        msf.to_duration()
    }
}
