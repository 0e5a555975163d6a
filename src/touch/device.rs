use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::TouchConfig;

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_ABS: u16 = 0x03;

pub const SYN_REPORT: u16 = 0;

pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;
pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;

pub const BTN_TOUCH: u16 = 0x14a;

const SYSFS_INPUT: &str = "/sys/class/input";
const DEV_INPUT: &str = "/dev/input";
const PROBED_NODES: usize = 10;

// Capability bitmaps in sysfs are printed in words of the kernel's `long`
const WORD_BITS: usize = std::mem::size_of::<libc::c_ulong>() * 8;

/// The type/code/value part of a kernel `input_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchProtocol {
    MultiTouch,
    SingleTouch,
}

#[derive(Debug, thiserror::Error)]
pub enum TouchError {
    #[error("Touch device {path:?} unavailable: {source}")]
    DeviceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Touch device read failed: {0}")]
    Io(#[from] io::Error),
}

/// Parses a sysfs capability bitmap (`"3 0 1000000000000"`, most significant
/// word first) into words ordered least significant first
pub fn parse_bitmap(text: &str) -> Option<Vec<u64>> {
    text.split_whitespace()
        .rev()
        .map(|word| u64::from_str_radix(word, 16).ok())
        .collect()
}

pub fn has_bit(bitmap: &[u64], bit: u16) -> bool {
    let bit = usize::from(bit);
    bitmap
        .get(bit / WORD_BITS)
        .is_some_and(|word| word & (1 << (bit % WORD_BITS)) != 0)
}

pub fn classify(abs: &[u64], key: &[u64]) -> Option<TouchProtocol> {
    if has_bit(abs, ABS_MT_SLOT) && has_bit(abs, ABS_MT_TRACKING_ID) {
        Some(TouchProtocol::MultiTouch)
    } else if has_bit(abs, ABS_X) && has_bit(abs, ABS_Y) && has_bit(key, BTN_TOUCH) {
        Some(TouchProtocol::SingleTouch)
    } else {
        None
    }
}

/// Classifies `/dev/input/<name>` from its sysfs capabilities
pub fn probe(sysfs_root: &Path, name: &str) -> Option<TouchProtocol> {
    let capabilities = sysfs_root.join(name).join("device").join("capabilities");
    let abs = parse_bitmap(&fs::read_to_string(capabilities.join("abs")).ok()?)?;
    let key = fs::read_to_string(capabilities.join("key"))
        .ok()
        .and_then(|text| parse_bitmap(&text))
        .unwrap_or_default();
    classify(&abs, &key)
}

/// First touch-capable node among `event0..event9`
pub fn autodetect(sysfs_root: &Path, dev_root: &Path) -> Option<(PathBuf, TouchProtocol)> {
    (0..PROBED_NODES).find_map(|n| {
        let name = format!("event{}", n);
        let protocol = probe(sysfs_root, &name)?;
        debug!("{} looks like a {:?} panel", name, protocol);
        Some((dev_root.join(name), protocol))
    })
}

/// Non-blocking reader on an evdev node
#[derive(Debug)]
pub struct TouchDevice {
    path: PathBuf,
    file: File,
    protocol: TouchProtocol,
    pending: Vec<u8>,
}

impl TouchDevice {
    pub fn open(path: &Path, protocol: TouchProtocol) -> Result<Self, TouchError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| TouchError::DeviceUnavailable {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Opened touch device {:?} ({:?})", path, protocol);
        Ok(Self {
            path: path.to_path_buf(),
            file,
            protocol,
            pending: Vec::new(),
        })
    }

    /// Picks the device the way the surface is configured to: explicit path,
    /// then autodetection, then the fallback node
    pub fn discover(config: &TouchConfig) -> Result<Self, TouchError> {
        Self::discover_in(config, Path::new(SYSFS_INPUT), Path::new(DEV_INPUT))
    }

    pub fn discover_in(
        config: &TouchConfig,
        sysfs_root: &Path,
        dev_root: &Path,
    ) -> Result<Self, TouchError> {
        let (path, detected) = match &config.device {
            Some(path) => (path.clone(), probe_path(sysfs_root, path)),
            None => match autodetect(sysfs_root, dev_root) {
                Some((path, protocol)) => (path, Some(protocol)),
                None => {
                    warn!(
                        "No touch panel detected, trying fallback {:?}",
                        config.fallback_device
                    );
                    let fallback = config.fallback_device.clone();
                    let protocol = probe_path(sysfs_root, &fallback);
                    (fallback, protocol)
                }
            },
        };

        let protocol = config
            .protocol
            .or(detected)
            .unwrap_or(TouchProtocol::SingleTouch);
        Self::open(&path, protocol)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn protocol(&self) -> TouchProtocol {
        self.protocol
    }

    /// Everything the kernel has queued; empty when nothing is pending
    pub fn read_events(&mut self) -> Result<Vec<RawInputEvent>, TouchError> {
        let mut buffer = [0u8; 64 * INPUT_EVENT_SIZE];
        loop {
            match self.file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => self.pending.extend_from_slice(&buffer[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let complete = self.pending.len() - self.pending.len() % INPUT_EVENT_SIZE;
        let events = self.pending[..complete]
            .chunks_exact(INPUT_EVENT_SIZE)
            .map(decode_input_event)
            .collect();
        self.pending.drain(..complete);
        Ok(events)
    }
}

fn probe_path(sysfs_root: &Path, path: &Path) -> Option<TouchProtocol> {
    let name = path.file_name()?.to_str()?;
    probe(sysfs_root, name)
}

/// `struct input_event`: a timeval followed by type (u16), code (u16) and
/// value (i32)
pub const INPUT_EVENT_SIZE: usize = std::mem::size_of::<libc::input_event>();

fn decode_input_event(record: &[u8]) -> RawInputEvent {
    let tail = &record[record.len() - 8..];
    RawInputEvent {
        kind: u16::from_ne_bytes([tail[0], tail[1]]),
        code: u16::from_ne_bytes([tail[2], tail[3]]),
        value: i32::from_ne_bytes([tail[4], tail[5], tail[6], tail[7]]),
    }
}

#[cfg(test)]
pub(crate) fn encode_input_event(event: RawInputEvent) -> Vec<u8> {
    let mut record = vec![0u8; INPUT_EVENT_SIZE];
    let tail = INPUT_EVENT_SIZE - 8;
    record[tail..tail + 2].copy_from_slice(&event.kind.to_ne_bytes());
    record[tail + 2..tail + 4].copy_from_slice(&event.code.to_ne_bytes());
    record[tail + 4..].copy_from_slice(&event.value.to_ne_bytes());
    record
}
