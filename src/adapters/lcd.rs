//! Serial character LCD (Matrix Orbital command set, RGB backpack).
//!
//! Every command is `0xFE` followed by an opcode and its argument bytes.
//! Cursor positions on the wire are 1-based, column first.  The serial
//! line itself (57600 8N1) is configured outside the process.

use std::fs::OpenOptions;
use std::io::Write;

use log::{info, warn};

use crate::app::ports::{DISPLAY_COLS, DISPLAY_ROWS, DisplayError, DisplayPort};

const START: u8 = 0xFE;
const CLEAR: u8 = 0x58;
const HOME: u8 = 0x48;
const SET_CURSOR: u8 = 0x47;
const UNDERLINE_OFF: u8 = 0x4B;
const DISPLAY_ON: u8 = 0x42;
const SET_CONTRAST: u8 = 0x50;
const SET_BRIGHTNESS: u8 = 0x99;
const RGB_BACKLIGHT: u8 = 0xD0;
const SET_SIZE: u8 = 0xD1;
// The backpack's general-purpose outputs are inverted.
const GPO_OFF: u8 = 0x56;
const GPO_ON: u8 = 0x57;

const DEFAULT_CONTRAST: u8 = 0xFF;

pub struct SerialLcd<W: Write> {
    port: W,
}

impl SerialLcd<std::fs::File> {
    /// Open a serial device node for writing.
    pub fn open(path: &str) -> Result<Self, DisplayError> {
        let port = OpenOptions::new().write(true).open(path).map_err(|e| {
            warn!("LCD | cannot open {}: {}", path, e);
            DisplayError::Io
        })?;
        info!("LCD | opened {}", path);
        Ok(Self::new(port))
    }
}

impl<W: Write> SerialLcd<W> {
    pub fn new(port: W) -> Self {
        Self { port }
    }

    /// Size, cursor style, contrast and backlight, then a clear screen.
    pub fn init(&mut self) -> Result<(), DisplayError> {
        self.command(&[SET_SIZE, DISPLAY_COLS as u8, DISPLAY_ROWS as u8])?;
        self.command(&[UNDERLINE_OFF])?;
        self.clear()?;
        self.command(&[SET_CONTRAST, DEFAULT_CONTRAST])?;
        self.command(&[DISPLAY_ON, 0x00])?;
        self.set_brightness(0xFF)?;
        self.set_outputs([false; 4])
    }

    fn command(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
        self.port.write_all(&[START]).map_err(|_| DisplayError::Io)?;
        self.port.write_all(bytes).map_err(|_| DisplayError::Io)?;
        self.port.flush().map_err(|_| DisplayError::Io)
    }

    pub fn into_inner(self) -> W {
        self.port
    }
}

impl<W: Write> DisplayPort for SerialLcd<W> {
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.command(&[CLEAR])?;
        self.command(&[HOME])
    }

    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), DisplayError> {
        if usize::from(row) >= DISPLAY_ROWS || usize::from(col) >= DISPLAY_COLS {
            return Err(DisplayError::OutOfRange);
        }
        self.command(&[SET_CURSOR, col + 1, row + 1])
    }

    /// Only printable ASCII reaches the wire; anything else becomes `?` so
    /// it cannot be taken for a command byte.
    fn write_text(&mut self, text: &str) -> Result<(), DisplayError> {
        let bytes: Vec<u8> = text
            .chars()
            .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' })
            .collect();
        self.port.write_all(&bytes).map_err(|_| DisplayError::Io)?;
        self.port.flush().map_err(|_| DisplayError::Io)
    }

    fn set_backlight(&mut self, r: u8, g: u8, b: u8) -> Result<(), DisplayError> {
        self.command(&[RGB_BACKLIGHT, r, g, b])
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), DisplayError> {
        self.command(&[SET_BRIGHTNESS, level])
    }

    fn set_outputs(&mut self, outputs: [bool; 4]) -> Result<(), DisplayError> {
        for (i, on) in (1u8..).zip(outputs) {
            self.command(&[if on { GPO_OFF } else { GPO_ON }, i])?;
        }
        Ok(())
    }
}
