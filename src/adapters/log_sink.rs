//! Log-backed display and status adapters.
//!
//! [`LogDisplay`] keeps a virtual 20×4 character grid and logs every row
//! that changes.  [`LogStatusSink`] keeps the published key/value pairs in
//! memory and logs each update.  The simulator uses both; tests read them
//! back.

use std::collections::HashMap;

use log::{debug, info};

use crate::app::ports::{DISPLAY_COLS, DISPLAY_ROWS, DisplayError, DisplayPort, StatusError, StatusSink};

// ── Display ───────────────────────────────────────────────────

pub struct LogDisplay {
    grid: [[char; DISPLAY_COLS]; DISPLAY_ROWS],
    cursor: (usize, usize),
    backlight: Option<(u8, u8, u8)>,
    brightness: Option<u8>,
    outputs: [bool; 4],
}

impl Default for LogDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl LogDisplay {
    pub fn new() -> Self {
        Self {
            grid: [[' '; DISPLAY_COLS]; DISPLAY_ROWS],
            cursor: (0, 0),
            backlight: None,
            brightness: None,
            outputs: [false; 4],
        }
    }

    /// Current contents, one string per row.
    pub fn rows(&self) -> Vec<String> {
        self.grid.iter().map(|r| r.iter().collect()).collect()
    }

    pub fn backlight(&self) -> Option<(u8, u8, u8)> {
        self.backlight
    }

    pub fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    pub fn outputs(&self) -> [bool; 4] {
        self.outputs
    }
}

impl DisplayPort for LogDisplay {
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.grid = [[' '; DISPLAY_COLS]; DISPLAY_ROWS];
        self.cursor = (0, 0);
        Ok(())
    }

    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), DisplayError> {
        let (row, col) = (usize::from(row), usize::from(col));
        if row >= DISPLAY_ROWS || col >= DISPLAY_COLS {
            return Err(DisplayError::OutOfRange);
        }
        self.cursor = (row, col);
        Ok(())
    }

    /// Text past the right edge is dropped; there is no wrap.
    fn write_text(&mut self, text: &str) -> Result<(), DisplayError> {
        let (row, mut col) = self.cursor;
        for c in text.chars() {
            if col >= DISPLAY_COLS {
                break;
            }
            self.grid[row][col] = c;
            col += 1;
        }
        self.cursor = (row, col);
        let line: String = self.grid[row].iter().collect();
        debug!("LCD | {}: [{}]", row, line);
        Ok(())
    }

    fn set_backlight(&mut self, r: u8, g: u8, b: u8) -> Result<(), DisplayError> {
        debug!("LCD | backlight {},{},{}", r, g, b);
        self.backlight = Some((r, g, b));
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), DisplayError> {
        info!("LCD | brightness {}", level);
        self.brightness = Some(level);
        Ok(())
    }

    fn set_outputs(&mut self, outputs: [bool; 4]) -> Result<(), DisplayError> {
        self.outputs = outputs;
        Ok(())
    }
}

// ── Status ────────────────────────────────────────────────────

#[derive(Default)]
pub struct LogStatusSink {
    values: HashMap<String, String>,
}

impl LogStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl StatusSink for LogStatusSink {
    fn set(&mut self, key: &str, value: &str) -> Result<(), StatusError> {
        let changed = self.values.get(key).is_none_or(|v| v != value);
        if changed {
            debug!("STATUS | {} = {}", key, value);
            self.values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_land_at_cursor_and_clip() {
        let mut d = LogDisplay::new();
        d.set_cursor(2, 15).unwrap();
        d.write_text("abcdefgh").unwrap();
        assert_eq!(d.rows()[2], format!("{}abcde", " ".repeat(15)));
        assert_eq!(d.set_cursor(4, 0), Err(DisplayError::OutOfRange));
    }

    #[test]
    fn status_overwrites() {
        let mut s = LogStatusSink::new();
        s.set("pp", "0").unwrap();
        s.set("pp", "1").unwrap();
        assert_eq!(s.get("pp").as_deref(), Some("1"));
        assert_eq!(s.len(), 1);
    }
}
