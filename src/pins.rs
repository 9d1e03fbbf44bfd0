//! GPIO pin assignments for the pool controller relay board.
//!
//! Single source of truth for the factory wiring.  These are only the
//! defaults; [`HardwareConfig`](crate::config::HardwareConfig) can remap
//! every pin at startup.  Numbering is BCM (Broadcom GPIO number), not
//! header position.

// ---------------------------------------------------------------------------
// Relay outputs (active HIGH)
// ---------------------------------------------------------------------------

/// Circulation pump contactor.
pub const PUMP_GPIO: u8 = 22;
/// Heater main power relay.  Requires the pump to be running.
pub const HEATER_GPIO: u8 = 27;
/// Heater thermostat-enable input.  Requires heater power.
pub const HEATER_ENABLE_GPIO: u8 = 23;
/// Valve actuator 1 direction (off = CW, on = CCW).
pub const VALVE1_DIR_GPIO: u8 = 17;
/// Valve actuator 2 direction (off = CW, on = CCW).
pub const VALVE2_DIR_GPIO: u8 = 24;
/// Spare relay, brought out to the terminal strip.
pub const SPARE_GPIO: u8 = 16;

// ---------------------------------------------------------------------------
// Activity LED
// ---------------------------------------------------------------------------

pub const ACTIVITY_LED_GPIO: u8 = 20;
/// Low side of the activity LED; held LOW.
pub const LED_RETURN_GPIO: u8 = 8;

// ---------------------------------------------------------------------------
// Front panel buttons (active LOW, internal pull-up)
// ---------------------------------------------------------------------------

/// In panel order: 1 (red, Menu), 2 (yellow, Temp), 3 (green, Pump),
/// 4 (blue, Spa).
pub const BUTTON_GPIOS: [u8; 4] = [6, 13, 19, 26];

// ---------------------------------------------------------------------------
// One-wire bus
// ---------------------------------------------------------------------------

/// DS18B20 data line; enumerated by the kernel `w1-gpio` overlay.
pub const ONE_WIRE_GPIO: u8 = 4;
