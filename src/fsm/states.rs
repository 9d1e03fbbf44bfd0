//! Mode table and per-mode event handlers.
//!
//! ```text
//!             PumpStarted               HeaterPowered / SpaStarted
//!   OFF ─────────────────▶ PUMP ───────────────────────────────▶ SPA
//!    ▲ ◀───────────────────  │                                     │
//!    │      PumpStopped      │ ManualRun            HeaterUnpowered│
//!    │                       ▼                         / SpaEnded  ▼
//!    ├──────Halted──────── MAN ◀──FreezeCleared── FREZ        COOL ─┐
//!    │                                             ▲                │
//!    │                     FreezeDetected (any) ───┘                │
//!    └──────────────────────────PumpStopped / Halted────────────────┘
//!
//!  Any mode ──[Shutdown]──▶ OFF
//! ```

use super::{ModeDescriptor, ModeEvent, SystemMode};

// ═══════════════════════════════════════════════════════════════════════════
//  Table
// ═══════════════════════════════════════════════════════════════════════════

/// Indexed by `SystemMode as usize`.
pub static MODE_TABLE: [ModeDescriptor; SystemMode::COUNT] = [
    ModeDescriptor {
        mode: SystemMode::Off,
        name: "OFF ",
        backlight: (255, 255, 255),
        protective: false,
        on_event: idle_event,
    },
    ModeDescriptor {
        mode: SystemMode::PumpOn,
        name: "PUMP",
        backlight: (0, 255, 0),
        protective: false,
        on_event: idle_event,
    },
    ModeDescriptor {
        mode: SystemMode::SpaOn,
        name: "SPA ",
        backlight: (0, 0, 255),
        protective: true,
        on_event: spa_event,
    },
    ModeDescriptor {
        mode: SystemMode::Cooldown,
        name: "COOL",
        backlight: (0, 255, 255),
        protective: true,
        on_event: idle_event,
    },
    ModeDescriptor {
        mode: SystemMode::Freeze,
        name: "FREZ",
        backlight: (255, 0, 0),
        protective: true,
        on_event: freeze_event,
    },
    ModeDescriptor {
        mode: SystemMode::Manual,
        name: "MAN ",
        backlight: (255, 255, 0),
        protective: false,
        on_event: manual_event,
    },
    ModeDescriptor {
        mode: SystemMode::Standby,
        name: "STBY",
        backlight: (255, 255, 255),
        protective: false,
        on_event: idle_event,
    },
];

// ═══════════════════════════════════════════════════════════════════════════
//  Handlers
// ═══════════════════════════════════════════════════════════════════════════

/// Events every mode reacts to the same way.
fn common(event: ModeEvent) -> Option<SystemMode> {
    match event {
        ModeEvent::HeaterPowered | ModeEvent::SpaStarted => Some(SystemMode::SpaOn),
        ModeEvent::HeaterUnpowered | ModeEvent::SpaEnded => Some(SystemMode::Cooldown),
        ModeEvent::FreezeDetected => Some(SystemMode::Freeze),
        ModeEvent::Halted | ModeEvent::Shutdown => Some(SystemMode::Off),
        _ => None,
    }
}

/// Off, PumpOn, Cooldown and Standby: the pump relay alone decides.
fn idle_event(event: ModeEvent) -> Option<SystemMode> {
    match event {
        ModeEvent::PumpStarted => Some(SystemMode::PumpOn),
        ModeEvent::PumpStopped => Some(SystemMode::Off),
        ModeEvent::ManualRun => Some(SystemMode::Manual),
        _ => common(event),
    }
}

/// A spa session owns the pump; plain pump changes don't move it.
fn spa_event(event: ModeEvent) -> Option<SystemMode> {
    match event {
        ModeEvent::PumpStarted | ModeEvent::PumpStopped | ModeEvent::ManualRun => None,
        _ => common(event),
    }
}

/// Manual runs end through `Halted`, not through the pump relay.
fn manual_event(event: ModeEvent) -> Option<SystemMode> {
    match event {
        ModeEvent::PumpStarted | ModeEvent::PumpStopped | ModeEvent::ManualRun => None,
        _ => common(event),
    }
}

/// Freeze protection is only left by a recovered air reading or a halt.
fn freeze_event(event: ModeEvent) -> Option<SystemMode> {
    match event {
        ModeEvent::FreezeCleared => Some(SystemMode::Manual),
        ModeEvent::PumpStarted
        | ModeEvent::PumpStopped
        | ModeEvent::ManualRun
        | ModeEvent::FreezeDetected => None,
        _ => common(event),
    }
}
