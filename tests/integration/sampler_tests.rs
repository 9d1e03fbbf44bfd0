//! Sampler feeding a live control service through the intent queue.

use std::sync::Arc;

use poolctl::app::commands::{Intent, RemoteCommand};
use poolctl::config::SystemConfig;
use poolctl::events::IntentQueue;
use poolctl::fsm::SystemMode;
use poolctl::sensors::onewire::SimBus;
use poolctl::sensors::sampler::Sampler;
use poolctl::sensors::{SensorId, TEMP_ERROR};

use crate::mock_hw::Rig;

fn wired(rig: &Rig) -> (Sampler<SimBus>, SimBus, Arc<IntentQueue>) {
    let ids = SystemConfig::default().sensor_ids;
    let bus = SimBus::new(&[
        (ids.spa.as_str(), 84.0),
        (ids.controller.as_str(), 95.0),
        (ids.air.as_str(), 60.0),
    ]);
    let queue = Arc::new(IntentQueue::new());
    let sampler = Sampler::new(bus.clone(), ids, rig.sensors.clone(), Arc::clone(&queue));
    (sampler, bus, queue)
}

fn deliver(rig: &mut Rig, queue: &IntentQueue) -> usize {
    let mut n = 0;
    while let Some(intent) = queue.next() {
        rig.intent(intent);
        n += 1;
    }
    n
}

#[test]
fn disabled_spa_sensor_ends_session() {
    let mut rig = Rig::new();
    let (mut sampler, bus, queue) = wired(&rig);
    assert_eq!(sampler.init(), Ok(3));

    rig.send(RemoteCommand::SpaOn { hours: Some(2) });
    assert_eq!(rig.mode(), SystemMode::SpaOn);

    let limit = SystemConfig::default().sensor_error_limit as usize;
    bus.fail(&SystemConfig::default().sensor_ids.spa, limit + 1);
    for _ in 0..limit {
        sampler.sample(SensorId::Spa);
    }
    assert!(queue.is_empty(), "still inside the error limit");
    assert_eq!(rig.sensors.read().unwrap().read(SensorId::Spa), 84.0);

    sampler.sample(SensorId::Spa);
    assert_eq!(queue.next(), Some(Intent::SensorFault(SensorId::Spa)));
    assert_eq!(rig.sensors.read().unwrap().read(SensorId::Spa), TEMP_ERROR);

    rig.intent(Intent::SensorFault(SensorId::Spa));
    assert_eq!(rig.mode(), SystemMode::Cooldown);
    assert!(!rig.service.equipment().state().heater_power);

    // Disabled sensors are not read again and do not report twice.
    let before = bus.reads();
    sampler.sample(SensorId::Spa);
    assert_eq!(bus.reads(), before);
    assert_eq!(deliver(&mut rig, &queue), 0);
}

#[test]
fn fresh_readings_reach_the_thermostat() {
    let mut rig = Rig::new();
    let (mut sampler, bus, queue) = wired(&rig);
    sampler.init().unwrap();

    rig.send(RemoteCommand::SpaOn { hours: Some(2) });
    bus.set(&SystemConfig::default().sensor_ids.spa, 98.0);

    // Tick 10 of the cycle reads the spa.
    let read: Vec<_> = (0..10).filter_map(|_| sampler.step()).collect();
    assert_eq!(read, vec![SensorId::Spa]);
    assert_eq!(deliver(&mut rig, &queue), 0);

    // 12:00:02 after spa_on; the next thermostat pass is at :10.
    rig.run_for(8);
    assert!(!rig.service.equipment().state().heater_enable);
    assert_eq!(rig.status.get("st").as_deref(), Some("98.0"));
}

#[test]
fn midnight_brings_a_failed_sensor_back() {
    let mut rig = Rig::with(
        SystemConfig::default(),
        crate::mock_hw::at(2024, 6, 1, 23, 59, 50),
    );
    let (mut sampler, bus, queue) = wired(&rig);
    sampler.init().unwrap();
    rig.tick();

    let limit = SystemConfig::default().sensor_error_limit as usize;
    bus.fail(&SystemConfig::default().sensor_ids.air, limit + 1);
    for _ in 0..=limit {
        sampler.sample(SensorId::Air);
    }
    assert_eq!(deliver(&mut rig, &queue), 1);
    assert!(!rig.sensors.read().unwrap().is_enabled(SensorId::Air));

    rig.run_for(10);
    assert!(rig.sensors.read().unwrap().is_enabled(SensorId::Air));
    assert!(sampler.sample(SensorId::Air));
    assert_eq!(rig.sensors.read().unwrap().read(SensorId::Air), 60.0);
}
