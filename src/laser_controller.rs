use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, park, JoinHandle},
    time::Duration,
};

use log::info;
use rppal::gpio::Gpio;

/**
 * Blinks the laser diode while sampling is active, holds it low otherwise.
 */
pub(crate) fn start_laser_controller(
    active: Arc<AtomicBool>,
    laser_pin: u8,
    blink_interval_ms: u64,
) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("Starting Laser Controller Thread...");
        _main_laser_thread_loop(active, laser_pin, blink_interval_ms);
    })
}

fn _main_laser_thread_loop(active: Arc<AtomicBool>, laser_pin: u8, blink_interval_ms: u64) {
    let mut pin = Gpio::new().unwrap().get(laser_pin).unwrap().into_output();
    pin.set_low();

    let interval = Duration::from_millis(blink_interval_ms);

    loop {
        while !active.load(Ordering::Relaxed) {
            pin.set_low();
            park();
        }

        pin.toggle();
        thread::sleep(interval);
    }
}
