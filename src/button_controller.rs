use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use log::info;
use rppal::gpio::{Gpio, Trigger};

/**
 * Monitors the push button and toggles `active` on each press, unparking
 * thread_handles so the workers pick the change up immediately.
 */
pub(crate) fn monitor_button(
    button_pin: u8,
    debounce_ms: u64,
    active: Arc<AtomicBool>,
    thread_handles: Vec<JoinHandle<()>>,
) {
    // The button shorts the pin to ground; idle level is pulled high, so a
    // press is the falling edge.
    let mut input_pin = Gpio::new()
        .unwrap()
        .get(button_pin)
        .unwrap()
        .into_input_pullup();
    input_pin.set_interrupt(Trigger::FallingEdge).unwrap();

    let debounce = Duration::from_millis(debounce_ms);
    let mut last_press: Option<Instant> = None;

    loop {
        // Poll with 10s timeout to prevent the thread for being de-prioritized
        // too much. Not sure if this actually helps :/
        let poll_result = input_pin.poll_interrupt(true, Option::Some(Duration::from_secs(10)));
        if poll_result.is_err() {
            panic!("Failed to poll for interrupt.");
        }

        let level_opt = poll_result.unwrap();
        if level_opt.is_none() {
            // no value means the poll timed out.
            continue;
        }

        // Mechanical bounce arrives as a burst of edges; accept one press
        // per debounce window.
        let now = Instant::now();
        if let Some(last) = last_press {
            if now - last < debounce {
                continue;
            }
        }
        last_press = Some(now);

        let was_active = active.fetch_xor(true, Ordering::Relaxed);
        info!(
            "Button pressed. Sampling {}",
            if was_active { "paused" } else { "active" }
        );

        for handle in &thread_handles {
            handle.thread().unpark();
        }
    }
}
