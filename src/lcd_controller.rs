use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, park, JoinHandle},
    time::Duration,
};

use log::{error, info};
use queues::IsQueue;

use crate::{
    classifier::ColorLabel,
    common::{ColorReading, ColorReadingQueue},
    lcd_driver::{GpioBus, I2cBus, Lcd, LcdBus, LcdError},
    user_config::{PanelBus, PanelInfo},
};

pub(crate) fn start_lcd_controller(
    active: Arc<AtomicBool>,
    readings: Arc<ColorReadingQueue>,
    panel: PanelInfo,
) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("Starting LCD Controller Thread...");
        _main_lcd_thread_loop(active, readings, panel);
    })
}

/**
 * The panel bus is built inside the thread that owns it; the display loop
 * itself is generic over the bus.
 */
fn _main_lcd_thread_loop(
    active: Arc<AtomicBool>,
    readings: Arc<ColorReadingQueue>,
    panel: PanelInfo,
) {
    match panel.bus {
        PanelBus::Parallel {
            rs,
            en,
            d4,
            d5,
            d6,
            d7,
        } => {
            let bus = GpioBus::new(rs, en, d4, d5, d6, d7).expect("Could not claim LCD GPIO pins");
            _run_display_loop(active, readings, Lcd::new(bus));
        }
        PanelBus::I2c { addr } => {
            let bus = I2cBus::new(addr).expect("Could not open I2C bus for LCD");
            _run_display_loop(active, readings, Lcd::new(bus));
        }
    }
}

fn _run_display_loop<B: LcdBus>(
    active: Arc<AtomicBool>,
    readings: Arc<ColorReadingQueue>,
    mut lcd: Lcd<B>,
) {
    lcd.init().expect("Could not initialize LCD");

    let mut last_label: Option<ColorLabel> = None;
    let mut idle_shown = false;

    loop {
        while !active.load(Ordering::Relaxed) {
            if !idle_shown {
                if let Err(err) = _show_idle_prompt(&mut lcd) {
                    error!("Failed to write idle prompt: {}", err);
                }
                idle_shown = true;
                last_label = None;
            }
            park();
        }
        idle_shown = false;

        // Grab the latest reading
        let mut reading_opt: Option<ColorReading> = Option::None;
        while active.load(Ordering::Relaxed) {
            let mut filled_q = readings.filled_queue.lock().unwrap();
            let filled_res = filled_q.remove();
            if filled_res.is_ok() {
                reading_opt = Some(filled_res.unwrap());
                break;
            }

            let mut wait_timeout = readings
                .filled_cv
                .wait_timeout(filled_q, Duration::from_millis(30))
                .unwrap();

            let filled_res = wait_timeout.0.remove();
            if filled_res.is_ok() {
                reading_opt = Some(filled_res.unwrap());
                break;
            }
        }

        if reading_opt.is_none() {
            // Sampling toggled off; back to the idle prompt.
            continue;
        }

        let reading = reading_opt.unwrap();
        if last_label == Some(reading.label) {
            continue;
        }

        // The display is best-effort. A failed write is logged and the
        // label stays pending so the next reading retries.
        match _show_reading(&mut lcd, &reading) {
            Ok(()) => last_label = Some(reading.label),
            Err(err) => error!("Failed to write reading to LCD: {}", err),
        }
    }
}

fn _show_idle_prompt<B: LcdBus>(lcd: &mut Lcd<B>) -> Result<(), LcdError> {
    lcd.clear()?;
    lcd.set_cursor(0, 0)?;
    lcd.print("Welcome!")?;
    lcd.set_cursor(1, 0)?;
    lcd.print("Press the button")?;
    Ok(())
}

fn _show_reading<B: LcdBus>(lcd: &mut Lcd<B>, reading: &ColorReading) -> Result<(), LcdError> {
    lcd.clear()?;
    lcd.set_cursor(0, 0)?;
    lcd.print("Color detected:")?;
    lcd.set_cursor(1, 0)?;
    lcd.print(reading.label.as_str())?;
    Ok(())
}
