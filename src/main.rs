mod button_controller;
mod camera_controller;
mod classifier;
mod common;
mod laser_controller;
mod lcd_controller;
mod lcd_driver;
mod user_config;

use std::{
    path::Path,
    sync::{atomic::AtomicBool, Arc},
};

use crate::{
    button_controller::monitor_button,
    camera_controller::start_camera_controller,
    laser_controller::start_laser_controller,
    lcd_controller::start_lcd_controller,
    user_config::{ControlPins, DevicePreference, PanelInfo, SamplerSettings},
};

const CONFIG_PATH: &str = "./config";

fn main() {
    env_logger::init();

    let config_dir = Path::new(CONFIG_PATH);
    let device_preference = DevicePreference::read(config_dir);
    let sampler_settings = SamplerSettings::read(config_dir, &device_preference.resolution);
    let panel_info = PanelInfo::read(config_dir);
    let control_pins = ControlPins::read(config_dir);

    // Sampling starts paused; the first button press turns it on.
    let active = Arc::new(AtomicBool::new(false));

    let camera_controller =
        start_camera_controller(active.clone(), device_preference, sampler_settings);

    let lcd_thread_handle = start_lcd_controller(
        active.clone(),
        camera_controller.readings_queue.clone(),
        panel_info,
    );

    let laser_thread_handle = start_laser_controller(
        active.clone(),
        control_pins.laser_pin,
        control_pins.blink_interval_ms,
    );

    let thread_handles = vec![
        camera_controller.thread_handle,
        lcd_thread_handle,
        laser_thread_handle,
    ];
    monitor_button(
        control_pins.button_pin,
        control_pins.debounce_ms,
        active,
        thread_handles,
    ); // never returns
}
