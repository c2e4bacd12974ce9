use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    thread,
    time::Duration,
};

use log::{debug, info, warn};
use palette::{Hsv, IntoColor, Srgb};
use queues::{IsQueue, Queue};
use rscam::{
    Camera, Config, Frame, CID_AUTO_WHITE_BALANCE, CID_BRIGHTNESS, CID_CONTRAST,
    CID_EXPOSURE_ABSOLUTE, CID_EXPOSURE_AUTO, CID_GAIN, CID_GAMMA, CID_HUE, CID_SATURATION,
    CID_SHARPNESS, CID_WHITE_BALANCE_TEMPERATURE, FIELD_NONE,
};
use turbojpeg::{Decompressor, Image, PixelFormat};

use crate::{
    classifier::{classify_hsv, classify_rgb, ColorLabel, HsvSample, RgbSample},
    common::{ColorReading, ColorReadingQueue},
    user_config::{DevicePreference, SampleSpace, SamplerSettings},
};

pub(crate) struct CameraController {
    /**
     * Handle to be unparked when sampling is toggled back on.
     * This allows the thread to sleep while the system is idle.
     */
    pub(crate) thread_handle: thread::JoinHandle<()>,
    /**
     * Blocking queue that will contain the classified readings.
     */
    pub(crate) readings_queue: Arc<ColorReadingQueue>,
}

/**
 * Simple blocking queue structure to transfer frames from the V4L2 camera
 * to the classifier thread.
 * We don't need a queue for empty Frames because Frames going out of scope
 * return the V4L2 buffer implicitly.
 */
struct V4L2FrameQueue {
    filled_queue: Mutex<Queue<Arc<Frame>>>,
    filled_cv: Condvar,
}

/**
 * Entry point for starting the camera threads.
 */
pub(crate) fn start_camera_controller(
    active: Arc<AtomicBool>,
    device: DevicePreference,
    sampler: SamplerSettings,
) -> CameraController {
    let readings_queue = Arc::new(ColorReadingQueue {
        filled_queue: Mutex::new(Queue::new()),
        filled_cv: Condvar::new(),
    });

    let device_arc = Arc::new(device);

    let thread_readings_queue = readings_queue.clone();
    let thread_handle = thread::spawn(move || {
        info!("Starting Camera Threads...");
        _main_camera_controller_loop(active, device_arc, sampler, thread_readings_queue);
    });

    CameraController {
        thread_handle,
        readings_queue,
    }
}

//////////////////////////// Classifier Thread Start ////////////////////////////
/**
 * Starts another thread to fetch frames from the V4L2 camera, and uses the
 * calling thread to decode the frames and classify the sample region.
 * The camera is opened on each activation and released again when the
 * button toggles the system off.
 */
fn _main_camera_controller_loop(
    active: Arc<AtomicBool>,
    device: Arc<DevicePreference>,
    sampler: SamplerSettings,
    readings_queue: Arc<ColorReadingQueue>,
) {
    loop {
        while !active.load(Ordering::Relaxed) {
            // button_controller will unpark the thread when sampling resumes.
            thread::park_timeout(Duration::from_secs(10));
        }

        let v4l2_queue = Arc::new(V4L2FrameQueue {
            filled_queue: Mutex::new(Queue::new()),
            filled_cv: Condvar::new(),
        });

        let active_clone = active.clone();
        let v4l2_queue_clone = v4l2_queue.clone();
        let device_clone = device.clone();

        // Thread to get frames from the V4L2 camera, pumping them to this
        // thread to be decoded and classified.
        // Two threads are needed because RPi Zero cannot decode
        // JPEGs at 30fps, and we don't want stale camera frames.
        let v4l2_thread = thread::spawn(move || {
            _pump_v4l2_frames_from_camera(active_clone, device_clone, v4l2_queue_clone);
        });

        _decode_and_classify(
            active.clone(),
            device.clone(),
            &sampler,
            v4l2_queue,
            readings_queue.clone(),
        );

        // Previous function only returns once sampling is toggled off.
        // Wait for v4l2 thread to join.
        v4l2_thread.join().unwrap();
    }
}

/**
 * Loop to get frames from v4l2_thread, decode the frame, average the sample
 * window, classify it, and send the reading to lcd_controller.
 */
fn _decode_and_classify(
    active: Arc<AtomicBool>,
    device: Arc<DevicePreference>,
    sampler: &SamplerSettings,
    v4l2_queue: Arc<V4L2FrameQueue>,
    readings_queue: Arc<ColorReadingQueue>,
) {
    let mut decompressor = Decompressor::new().expect("Could not create JPEG decompressor.");
    // Pre-allocate a buffer to hold the decoded rgb frame.
    let buffer_length_bytes = device.resolution.0 * device.resolution.1 * PixelFormat::RGB.size();
    let mut rgb_buffer = Image {
        pixels: vec![0 as u8; buffer_length_bytes],
        width: device.resolution.0,
        pitch: device.resolution.0 * PixelFormat::RGB.size(),
        height: device.resolution.1,
        format: PixelFormat::RGB,
    };

    let mut last_label: Option<ColorLabel> = None;

    // Main decode and classify loop
    while active.load(Ordering::Relaxed) {
        // Fetch a filled v4l2 frame.
        let mut filled_frame_opt: Option<Arc<Frame>> = Option::None;
        while active.load(Ordering::Relaxed) {
            let mut filled_frame_q = v4l2_queue.filled_queue.lock().unwrap();
            let filled_frame_res = filled_frame_q.remove();
            if filled_frame_res.is_ok() {
                filled_frame_opt = Option::Some(filled_frame_res.unwrap());
                break;
            }

            let mut wait_timeout = v4l2_queue
                .filled_cv
                .wait_timeout(filled_frame_q, Duration::from_millis(30))
                .unwrap();

            let filled_frame_res = wait_timeout.0.remove();
            if filled_frame_res.is_ok() {
                filled_frame_opt = Option::Some(filled_frame_res.unwrap());
                break;
            }
        }

        if filled_frame_opt.is_none() {
            // Sampling toggled off
            break;
        }

        let filled_frame = filled_frame_opt.unwrap();
        // Decode v4l2 frame to RGB
        let temp_rgb = Image {
            pixels: &mut rgb_buffer.pixels[..],
            width: rgb_buffer.width,
            pitch: rgb_buffer.pitch,
            height: rgb_buffer.height,
            format: rgb_buffer.format,
        };
        let decode_res = _decode_v4l2_frame_to_rgb(&filled_frame, &mut decompressor, temp_rgb);
        if decode_res.is_err() {
            // Camera occasionally sends a malformed jpeg. Log and drop.
            warn!("Failed to decode image: {}", decode_res.unwrap_err());
            continue;
        }

        // Average the sample window and classify it.
        let mean_rgb = _mean_of_window(&rgb_buffer, &sampler.window);
        let label = match sampler.space {
            SampleSpace::Rgb => classify_rgb(mean_rgb, &sampler.classifier),
            SampleSpace::Hsv => classify_hsv(_to_opencv_hsv(mean_rgb), &sampler.classifier),
        };

        if last_label != Some(label) {
            info!(
                "Detected {} (R={} G={} B={})",
                label.as_str(),
                mean_rgb.r,
                mean_rgb.g,
                mean_rgb.b
            );
            last_label = Some(label);
        } else {
            debug!("Still {}", label.as_str());
        }

        // One last check before sending the reading off!
        if !active.load(Ordering::Relaxed) {
            break;
        }

        {
            let mut filled_readings_q = readings_queue.filled_queue.lock().unwrap();
            // Remove any existing reading from the queue to give
            // lcd_controller the most up-to-date label.
            let _ = filled_readings_q.remove();
            filled_readings_q
                .add(ColorReading { label, mean_rgb })
                .unwrap();
        }
        readings_queue.filled_cv.notify_all();
    } // main decode loop
}

/**
 * Decodes a MJPEG frame from V4L2 camera to RGB buffer
 */
fn _decode_v4l2_frame_to_rgb(
    mjpg: &Frame,
    decompressor: &mut Decompressor,
    output_image: Image<&mut [u8]>,
) -> Result<(), String> {
    let decompress = decompressor.decompress(&mjpg[..], output_image);
    if decompress.is_err() {
        return Err(format!("Decompression Failed: {}", decompress.unwrap_err()).to_string());
    }

    let _ = decompress.unwrap();
    Ok(())
}

/**
 * Mean channel values over the sample window. Window bounds are
 * right/bottom exclusive and already clamped to the frame.
 */
fn _mean_of_window(image: &Image<Vec<u8>>, window: &((usize, usize), (usize, usize))) -> RgbSample {
    let pixels = &image.pixels;
    let stride = image.pitch;

    let ((x0, y0), (x1, y1)) = *window;

    let mut r: u32 = 0;
    let mut g: u32 = 0;
    let mut b: u32 = 0;

    for y in y0..y1 {
        for x in x0..x1 {
            let r_idx = _coords_to_idx(&(x, y), stride);
            r += pixels[r_idx] as u32;
            g += pixels[r_idx + 1] as u32;
            b += pixels[r_idx + 2] as u32;
        }
    }

    let count = ((x1 - x0) * (y1 - y0)) as u32;
    RgbSample {
        r: (r / count) as u8,
        g: (g / count) as u8,
        b: (b / count) as u8,
    }
}

/**
 * Converts a mean RGB sample to OpenCV HSV units (hue 0-179, saturation and
 * value 0-255), which is what the HSV rule table is calibrated against.
 */
fn _to_opencv_hsv(sample: RgbSample) -> HsvSample {
    let rgb: Srgb<u8> = Srgb::from([sample.r, sample.g, sample.b]);
    let rgb: Srgb = rgb.into_format();
    let hsv: Hsv = rgb.into_color();

    let degrees = hsv.hue.into_positive_degrees(); // [0, 360)
    HsvSample {
        h: ((degrees / 2.0).round() as u16 % 180) as u8,
        s: (hsv.saturation * 255.0).round() as u8,
        v: (hsv.value * 255.0).round() as u8,
    }
}

/**
 * Utility function to convert the conventional (x, y) coordinates to an index in the flat buffer.
 */
fn _coords_to_idx((x, y): &(usize, usize), stride: usize) -> usize {
    let row_idx = y * stride;
    let col_idx = x * PixelFormat::RGB.size();
    row_idx + col_idx
}
//////////////////////////// Classifier Thread End ////////////////////////////

//////////////////////////// V4L2 Thread Start ////////////////////////////
/**
 * Main thread loop that opens the V4L2 device, configures it, and pumps
 * frames to the classifier thread until sampling is toggled off.
 */
fn _pump_v4l2_frames_from_camera(
    active: Arc<AtomicBool>,
    device: Arc<DevicePreference>,
    v4l2_queue: Arc<V4L2FrameQueue>,
) {
    let mut camera = Camera::new(&device.device_path)
        .expect(format!("Could not open camera {}", device.device_path).as_str());

    _set_v4l2_camera_controls(&mut camera);

    let config = Config {
        interval: (1, 30), // 30fps hardcoded. This may or may not be reasonable for the camera
        resolution: (device.resolution.0 as u32, device.resolution.1 as u32),
        format: b"MJPG",
        field: FIELD_NONE,
        nbuffers: 4,
    };

    camera.start(&config).unwrap();

    while active.load(Ordering::Relaxed) {
        let frame = Arc::new(camera.capture().unwrap());
        {
            let mut filled_v4l2_q = v4l2_queue.filled_queue.lock().unwrap();

            // silently drop any existing frame in filled_v4l2_q. This ensures that there can
            // be at most one queued up frame to be decoded.
            let _ = filled_v4l2_q.remove();
            let _ = filled_v4l2_q.add(frame).unwrap();
        }
        v4l2_queue.filled_cv.notify_all(); // Wake up any thread that
                                           // might be waiting on a new frame.
    }

    {
        // Sampling off. Empty queue and exit.
        let mut filled_v4l2_q = v4l2_queue.filled_queue.lock().unwrap();
        loop {
            let remove = filled_v4l2_q.remove();
            if remove.is_err() {
                // Removed all frames.
                break;
            }
            // silently drop the frame (by going out of scope)
        }
    }

    camera.stop().unwrap();
    info!("Camera released.");
}

/**
 * Simple utility function to set V4L2 controls of the given Camera.
 * These values were determined by trial and error, your results might vary.
 */
fn _set_v4l2_camera_controls(camera: &mut Camera) {
    camera.set_control(CID_BRIGHTNESS, &64).unwrap();
    camera.set_control(CID_CONTRAST, &80).unwrap();
    camera.set_control(CID_SATURATION, &150).unwrap();
    camera.set_control(CID_HUE, &0).unwrap();
    camera.set_control(CID_GAMMA, &100).unwrap();
    camera.set_control(CID_GAIN, &32).unwrap();
    camera.set_control(CID_SHARPNESS, &10).unwrap();

    // Disable auto whitebalance and set whitepoint manually
    // This is needed to prevent the camera from auto whitebalancing,
    // potentially messing the colors.
    camera.set_control(CID_AUTO_WHITE_BALANCE, &0).unwrap();
    camera
        .set_control(CID_WHITE_BALANCE_TEMPERATURE, &4100)
        .unwrap();

    // Disable auto exposure and set an exposure value
    // This is needed to prevent the camera from auto blowing out dark scenes
    // or dimming dark ones.
    camera.set_control(CID_EXPOSURE_AUTO, &1).unwrap();
    camera.set_control(CID_EXPOSURE_ABSOLUTE, &300).unwrap();
}
//////////////////////////// V4L2 Thread End ////////////////////////////
