use std::sync::{Condvar, Mutex};

use queues::Queue;

use crate::classifier::{ColorLabel, RgbSample};

/**
 * One classified sample, as handed from the camera controller to the
 * display thread. The mean RGB rides along for logging.
 */
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColorReading {
    pub(crate) label: ColorLabel,
    pub(crate) mean_rgb: RgbSample,
}

/**
 * Single-slot blocking queue carrying the latest reading. The producer
 * drops any reading still queued before adding a new one, so the display
 * thread always sees the most recent classification and stale labels are
 * never rendered.
 */
#[derive(Debug)]
pub(crate) struct ColorReadingQueue {
    pub(crate) filled_queue: Mutex<Queue<ColorReading>>,
    pub(crate) filled_cv: Condvar,
}
