use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc, RwLock,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Receiver};

use crate::AudioStreamParams;

use super::AudioPipe;

#[derive(Debug, Clone)]
pub struct BufferedRendererStats {
    /// The number of samples currently buffered.
    /// Can be negative if the reader is waiting for more samples.
    samples: Arc<AtomicI64>,

    /// The last number of samples requested by the read command.
    last_request_samples: Arc<AtomicI64>,

    /// The last 100 render time percentages (0 to 1) of how long the render
    /// thread spent rendering, out of the max allowed time.
    render_time: Arc<RwLock<VecDeque<f64>>>,

    /// The number of samples to render each iteration
    render_size: Arc<AtomicUsize>,
}

pub struct BufferedRendererStatsReader {
    stats: BufferedRendererStats,
}

impl BufferedRendererStatsReader {
    pub fn samples(&self) -> i64 {
        self.stats.samples.load(Ordering::Relaxed)
    }

    pub fn last_request_samples(&self) -> i64 {
        self.stats.last_request_samples.load(Ordering::Relaxed)
    }

    pub fn render_size(&self) -> usize {
        self.stats.render_size.load(Ordering::Relaxed)
    }

    pub fn average_renderer_load(&self) -> f64 {
        let queue = self.stats.render_time.read().unwrap();
        let total = queue.len();
        queue.iter().sum::<f64>() / total as f64
    }

    pub fn last_renderer_load(&self) -> f64 {
        let queue = self.stats.render_time.read().unwrap();
        *queue.front().unwrap_or(&0.0)
    }
}

/// The helper struct for deferred sample rendering.
///
/// Decouples the audio driver callback from the engine: a dedicated thread
/// renders small chunks ahead of time into a queue, so a block that renders
/// slowly causes minimal impact on the driver deadline.
///
/// Designed to be used in realtime playback only.
pub struct BufferedRenderer {
    stats: BufferedRendererStats,

    /// The receiver for samples (the render thread has the sender).
    receive: Receiver<Vec<f32>>,

    /// Remainder of samples from the last received samples vec.
    remainder: Vec<f32>,

    stream_params: AudioStreamParams,
}

impl BufferedRenderer {
    pub fn new<F: 'static + AudioPipe + Send>(
        mut render: F,
        stream_params: AudioStreamParams,
        render_size: usize,
    ) -> Self {
        let (tx, rx) = unbounded();

        let samples = Arc::new(AtomicI64::new(0));
        let last_request_samples = Arc::new(AtomicI64::new(0));
        let render_size = Arc::new(AtomicUsize::new(render_size));
        let render_time = Arc::new(RwLock::new(VecDeque::new()));

        {
            let samples = samples.clone();
            let last_request_samples = last_request_samples.clone();
            let render_size = render_size.clone();
            let render_time = render_time.clone();
            let sample_rate = stream_params.sample_rate;
            let channels = stream_params.channels.count();

            thread::Builder::new()
                .name("spherest_render".into())
                .spawn(move || loop {
                    let size = render_size.load(Ordering::SeqCst);

                    // The expected render time per iteration. Slightly
                    // shortened (*90/100) so the thread can catch up when
                    // it falls behind.
                    let delay = Duration::from_secs(1) * size as u32 / sample_rate * 90 / 100;

                    // If the render thread is ahead by over ~10%, wait until
                    // more samples are required.
                    loop {
                        let buffered = samples.load(Ordering::SeqCst);
                        let last_requested = last_request_samples.load(Ordering::SeqCst);
                        if buffered > last_requested * 110 / 100 {
                            spin_sleep::sleep(delay / 10);
                        } else {
                            break;
                        }
                    }

                    let start = Instant::now();
                    let end = start + delay;

                    let mut vec = vec![0.0; size * channels as usize];
                    render.read_samples(&mut vec);

                    // Send the samples, stop if the pipe is broken
                    samples.fetch_add(vec.len() as i64, Ordering::SeqCst);
                    if tx.send(vec).is_err() {
                        break;
                    }

                    // Record the elapsed render time percentage
                    {
                        let mut queue = render_time.write().unwrap();
                        let elapsed = start.elapsed().as_secs_f64();
                        let total = delay.as_secs_f64();
                        queue.push_front(elapsed / total);
                        if queue.len() > 100 {
                            queue.pop_back();
                        }
                    }

                    // Sleep until the next iteration
                    let now = Instant::now();
                    if end > now {
                        spin_sleep::sleep(end - now);
                    }
                })
                .unwrap();
        }

        Self {
            stats: BufferedRendererStats {
                samples,
                last_request_samples,
                render_time,
                render_size,
            },
            receive: rx,
            remainder: Vec::new(),
            stream_params,
        }
    }

    /// Reads samples from the remainder and the output queue into the
    /// destination array.
    pub fn read(&mut self, dest: &mut [f32]) {
        let mut i: usize = 0;
        let len = dest.len().min(self.remainder.len());
        self.stats
            .samples
            .fetch_sub(dest.len() as i64, Ordering::SeqCst);

        self.stats
            .last_request_samples
            .store(dest.len() as i64, Ordering::SeqCst);

        // Drain the current remainder first
        for r in self.remainder.drain(0..len) {
            dest[i] = r;
            i += 1;
        }

        // Then read from the output queue, keeping any leftover as the
        // next remainder
        while self.remainder.is_empty() {
            let mut buf = match self.receive.recv() {
                Ok(buf) => buf,
                Err(_) => return,
            };

            let len = buf.len().min(dest.len() - i);
            for r in buf.drain(0..len) {
                dest[i] = r;
                i += 1;
            }

            self.remainder = buf;
        }
    }

    /// Sets the number of samples that should be rendered each iteration.
    pub fn set_render_size(&self, size: usize) {
        self.stats.render_size.store(size, Ordering::SeqCst);
    }

    pub fn get_buffer_stats(&self) -> BufferedRendererStatsReader {
        BufferedRendererStatsReader {
            stats: self.stats.clone(),
        }
    }
}

impl AudioPipe for BufferedRenderer {
    fn stream_params(&self) -> &'_ AudioStreamParams {
        &self.stream_params
    }

    fn read_samples_unchecked(&mut self, to: &mut [f32]) {
        self.read(to)
    }
}
