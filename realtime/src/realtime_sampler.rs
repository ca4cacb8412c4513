use std::sync::{Arc, Mutex};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, FromSample, PauseStreamError, PlayStreamError, SizedSample, Stream,
    SupportedStreamConfig,
};
use crossbeam_channel::{unbounded, Receiver};

use spherest_core::{
    buffered_renderer::{BufferedRenderer, BufferedRendererStatsReader},
    sampler::{SamplerEngine, SamplerEvent, SamplerStatsReader},
    AudioPipe, AudioStreamParams, ChannelCount,
};

use crate::{config::RealtimeSamplerConfig, SamplerEventSender};

/// Reads the live state of a `RealtimeSampler`.
pub struct RealtimeSamplerStatsReader {
    sampler_stats: SamplerStatsReader,
    buffered_stats: BufferedRendererStatsReader,
}

impl RealtimeSamplerStatsReader {
    /// The number of voices currently sounding.
    pub fn voice_count(&self) -> u64 {
        self.sampler_stats.voice_count()
    }

    pub fn is_sample_loaded(&self) -> bool {
        self.sampler_stats.is_sample_loaded()
    }

    pub fn base_key(&self) -> u8 {
        self.sampler_stats.base_key()
    }

    pub fn buffer(&self) -> &BufferedRendererStatsReader {
        &self.buffered_stats
    }
}

/// Wraps the engine so that queued events are applied right before each
/// render request, at a block boundary.
struct EventProcessedSampler {
    engine: SamplerEngine,
    receiver: Receiver<SamplerEvent>,
}

impl AudioPipe for EventProcessedSampler {
    fn stream_params(&self) -> &AudioStreamParams {
        AudioPipe::stream_params(&self.engine)
    }

    fn read_samples_unchecked(&mut self, out: &mut [f32]) {
        self.engine.push_events_iter(self.receiver.try_iter());
        self.engine.read_samples_unchecked(out);
    }
}

/// A sampler plugged directly into the default (or a chosen) cpal output
/// device. The engine runs on a buffered render thread; the UI talks to it
/// through the `SamplerEventSender` returned by `get_sender`.
pub struct RealtimeSampler {
    buffered_renderer: Arc<Mutex<BufferedRenderer>>,

    stream: Stream,

    event_sender: SamplerEventSender,

    stats: SamplerStatsReader,

    stream_params: AudioStreamParams,
}

impl RealtimeSampler {
    pub fn open_with_all_defaults() -> Self {
        Self::open_with_default_output(Default::default())
    }

    pub fn open_with_default_output(config: RealtimeSamplerConfig) -> Self {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .expect("failed to find output device");

        let stream_config = device.default_output_config().unwrap();

        RealtimeSampler::open(config, &device, stream_config)
    }

    pub fn open(
        config: RealtimeSamplerConfig,
        device: &Device,
        stream_config: SupportedStreamConfig,
    ) -> Self {
        let sample_rate = stream_config.sample_rate().0;
        let audio_channels = ChannelCount::from_count(stream_config.channels())
            .expect("only mono and stereo outputs are supported");
        let stream_params = AudioStreamParams::new(sample_rate, audio_channels);

        let (event_sender, event_receiver) = unbounded();

        let engine = SamplerEngine::new(config.init_options, stream_params);
        let stats = engine.get_stats();

        let render = EventProcessedSampler {
            engine,
            receiver: event_receiver,
        };

        let buffered = Arc::new(Mutex::new(BufferedRenderer::new(
            render,
            stream_params,
            (sample_rate as f64 * config.render_window_ms / 1000.0) as usize,
        )));

        fn build_stream<T: SizedSample + FromSample<f32>>(
            device: &Device,
            stream_config: SupportedStreamConfig,
            buffered: Arc<Mutex<BufferedRenderer>>,
        ) -> Stream {
            let err_fn = |err| eprintln!("an error occurred on stream: {err}");
            let mut output_vec = Vec::new();

            device
                .build_output_stream(
                    &stream_config.into(),
                    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                        output_vec.resize(data.len(), 0.0);
                        buffered.lock().unwrap().read(&mut output_vec);
                        for (out, s) in data.iter_mut().zip(output_vec.drain(..)) {
                            *out = T::from_sample(s);
                        }
                    },
                    err_fn,
                    None,
                )
                .unwrap()
        }

        let stream = match stream_config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(device, stream_config, buffered.clone()),
            cpal::SampleFormat::I16 => build_stream::<i16>(device, stream_config, buffered.clone()),
            cpal::SampleFormat::U16 => build_stream::<u16>(device, stream_config, buffered.clone()),
            format => panic!("unsupported sample format: {format}"),
        };

        stream.play().unwrap();

        Self {
            buffered_renderer: buffered,
            stream,
            event_sender: SamplerEventSender::new(event_sender, stream_params),
            stats,
            stream_params,
        }
    }

    /// Sends a SamplerEvent to the sampler.
    pub fn send_event(&self, event: SamplerEvent) {
        self.event_sender.send_event(event);
    }

    pub fn get_sender(&self) -> SamplerEventSender {
        self.event_sender.clone()
    }

    pub fn get_stats(&self) -> RealtimeSamplerStatsReader {
        let buffered_stats = self.buffered_renderer.lock().unwrap().get_buffer_stats();

        RealtimeSamplerStatsReader {
            sampler_stats: self.stats.clone(),
            buffered_stats,
        }
    }

    pub fn stream_params(&self) -> &AudioStreamParams {
        &self.stream_params
    }

    pub fn pause(&mut self) -> Result<(), PauseStreamError> {
        self.stream.pause()
    }

    pub fn resume(&mut self) -> Result<(), PlayStreamError> {
        self.stream.play()
    }
}
