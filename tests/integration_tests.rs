//! Integration Tests
//!
//! End-to-end tests for the Convoplay playback and reverb pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use tempfile::tempdir;

use convoplay::dsp::{ImpulseResponse, IrLoader, IrSource, LoadEvent};
use convoplay::engine::{
    decode_file, export_wav, AudioBuffer, BufferSink, EngineState, InterleavedSink,
    PreviewRenderer, RealtimeProcessor, TransportState,
};
use convoplay::{LoadError, PlayerConfig, PlayerContext};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Helper to create a test sine wave buffer
fn create_sine_buffer(frequency: f32, sample_rate: u32, num_frames: usize) -> AudioBuffer {
    let samples = (0..num_frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5
        })
        .collect();
    AudioBuffer::from_channels(vec![samples], sample_rate).unwrap()
}

fn write_wav(dir: &Path, name: &str, buffer: &AudioBuffer) -> PathBuf {
    let path = dir.join(name);
    export_wav(buffer, &path, 32).unwrap();
    path
}

fn render(processor: &mut RealtimeProcessor, frames: usize, block: usize) -> AudioBuffer {
    let mut sink = BufferSink::new(processor.num_channels(), 48000);
    let mut done = 0;
    while done < frames {
        let n = block.min(frames - done);
        processor.process_block(n, &mut sink);
        done += n;
    }
    sink.into_buffer()
}

// === Playback Tests ===

#[test]
fn test_looping_source_wraps_without_gap() {
    let state = Arc::new(EngineState::new());
    let mut processor = RealtimeProcessor::new(state, 1, 8);
    let source = AudioBuffer::from_channels(vec![vec![1.0, 2.0, 3.0, 4.0]], 48000).unwrap();
    processor.attach_source(source, 48000);

    let transport = processor.transport();
    transport.set_looping(true);
    transport.play();

    let output = render(&mut processor, 10, 3);
    assert_eq!(
        output.channel(0),
        &[1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0, 1.0, 2.0]
    );
    assert!(transport.is_playing());
}

#[test]
fn test_end_of_stream_stops_and_rewinds() {
    let state = Arc::new(EngineState::new());
    let mut processor = RealtimeProcessor::new(state, 2, 16);
    let source = AudioBuffer::from_channels(vec![vec![0.5; 6]], 48000).unwrap();
    processor.attach_source(source, 48000);

    let transport = processor.transport();
    transport.play();
    let output = render(&mut processor, 10, 10);

    // Mono source is mapped onto both output channels
    for ch in 0..2 {
        assert_eq!(&output.channel(ch)[..6], &[0.5; 6]);
        assert_eq!(&output.channel(ch)[6..], &[0.0; 4]);
    }
    assert_eq!(transport.state(), TransportState::Stopped);
    assert_eq!(transport.current_position(), 0.0);
}

// === Convolution Tests ===

#[test]
fn test_mono_ir_applied_to_stereo_source() {
    let state = Arc::new(EngineState::new());
    state.publish(ImpulseResponse::mono("unit", vec![1.0], 48000));
    state.set_enabled(true);

    let mut processor = RealtimeProcessor::new(Arc::clone(&state), 2, 64);
    let source =
        AudioBuffer::from_channels(vec![vec![1.0; 32], vec![-0.5; 32]], 48000).unwrap();
    processor.attach_source(source, 48000);
    processor.transport().play();

    let output = render(&mut processor, 32, 32);
    for frame in 0..32 {
        assert_relative_eq!(output.channel(0)[frame], 0.1, epsilon = 1e-6);
        assert_relative_eq!(output.channel(1)[frame], -0.05, epsilon = 1e-6);
    }
}

#[test]
fn test_toggle_takes_effect_on_next_block() {
    let state = Arc::new(EngineState::new());
    state.publish(ImpulseResponse::mono("unit", vec![1.0], 48000));

    let mut processor = RealtimeProcessor::new(Arc::clone(&state), 1, 4);
    let source = AudioBuffer::from_channels(vec![vec![1.0; 8]], 48000).unwrap();
    processor.attach_source(source, 48000);
    processor.transport().play();

    let mut sink = BufferSink::new(1, 48000);
    processor.process_block(4, &mut sink);
    state.set_enabled(true);
    processor.process_block(4, &mut sink);

    let output = sink.into_buffer();
    assert_eq!(&output.channel(0)[..4], &[1.0; 4]);
    for &sample in &output.channel(0)[4..] {
        assert_relative_eq!(sample, 0.1, epsilon = 1e-6);
    }
}

#[test]
fn test_enabled_without_impulse_passes_through() {
    let state = Arc::new(EngineState::new());
    state.set_enabled(true);

    let mut processor = RealtimeProcessor::new(state, 1, 16);
    let source = create_sine_buffer(440.0, 48000, 16);
    let expected = source.channel(0).to_vec();
    processor.attach_source(source, 48000);
    processor.transport().play();

    let output = render(&mut processor, 16, 16);
    assert_eq!(output.channel(0), expected.as_slice());
}

// === Concurrency Tests ===

#[test]
fn test_blocks_stay_whole_while_another_thread_swaps_and_toggles() {
    const BLOCK: usize = 64;
    const CHANNELS: usize = 2;

    let state = Arc::new(EngineState::new());
    let mut processor = RealtimeProcessor::new(Arc::clone(&state), CHANNELS, BLOCK);
    let source = AudioBuffer::from_channels(vec![vec![1.0; 1024]], 48000).unwrap();
    processor.attach_source(source, 48000);
    let transport = processor.transport();
    transport.set_looping(true);
    transport.play();

    let done = Arc::new(AtomicBool::new(false));
    let control_state = Arc::clone(&state);
    let control_done = Arc::clone(&done);
    let control = thread::spawn(move || {
        let mut i: u32 = 0;
        while !control_done.load(Ordering::Acquire) {
            match i % 4 {
                0 => {
                    control_state.publish(ImpulseResponse::mono("a", vec![1.0, 0.5], 48000));
                }
                1 => control_state.set_enabled(i % 8 == 1),
                2 => {
                    control_state.publish(ImpulseResponse::mono("b", vec![2.0], 48000));
                }
                _ => control_state.store().clear(),
            }
            i = i.wrapping_add(1);
            thread::yield_now();
        }
    });

    // Constant input: each block is either dry, fully IR "a" or fully IR "b"
    let dry = vec![1.0_f32; BLOCK];
    let mut with_a = vec![0.15_f32; BLOCK];
    with_a[0] = 0.1;
    let with_b = vec![0.2_f32; BLOCK];
    let matches = |block: &[f32], expected: &[f32]| {
        block
            .iter()
            .zip(expected)
            .all(|(a, b)| (a - b).abs() < 1e-6)
    };

    let mut out = vec![0.0_f32; BLOCK * CHANNELS];
    for _ in 0..5000 {
        let mut sink = InterleavedSink::new(&mut out, CHANNELS);
        processor.process_block(BLOCK, &mut sink);
        assert_eq!(sink.frames_written(), BLOCK);

        for ch in 0..CHANNELS {
            let block: Vec<f32> = out.iter().skip(ch).step_by(CHANNELS).copied().collect();
            assert!(
                matches(&block, &dry) || matches(&block, &with_a) || matches(&block, &with_b),
                "block mixes impulse responses: {:?}",
                &block[..4]
            );
        }
    }

    done.store(true, Ordering::Release);
    control.join().unwrap();
    assert_eq!(out.len(), BLOCK * CHANNELS);
    assert!(transport.is_playing());
}

// === Loading Tests ===

#[test]
fn test_unsupported_ir_keeps_previous_snapshot() {
    let dir = tempdir().unwrap();
    let bogus = dir.path().join("notes.wav");
    std::fs::write(&bogus, b"this is not a riff file").unwrap();

    let state = Arc::new(EngineState::new());
    let before = state.publish(ImpulseResponse::mono("room", vec![1.0, 0.5], 48000));

    let loader = IrLoader::spawn(Arc::clone(state.store())).unwrap();
    let generation = loader.request(IrSource::File(bogus)).unwrap();

    match loader.wait_event(TIMEOUT) {
        Some(LoadEvent::Failed { generation: g, error }) => {
            assert_eq!(g, generation);
            assert!(matches!(error, LoadError::UnsupportedFormat { .. }));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert_eq!(state.snapshot().id(), before.id());
}

#[test]
fn test_missing_ir_file_is_io_family() {
    let state = EngineState::new();
    let result = state.store().load_from_file(Path::new("/nonexistent/hall.wav"));
    assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    assert!(state.snapshot().is_none());
}

#[test]
fn test_context_loads_builtin_and_processes() {
    let config = PlayerConfig {
        reverb_enabled: true,
        block_size: 256,
        ..PlayerConfig::default()
    };
    let context = PlayerContext::new(config).unwrap();
    let generation = context.select_impulse("small-room").unwrap();

    match context.loader().wait_event(TIMEOUT) {
        Some(LoadEvent::Published {
            generation: g,
            name,
            channels,
            ..
        }) => {
            assert_eq!(g, generation);
            assert_eq!(name, "small-room");
            assert_eq!(channels, 1);
        }
        other => panic!("Expected Published, got {:?}", other),
    }

    let mut processor = context.build_processor();
    let mut impulse = vec![0.0; 512];
    impulse[0] = 1.0;
    processor.attach_source(AudioBuffer::from_channels(vec![impulse], 44100).unwrap(), 44100);
    processor.transport().play();

    let output = render(&mut processor, 512, 256);
    // The builtin IR starts at full scale
    assert_relative_eq!(output.channel(0)[0], 0.1, epsilon = 1e-3);
    assert!(output.channel(0)[1..].iter().any(|s| *s != 0.0));
}

// === Offline Rendering Tests ===

#[test]
fn test_render_pipeline_to_wav() {
    let dir = tempdir().unwrap();
    let input = write_wav(dir.path(), "tone.wav", &create_sine_buffer(220.0, 48000, 2000));

    let state = Arc::new(EngineState::new());
    state.publish(ImpulseResponse::mono("echo", vec![1.0, 0.0, 0.5], 48000));
    state.set_enabled(true);

    let decoded = decode_file(&input).unwrap();
    let mut processor = RealtimeProcessor::new(state, 2, 512);
    processor.attach_source(decoded.buffer, decoded.sample_rate);
    processor.transport().play();
    let rendered = render(&mut processor, 2000, 512);

    let output = write_wav(dir.path(), "out.wav", &rendered);
    let reloaded = decode_file(&output).unwrap();
    assert_eq!(reloaded.num_channels(), 2);
    assert_eq!(reloaded.num_frames(), 2000);
    assert!(reloaded.buffer.is_finite());
}

#[test]
fn test_preview_matches_realtime_for_short_ir() {
    let dir = tempdir().unwrap();
    let source = create_sine_buffer(330.0, 48000, 256);
    let input = write_wav(dir.path(), "short.wav", &source);

    let state = Arc::new(EngineState::new());
    let snapshot = state.publish(ImpulseResponse::mono("tap", vec![0.5, 0.25], 48000));
    state.set_enabled(true);

    let (preview, _) = PreviewRenderer::render_preview(&input, &snapshot).unwrap();

    // One block covering the whole file sees the same input as the preview
    let mut processor = RealtimeProcessor::new(state, 1, 256);
    processor.attach_source(source, 48000);
    processor.transport().play();
    let realtime = render(&mut processor, 256, 256);

    for (a, b) in preview.channel(0).iter().zip(realtime.channel(0)) {
        assert_relative_eq!(*a, *b, epsilon = 1e-5);
    }
}
