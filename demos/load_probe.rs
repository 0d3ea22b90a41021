//! Plays a quiet tone through the default output while toggling the minimum
//! load, and prints how long render cycles take.
//!
//! Run with: cargo run --example load_probe --features cpal_driver

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};

use renderhost::{AudioHost, Callbacks, CpalDriver, Driver, HostConfig};

const TONE_HZ: f32 = 220.0;
const GAIN: f32 = 0.05;

fn synthetic_work(frames: usize) -> f32 {
    (0..frames * 16).fold(0.0f32, |acc, i| acc + (i as f32 * 0.001).sin())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let driver = CpalDriver::default_output()?;
    let sample_rate = driver.sample_rate();
    println!("{} at {} Hz", driver.name(), sample_rate);

    let epoch = Instant::now();
    let cycle_start = Arc::new(AtomicU64::new(0));
    let frames_played = AtomicU64::new(0);
    let (producer, mut consumer) = rtrb::RingBuffer::<u64>::new(4096);
    let producer = Mutex::new(producer);

    let started = cycle_start.clone();
    let ended = cycle_start.clone();
    let callbacks = Callbacks::new(
        |workers| println!("setup: {} workers", workers),
        move |_| started.store(epoch.elapsed().as_nanos() as u64, Ordering::Relaxed),
        |_, frames| {
            std::hint::black_box(synthetic_work(frames));
        },
        move |output, _, frames| {
            let first = frames_played.fetch_add(frames as u64, Ordering::Relaxed);
            let (left, right) = output.channels_mut();
            for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
                let t = (first + i as u64) as f32 / sample_rate as f32;
                let s = GAIN * (TAU * TONE_HZ * t).sin();
                *l = s;
                *r = s;
            }

            let now = epoch.elapsed().as_nanos() as u64;
            let took = now.saturating_sub(ended.load(Ordering::Relaxed));
            // Never block the audio thread on the reporting side.
            if let Ok(mut producer) = producer.try_lock() {
                let _ = producer.push(took);
            }
        },
    );

    let config = HostConfig::default()
        .with_buffer_size(256)
        .with_worker_threads(2)
        .with_busy_threads(1)
        .with_process_in_driver_thread(false);
    let mut host = AudioHost::with_config(driver, callbacks, config)?;
    host.start()?;

    let buffer_us = 256.0 * 1e6 / sample_rate as f64;
    for second in 0..5 {
        let load = if second % 2 == 0 { 0.0 } else { 0.8 };
        host.set_minimum_load(load);
        sleep(Duration::from_secs(1));

        let mut count = 0u64;
        let mut total = 0u64;
        let mut max = 0u64;
        while let Ok(nanos) = consumer.pop() {
            count += 1;
            total += nanos;
            max = max.max(nanos);
        }
        if count == 0 {
            println!("load {:.1}: no cycles", load);
            continue;
        }
        println!(
            "load {:.1}: {} cycles, avg {:.0} us, max {:.0} us (buffer {:.0} us)",
            load,
            count,
            total as f64 / count as f64 / 1e3,
            max as f64 / 1e3,
            buffer_us
        );
    }

    host.stop();
    Ok(())
}
