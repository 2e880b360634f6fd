mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use relay_engine::{ConnectorParams, InboundMessage, Processor, ProcessorConfig};

use common::{
    fast_config, init_logging, wait_until, ChatSurface, GatedConnector, ScriptedConnector,
};

const PATIENCE: Duration = Duration::from_secs(10);

#[test]
fn in_flight_count_never_exceeds_the_cap_under_load() {
    init_logging();
    let surface = ChatSurface::new();
    // Slow enough that jobs pile up behind the cap.
    let connector =
        ScriptedConnector::new(Duration::from_millis(15), |text| Ok(format!("ok: {text}")));
    let config = ProcessorConfig {
        max_concurrent: 3,
        ..fast_config()
    };
    let processor = Processor::new(config, connector.clone());
    processor.start().unwrap();

    let sampling = Arc::new(AtomicBool::new(true));
    let worst = Arc::new(AtomicUsize::new(0));
    let sampler = {
        let processor = processor.clone();
        let sampling = Arc::clone(&sampling);
        let worst = Arc::clone(&worst);
        thread::spawn(move || {
            while sampling.load(Ordering::SeqCst) {
                worst.fetch_max(processor.get_status().in_flight, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let producers: Vec<_> = (0..30)
        .map(|i| {
            let processor = processor.clone();
            let window = surface.window(&format!("user{i}"));
            thread::spawn(move || {
                processor.add_message(
                    window,
                    InboundMessage::new(format!("message {i}")),
                    ConnectorParams::default(),
                    0,
                );
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(wait_until(PATIENCE, || surface.count() == 30));
    sampling.store(false, Ordering::SeqCst);
    sampler.join().unwrap();

    assert!(worst.load(Ordering::SeqCst) <= 3);
    assert!(connector.peak() <= 3, "peak {}", connector.peak());
    assert_eq!(connector.calls(), 30);
    processor.stop();
}

#[test]
fn third_job_waits_for_a_free_slot() {
    init_logging();
    let surface = ChatSurface::new();
    let connector = GatedConnector::new();
    let config = ProcessorConfig {
        max_concurrent: 2,
        ..fast_config()
    };
    let processor = Processor::new(config, connector.clone());

    for who in ["ann", "ben", "cat"] {
        processor.add_message(
            surface.window(who),
            InboundMessage::new(who),
            ConnectorParams::default(),
            0,
        );
    }

    assert!(wait_until(PATIENCE, || connector.started().len() == 2));
    thread::sleep(Duration::from_millis(150));
    assert_eq!(connector.started(), vec!["ann", "ben"]);
    let status = processor.get_status();
    assert_eq!(status.in_flight, 2);
    assert_eq!(status.queue_depth, 1);

    connector.release(1);
    assert!(wait_until(PATIENCE, || connector.started().len() == 3));
    assert_eq!(connector.started()[2], "cat");

    connector.release(2);
    assert!(wait_until(PATIENCE, || surface.count() == 3));
    processor.stop();
}

#[test]
fn sends_never_overlap_and_each_job_keeps_segment_order() {
    init_logging();
    let surface = ChatSurface::with_send_pause(Duration::from_millis(1));
    let connector = ScriptedConnector::new(Duration::ZERO, |text| Ok(text.repeat(4)));
    let config = ProcessorConfig {
        max_concurrent: 8,
        chunk_size: 10,
        send_delay: Duration::ZERO,
        ..fast_config()
    };
    let processor = Processor::new(config, connector);

    let jobs = 24;
    let producers: Vec<_> = (0..jobs)
        .map(|i| {
            let processor = processor.clone();
            let window = surface.window(&format!("room{i}"));
            thread::spawn(move || {
                // 9 chars repeated four times: 36 chars, four segments each.
                processor.add_message(
                    window,
                    InboundMessage::new(format!("{i:0>2}-abcdef")),
                    ConnectorParams::default(),
                    0,
                );
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(wait_until(PATIENCE, || surface.count() == jobs * 4));
    assert!(!surface.overlapped(), "destination send was re-entered");
    for i in 0..jobs {
        let texts = surface.texts_for(&format!("room{i}"));
        assert_eq!(texts.len(), 4);
        assert_eq!(texts.concat(), format!("{i:0>2}-abcdef").repeat(4));
    }
    processor.stop();
}
