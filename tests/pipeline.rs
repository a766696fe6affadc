use std::io::Cursor;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use pipecast::encoder::{self, Format};
use pipecast::{EncodeOptions, Encoder, ErrorKind, Frame, PacketLimit, Session};

// 4 samples per channel, stereo: 8 samples, 16 bytes per frame
fn small_options() -> EncodeOptions {
    EncodeOptions::new(256, 8000, 4, 20, 16000, 0, 2, 0, 10)
}

/// `count` frames, every sample of frame `i` set to `i`.
fn frames(count: usize) -> Vec<u8> {
    let len = small_options().frame_len();
    (0..count)
        .flat_map(|i| std::iter::repeat(i as i16).take(len))
        .flat_map(|s| s.to_le_bytes())
        .collect()
}

fn session(capacity: usize) -> (tempfile::NamedTempFile, Session) {
    let file = tempfile::NamedTempFile::new().unwrap();
    let session = Session::new(file.path(), small_options())
        .unwrap()
        .with_capacity(capacity);
    (file, session)
}

/// Fails on the `fail_at`th frame, counting from zero.
struct FailAt {
    fail_at: usize,
    seen: usize,
    out: Vec<u8>,
}

impl Encoder for FailAt {
    fn samplerate(&self) -> u32 {
        8000
    }

    fn channels(&self) -> u16 {
        2
    }

    fn format(&self) -> Format {
        Format::Other("test".to_owned())
    }

    fn encode(&mut self, frame: &Frame, _max_bytes: usize) -> anyhow::Result<&[u8]> {
        if self.seen == self.fail_at {
            anyhow::bail!("bad frame {}", self.seen);
        }
        self.seen += 1;
        self.out = vec![frame.samples()[0] as u8];
        Ok(&self.out)
    }
}

#[test]
fn delivers_exactly_the_complete_frames() {
    let (_file, session) = session(2);
    let (tx, rx) = mpsc::channel::<Vec<u8>>();

    thread::scope(|s| {
        let consumer = s.spawn(|| session.send_pcm(encoder::Pcm::new, tx));
        let produced = session.load_from(Cursor::new(frames(5))).unwrap();
        session.close().unwrap();
        assert_eq!(produced, 5);
        assert_eq!(consumer.join().unwrap().unwrap(), 5);
    });

    let packets: Vec<Vec<u8>> = rx.iter().collect();
    assert_eq!(packets.len(), 5);
    let expected = frames(5);
    for (i, packet) in packets.iter().enumerate() {
        assert_eq!(packet.as_slice(), &expected[i * 16..(i + 1) * 16]);
    }
}

#[test]
fn trailing_partial_frame_is_dropped() {
    let (_file, session) = session(2);
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let mut data = frames(3);
    data.extend_from_slice(&[1, 2, 3, 4, 5]);

    thread::scope(|s| {
        let consumer = s.spawn(|| session.send_pcm(encoder::Pcm::new, tx));
        assert_eq!(session.load_from(Cursor::new(data)).unwrap(), 3);
        session.close().unwrap();
        assert_eq!(consumer.join().unwrap().unwrap(), 3);
    });

    assert_eq!(rx.iter().count(), 3);
}

#[test]
fn slow_sink_holds_back_the_producer() {
    let (_file, session) = session(2);
    // rendezvous channel: every send waits for a receive
    let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(0);

    thread::scope(|s| {
        let consumer = s.spawn(|| session.send_pcm(encoder::Pcm::new, tx));
        let producer = s.spawn(|| session.load_from(Cursor::new(frames(10))));

        thread::sleep(Duration::from_millis(200));
        assert_eq!(session.buffer().len(), 2);
        assert!(!producer.is_finished());

        for i in 0..10 {
            assert_eq!(rx.recv().unwrap()[0], i as u8);
        }
        assert_eq!(producer.join().unwrap().unwrap(), 10);
        session.close().unwrap();
        assert_eq!(consumer.join().unwrap().unwrap(), 10);
    });
}

#[test]
fn close_releases_idle_consumer() {
    let (_file, session) = session(2);
    let (tx, rx) = mpsc::channel::<Vec<u8>>();

    thread::scope(|s| {
        let consumer = s.spawn(|| session.send_pcm(encoder::Pcm::new, tx));
        thread::sleep(Duration::from_millis(50));
        session.close().unwrap();

        let start = Instant::now();
        while !consumer.is_finished() {
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(consumer.join().unwrap().unwrap(), 0);
    });

    assert_eq!(rx.iter().count(), 0);
    assert_eq!(session.close().unwrap_err().kind(), ErrorKind::AlreadyClosed);
}

#[test]
fn encode_failure_stops_all_later_sends() {
    let (_file, session) = session(2);
    let (tx, rx) = mpsc::channel::<Vec<u8>>();

    thread::scope(|s| {
        let consumer = s.spawn(|| {
            let sent = session.send_pcm(
                |_| {
                    Ok(FailAt {
                        fail_at: 2,
                        seen: 0,
                        out: Vec::new(),
                    })
                },
                tx,
            );
            // owner's job: unblock the producer
            session.close().unwrap();
            sent
        });
        let produced = session.load_from(Cursor::new(frames(10))).unwrap();
        assert!(produced < 10);

        let err = consumer.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
    });

    let packets: Vec<Vec<u8>> = rx.iter().collect();
    assert_eq!(packets, vec![vec![0], vec![1]]);
}

#[test]
fn encoder_init_failure_aborts() {
    let (_file, session) = session(2);
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let err = session
        .send_pcm(
            |_: &EncodeOptions| -> anyhow::Result<encoder::Pcm> { anyhow::bail!("no codec") },
            tx,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncoderInit);
    assert_eq!(rx.iter().count(), 0);
}

#[test]
fn fixed_packet_limit_applies() {
    let (_file, session) = session(2);
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    session.buffer().push(Frame::from(vec![0; 8])).unwrap();
    session.close().unwrap();

    let err = session
        .send_pcm_with_limit(encoder::Pcm::new, tx, PacketLimit::Fixed(8))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encode);
    assert_eq!(rx.iter().count(), 0);
}

#[test]
fn hung_up_sink_ends_consumer() {
    let (_file, session) = session(4);
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    drop(rx);
    session.buffer().push(Frame::from(vec![0; 8])).unwrap();
    session.close().unwrap();

    let err = session.send_pcm(encoder::Pcm::new, tx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SinkClosed);
}

#[test]
fn volume_is_applied_to_frames() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut options = small_options();
    options.volume = 512;
    let session = Session::new(file.path(), options).unwrap();
    let (tx, rx) = mpsc::channel::<Vec<u8>>();

    thread::scope(|s| {
        let consumer = s.spawn(|| session.send_pcm(encoder::Pcm::new, tx));
        session.load_from(Cursor::new(frames(4))).unwrap();
        session.close().unwrap();
        consumer.join().unwrap().unwrap();
    });

    let firsts: Vec<u8> = rx.iter().map(|p| p[0]).collect();
    assert_eq!(firsts, vec![0, 2, 4, 6]);
}

#[cfg(unix)]
mod subprocess {
    use super::*;

    fn with_script(script: &str) -> (tempfile::NamedTempFile, Session) {
        let (file, session) = session(2);
        // extra arguments land in $0, $1, ... and are ignored
        let session = session.with_decoder_args("sh", ["-c", script, "decoder"]);
        (file, session)
    }

    #[test]
    fn play_streams_decoder_output() {
        // 4 whole frames and 6 stray bytes
        let (_file, session) = with_script("head -c 70 /dev/zero");
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        assert_eq!(session.play(encoder::Pcm::new, tx).unwrap(), 4);
        let packets: Vec<Vec<u8>> = rx.iter().collect();
        assert_eq!(packets, vec![vec![0; 16]; 4]);
    }

    #[test]
    fn second_play_is_rejected() {
        let (_file, session) = with_script("head -c 32 /dev/zero");
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        assert_eq!(session.play(encoder::Pcm::new, tx).unwrap(), 2);
        assert_eq!(rx.iter().count(), 2);

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let err = session.play(encoder::Pcm::new, tx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyClosed);
        assert_eq!(rx.iter().count(), 0);
    }

    #[test]
    fn failed_decoder_is_reported() {
        let (_file, session) = with_script("head -c 32 /dev/zero; exit 1");
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let err = session.play(encoder::Pcm::new, tx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessKilled);
        assert_eq!(rx.iter().count(), 2);
    }

    #[test]
    fn play_stops_decoder_after_encode_failure() {
        let (_file, session) = with_script("exec cat /dev/zero");
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let err = session
            .play(
                |_| {
                    Ok(FailAt {
                        fail_at: 3,
                        seen: 0,
                        out: Vec::new(),
                    })
                },
                tx,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        assert_eq!(rx.iter().count(), 3);
    }

    #[test]
    fn kill_decoder_stops_a_stalled_stream() {
        let (_file, session) = with_script("exec sleep 30");
        let (tx, _rx) = mpsc::channel::<Vec<u8>>();

        thread::scope(|s| {
            let player = s.spawn(|| session.play(encoder::Pcm::new, tx));
            let start = Instant::now();
            while !player.is_finished() {
                assert!(start.elapsed() < Duration::from_secs(10));
                session.kill_decoder().unwrap();
                thread::sleep(Duration::from_millis(20));
            }
            let err = player.join().unwrap().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ProcessKilled);
        });
    }
}
