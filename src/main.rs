use std::io::Write;
use std::time::Duration;

use clap::clap_app;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipecast::{encoder, sink, EncodeOptions, Encoder, Session, Sink};

fn main() {
    // logs go to stderr, stdout may be carrying packets
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipecast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let matches = clap_app!(
        pipecast =>
            (@subcommand play =>
             (@arg CONFIG: -c --config +takes_value "encode options yaml")
             (@arg DECODER: -d --decoder +takes_value "decoder binary (default ffmpeg)")
             (@arg OUTPUT: -o --output +takes_value "write packets here instead of stdout")
             (@arg CODEC: --codec +takes_value "encoder to use, pcm or opus")
             (@arg REALTIME: -r --realtime "send packets at playback speed")
             (@arg PREFIXED: --prefixed "prefix each packet with its length")
             (@arg INPUT: +required "audio file to stream")
            )
            (@subcommand args =>
             (@arg CONFIG: -c --config +takes_value "encode options yaml")
             (@arg DECODER: -d --decoder +takes_value "decoder binary (default ffmpeg)")
             (@arg INPUT: +required "audio file to stream")
            )
    )
    .get_matches();

    if let Some(matches) = matches.subcommand_matches("play") {
        let session = open_session(matches)?;
        let codec = matches.value_of("CODEC").unwrap_or("pcm").to_owned();
        let frame_duration = session
            .options()
            .map(|o| o.frame_duration)
            .unwrap_or_default();

        let output: Box<dyn Write + Send> = match matches.value_of("OUTPUT") {
            Some(path) => Box::new(std::fs::File::create(path)?),
            None => Box::new(std::io::stdout()),
        };
        let stream = if matches.is_present("PREFIXED") {
            sink::Stream::length_prefixed(output)
        } else {
            sink::Stream::new(output)
        };
        let sink: Box<dyn Sink + Send> = if matches.is_present("REALTIME") {
            Box::new(stream.realtime(Duration::from_millis(frame_duration as u64)))
        } else {
            Box::new(stream)
        };

        let sent = session.play(move |options| new_encoder(&codec, options), sink)?;
        info!(file = session.name(), packets = sent, "stream finished");
    }

    if let Some(matches) = matches.subcommand_matches("args") {
        let session = open_session(matches)?;
        println!("{}", session.command()?);
    }

    Ok(())
}

fn open_session(matches: &clap::ArgMatches) -> anyhow::Result<Session> {
    let input = matches
        .value_of("INPUT")
        .ok_or_else(|| anyhow::anyhow!("no input file given"))?;
    let options = match matches.value_of("CONFIG") {
        Some(path) => EncodeOptions::open(path)?,
        None => EncodeOptions::default(),
    };
    let mut session = Session::new(input, options)?;
    if let Some(decoder) = matches.value_of("DECODER") {
        session = session.with_decoder(decoder);
    }
    Ok(session)
}

fn new_encoder(codec: &str, options: &EncodeOptions) -> anyhow::Result<Box<dyn Encoder>> {
    match codec {
        "pcm" => Ok(Box::new(encoder::Pcm::new(options)?)),
        #[cfg(feature = "opus")]
        "opus" => Ok(Box::new(encoder::Opus::new(options)?)),
        other => anyhow::bail!("unsupported codec {:?}", other),
    }
}
