use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use opusbind::logging;
use opusbind::{
    Decoder, Encoder, EncoderOpts, MAX_ENCODED_FRAME_SIZE, STREAM_SAMPLE_RATE, Stream, version,
};

fn main() -> Result<()> {
    logging::init();
    let params = Params::parse();

    match params.command {
        Command::Decode {
            input,
            output,
            channels,
            float,
            chunk,
        } => decode(&input, &output, channels, float, chunk),
        Command::Roundtrip {
            input,
            output,
            config,
            frame_ms,
            drop_every,
            fec,
        } => {
            let opts = load_opts(config.as_deref())?;
            let stats = roundtrip(&input, &output, opts, frame_ms, drop_every, fec)?;
            serde_json::to_writer_pretty(io::stdout().lock(), &stats)?;
            println!();
            Ok(())
        }
        Command::Version => {
            println!("{}", version());
            Ok(())
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "opus-cli")]
#[command(about = "Encode, decode and stream Opus audio")]
struct Params {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode an Ogg Opus file to a 48 kHz WAV file.
    Decode {
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Channel count of the input stream.
        #[arg(short = 'c', long = "channels", default_value_t = 2)]
        channels: u16,

        /// Write 32-bit float samples instead of 16-bit integers.
        #[arg(long = "float", default_value_t = false)]
        float: bool,

        /// Samples per channel requested from the decoder per read.
        #[arg(long = "chunk", default_value_t = 5_760)]
        chunk: usize,
    },

    /// Encode a WAV file frame by frame and decode it again, optionally simulating packet loss.
    Roundtrip {
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// JSON file with encoder options. Sample rate and channels come from the input file.
        #[arg(long = "config")]
        config: Option<PathBuf>,

        #[arg(long = "frame-ms", default_value_t = 20)]
        frame_ms: u32,

        /// Drop every Nth packet. 0 keeps every packet.
        #[arg(long = "drop-every", default_value_t = 0)]
        drop_every: usize,

        /// Recover dropped packets from in-band FEC instead of concealment.
        #[arg(long = "fec", default_value_t = false)]
        fec: bool,
    },

    /// Print the libopus version.
    Version,
}

fn load_opts(path: Option<&Path>) -> Result<EncoderOpts> {
    let Some(path) = path else {
        return Ok(EncoderOpts::default());
    };
    let file = File::open(path).with_context(|| format!("failed to open config {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse config {}", path.display()))
}

fn decode(input: &Path, output: &Path, channels: u16, float: bool, chunk: usize) -> Result<()> {
    if channels == 0 || channels > 2 {
        bail!("channels must be 1 or 2, got {channels}");
    }
    if chunk == 0 {
        bail!("chunk must be greater than zero");
    }

    let file = File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let mut stream = Stream::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not an Ogg Opus stream", input.display()))?;

    let spec = hound::WavSpec {
        channels,
        sample_rate: STREAM_SAMPLE_RATE,
        bits_per_sample: if float { 32 } else { 16 },
        sample_format: if float {
            hound::SampleFormat::Float
        } else {
            hound::SampleFormat::Int
        },
    };
    let mut writer = hound::WavWriter::new(BufWriter::new(File::create(output)?), spec)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let channels = channels as usize;
    if float {
        let mut pcm = vec![0f32; chunk * channels];
        while let Some(n) = stream.read_float(&mut pcm)? {
            for &s in &pcm[..n * channels] {
                writer.write_sample(s)?;
            }
        }
    } else {
        let mut pcm = vec![0i16; chunk * channels];
        while let Some(n) = stream.read(&mut pcm)? {
            for &s in &pcm[..n * channels] {
                writer.write_sample(s)?;
            }
        }
    }

    stream.close()?;
    writer.finalize()?;
    Ok(())
}

/// Summary printed after a round trip.
#[derive(Debug, Serialize)]
struct RoundtripStats {
    sample_rate: u32,
    channels: usize,
    frame_size: usize,
    frames: usize,
    dropped: usize,
    recovered_with_fec: usize,
    concealed: usize,
    encoded_bytes: usize,
    average_bitrate: u64,
}

fn roundtrip(
    input: &Path,
    output: &Path,
    mut opts: EncoderOpts,
    frame_ms: u32,
    drop_every: usize,
    fec: bool,
) -> Result<RoundtripStats> {
    let mut reader = hound::WavReader::open(input)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!("input must be 16-bit integer PCM");
    }
    let samples: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;

    opts.sample_rate = spec.sample_rate;
    opts.channels = spec.channels as usize;
    if fec {
        opts.inband_fec = Some(true);
        opts.packet_loss_perc.get_or_insert(20);
    }
    let mut encoder = Encoder::from_opts(&opts).context("failed to configure encoder")?;
    let mut decoder = Decoder::new(opts.sample_rate, opts.channels)?;

    let channels = opts.channels;
    let frame_size = (opts.sample_rate * frame_ms / 1000) as usize;
    let frame_len = frame_size * channels;
    if frame_len == 0 {
        bail!("frame of {frame_ms} ms is empty at {} Hz", opts.sample_rate);
    }

    let mut packets = Vec::new();
    let mut encoded_bytes = 0;
    let mut frame = vec![0i16; frame_len];
    let mut packet = vec![0u8; MAX_ENCODED_FRAME_SIZE];
    for chunk in samples.chunks(frame_len) {
        frame[..chunk.len()].copy_from_slice(chunk);
        frame[chunk.len()..].fill(0);
        let n = encoder.encode(&frame, &mut packet)?;
        encoded_bytes += n;
        packets.push(packet[..n].to_vec());
    }

    let out_spec = hound::WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(BufWriter::new(File::create(output)?), out_spec)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let mut stats = RoundtripStats {
        sample_rate: opts.sample_rate,
        channels,
        frame_size,
        frames: packets.len(),
        dropped: 0,
        recovered_with_fec: 0,
        concealed: 0,
        encoded_bytes,
        average_bitrate: 0,
    };

    let mut pcm = vec![0i16; frame_len];
    for (i, packet) in packets.iter().enumerate() {
        let lost = drop_every > 0 && (i + 1) % drop_every == 0;
        if !lost {
            decoder.decode(packet, &mut pcm)?;
        } else {
            stats.dropped += 1;
            match packets.get(i + 1) {
                Some(next) if fec => {
                    decoder.decode_fec(next, &mut pcm)?;
                    stats.recovered_with_fec += 1;
                }
                _ => match decoder.decode_plc(&mut pcm) {
                    Ok(()) => stats.concealed += 1,
                    Err(e) if e.usage() == Some(opusbind::Usage::NoDecoderHistory) => pcm.fill(0),
                    Err(e) => return Err(e.into()),
                },
            }
        }
        for &s in &pcm {
            writer.write_sample(s)?;
        }
    }
    writer.finalize()?;

    let seconds = (stats.frames * frame_size) as f64 / opts.sample_rate as f64;
    if seconds > 0.0 {
        stats.average_bitrate = (encoded_bytes as f64 * 8.0 / seconds) as u64;
    }
    Ok(stats)
}
