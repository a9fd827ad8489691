use anyhow::{bail, Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer as DecodedSamples;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::DataSink;
use super::format::AudioFormat;

/// Decode an audio file and append it to `sink` as interleaved 16-bit PCM.
///
/// Returns the format describing the bytes written.
pub fn decode_into(path: &Path, sink: &DataSink) -> Result<AudioFormat> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let declared_channels = track.codec_params.channels.map(|c| c.count());
    let declared_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut total_frames: u64 = 0;
    // (sample rate, channels) of the first decoded buffer
    let mut layout: Option<(u32, usize)> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let (_, channels) = *layout.get_or_insert((spec.rate, spec.channels.count()));
        if spec.channels.count() != channels {
            bail!(
                "Channel count changed mid-stream ({} -> {})",
                channels,
                spec.channels.count()
            );
        }

        let mut sample_buf = DecodedSamples::<i16>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        sink.append_i16(sample_buf.samples())
            .context("Failed to write decoded samples")?;
        total_frames += num_frames as u64;
    }

    let (sample_rate, channels) = match layout {
        Some(layout) => layout,
        None => (
            declared_rate.context("Unknown sample rate")?,
            declared_channels.unwrap_or(1),
        ),
    };
    let audio_format = AudioFormat::new(sample_rate, 16, channels as u16);

    log::info!(
        "Decoded audio: {} frames, {}, {:.1}s",
        total_frames,
        audio_format,
        total_frames as f32 / sample_rate as f32
    );

    Ok(audio_format)
}
