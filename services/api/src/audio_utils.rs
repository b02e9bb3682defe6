use base64::Engine;
use tutoria_core::session::Codec;

// Sample rates of the realtime audio formats each codec maps to.
pub const PCM16_SAMPLE_RATE: u32 = 24000;
pub const G711_SAMPLE_RATE: u32 = 8000;

/// Sample rate the presentation client must capture and play at.
pub fn sample_rate(codec: Codec) -> u32 {
    match codec {
        Codec::Opus => PCM16_SAMPLE_RATE,
        Codec::Pcmu | Codec::Pcma => G711_SAMPLE_RATE,
    }
}

/// Bytes per sample on the wire: PCM16 is two bytes, G.711 one.
pub fn bytes_per_sample(codec: Codec) -> usize {
    match codec {
        Codec::Opus => 2,
        Codec::Pcmu | Codec::Pcma => 1,
    }
}

/// Duration in milliseconds of a raw audio frame.
pub fn frame_duration_ms(len: usize, codec: Codec) -> u64 {
    let samples = (len / bytes_per_sample(codec)) as u64;
    samples * 1000 / sample_rate(codec) as u64
}

/// Encodes a raw microphone frame for `input_audio_buffer.append`.
pub fn encode_frame(frame: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(frame)
}
