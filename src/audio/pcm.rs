//! PCM sample conversion and transport encoding.
//!
//! The live session speaks little-endian 16-bit PCM wrapped in base64:
//! 16 kHz mono on the way up (microphone), 24 kHz mono on the way down
//! (model speech).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Sample rate of outbound microphone audio.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of inbound model audio.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// MIME descriptor attached to every outbound chunk.
pub const CAPTURE_MIME: &str = "audio/pcm;rate=16000";

/// Root-mean-square level of a frame, for UI volume feedback.
///
/// Returns 0.0 for an empty or silent frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = frame.iter().map(|s| s * s).sum();
    (sum_sq / frame.len() as f32).sqrt()
}

/// Encode f32 samples in [-1, 1] as base64-wrapped little-endian i16 PCM.
///
/// Conversion multiplies by 32768 and truncates toward zero, saturating
/// at the i16 bounds.
pub fn encode_chunk(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let pcm = (s * 32768.0) as i16;
        bytes.extend_from_slice(&pcm.to_le_bytes());
    }
    BASE64.encode(&bytes)
}

/// Decode a base64-wrapped little-endian i16 PCM chunk into f32 samples.
///
/// Fails on invalid base64 or an odd byte count; the caller drops the
/// chunk and keeps the session going.
pub fn decode_chunk(data: &str) -> anyhow::Result<Vec<f32>> {
    let bytes = BASE64
        .decode(data)
        .map_err(|e| anyhow::anyhow!("invalid base64 audio chunk: {e}"))?;
    if bytes.len() % 2 != 0 {
        anyhow::bail!("PCM chunk has odd byte count: {}", bytes.len());
    }
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_is_zero_for_silence() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0; 4096]), 0.0);
    }

    #[test]
    fn rms_is_nonnegative_and_scales() {
        let quiet = rms(&[0.1, -0.1, 0.1, -0.1]);
        let loud = rms(&[0.8, -0.8, 0.8, -0.8]);
        assert!(quiet > 0.0);
        assert!(loud > quiet);
        assert!((loud - 0.8).abs() < 1e-6);
    }

    #[test]
    fn encode_saturates_at_i16_bounds() {
        let encoded = encode_chunk(&[1.0, -1.0]);
        let bytes = BASE64.decode(encoded).unwrap();
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MIN);
    }

    #[test]
    fn chunk_round_trip_preserves_samples() {
        let samples: Vec<f32> = (0..256).map(|i| (i as f32 / 256.0) - 0.5).collect();
        let decoded = decode_chunk(&encode_chunk(&samples)).unwrap();
        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(&decoded) {
            assert!((a - b).abs() < 1.0 / 32768.0);
        }
    }

    #[test]
    fn base64_round_trip_preserves_bytes() {
        let bytes: Vec<u8> = (0..=255).collect();
        let encoded = BASE64.encode(&bytes);
        assert_eq!(BASE64.decode(encoded).unwrap(), bytes);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_chunk("not base64!!!").is_err());
        // 3 bytes decodes fine as base64 but is not whole i16 samples
        let odd = BASE64.encode([1u8, 2, 3]);
        assert!(decode_chunk(&odd).is_err());
    }
}
