#![allow(dead_code)]

//! Fixtures shared by the integration tests: test tones and in-memory Ogg Opus files.

use std::io::{self, Read};

use opusbind::{Application, Encoder, MAX_ENCODED_FRAME_SIZE};

const PAGE_HEADER_SIZE: usize = 27;
const HEADER_TYPE_FRESH: u8 = 0x00;
const HEADER_TYPE_BOS: u8 = 0x02;
const HEADER_TYPE_EOS: u8 = 0x04;
const SERIAL: u32 = 0x5eed;

/// Interleaved 16-bit sine, the same tone on every channel.
pub fn sine_i16(frames: usize, channels: usize, freq: f32, sample_rate: u32) -> Vec<i16> {
    sine_f32(frames, channels, freq, sample_rate)
        .into_iter()
        .map(|s| (s * i16::MAX as f32) as i16)
        .collect()
}

/// Interleaved `f32` sine at half scale.
pub fn sine_f32(frames: usize, channels: usize, freq: f32, sample_rate: u32) -> Vec<f32> {
    let mut out = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let s = 0.5 * (2.0 * std::f32::consts::PI * freq * t).sin();
        for _ in 0..channels {
            out.push(s);
        }
    }
    out
}

/// Encode `frames` frames of 20 ms 48 kHz sine into an in-memory Ogg Opus file.
pub fn ogg_opus_tone(channels: usize, frames: usize) -> Vec<u8> {
    const FRAME_SIZE: usize = 960;

    let mut enc = Encoder::new(48_000, channels, Application::Audio).expect("encoder");
    let pcm = sine_i16(FRAME_SIZE * frames, channels, 440.0, 48_000);

    let mut packets = Vec::with_capacity(frames);
    let mut buf = vec![0u8; MAX_ENCODED_FRAME_SIZE];
    for frame in pcm.chunks(FRAME_SIZE * channels) {
        let n = enc.encode(frame, &mut buf).expect("encode");
        packets.push(buf[..n].to_vec());
    }
    ogg_opus_file(channels as u8, &packets, FRAME_SIZE as u64)
}

/// Wrap Opus packets, one per page, in an Ogg Opus stream with zero pre-skip.
pub fn ogg_opus_file(channels: u8, packets: &[Vec<u8>], samples_per_packet: u64) -> Vec<u8> {
    let table = checksum_table();
    let mut out = Vec::new();
    let mut sequence = 0u32;

    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1);
    head.push(channels);
    head.extend_from_slice(&0u16.to_le_bytes()); // pre-skip
    head.extend_from_slice(&48_000u32.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes()); // output gain
    head.push(0); // mapping family
    out.extend(page(&table, &head, HEADER_TYPE_BOS, 0, sequence));
    sequence += 1;

    let mut tags = Vec::new();
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&8u32.to_le_bytes());
    tags.extend_from_slice(b"opusbind");
    tags.extend_from_slice(&0u32.to_le_bytes());
    out.extend(page(&table, &tags, HEADER_TYPE_FRESH, 0, sequence));
    sequence += 1;

    let mut granule = 0u64;
    for (i, packet) in packets.iter().enumerate() {
        granule += samples_per_packet;
        let header_type = if i + 1 == packets.len() {
            HEADER_TYPE_EOS
        } else {
            HEADER_TYPE_FRESH
        };
        out.extend(page(&table, packet, header_type, granule, sequence));
        sequence += 1;
    }
    out
}

fn page(table: &[u32; 256], payload: &[u8], header_type: u8, granule: u64, sequence: u32) -> Vec<u8> {
    let segments = payload.len() / 255 + 1;
    assert!(segments <= 255, "packet too large for a single page");

    let mut page = vec![0u8; PAGE_HEADER_SIZE + segments + payload.len()];
    page[..4].copy_from_slice(b"OggS");
    page[5] = header_type;
    page[6..14].copy_from_slice(&granule.to_le_bytes());
    page[14..18].copy_from_slice(&SERIAL.to_le_bytes());
    page[18..22].copy_from_slice(&sequence.to_le_bytes());
    page[26] = segments as u8;
    for i in 0..segments - 1 {
        page[PAGE_HEADER_SIZE + i] = 255;
    }
    page[PAGE_HEADER_SIZE + segments - 1] = (payload.len() % 255) as u8;
    page[PAGE_HEADER_SIZE + segments..].copy_from_slice(payload);

    let mut crc = 0u32;
    for &b in &page {
        crc = (crc << 8) ^ table[((crc >> 24) as u8 ^ b) as usize];
    }
    page[22..26].copy_from_slice(&crc.to_le_bytes());
    page
}

fn checksum_table() -> [u32; 256] {
    const POLY: u32 = 0x04c1_1db7;
    let mut table = [0u32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut r = (i as u32) << 24;
        for _ in 0..8 {
            r = if r & 0x8000_0000 != 0 { (r << 1) ^ POLY } else { r << 1 };
        }
        *slot = r;
    }
    table
}

/// A reader that never returns more than `max` bytes per call.
pub struct Trickle<R> {
    pub inner: R,
    pub max: usize,
}

impl<R: Read> Read for Trickle<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.max);
        self.inner.read(&mut buf[..n])
    }
}
