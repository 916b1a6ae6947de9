//! Text output for `--info`

use std::io::{self, Write};

use sndstrm_core::WaveFileInfo;

pub(crate) fn write_details<W: Write>(out: &mut W, info: &WaveFileInfo) -> io::Result<()> {
    let format = info.format();
    let data = info.data();

    writeln!(out, "{info}")?;
    writeln!(
        out,
        "format: tag={} block_align={} avg_bytes_per_sec={}",
        format.format_tag, format.block_align, format.avg_bytes_per_sec
    )?;
    writeln!(
        out,
        "data: {} bytes at {}..{} ({} frames)",
        data.size,
        data.start,
        data.end,
        info.frame_count()
    )?;
    writeln!(out, "play time: {:.3}s", info.play_time().as_secs_f64())?;

    writeln!(out, "chunks:")?;
    for chunk in info.chunks() {
        writeln!(out, "  {chunk}")?;
    }

    if let Some(sampler) = info.sampler() {
        writeln!(
            out,
            "sampler: unity_note={} period={}ns loops={}",
            sampler.midi_unity_note, sampler.sample_period_ns, sampler.loop_count
        )?;
    }
    for (i, record) in info.loops().iter().enumerate() {
        let plays = if record.is_infinite() {
            "forever".to_string()
        } else {
            format!("{}x", record.play_count)
        };
        writeln!(
            out,
            "  loop {i}: samples {}..{} type={} plays={plays}",
            record.start_sample, record.end_sample, record.loop_type
        )?;
    }
    if let Some(range) = info.loop_range() {
        writeln!(out, "active loop bytes: {}..{}", range.start, range.end)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use sndstrm_core::test_support::{pcm_wave, WaveBuilder};
    use sndstrm_core::{parse_wave, PcmFormat};

    fn render(bytes: Vec<u8>) -> String {
        let info = parse_wave(&mut Cursor::new(bytes)).unwrap();
        let mut out = Vec::new();
        write_details(&mut out, &info).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn plain_file_has_no_loop_lines() {
        let text = render(pcm_wave(&PcmFormat::new(2, 44_100, 16), &[0; 8]));

        assert!(text.starts_with("16[bit] 44100[Hz] 2[ch] Loop=false\n"));
        assert!(text.contains("data: 8 bytes at 44..52 (2 frames)"));
        assert!(text.contains("  \"fmt \" (16 bytes)"));
        assert!(!text.contains("loop 0"));
        assert!(!text.contains("active loop"));
    }

    #[test]
    fn looping_file_lists_records() {
        let bytes = WaveBuilder::new()
            .fmt(&PcmFormat::new(1, 8_000, 8))
            .data(&[0; 16])
            .smpl(&[(2, 10), (4, 6)])
            .build();
        let text = render(bytes);

        assert!(text.contains("Loop=true"));
        assert!(text.contains("  loop 0: samples 2..10 type=0 plays=forever"));
        assert!(text.contains("  loop 1: samples 4..6"));
        assert!(text.contains("active loop bytes: 46..54"));
        assert!(text.contains("play time: 0.002s"));
    }
}
