//! Helpers shared by multiple examples.

use std::path::Path;

use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Reads a 16-bit PCM WAV file as interleaved samples.
pub(crate) fn read_wav(path: &Path) -> Result<(WavSpec, Vec<i16>)> {
    let reader =
        WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!("{} is not 16-bit PCM", path.display());
    }
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("reading {}", path.display()))?;
    Ok((spec, samples))
}

/// Writes interleaved 16-bit PCM samples.
pub(crate) fn write_wav(path: &Path, spec: WavSpec, samples: &[i16]) -> Result<()> {
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}
