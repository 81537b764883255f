//! Sample format conversions between `[-1, 1]` floats and `i16`.

const S16_TO_FLOAT_SCALING: f32 = 1.0 / 32768.0;

pub(crate) fn s16_to_float(v: i16) -> f32 {
    f32::from(v) * S16_TO_FLOAT_SCALING
}

/// Rounds half away from zero and saturates.
pub(crate) fn float_to_s16(v: f32) -> i16 {
    let v = (v * 32768.0).clamp(-32768.0, 32767.0);
    (v + f32::copysign(0.5, v)) as i16
}

/// Interleaves equally long channels into `dst`.
pub(crate) fn interleave_to_s16(src: &[&[f32]], dst: &mut [i16]) {
    let channels = src.len();
    for (ch, samples) in src.iter().enumerate() {
        for (i, &v) in samples.iter().enumerate() {
            dst[i * channels + ch] = float_to_s16(v);
        }
    }
}

/// Splits interleaved `src` into the channels of `dst`.
pub(crate) fn deinterleave_to_float(src: &[i16], dst: &mut [&mut [f32]]) {
    let channels = dst.len();
    for (ch, samples) in dst.iter_mut().enumerate() {
        for (i, v) in samples.iter_mut().enumerate() {
            *v = s16_to_float(src[i * channels + ch]);
        }
    }
}
