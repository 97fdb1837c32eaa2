/// Area-interpolated resize of a single-channel 8-bit image.
///
/// Each destination pixel is the coverage-weighted mean of the source pixels
/// its footprint spans, so shrinking averages whole blocks and enlarging
/// replicates (blending only across straddled source edges). Output values
/// are unrounded intensities in `[0, 255]`.
pub fn resize_area(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<f32> {
    debug_assert_eq!(src.len(), src_w * src_h, "source length must equal width * height");
    if dst_w == 0 || dst_h == 0 || src_w == 0 || src_h == 0 {
        return vec![0.0; dst_w * dst_h];
    }

    let x_spans = area_spans(src_w, dst_w);
    let y_spans = area_spans(src_h, dst_h);

    // Horizontal pass: src_h rows × dst_w columns.
    let mut rows = vec![0.0f64; src_h * dst_w];
    for sy in 0..src_h {
        let src_row = &src[sy * src_w..(sy + 1) * src_w];
        let out_row = &mut rows[sy * dst_w..(sy + 1) * dst_w];
        for (dx, span) in x_spans.iter().enumerate() {
            out_row[dx] = span.iter().map(|&(sx, w)| src_row[sx] as f64 * w).sum();
        }
    }

    let mut out = Vec::with_capacity(dst_w * dst_h);
    for span in &y_spans {
        for dx in 0..dst_w {
            let v: f64 = span.iter().map(|&(sy, w)| rows[sy * dst_w + dx] * w).sum();
            out.push(v.clamp(0.0, 255.0) as f32);
        }
    }
    out
}

/// For each destination index, the source indices it covers and their
/// normalized weights (weights of one span sum to 1).
fn area_spans(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f64)>> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = ((d + 1) as f64 * scale).min(src_len as f64);
            let mut span = Vec::new();
            let mut s = start.floor() as usize;
            while s < src_len && (s as f64) < end {
                let lo = start.max(s as f64);
                let hi = end.min((s + 1) as f64);
                if hi > lo {
                    span.push((s, hi - lo));
                }
                s += 1;
            }
            let total: f64 = span.iter().map(|&(_, w)| w).sum();
            if total > 0.0 {
                for entry in &mut span {
                    entry.1 /= total;
                }
            }
            span
        })
        .collect()
}
