pub fn ensure_capacity<T: Copy + Default>(v: &mut Vec<T>, len: usize) {
    if v.len() != len {
        v.clear();
        v.resize(len, T::default());
    }
}

/// Flat offset into a rank-4 [N, H, W, C] buffer.
#[inline]
pub fn nhwc_offset(
    height: usize,
    width: usize,
    depth: usize,
    n: usize,
    y: usize,
    x: usize,
    c: usize,
) -> usize {
    ((n * height + y) * width + x) * depth + c
}
