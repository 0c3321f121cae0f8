use crate::Rect;

/// Computes n = a * b, where a and b are powers of two and a >= b.
pub(crate) fn factor_power_of_two(n: usize) -> (usize, usize) {
    let x = n.next_power_of_two().trailing_zeros() as usize;

    (1 << (x - x / 2), 1 << (x / 2))
}

/// Atlas dimensions and the frame cells of a row major power of two grid.
pub(crate) fn layout(nframes: usize, frame_width: u32, frame_height: u32) -> (u32, u32, Vec<Rect>) {
    let (mut cols, mut rows) = factor_power_of_two(nframes);

    // wide frames get the short grid side so the atlas stays near square
    if frame_width > frame_height {
        std::mem::swap(&mut cols, &mut rows);
    }

    let rects = (0..nframes)
        .map(|i| Rect {
            x: (i % cols) as i32 * frame_width as i32,
            y: (i / cols) as i32 * frame_height as i32,
            width: frame_width,
            height: frame_height,
        })
        .collect();

    (cols as u32 * frame_width, rows as u32 * frame_height, rects)
}
