use std::borrow::Cow;

use image::{imageops, Rgba, RgbaImage};

use crate::{
    atlas,
    blend::BlendMode,
    types::{Cel, CelImage, Container, Layer},
    Rect,
};

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Composites every frame and packs them onto the atlas grid.
pub(crate) fn render_atlas(
    container: &Container,
    layers: &[Layer],
    cels: &[Vec<Option<Cel>>],
    palette: &[[u8; 4]],
) -> (RgbaImage, Vec<Rect>) {
    let header = &container.header;
    let (atlas_width, atlas_height, rects) =
        atlas::layout(cels.len(), header.width as u32, header.height as u32);

    let mut atlas = RgbaImage::new(atlas_width, atlas_height);

    for (frame_idx, frame_cels) in cels.iter().enumerate() {
        let mut canvas = RgbaImage::new(header.width as u32, header.height as u32);

        composite_frame(
            &mut canvas,
            frame_cels,
            layers,
            palette,
            header.transparent_index,
        );

        let rect = rects[frame_idx];

        imageops::replace(&mut atlas, &canvas, rect.x as i64, rect.y as i64);
    }

    (atlas, rects)
}

/// Paints the frame's cels onto the canvas in layer order, bottom first.
pub(crate) fn composite_frame(
    canvas: &mut RgbaImage,
    cels: &[Option<Cel>],
    layers: &[Layer],
    palette: &[[u8; 4]],
    transparent_index: u8,
) {
    for (layer_idx, cel) in cels.iter().enumerate() {
        let Some(cel) = cel else {
            continue;
        };

        let mode = BlendMode::from_raw(layers[layer_idx].blend_mode).unwrap_or(BlendMode::Normal);

        draw_cel(canvas, cel, mode, palette, transparent_index);
    }
}

fn draw_cel(
    canvas: &mut RgbaImage,
    cel: &Cel,
    mode: BlendMode,
    palette: &[[u8; 4]],
    transparent_index: u8,
) {
    let source = CelSource::new(cel, palette, transparent_index);

    let canvas_width = canvas.width() as i32;
    let canvas_height = canvas.height() as i32;

    for row in 0..cel.bounds.height as i32 {
        let y = cel.bounds.y + row;

        if y < 0 || y >= canvas_height {
            continue;
        }

        for col in 0..cel.bounds.width as i32 {
            let x = cel.bounds.x + col;

            if x < 0 || x >= canvas_width {
                continue;
            }

            let src = source.rgba((row as u32 * cel.bounds.width + col as u32) as usize);
            let dst = canvas.get_pixel(x as u32, y as u32).0;

            let src = if mode == BlendMode::Normal {
                src
            } else {
                blend_source(mode, dst, src)
            };

            canvas.put_pixel(x as u32, y as u32, Rgba(source_over(dst, src, cel.opacity)));
        }
    }
}

/// Blends one source pixel against the accumulated canvas pixel.
pub(crate) fn blend_source(mode: BlendMode, dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    // fully transparent source pixels pass through unblended
    if src[3] == 0 {
        src
    } else {
        mode.blend(dst, src)
    }
}

/// Standard source over compositing with straight alpha, masked by the
/// cel opacity.
fn source_over(dst: [u8; 4], src: [u8; 4], opacity: u8) -> [u8; 4] {
    let sa = (src[3] as u32 * opacity as u32 + 127) / 255;
    let rest = dst[3] as u32 * (255 - sa);
    let denom = sa * 255 + rest;

    if denom == 0 {
        return TRANSPARENT;
    }

    let mut out = [0u8; 4];

    for c in 0..3 {
        let num = src[c] as u32 * sa * 255 + dst[c] as u32 * rest;

        out[c] = ((num + denom / 2) / denom) as u8;
    }

    out[3] = ((denom + 127) / 255) as u8;
    out
}

enum CelSource<'a> {
    Indexed {
        pix: Cow<'a, [u8]>,
        palette: &'a [[u8; 4]],
    },
    Gray16 {
        pix: &'a [u8],
    },
    Rgba {
        pix: &'a [u8],
    },
}

impl<'a> CelSource<'a> {
    fn new(cel: &'a Cel, palette: &'a [[u8; 4]], transparent_index: u8) -> CelSource<'a> {
        match cel.image.as_ref() {
            CelImage::Indexed(pix) => {
                // stale indices can outlive a shrunken palette; they turn
                // transparent instead of reading past the table
                let pix = if pix.iter().any(|&idx| idx as usize >= palette.len()) {
                    Cow::Owned(
                        pix.iter()
                            .map(|&idx| {
                                if idx as usize >= palette.len() {
                                    transparent_index
                                } else {
                                    idx
                                }
                            })
                            .collect(),
                    )
                } else {
                    Cow::Borrowed(pix.as_slice())
                };

                CelSource::Indexed { pix, palette }
            }
            CelImage::Gray16(pix) => CelSource::Gray16 { pix },
            CelImage::Rgba(pix) => CelSource::Rgba { pix },
        }
    }

    fn rgba(&self, idx: usize) -> [u8; 4] {
        match self {
            CelSource::Indexed { pix, palette } => palette
                .get(pix[idx] as usize)
                .copied()
                .unwrap_or(TRANSPARENT),
            CelSource::Gray16 { pix } => {
                let sample = u16::from_be_bytes([pix[2 * idx], pix[2 * idx + 1]]);
                let v = (sample >> 8) as u8;

                [v, v, v, 255]
            }
            CelSource::Rgba { pix } => {
                [pix[4 * idx], pix[4 * idx + 1], pix[4 * idx + 2], pix[4 * idx + 3]]
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::*;
    use crate::types::CelImage;

    #[test]
    fn transparent_source_passes_through_every_mode() {
        let src = [7, 13, 21, 0];
        let dst = [200, 100, 50, 255];

        for raw in 0..19 {
            let mode = BlendMode::from_raw(raw).unwrap();

            assert!(blend_source(mode, dst, src) == src, "mode {raw}");
        }
    }

    #[test]
    fn source_over_opaque_replaces() {
        assert!(source_over([10, 20, 30, 255], [200, 100, 50, 255], 255) == [200, 100, 50, 255]);
    }

    #[test]
    fn source_over_transparent_keeps_destination() {
        let dst = [10, 20, 30, 200];

        assert!(source_over(dst, [99, 99, 99, 0], 255) == dst);
        assert!(source_over(dst, [99, 99, 99, 255], 0) == dst);
    }

    #[test]
    fn source_over_half_mixes() {
        let out = source_over([0, 0, 0, 255], [255, 255, 255, 255], 128);

        // 128/255 of white over black
        assert!(out[3] == 255);
        assert!(out[0] == 128);
    }

    #[test]
    fn out_of_range_indices_turn_transparent() {
        let cel = Cel {
            bounds: Rect {
                x: 0,
                y: 0,
                width: 2,
                height: 1,
            },
            opacity: 255,
            image: Rc::new(CelImage::Indexed(vec![1, 7])),
            data: None,
        };

        // index 7 is past the two entry palette and the transparent index
        // itself is out of range too, so the lookup falls back
        let palette = [[255, 0, 0, 255], [0, 255, 0, 255]];
        let source = CelSource::new(&cel, &palette, 200);

        assert!(source.rgba(0) == [0, 255, 0, 255]);
        assert!(source.rgba(1) == TRANSPARENT);
    }

    #[test]
    fn in_range_indices_borrow_the_raster() {
        let cel = Cel {
            bounds: Rect {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            },
            opacity: 255,
            image: Rc::new(CelImage::Indexed(vec![0])),
            data: None,
        };

        let palette = [[9, 9, 9, 255]];

        match CelSource::new(&cel, &palette, 0) {
            CelSource::Indexed { pix, .. } => assert!(matches!(pix, Cow::Borrowed(_))),
            _ => unreachable!(),
        }
    }

    #[test]
    fn gray16_samples_are_big_endian_and_opaque() {
        let cel = Cel {
            bounds: Rect {
                x: 0,
                y: 0,
                width: 2,
                height: 1,
            },
            opacity: 255,
            image: Rc::new(CelImage::Gray16(vec![0x80, 0x00, 0xFF, 0xFF])),
            data: None,
        };

        let source = CelSource::new(&cel, &[], 0);

        assert!(source.rgba(0) == [0x80, 0x80, 0x80, 255]);
        assert!(source.rgba(1) == [0xFF, 0xFF, 0xFF, 255]);
    }
}
