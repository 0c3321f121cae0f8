use std::{ffi::OsStr, path::Path, rc::Rc, time::Duration};

use miniz_oxide::inflate::decompress_to_vec_zlib;

use crate::{
    atlas, composite,
    error::AseError,
    parser,
    types::{
        Cel, CelImage, CelRecord, Chunk, ChunkKind, ColorDepth, Container, Layer, RawFrame,
        UserData,
    },
    Ase, AseFrame, AseInfo, Rect, Slice, Tag,
};

pub(crate) const HEADER_MAGIC: u16 = 0xA5E0;
pub(crate) const FRAME_MAGIC: u16 = 0xF1FA;

const HEADER_LEN: usize = 128;

const OPAQUE_BLACK: [u8; 4] = [0, 0, 0, 255];
const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

impl Ase {
    /// Decodes a sprite file into its atlas and animation metadata.
    pub fn open_from_bytes(i: &[u8]) -> Result<Ase, AseError> {
        let container = read_container(i)?;
        let palette = build_palette(&container)?;
        let layers = build_layers(&container)?;
        let cels = build_cels(&container, &layers)?;
        let tags = build_tags(&container)?;
        let slices = build_slices(&container)?;

        let (atlas, rects) = composite::render_atlas(&container, &layers, &cels, &palette);

        let frames = container
            .frames
            .iter()
            .zip(&rects)
            .zip(&cels)
            .map(|((frame, rect), frame_cels)| AseFrame {
                bounds: *rect,
                duration: Duration::from_millis(frame.duration_ms as u64),
                data: frame_cels
                    .iter()
                    .flatten()
                    .filter_map(|cel| cel.data.clone())
                    .filter(|data| !data.is_empty())
                    .collect(),
            })
            .collect();

        let layer_data = layers
            .iter()
            .filter(|layer| layer.is_visible())
            .filter_map(|layer| layer.data.clone())
            .filter(|data| !data.is_empty())
            .collect();

        Ok(Ase {
            atlas,
            frames,
            tags,
            slices,
            layer_data,
            color_model: container.depth.color_model(),
        })
    }

    pub fn open_from_file(path: impl AsRef<OsStr> + AsRef<Path>) -> Result<Ase, AseError> {
        let file = std::fs::read(path)?;

        Self::open_from_bytes(&file)
    }

    /// Reads the color model and final atlas dimensions from the header
    /// alone, without decoding any pixel data.
    pub fn probe_from_bytes(i: &[u8]) -> Result<AseInfo, AseError> {
        let (_, (_, magic, frames, width, height, depth)) =
            parser::parse_header_prefix(i).map_err(|_| AseError::Truncated)?;

        if magic != HEADER_MAGIC {
            return Err(AseError::InvalidMagic { magic });
        }

        let depth =
            ColorDepth::from_raw(depth).ok_or(AseError::UnsupportedColorDepth { depth })?;

        let (width, height, _) = atlas::layout(frames as usize, width as u32, height as u32);

        Ok(AseInfo {
            color_model: depth.color_model(),
            width,
            height,
        })
    }

    pub fn probe_from_file(path: impl AsRef<OsStr> + AsRef<Path>) -> Result<AseInfo, AseError> {
        let file = std::fs::read(path)?;

        Self::probe_from_bytes(&file)
    }
}

pub(crate) fn read_container(i: &[u8]) -> Result<Container<'_>, AseError> {
    let (_, header) = parser::parse_header(i).map_err(|_| AseError::Truncated)?;

    if header.magic != HEADER_MAGIC {
        return Err(AseError::InvalidMagic {
            magic: header.magic,
        });
    }

    if header.pixel_width != header.pixel_height {
        return Err(AseError::UnsupportedAspectRatio {
            width: header.pixel_width,
            height: header.pixel_height,
        });
    }

    let depth = ColorDepth::from_raw(header.depth).ok_or(AseError::UnsupportedColorDepth {
        depth: header.depth,
    })?;

    // the header declares the total file size; everything past it is ignored
    let total = header.size as usize;

    if total < HEADER_LEN || i.len() < total {
        return Err(AseError::Truncated);
    }

    let mut body = &i[HEADER_LEN..total];
    let mut frames = Vec::with_capacity(header.frames as usize);

    while !body.is_empty() {
        let (rest, frame) = read_frame(body)?;

        frames.push(frame);
        body = rest;
    }

    Ok(Container {
        header,
        depth,
        frames,
    })
}

fn read_frame(i: &[u8]) -> Result<(&[u8], RawFrame<'_>), AseError> {
    let (i, header) = parser::parse_frame_header(i).map_err(|_| AseError::Truncated)?;

    if header.magic != FRAME_MAGIC {
        return Err(AseError::InvalidMagic {
            magic: header.magic,
        });
    }

    // the 32 bit count supersedes the legacy 16 bit one when set
    let nchunks = if header.new_chunks != 0 {
        header.new_chunks as usize
    } else {
        header.old_chunks as usize
    };

    let mut chunks = Vec::new();
    let mut i = i;

    for _ in 0..nchunks {
        let (rest, chunk) = parser::parse_chunk(i).map_err(|_| AseError::Truncated)?;

        chunks.push(chunk);
        i = rest;
    }

    Ok((
        i,
        RawFrame {
            duration_ms: header.duration_ms,
            chunks,
        },
    ))
}

pub(crate) fn build_palette(container: &Container) -> Result<Vec<[u8; 4]>, AseError> {
    let header = &container.header;
    let mut palette = vec![OPAQUE_BLACK; header.ncolors as usize];

    if let Some(entry) = palette.get_mut(header.transparent_index as usize) {
        *entry = TRANSPARENT;
    }

    let Some(frame) = container.frames.first() else {
        return Ok(palette);
    };

    if let Some(chunk) = frame.chunks.iter().find(|c| c.kind == ChunkKind::Palette) {
        let (_, run) = parser::parse_palette(chunk.raw).map_err(|_| AseError::Truncated)?;

        for (offset, color) in run.colors.into_iter().enumerate() {
            if let Some(entry) = palette.get_mut(run.first as usize + offset) {
                *entry = color;
            }
        }
    } else if let Some(chunk) = frame
        .chunks
        .iter()
        .find(|c| matches!(c.kind, ChunkKind::OldPalette | ChunkKind::OldPalette6))
    {
        let (_, packets) = parser::parse_old_palette(chunk.raw).map_err(|_| AseError::Truncated)?;
        let six_bit = chunk.kind == ChunkKind::OldPalette6;

        let mut index = 0usize;

        for packet in packets {
            index += packet.skip as usize;

            for [r, g, b] in packet.colors {
                let color = if six_bit {
                    [r << 2, g << 2, b << 2, 255]
                } else {
                    [r, g, b, 255]
                };

                if let Some(entry) = palette.get_mut(index) {
                    *entry = color;
                }

                index += 1;
            }
        }
    }

    // the transparent entry always wins over palette chunk contents
    if header.flags & 1 != 0 {
        if let Some(entry) = palette.get_mut(header.transparent_index as usize) {
            *entry = TRANSPARENT;
        }
    }

    Ok(palette)
}

pub(crate) fn build_layers(container: &Container) -> Result<Vec<Layer>, AseError> {
    let mut layers = Vec::new();

    let Some(frame) = container.frames.first() else {
        return Ok(layers);
    };

    for (idx, chunk) in frame.chunks.iter().enumerate() {
        if chunk.kind != ChunkKind::Layer {
            continue;
        }

        let (_, record) = parser::parse_layer(chunk.raw).map_err(|_| AseError::Truncated)?;

        if record.kind == 2 {
            return Err(AseError::UnsupportedLayerKind { kind: record.kind });
        }

        let data = next_user_data(&frame.chunks, idx)?.and_then(|ud| ud.text);

        layers.push(Layer {
            flags: record.flags,
            blend_mode: record.blend_mode,
            opacity: record.opacity,
            data,
        });
    }

    Ok(layers)
}

pub(crate) fn build_cels(
    container: &Container,
    layers: &[Layer],
) -> Result<Vec<Vec<Option<Cel>>>, AseError> {
    let mut frames: Vec<Vec<Option<Cel>>> = container
        .frames
        .iter()
        .map(|_| (0..layers.len()).map(|_| None).collect())
        .collect();

    for (frame_idx, frame) in container.frames.iter().enumerate() {
        for (chunk_idx, chunk) in frame.chunks.iter().enumerate() {
            if chunk.kind != ChunkKind::Cel {
                continue;
            }

            let (_, record) = parser::parse_cel(chunk.raw).map_err(|_| AseError::Truncated)?;
            let layer_idx = record.layer as usize;

            let Some(layer) = layers.get(layer_idx) else {
                continue;
            };

            if !layer.is_visible() || layer.is_reference() {
                continue;
            }

            let opacity = ((record.opacity as u32 * layer.opacity as u32) / 255) as u8;

            let mut cel = match record.kind {
                0 => decode_raw_cel(container.depth, &record, opacity)?,
                1 => {
                    let (_, source) =
                        parser::parse_cel_link(record.body).map_err(|_| AseError::Truncated)?;

                    // share the earlier raster, never re-read pixels
                    match frames
                        .get(source as usize)
                        .and_then(|cels| cels[layer_idx].clone())
                    {
                        Some(cel) => cel,
                        None => continue,
                    }
                }
                2 => decode_compressed_cel(container.depth, &record, opacity)?,
                kind => return Err(AseError::UnsupportedCelKind { kind }),
            };

            if let Some(ud) = next_user_data(&frame.chunks, chunk_idx)? {
                cel.data = ud.text;
            }

            frames[frame_idx][layer_idx] = Some(cel);
        }
    }

    Ok(frames)
}

fn decode_raw_cel(depth: ColorDepth, record: &CelRecord, opacity: u8) -> Result<Cel, AseError> {
    let (_, (width, height, pix)) = parser::parse_cel_pixels(record.body, depth.bytes_per_pixel())
        .map_err(|_| AseError::Truncated)?;

    Ok(make_cel(depth, record, opacity, width, height, pix.to_vec()))
}

fn decode_compressed_cel(
    depth: ColorDepth,
    record: &CelRecord,
    opacity: u8,
) -> Result<Cel, AseError> {
    let (stream, (width, height)) =
        parser::parse_cel_size(record.body).map_err(|_| AseError::Truncated)?;

    let pix = decompress_to_vec_zlib(stream).map_err(|err| AseError::Decompression {
        reason: err.to_string(),
    })?;

    let expected = width as usize * height as usize * depth.bytes_per_pixel();

    if pix.len() != expected {
        return Err(AseError::Decompression {
            reason: format!("expected {expected} pixel bytes, got {}", pix.len()),
        });
    }

    Ok(make_cel(depth, record, opacity, width, height, pix))
}

fn make_cel(
    depth: ColorDepth,
    record: &CelRecord,
    opacity: u8,
    width: u16,
    height: u16,
    pix: Vec<u8>,
) -> Cel {
    Cel {
        bounds: Rect {
            x: record.x as i32,
            y: record.y as i32,
            width: width as u32,
            height: height as u32,
        },
        opacity,
        image: Rc::new(CelImage::from_pixels(depth, pix)),
        data: None,
    }
}

pub(crate) fn build_tags(container: &Container) -> Result<Vec<Tag>, AseError> {
    let Some(frame) = container.frames.first() else {
        return Ok(Vec::new());
    };

    match frame.chunks.iter().find(|c| c.kind == ChunkKind::Tags) {
        Some(chunk) => {
            let (_, tags) = parser::parse_tags(chunk.raw).map_err(|_| AseError::Truncated)?;

            Ok(tags)
        }
        None => Ok(Vec::new()),
    }
}

pub(crate) fn build_slices(container: &Container) -> Result<Vec<Slice>, AseError> {
    let mut slices = Vec::new();

    let Some(frame) = container.frames.first() else {
        return Ok(slices);
    };

    for (idx, chunk) in frame.chunks.iter().enumerate() {
        if chunk.kind != ChunkKind::Slice {
            continue;
        }

        let (_, parsed) = parser::parse_slice(chunk.raw).map_err(|_| AseError::Truncated)?;
        let ud = next_user_data(&frame.chunks, idx)?;

        slices.push(Slice {
            name: parsed.name,
            keys: parsed.keys,
            data: ud.as_ref().and_then(|ud| ud.text.clone()),
            color: ud.and_then(|ud| ud.color),
        });
    }

    Ok(slices)
}

fn next_user_data(chunks: &[Chunk], idx: usize) -> Result<Option<UserData>, AseError> {
    match chunks.get(idx + 1) {
        Some(chunk) if chunk.kind == ChunkKind::UserData => {
            let (_, ud) = parser::parse_user_data(chunk.raw).map_err(|_| AseError::Truncated)?;

            Ok(Some(ud))
        }
        _ => Ok(None),
    }
}
