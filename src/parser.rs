use nom::{
    bytes::complete::take,
    combinator::map,
    error::{Error, ErrorKind},
    multi::count,
    number::complete::{le_i16, le_i32, le_u16, le_u32, le_u8},
    IResult as _IResult, Parser,
};

use crate::{
    types::{
        CelRecord, Chunk, ChunkKind, FrameHeader, Header, LayerRecord, PalettePacket, PaletteRun,
        SliceChunk, UserData,
    },
    Point, Rect, SliceKey, Tag,
};

pub type IResult<'a, T> = _IResult<&'a [u8], T>;

pub fn parse_header(i: &'_ [u8]) -> IResult<'_, Header> {
    map(
        (
            le_u32,
            le_u16,
            le_u16,
            le_u16,
            le_u16,
            le_u16,
            le_u16,
            take(12usize),
            le_u8,
            take(3usize),
            le_u16,
            le_u8,
            le_u8,
            take(92usize),
        ),
        |(
            size,
            magic,
            frames,
            width,
            height,
            depth,
            flags,
            _,
            transparent_index,
            _,
            ncolors,
            pixel_width,
            pixel_height,
            _,
        )| Header {
            size,
            magic,
            frames,
            width,
            height,
            depth,
            flags,
            transparent_index,
            ncolors,
            pixel_width,
            pixel_height,
        },
    )
    .parse(i)
}

/// First header fields only, enough for a header probe.
pub fn parse_header_prefix(i: &'_ [u8]) -> IResult<'_, (u32, u16, u16, u16, u16, u16)> {
    (le_u32, le_u16, le_u16, le_u16, le_u16, le_u16).parse(i)
}

pub fn parse_frame_header(i: &'_ [u8]) -> IResult<'_, FrameHeader> {
    map(
        (le_u32, le_u16, le_u16, le_u16, take(2usize), le_u32),
        |(_, magic, old_chunks, duration_ms, _, new_chunks)| FrameHeader {
            magic,
            old_chunks,
            duration_ms,
            new_chunks,
        },
    )
    .parse(i)
}

pub fn parse_chunk(i: &'_ [u8]) -> IResult<'_, Chunk<'_>> {
    let (i, length) = le_u32(i)?;
    let (i, kind) = le_u16(i)?;

    // the length field covers its own 6 byte prefix
    if length < 6 {
        return Err(nom::Err::Error(Error::new(i, ErrorKind::Verify)));
    }

    let (i, raw) = take(length as usize - 6).parse(i)?;

    Ok((
        i,
        Chunk {
            kind: ChunkKind::from_raw(kind),
            raw,
        },
    ))
}

pub fn parse_string(i: &'_ [u8]) -> IResult<'_, String> {
    let (i, n) = le_u16(i)?;
    let (i, bytes) = take(n as usize).parse(i)?;

    Ok((i, String::from_utf8_lossy(bytes).into_owned()))
}

fn skip_string(i: &'_ [u8]) -> IResult<'_, ()> {
    let (i, n) = le_u16(i)?;
    let (i, _) = take(n as usize).parse(i)?;

    Ok((i, ()))
}

fn parse_rgba(i: &'_ [u8]) -> IResult<'_, [u8; 4]> {
    map(take(4usize), |c: &[u8]| [c[0], c[1], c[2], c[3]]).parse(i)
}

pub fn parse_user_data(i: &'_ [u8]) -> IResult<'_, UserData> {
    let (i, flags) = le_u32(i)?;

    let (i, text) = if flags & 1 != 0 {
        let (i, n) = le_u16(i)?;
        let (i, bytes) = take(n as usize).parse(i)?;

        (i, Some(bytes.to_vec()))
    } else {
        (i, None)
    };

    let (i, color) = if flags & 2 != 0 {
        let (i, color) = parse_rgba(i)?;

        (i, Some(color))
    } else {
        (i, None)
    };

    Ok((i, UserData { text, color }))
}

pub fn parse_palette(i: &'_ [u8]) -> IResult<'_, PaletteRun> {
    let (i, entries) = le_u32(i)?;
    let (i, first) = le_u32(i)?;
    let (i, _last) = le_u32(i)?;
    let (mut i, _) = take(8usize).parse(i)?;

    let mut colors = Vec::new();

    for _ in 0..entries {
        let (rest, flags) = le_u16(i)?;
        let (rest, color) = parse_rgba(rest)?;

        let rest = if flags & 1 != 0 {
            skip_string(rest)?.0
        } else {
            rest
        };

        colors.push(color);
        i = rest;
    }

    Ok((i, PaletteRun { first, colors }))
}

pub fn parse_old_palette(i: &'_ [u8]) -> IResult<'_, Vec<PalettePacket>> {
    let (mut i, npackets) = le_u16(i)?;

    let mut packets = Vec::new();

    for _ in 0..npackets {
        let (rest, skip) = le_u8(i)?;
        let (rest, ncolors) = le_u8(rest)?;

        // a zero count means 256 consecutive entries
        let ncolors = if ncolors == 0 { 256 } else { ncolors as usize };

        let (rest, colors) = count(
            map(take(3usize), |c: &[u8]| [c[0], c[1], c[2]]),
            ncolors,
        )
        .parse(rest)?;

        packets.push(PalettePacket { skip, colors });
        i = rest;
    }

    Ok((i, packets))
}

pub fn parse_layer(i: &'_ [u8]) -> IResult<'_, LayerRecord> {
    map(
        (le_u16, le_u16, take(6usize), le_u16, le_u8),
        |(flags, kind, _, blend_mode, opacity)| LayerRecord {
            flags,
            kind,
            blend_mode,
            opacity,
        },
    )
    .parse(i)
}

pub fn parse_cel(i: &'_ [u8]) -> IResult<'_, CelRecord<'_>> {
    let (i, (layer, x, y, opacity, kind)) = (le_u16, le_i16, le_i16, le_u8, le_u16).parse(i)?;
    let (body, _) = take(7usize).parse(i)?;

    Ok((
        &body[body.len()..],
        CelRecord {
            layer,
            x,
            y,
            opacity,
            kind,
            body,
        },
    ))
}

pub fn parse_cel_size(i: &'_ [u8]) -> IResult<'_, (u16, u16)> {
    (le_u16, le_u16).parse(i)
}

pub fn parse_cel_pixels(i: &'_ [u8], bytes_per_pixel: usize) -> IResult<'_, (u16, u16, &'_ [u8])> {
    let (i, (width, height)) = parse_cel_size(i)?;
    let (i, pix) = take(width as usize * height as usize * bytes_per_pixel).parse(i)?;

    Ok((i, (width, height, pix)))
}

pub fn parse_cel_link(i: &'_ [u8]) -> IResult<'_, u16> {
    le_u16(i)
}

pub fn parse_tags(i: &'_ [u8]) -> IResult<'_, Vec<Tag>> {
    let (i, ntags) = le_u16(i)?;
    let (mut i, _) = take(8usize).parse(i)?;

    let mut tags = Vec::new();

    for _ in 0..ntags {
        let (rest, (lo, hi, direction, repeat)) = (le_u16, le_u16, le_u8, le_u16).parse(i)?;
        let (rest, _) = take(10usize).parse(rest)?;
        let (rest, name) = parse_string(rest)?;

        tags.push(Tag {
            name,
            lo,
            hi,
            repeat,
            loop_direction: direction.into(),
        });

        i = rest;
    }

    Ok((i, tags))
}

pub fn parse_slice(i: &'_ [u8]) -> IResult<'_, SliceChunk> {
    let (i, nkeys) = le_u32(i)?;
    let (i, flags) = le_u32(i)?;
    let (i, _) = take(4usize).parse(i)?;
    let (mut i, name) = parse_string(i)?;

    let mut keys = Vec::new();

    while !i.is_empty() && keys.len() < nkeys as usize {
        let (rest, key) = parse_slice_key(i, flags)?;

        keys.push(key);
        i = rest;
    }

    Ok((i, SliceChunk { name, keys }))
}

fn parse_slice_key(i: &'_ [u8], flags: u32) -> IResult<'_, SliceKey> {
    let (i, (frame, x, y, width, height)) = (le_u32, le_i32, le_i32, le_u32, le_u32).parse(i)?;

    let (i, center) = if flags & 1 != 0 {
        let (i, (cx, cy, cw, ch)) = (le_i32, le_i32, le_u32, le_u32).parse(i)?;

        (
            i,
            Some(Rect {
                x: cx,
                y: cy,
                width: cw,
                height: ch,
            }),
        )
    } else {
        (i, None)
    };

    let (i, pivot) = if flags & 2 != 0 {
        let (i, (px, py)) = (le_i32, le_i32).parse(i)?;

        (i, Some(Point { x: px, y: py }))
    } else {
        (i, None)
    };

    Ok((
        i,
        SliceKey {
            frame,
            bounds: Rect {
                x,
                y,
                width,
                height,
            },
            center,
            pivot,
        },
    ))
}
