use std::rc::Rc;
use std::time::Duration;

use image::RgbaImage;

/// Loop direction of a tag animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopDirection {
    Forward,
    Reverse,
    PingPong,
    PingPongReverse,
}

impl From<u8> for LoopDirection {
    fn from(raw: u8) -> Self {
        match raw {
            1 => LoopDirection::Reverse,
            2 => LoopDirection::PingPong,
            3 => LoopDirection::PingPongReverse,
            _ => LoopDirection::Forward,
        }
    }
}

/// Color model of the source file, derived from its color depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Indexed,
    Gray16,
    Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// An animation tag. Names can be duplicate.
#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    /// First frame of the animation.
    pub lo: u16,
    /// Last frame of the animation, inclusive.
    pub hi: u16,
    /// How many times to repeat the animation.
    pub repeat: u16,
    pub loop_direction: LoopDirection,
}

/// One keyframe of a [`Slice`].
#[derive(Debug, Clone)]
pub struct SliceKey {
    pub frame: u32,
    pub bounds: Rect,
    /// 9-slices center, relative to bounds.
    pub center: Option<Rect>,
    /// Pivot point, relative to bounds.
    pub pivot: Option<Point>,
}

/// A named rectangular annotation with one entry per keyframe.
#[derive(Debug, Clone)]
pub struct Slice {
    pub name: String,
    pub keys: Vec<SliceKey>,
    pub data: Option<Vec<u8>>,
    pub color: Option<[u8; 4]>,
}

/// A single frame of the sprite.
#[derive(Debug, Clone)]
pub struct AseFrame {
    /// Where the frame image sits inside the atlas.
    pub bounds: Rect,
    /// How long the frame should be displayed for.
    pub duration: Duration,
    /// User data of the cels making up the frame, in layer order.
    /// Cels on invisible and reference layers are not included.
    pub data: Vec<Vec<u8>>,
}

/// A decoded sprite: all layers flattened and all frames packed onto one
/// texture atlas.
pub struct Ase {
    pub atlas: RgbaImage,
    pub frames: Vec<AseFrame>,
    pub tags: Vec<Tag>,
    pub slices: Vec<Slice>,
    /// User data of the visible layers, in layer order.
    pub layer_data: Vec<Vec<u8>>,
    pub color_model: ColorModel,
}

/// Header probe result, see [`Ase::probe_from_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AseInfo {
    pub color_model: ColorModel,
    /// Atlas width the full decode would produce.
    pub width: u32,
    /// Atlas height the full decode would produce.
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorDepth {
    Indexed,
    Gray16,
    Rgba,
}

impl ColorDepth {
    pub(crate) fn from_raw(depth: u16) -> Option<ColorDepth> {
        match depth {
            8 => Some(ColorDepth::Indexed),
            16 => Some(ColorDepth::Gray16),
            32 => Some(ColorDepth::Rgba),
            _ => None,
        }
    }

    pub(crate) fn bytes_per_pixel(self) -> usize {
        match self {
            ColorDepth::Indexed => 1,
            ColorDepth::Gray16 => 2,
            ColorDepth::Rgba => 4,
        }
    }

    pub(crate) fn color_model(self) -> ColorModel {
        match self {
            ColorDepth::Indexed => ColorModel::Indexed,
            ColorDepth::Gray16 => ColorModel::Gray16,
            ColorDepth::Rgba => ColorModel::Rgba,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Header {
    pub size: u32,
    pub magic: u16,
    pub frames: u16,
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub flags: u16,
    pub transparent_index: u8,
    pub ncolors: u16,
    pub pixel_width: u8,
    pub pixel_height: u8,
}

#[derive(Debug)]
pub(crate) struct FrameHeader {
    pub magic: u16,
    pub old_chunks: u16,
    pub duration_ms: u16,
    pub new_chunks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkKind {
    OldPalette,
    OldPalette6,
    Layer,
    Cel,
    Tags,
    Palette,
    UserData,
    Slice,
    Unknown,
}

impl ChunkKind {
    pub(crate) fn from_raw(raw: u16) -> ChunkKind {
        match raw {
            0x0004 => ChunkKind::OldPalette,
            0x0011 => ChunkKind::OldPalette6,
            0x2004 => ChunkKind::Layer,
            0x2005 => ChunkKind::Cel,
            0x2018 => ChunkKind::Tags,
            0x2019 => ChunkKind::Palette,
            0x2020 => ChunkKind::UserData,
            0x2022 => ChunkKind::Slice,
            _ => ChunkKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk<'a> {
    pub kind: ChunkKind,
    pub raw: &'a [u8],
}

#[derive(Debug)]
pub(crate) struct RawFrame<'a> {
    pub duration_ms: u16,
    pub chunks: Vec<Chunk<'a>>,
}

#[derive(Debug)]
pub(crate) struct Container<'a> {
    pub header: Header,
    pub depth: ColorDepth,
    pub frames: Vec<RawFrame<'a>>,
}

#[derive(Debug)]
pub(crate) struct Layer {
    pub flags: u16,
    pub blend_mode: u16,
    pub opacity: u8,
    pub data: Option<Vec<u8>>,
}

impl Layer {
    pub(crate) fn is_visible(&self) -> bool {
        self.flags & 1 != 0
    }

    pub(crate) fn is_reference(&self) -> bool {
        self.flags & 64 != 0
    }
}

#[derive(Debug, Clone)]
pub(crate) enum CelImage {
    Indexed(Vec<u8>),
    Gray16(Vec<u8>),
    Rgba(Vec<u8>),
}

impl CelImage {
    pub(crate) fn from_pixels(depth: ColorDepth, pix: Vec<u8>) -> CelImage {
        match depth {
            ColorDepth::Indexed => CelImage::Indexed(pix),
            ColorDepth::Gray16 => CelImage::Gray16(pix),
            ColorDepth::Rgba => CelImage::Rgba(pix),
        }
    }
}

/// The raster contribution of one layer to one frame. Linked cels share
/// their raster with the cel of an earlier frame on the same layer.
#[derive(Debug, Clone)]
pub(crate) struct Cel {
    pub bounds: Rect,
    pub opacity: u8,
    pub image: Rc<CelImage>,
    pub data: Option<Vec<u8>>,
}

#[derive(Debug)]
pub(crate) struct UserData {
    pub text: Option<Vec<u8>>,
    pub color: Option<[u8; 4]>,
}

#[derive(Debug)]
pub(crate) struct PaletteRun {
    pub first: u32,
    pub colors: Vec<[u8; 4]>,
}

#[derive(Debug)]
pub(crate) struct PalettePacket {
    pub skip: u8,
    pub colors: Vec<[u8; 3]>,
}

#[derive(Debug)]
pub(crate) struct LayerRecord {
    pub flags: u16,
    pub kind: u16,
    pub blend_mode: u16,
    pub opacity: u8,
}

#[derive(Debug)]
pub(crate) struct CelRecord<'a> {
    pub layer: u16,
    pub x: i16,
    pub y: i16,
    pub opacity: u8,
    pub kind: u16,
    pub body: &'a [u8],
}

#[derive(Debug)]
pub(crate) struct SliceChunk {
    pub name: String,
    pub keys: Vec<SliceKey>,
}
