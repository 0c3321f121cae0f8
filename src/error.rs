#[derive(Debug, thiserror::Error)]
pub enum AseError {
    #[error("Invalid magic number: {magic:#06x}")]
    InvalidMagic { magic: u16 },
    #[error("Unsupported pixel aspect ratio: {width}:{height}")]
    UnsupportedAspectRatio { width: u8, height: u8 },
    #[error("Unsupported color depth: {depth}")]
    UnsupportedColorDepth { depth: u16 },
    #[error("Does not support layer type: {kind}")]
    UnsupportedLayerKind { kind: u16 },
    #[error("Does not support cel type: {kind}")]
    UnsupportedCelKind { kind: u16 },
    #[error("Unexpected end of data")]
    Truncated,
    #[error("Cannot decompress cel data: {reason}")]
    Decompression { reason: String },
    #[error("IOError: {source}")]
    IOError {
        #[from]
        source: std::io::Error,
    },
}
