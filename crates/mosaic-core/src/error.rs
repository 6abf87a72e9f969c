use thiserror::Error;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid tile volume: {0}")]
    InvalidVolume(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tile shape mismatch: {a} is {a_width}x{a_height}, {b} is {b_width}x{b_height}")]
    ShapeMismatch {
        a: String,
        a_width: usize,
        a_height: usize,
        b: String,
        b_width: usize,
        b_height: usize,
    },

    #[error("Frame range {z_from}..{z_to} out of bounds for {tile} (total: {total})")]
    FrameOutOfRange {
        tile: String,
        z_from: usize,
        z_to: usize,
        total: usize,
    },

    #[error("Channel {channel} out of range (tile has {channels})")]
    ChannelOutOfRange { channel: usize, channels: usize },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Empty tile grid")]
    EmptyGrid,
}

pub type Result<T> = std::result::Result<T, MosaicError>;
