pub mod align;
pub mod consts;
pub mod error;
pub mod fuse;
pub mod io;
pub mod mask;
pub mod pipeline;
pub mod tile;
