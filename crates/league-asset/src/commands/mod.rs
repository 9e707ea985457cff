mod bin;
mod extract;
mod wad_info;

pub use bin::*;
pub use extract::*;
pub use wad_info::*;
