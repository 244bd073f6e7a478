//! Source-specific readers producing a [`Dataset`](crate::Dataset).

mod cryosat2;
mod historical;
mod piomas;

pub use cryosat2::{SEA_ICE_VOLUME, read_cryosat2};
pub use historical::{DirectoryPolicy, historical_patterns, read_historical};
pub use piomas::{PIOMAS_FILE_GLOB, PiomasOptions, read_piomas};
