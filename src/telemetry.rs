mod decode;
mod measurement;
mod normalize;
mod record;

pub use decode::*;
pub use measurement::*;
pub use normalize::*;
pub use record::*;
