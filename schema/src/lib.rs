pub mod clock;
pub mod codec;
pub mod wire;

pub use clock::VectorClock;
pub use codec::{read_frame, write_frame, CodecError};
pub use wire::*;
