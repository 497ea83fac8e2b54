//! Frame encoding and decoding over async streams.

mod framed;

pub use framed::FrameCodec;
