#![doc = include_str!("../README.md")]

mod engine;
pub mod reader;
pub mod source;

pub use source::{FrameError, OpenError, SourceRequest, VideoSource};

pub mod prelude {
    pub use crate::reader::{
        ContainerError, ContainerOpener, OpenMode, ReadError, ReadOutcome, StreamInfo,
        StreamReader,
    };
    pub use crate::source::{FrameError, OpenError, SourceRequest, VideoSource};
    pub use scrub_codec::prelude::*;
}
