#![doc = include_str!("../README.md")]

pub mod counters;
pub mod format;
pub mod frame;

pub mod prelude {
    pub use crate::{
        counters::Counters,
        format::{
            CompressionTag, FourCc, FrameRate, PixelFormat, Resolution, SourceFormat,
            StreamDescriptor, TargetFormat, WireLayout, image_byte_size,
        },
        frame::{
            BufferLease, BufferPool, Frame, FrameMeta, FramePair, PictureType, Plane, PlaneLayout,
            PlaneMut,
        },
    };
}
