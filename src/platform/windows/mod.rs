mod volume;

pub use volume::NativeVolumeProbe;
