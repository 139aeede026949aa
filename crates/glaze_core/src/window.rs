//! Native window interface consumed by the backends

/// Handle of a native drawable (window or off-screen buffer)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(pub u64);

/// Handle of a native device context; `NONE` when the platform has none
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DeviceContextId(pub u64);

impl DeviceContextId {
    pub const NONE: DeviceContextId = DeviceContextId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// A native window the backends can render into
pub trait NativeWindow {
    fn id(&self) -> DrawableId;

    /// Width and height in device pixels
    fn bounds(&self) -> (u32, u32);

    fn device_context(&self) -> DeviceContextId {
        DeviceContextId::NONE
    }
}
