use crate::Result;
use std::sync::Arc;

/// Shared handle to a channel owned by a live context.
pub type ChannelRef = Arc<dyn Channel>;

/// Shared handle to a device owned by a live context.
pub type DeviceRef = Arc<dyn Device>;

/// An addressable measurement or control line on a device.
pub trait Channel: Send + Sync {
    /// True for output (write-side) channels, which carry no sample data.
    fn is_output(&self) -> bool;

    /// Names of the attributes this channel exposes, in enumeration order.
    fn attributes(&self) -> Vec<String>;

    /// Read an attribute value as text.
    fn read_attribute(&self, name: &str) -> Result<String>;

    /// Write an attribute value as text.
    fn write_attribute(&self, name: &str, value: &str) -> Result<()>;

    /// Mark the channel active so the remote side streams it.
    fn enable(&self) -> Result<()>;

    /// Mark the channel inactive.
    fn disable(&self) -> Result<()>;
}

/// A remote hardware endpoint exposing one or more channels.
pub trait Device: Send + Sync {
    /// Device name, or `None` when the remote reference is unreadable.
    fn name(&self) -> Option<String>;

    /// Enumerate the device's channels.
    fn channels(&self) -> Vec<ChannelRef>;
}

/// A live connection to a remote device population.
///
/// The context exclusively owns every device and channel reference obtained
/// through it; dropping the context invalidates them all.
pub trait Context: Send + Sync {
    /// Enumerate the devices visible through this context.
    fn devices(&self) -> Vec<DeviceRef>;
}

/// Factory for contexts, one per transport backend.
pub trait Backend: Send + Sync {
    /// Open a context to the given endpoint (e.g. an "ip:host" address).
    fn connect(&self, endpoint: &str) -> Result<Box<dyn Context>>;
}
