//! The backend surface a generic user-space USB stack calls into.
//!
//! This is the drop-in boundary: upper layers written against a
//! libusb-style API (enumerate, descriptors, open/claim, control and
//! bulk transfers) drive any [`UsbBackend`] without knowing whether
//! packets reach the device through a generic USB stack or, as with
//! [`D2xx`](crate::d2xx::D2xx), through a vendor driver.

use crate::wire::{
    ConfigurationDescriptor, DeviceDescriptor, EndpointDescriptor,
    InterfaceDescriptor, SetupPacket,
};
use crate::Result;

/// The data phase of a control transfer: in, out, or none.
#[derive(Debug, PartialEq, Eq)]
pub enum DataPhase<'a> {
    /// The request transfers data from device to host.
    In(&'a mut [u8]),
    /// The request transfers data from host to device.
    Out(&'a [u8]),
    /// The setup packet itself is the whole request.
    None,
}

/// A libusb-style USB backend.
///
/// `Device` is whatever the backend's enumeration produces; `Handle`
/// is an open device. A handle is exclusively owned by the caller
/// between `open_device` and `close_device`, and the caller serializes
/// all operations on it; distinct handles are independent.
///
/// Timeout parameters are upper bounds the backend may round or
/// ignore where the underlying transport fixes its own timeouts.
pub trait UsbBackend {
    type Device;
    type Handle;

    /// Lists the devices this backend can currently reach.
    fn enumerate_devices(&self) -> Result<Vec<Self::Device>>;

    fn get_device_descriptor(
        &self,
        dev: &Self::Device,
    ) -> Result<DeviceDescriptor>;

    fn get_configuration_descriptor(
        &self,
        dev: &Self::Device,
        config: u8,
    ) -> Result<ConfigurationDescriptor>;

    fn get_interface_descriptor(
        &self,
        dev: &Self::Device,
        intf: u8,
        alt: u8,
        config: u8,
    ) -> Result<InterfaceDescriptor>;

    fn get_endpoint_descriptor(
        &self,
        dev: &Self::Device,
        ep: u8,
        intf: u8,
        alt: u8,
        config: u8,
    ) -> Result<EndpointDescriptor>;

    fn open_device(&self, dev: &Self::Device) -> Result<Self::Handle>;

    /// Closes the device. The handle must be released on every exit
    /// path; closing twice is a caller bug the backend does not guard
    /// against.
    fn close_device(&self, handle: &mut Self::Handle) -> Result<()>;

    fn set_configuration(
        &self,
        handle: &mut Self::Handle,
        config: u8,
    ) -> Result<()>;

    fn get_configuration(&self, handle: &Self::Handle) -> Result<u8>;

    fn claim_interface(
        &self,
        handle: &mut Self::Handle,
        intf: u8,
    ) -> Result<()>;

    fn release_interface(
        &self,
        handle: &mut Self::Handle,
        intf: u8,
    ) -> Result<()>;

    /// Writes `data` to a bulk OUT endpoint; returns the count the
    /// transport reported written.
    fn bulk_write(
        &self,
        handle: &Self::Handle,
        endpoint: u8,
        intf: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<usize>;

    /// Reads from a bulk IN endpoint into `buffer`; returns the byte
    /// count, 0 when no data is available within the backend's polling
    /// bound.
    fn bulk_read(
        &self,
        handle: &Self::Handle,
        endpoint: u8,
        intf: u8,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize>;

    /// Performs a control transfer; returns the length of the data
    /// phase actually transferred.
    fn ctrl_transfer(
        &self,
        handle: &mut Self::Handle,
        setup: SetupPacket,
        data: DataPhase<'_>,
        timeout_ms: u32,
    ) -> Result<usize>;
}
