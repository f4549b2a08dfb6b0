/// The SETUP packet that opens every control transfer.
///
/// Eight bytes laid out per USB 2.0 section 9.3, which is also where
/// the deliberately un-Rust-like field names come from; whether a
/// data phase follows, and in which direction, is encoded in
/// `bmRequestType` and `wLength`.
///
/// Here the interesting values are the FTDI vendor-specific requests
/// in [`crate::sio`], plus the standard GET_DESCRIPTOR request for
/// string descriptors.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-2
pub struct SetupPacket {
    /// The type and specific target of the request.
    pub bmRequestType: u8,
    /// The particular request.
    pub bRequest: u8,
    /// A parameter to the request.
    pub wValue: u16,
    /// A second parameter to the request.
    pub wIndex: u16,
    /// The length of the subsequent IN or OUT data phase; can be zero
    /// if the setup packet itself contains all the required
    /// information.
    pub wLength: u16,
}

/// The device descriptor synthesized for an enumerated FTDI chip.
///
/// The `address` and `bus` fields are not part of the USB wire format;
/// they are the host-side topology values a generic USB stack reports
/// alongside the descriptor, recovered here from the D2XX location id.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-8
pub struct DeviceDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bcdUSB: u16,
    pub bDeviceClass: u8,
    pub bDeviceSubClass: u8,
    pub bDeviceProtocol: u8,
    pub bMaxPacketSize0: u8,

    pub idVendor: u16,
    pub idProduct: u16,
    pub bcdDevice: u16,
    pub iManufacturer: u8,
    pub iProduct: u8,
    pub iSerialNumber: u8,
    pub bNumConfigurations: u8,

    pub address: u8,
    pub bus: u8,
}

// SAFETY: all fields zeroable
unsafe impl bytemuck::Zeroable for DeviceDescriptor {}
// SAFETY: no padding (every u16 sits at an even offset), no
// disallowed bit patterns
unsafe impl bytemuck::Pod for DeviceDescriptor {}

impl DeviceDescriptor {
    /// Builds the descriptor from a D2XX device id (VID in the upper
    /// 16 bits, PID in the lower) and location id.
    pub fn new(dev_id: u32, loc_id: u32) -> Self {
        Self {
            bLength: 0x12,
            bDescriptorType: DEVICE_DESCRIPTOR,
            bcdUSB: 0x0200,
            bDeviceClass: 0,
            bDeviceSubClass: 0,
            bDeviceProtocol: 0,
            bMaxPacketSize0: 0x40,
            idVendor: ((dev_id >> 16) & 0xFFFF) as u16,
            idProduct: (dev_id & 0xFFFF) as u16,
            bcdDevice: 0x0900,
            iManufacturer: 1,
            iProduct: 2,
            iSerialNumber: 3,
            bNumConfigurations: 1,
            address: (loc_id & 0xF) as u8,
            bus: ((loc_id >> 4) & 0xF) as u8,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-10
pub struct ConfigurationDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub wTotalLength: [u8; 2],
    pub bNumInterfaces: u8,
    pub bConfigurationValue: u8,
    pub iConfiguration: u8,
    pub bmAttributes: u8,
    pub bMaxPower: u8,
}

// SAFETY: all fields zeroable
unsafe impl bytemuck::Zeroable for ConfigurationDescriptor {}
// SAFETY: no padding, no disallowed bit patterns
unsafe impl bytemuck::Pod for ConfigurationDescriptor {}

impl ConfigurationDescriptor {
    /// The single configuration of an FTDI chip: bus-powered with
    /// remote wakeup, 90 mA.
    pub fn new(num_interfaces: u8) -> Self {
        Self {
            bLength: 9,
            bDescriptorType: CONFIGURATION_DESCRIPTOR,
            wTotalLength: 0x0020u16.to_le_bytes(),
            bNumInterfaces: num_interfaces,
            bConfigurationValue: 1,
            iConfiguration: 0,
            bmAttributes: 0xA0,
            bMaxPower: 0x2D,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-12
pub struct InterfaceDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bInterfaceNumber: u8,
    pub bAlternateSetting: u8,
    pub bNumEndpoints: u8,
    pub bInterfaceClass: u8,
    pub bInterfaceSubClass: u8,
    pub bInterfaceProtocol: u8,
    pub iInterface: u8,
}

// SAFETY: all fields zeroable
unsafe impl bytemuck::Zeroable for InterfaceDescriptor {}
// SAFETY: no padding, no disallowed bit patterns
unsafe impl bytemuck::Pod for InterfaceDescriptor {}

impl InterfaceDescriptor {
    /// A vendor-specific interface with one bulk endpoint pair.
    pub fn new(number: u8) -> Self {
        Self {
            bLength: 9,
            bDescriptorType: INTERFACE_DESCRIPTOR,
            bInterfaceNumber: number,
            bAlternateSetting: 0,
            bNumEndpoints: 2,
            bInterfaceClass: 0xFF,
            bInterfaceSubClass: 0xFF,
            bInterfaceProtocol: 0xFF,
            iInterface: 2,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-13
pub struct EndpointDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bEndpointAddress: u8,
    pub bmAttributes: u8,
    pub wMaxPacketSize: [u8; 2],
    pub bInterval: u8,
}

// SAFETY: all fields zeroable
unsafe impl bytemuck::Zeroable for EndpointDescriptor {}
// SAFETY: no padding, no disallowed bit patterns
unsafe impl bytemuck::Pod for EndpointDescriptor {}

impl EndpointDescriptor {
    fn bulk(address: u8) -> Self {
        Self {
            bLength: 7,
            bDescriptorType: ENDPOINT_DESCRIPTOR,
            bEndpointAddress: address,
            bmAttributes: 0x02,
            wMaxPacketSize: 0x0040u16.to_le_bytes(),
            bInterval: 0,
        }
    }

    /// The bulk IN endpoint of an FTDI interface.
    pub fn bulk_in() -> Self {
        Self::bulk(0x81)
    }

    /// The bulk OUT endpoint of an FTDI interface.
    pub fn bulk_out() -> Self {
        Self::bulk(0x02)
    }
}

// For request_type (USB 2.0 table 9-2)
pub const DEVICE_TO_HOST: u8 = 0x80;
pub const HOST_TO_DEVICE: u8 = 0;
pub const STANDARD_REQUEST: u8 = 0;
pub const CLASS_REQUEST: u8 = 0x20;
pub const VENDOR_REQUEST: u8 = 0x40;

// For request (USB 2.0 table 9-4)
pub const GET_DESCRIPTOR: u8 = 6;

// Descriptor types (USB 2.0 table 9-5)
pub const DEVICE_DESCRIPTOR: u8 = 1;
pub const CONFIGURATION_DESCRIPTOR: u8 = 2;
pub const STRING_DESCRIPTOR: u8 = 3;
pub const INTERFACE_DESCRIPTOR: u8 = 4;
pub const ENDPOINT_DESCRIPTOR: u8 = 5;

/// String descriptor 0: the LANGID table, English (US) only.
pub const LANGID_EN_US: [u8; 4] = [0x04, STRING_DESCRIPTOR, 0x09, 0x04];

/// Encodes `s` as a USB string descriptor into `data`.
///
/// Returns the descriptor length (also written to `data[0]`), or
/// [`Error::InvalidBuffer`](crate::Error::InvalidBuffer) if `data` is
/// too short to hold the whole descriptor.
pub fn encode_string_descriptor(
    data: &mut [u8],
    s: &str,
) -> Result<usize, crate::Error> {
    let units = s.encode_utf16().count();
    let total = 2 * (units + 1);
    if data.len() < total {
        return Err(crate::Error::InvalidBuffer);
    }
    data[0] = total as u8;
    data[1] = STRING_DESCRIPTOR;
    for (i, unit) in s.encode_utf16().enumerate() {
        let [lo, hi] = unit.to_le_bytes();
        data[2 + 2 * i] = lo;
        data[3 + 2 * i] = hi;
    }
    Ok(total)
}

#[cfg(test)]
#[path = "tests/wire.rs"]
mod tests;
