//! The D2XX backend: everything between the [`UsbBackend`] surface
//! and the vendor ABI.
//!
//! The flow is enumerate → open → control/bulk traffic. Enumeration
//! folds the per-interface rows that multi-interface chips produce
//! into one [`DeviceInfo`] per physical chip. Opening creates the RX
//! event and fixes the driver-side timeouts. After that the control
//! dispatcher maps each `(bmRequestType, bRequest, wValue, wIndex)`
//! onto vendor calls, and bulk reads re-insert the two status bytes
//! the vendor driver strips from the FTDI wire format.

pub mod driver;
pub mod event;
pub mod ffi;

use crate::backend::{DataPhase, UsbBackend};
use crate::sio::{
    BaudDivisor, ChipType, LineParams, SIO_ERASE_EEPROM,
    SIO_GET_LATENCY_TIMER, SIO_POLL_MODEM_STATUS, SIO_READ_EEPROM,
    SIO_READ_PINS, SIO_RESET, SIO_RESET_PURGE_RX, SIO_RESET_PURGE_TX,
    SIO_RESET_SIO, SIO_SET_BAUDRATE, SIO_SET_BITMODE, SIO_SET_DATA,
    SIO_SET_ERROR_CHAR, SIO_SET_EVENT_CHAR, SIO_SET_FLOW_CTRL,
    SIO_SET_LATENCY_TIMER, SIO_SET_MODEM_CTRL, SIO_DTR_HIGH, SIO_RTS_HIGH,
    SIO_SET_DTR_MASK, SIO_SET_RTS_MASK, SIO_WRITE_EEPROM, XOFF_CHAR,
    XON_CHAR,
};
use crate::wire::{
    encode_string_descriptor, ConfigurationDescriptor, DeviceDescriptor,
    EndpointDescriptor, InterfaceDescriptor, SetupPacket, DEVICE_TO_HOST,
    GET_DESCRIPTOR, LANGID_EN_US, STANDARD_REQUEST, STRING_DESCRIPTOR,
    VENDOR_REQUEST,
};
use crate::{Error, Result};
use self::driver::{D2xxApi, Driver};
use self::event::RxEvent;
use self::ffi::{
    DeviceFlags, FtHandle, FT_EVENT_RXCHAR, FT_PURGE_RX, FT_PURGE_TX,
};
use once_cell::sync::OnceCell;

// Driver-side timeouts fixed at open; callers' per-transfer timeouts
// are not forwarded (the ABI has no per-call timeout)
const READ_TIMEOUT_MS: u32 = 5000;
const WRITE_TIMEOUT_MS: u32 = 1000;

// How long one bulk_read is allowed to sit on the RX event
const RX_POLL_MS: u32 = 10;

const USB_TRANSFER_SIZE: u32 = 0x10000;

/// One enumerated FTDI chip, as the upper layer sees it.
///
/// Multi-interface chips appear once, however many rows the vendor
/// driver listed; `available_interfaces` records which interface
/// letters were seen.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub flags: DeviceFlags,
    pub chip_type: ChipType,
    /// Vendor id in the upper 16 bits, product id in the lower.
    pub id: u32,
    /// Bus in bits 4..8, address in bits 0..4.
    pub loc_id: u32,
    /// The driver's internal handle token. Not the open handle;
    /// opaque and unused once the list is built.
    pub handle: FtHandle,
    pub serial_number: String,
    pub description: String,
    /// Bitmap over interfaces 0..`num_interfaces()`.
    pub available_interfaces: u8,
}

impl DeviceInfo {
    /// Interface count; a property of the chip model alone.
    pub fn num_interfaces(&self) -> u8 {
        self.chip_type.num_interfaces()
    }
}

/// An open device: the vendor handle plus the per-handle state the
/// SIO translation needs.
///
/// Exclusively owned by the caller from `open_device` to
/// `close_device`; nothing here is internally synchronized.
#[derive(Debug)]
pub struct DeviceHandle {
    device: DeviceInfo,
    handle: FtHandle,
    rx_event: Option<Box<dyn RxEvent>>,
    event_char: u8,
    event_char_enabled: u8,
    error_char: u8,
    error_char_enabled: u8,
}

impl DeviceHandle {
    /// The device this handle was opened against.
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }
}

/// Windows code page 1252, which is what the vendor driver writes
/// into serial-number and description buffers.
fn decode_cp1252(bytes: &[u8]) -> String {
    // 0x80..0xA0; the five holes decode to U+FFFD
    const C1: [char; 32] = [
        '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}',
        '\u{2026}', '\u{2020}', '\u{2021}', '\u{02C6}', '\u{2030}',
        '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}',
        '\u{FFFD}', '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}',
        '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}',
        '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}',
        '\u{017E}', '\u{0178}',
    ];
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => C1[usize::from(b - 0x80)],
            _ => char::from(b),
        })
        .collect()
}

/// The USB-to-D2XX translation backend.
///
/// Generic over the vendor API so the test suite can substitute a
/// mock; production code uses [`get_backend`] and never names the
/// parameter.
pub struct D2xx<A: D2xxApi = Driver> {
    api: A,
}

impl<A: D2xxApi> std::fmt::Debug for D2xx<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("D2xx").finish_non_exhaustive()
    }
}

impl<A: D2xxApi> D2xx<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    fn ctrl_transfer_standard(
        &self,
        handle: &DeviceHandle,
        setup: &SetupPacket,
        data: DataPhase<'_>,
    ) -> Result<usize> {
        if setup.bmRequestType & DEVICE_TO_HOST == 0
            || setup.bRequest != GET_DESCRIPTOR
        {
            return Err(Error::NotImplemented);
        }
        let desc_type = (setup.wValue >> 8) as u8;
        let desc_index = (setup.wValue & 0xFF) as u8;
        if desc_type != STRING_DESCRIPTOR {
            return Err(Error::NotImplemented);
        }
        let DataPhase::In(buf) = data else {
            return Err(Error::InvalidBuffer);
        };
        match desc_index {
            0 => {
                if buf.len() < LANGID_EN_US.len() {
                    return Err(Error::InvalidBuffer);
                }
                buf[..LANGID_EN_US.len()].copy_from_slice(&LANGID_EN_US);
                Ok(LANGID_EN_US.len())
            }
            1 => encode_string_descriptor(buf, "FTDI"),
            2 => encode_string_descriptor(buf, &handle.device.description),
            3 => encode_string_descriptor(buf, &handle.device.serial_number),
            _ => Err(Error::NotImplemented),
        }
    }

    fn ctrl_transfer_vendor(
        &self,
        handle: &mut DeviceHandle,
        setup: &SetupPacket,
        data: DataPhase<'_>,
    ) -> Result<usize> {
        let h = handle.handle;
        match setup.bRequest {
            SIO_RESET => {
                match setup.wValue {
                    SIO_RESET_SIO => self.api.reset_device(h)?,
                    SIO_RESET_PURGE_RX => self.api.purge(h, FT_PURGE_RX)?,
                    SIO_RESET_PURGE_TX => self.api.purge(h, FT_PURGE_TX)?,
                    _ => return Err(Error::NotImplemented),
                }
                Ok(0)
            }
            SIO_SET_MODEM_CTRL => {
                if setup.wValue & SIO_SET_DTR_MASK != 0 {
                    if setup.wValue & SIO_DTR_HIGH != 0 {
                        self.api.set_dtr(h)?;
                    } else {
                        self.api.clr_dtr(h)?;
                    }
                }
                if setup.wValue & SIO_SET_RTS_MASK != 0 {
                    if setup.wValue & SIO_RTS_HIGH != 0 {
                        self.api.set_rts(h)?;
                    } else {
                        self.api.clr_rts(h)?;
                    }
                }
                Ok(0)
            }
            SIO_SET_FLOW_CTRL => {
                self.api.set_flow_control(
                    h,
                    setup.wIndex & 0xFF00,
                    XON_CHAR,
                    XOFF_CHAR,
                )?;
                Ok(0)
            }
            SIO_SET_BAUDRATE => {
                let divisor = BaudDivisor::decode(
                    setup.wValue,
                    setup.wIndex,
                    handle.device.chip_type,
                );
                log::debug!(
                    "baud divisor {divisor:?} ({} baud)",
                    divisor.rate()
                );
                // Zero tells the driver to derive the rate itself from
                // the device it opened; see DESIGN.md on the divisor
                self.api.set_baud_rate(h, 0)?;
                Ok(0)
            }
            SIO_SET_DATA => {
                let params = LineParams::decode(setup.wValue);
                self.api.set_data_characteristics(
                    h,
                    params.word_length,
                    params.stop_bits,
                    params.parity,
                )?;
                if params.line_break {
                    self.api.set_break_on(h)?;
                } else {
                    self.api.set_break_off(h)?;
                }
                Ok(0)
            }
            SIO_POLL_MODEM_STATUS => {
                let DataPhase::In(buf) = data else {
                    return Err(Error::InvalidBuffer);
                };
                if buf.len() < 2 {
                    return Err(Error::InvalidBuffer);
                }
                let status = self.api.get_modem_status(h)?;
                buf[0] = (status & 0xFF) as u8;
                buf[1] = ((status >> 8) & 0xFF) as u8;
                Ok(2)
            }
            SIO_SET_EVENT_CHAR => {
                handle.event_char = (setup.wValue & 0xFF) as u8;
                handle.event_char_enabled = ((setup.wValue >> 8) & 0xFF) as u8;
                self.api.set_chars(
                    h,
                    handle.event_char,
                    handle.event_char_enabled,
                    handle.error_char,
                    handle.error_char_enabled,
                )?;
                Ok(0)
            }
            SIO_SET_ERROR_CHAR => {
                handle.error_char = (setup.wValue & 0xFF) as u8;
                handle.error_char_enabled = ((setup.wValue >> 8) & 0xFF) as u8;
                self.api.set_chars(
                    h,
                    handle.event_char,
                    handle.event_char_enabled,
                    handle.error_char,
                    handle.error_char_enabled,
                )?;
                Ok(0)
            }
            SIO_SET_LATENCY_TIMER => {
                self.api
                    .set_latency_timer(h, (setup.wValue & 0xFF) as u8)?;
                Ok(0)
            }
            SIO_GET_LATENCY_TIMER => {
                let DataPhase::In(buf) = data else {
                    return Err(Error::InvalidBuffer);
                };
                if buf.is_empty() {
                    return Err(Error::InvalidBuffer);
                }
                buf[0] = self.api.get_latency_timer(h)?;
                Ok(1)
            }
            SIO_SET_BITMODE => {
                let mode = (setup.wValue >> 8) as u8;
                let mask = (setup.wValue & 0xFF) as u8;
                self.api.set_bit_mode(h, mask, mode)?;
                Ok(0)
            }
            SIO_READ_PINS => {
                let DataPhase::In(buf) = data else {
                    return Err(Error::InvalidBuffer);
                };
                if buf.is_empty() {
                    return Err(Error::InvalidBuffer);
                }
                buf[0] = self.api.get_bit_mode(h)?;
                Ok(1)
            }
            SIO_READ_EEPROM => {
                let DataPhase::In(buf) = data else {
                    return Err(Error::InvalidBuffer);
                };
                if buf.len() < 2 {
                    return Err(Error::InvalidBuffer);
                }
                let value =
                    self.api.read_ee(h, u32::from(setup.wIndex))?;
                buf[..2].copy_from_slice(&value.to_le_bytes());
                Ok(2)
            }
            SIO_WRITE_EEPROM => {
                self.api
                    .write_ee(h, u32::from(setup.wIndex), setup.wValue)?;
                Ok(0)
            }
            SIO_ERASE_EEPROM => {
                self.api.erase_ee(h)?;
                Ok(0)
            }
            _ => Err(Error::NotImplemented),
        }
    }
}

impl<A: D2xxApi> UsbBackend for D2xx<A> {
    type Device = DeviceInfo;
    type Handle = DeviceHandle;

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>> {
        let num_devs = self.api.create_device_info_list()?;
        let mut devices: Vec<DeviceInfo> = Vec::new();
        for index in 0..num_devs {
            let node = self.api.get_device_info_detail(index)?;
            let flags = DeviceFlags::from_bits_retain(node.flags);
            let chip_type = ChipType::from(node.chip_type);
            let mut serial_number = decode_cp1252(&node.serial_number);
            let mut description = decode_cp1252(&node.description);
            log::info!(
                "found device: id={:04X}:{:04X}, type={chip_type:?}, \
                 serial_number={serial_number:?}, \
                 description={description:?}",
                (node.id >> 16) & 0xFFFF,
                node.id & 0xFFFF,
            );

            let mut available_interfaces = 1u8;
            if chip_type.is_multi_interface() {
                if let Some(letter @ 'A'..='D') = serial_number.chars().last()
                {
                    available_interfaces = 1 << (letter as u8 - b'A');
                    serial_number.pop();
                    if description.ends_with(letter) {
                        description.pop();
                    }
                    let unpadded = description.trim_end_matches(' ').len();
                    description.truncate(unpadded);
                }
            }

            if flags.contains(DeviceFlags::OPENED) {
                // Claimed by some other process; not presentable
                continue;
            }
            if let Some(prev) = devices
                .iter_mut()
                .find(|d| d.serial_number == serial_number)
            {
                prev.available_interfaces |= available_interfaces;
            } else {
                devices.push(DeviceInfo {
                    flags,
                    chip_type,
                    id: node.id,
                    loc_id: node.loc_id,
                    handle: node.handle,
                    serial_number,
                    description,
                    available_interfaces,
                });
            }
        }
        Ok(devices)
    }

    fn get_device_descriptor(
        &self,
        dev: &DeviceInfo,
    ) -> Result<DeviceDescriptor> {
        log::debug!("get_device_descriptor");
        Ok(DeviceDescriptor::new(dev.id, dev.loc_id))
    }

    fn get_configuration_descriptor(
        &self,
        dev: &DeviceInfo,
        config: u8,
    ) -> Result<ConfigurationDescriptor> {
        log::debug!("get_configuration_descriptor: config={config}");
        if config >= 1 {
            return Err(Error::OutOfRange {
                kind: "configuration",
                index: config,
            });
        }
        Ok(ConfigurationDescriptor::new(dev.num_interfaces()))
    }

    fn get_interface_descriptor(
        &self,
        dev: &DeviceInfo,
        intf: u8,
        alt: u8,
        config: u8,
    ) -> Result<InterfaceDescriptor> {
        log::debug!(
            "get_interface_descriptor: intf={intf}, alt={alt}, \
             config={config}"
        );
        if config >= 1 {
            return Err(Error::OutOfRange {
                kind: "configuration",
                index: config,
            });
        }
        if intf >= dev.num_interfaces() {
            return Err(Error::OutOfRange {
                kind: "interface",
                index: intf,
            });
        }
        if alt >= 1 {
            return Err(Error::OutOfRange {
                kind: "alternate setting",
                index: alt,
            });
        }
        Ok(InterfaceDescriptor::new(intf))
    }

    fn get_endpoint_descriptor(
        &self,
        dev: &DeviceInfo,
        ep: u8,
        intf: u8,
        alt: u8,
        config: u8,
    ) -> Result<EndpointDescriptor> {
        log::debug!(
            "get_endpoint_descriptor: ep={ep}, intf={intf}, alt={alt}, \
             config={config}"
        );
        if ep >= 2 {
            return Err(Error::OutOfRange {
                kind: "endpoint",
                index: ep,
            });
        }
        if config >= 1 {
            return Err(Error::OutOfRange {
                kind: "configuration",
                index: config,
            });
        }
        if intf >= dev.num_interfaces() {
            return Err(Error::OutOfRange {
                kind: "interface",
                index: intf,
            });
        }
        if alt >= 1 {
            return Err(Error::OutOfRange {
                kind: "alternate setting",
                index: alt,
            });
        }
        Ok(if ep == 0 {
            EndpointDescriptor::bulk_in()
        } else {
            EndpointDescriptor::bulk_out()
        })
    }

    fn open_device(&self, dev: &DeviceInfo) -> Result<DeviceHandle> {
        log::debug!("open_device: serial={:?}", dev.serial_number);
        let mut serial = dev.serial_number.clone();
        if dev.chip_type.is_multi_interface() {
            // The letter was stripped at enumeration; interface A is
            // the one this backend drives
            serial.push('A');
        }
        let handle = self.api.open_by_serial(&serial)?;
        let rx_event = self.api.create_rx_event();
        let configured = self
            .api
            .set_timeouts(handle, READ_TIMEOUT_MS, WRITE_TIMEOUT_MS)
            .and_then(|_| {
                self.api.set_usb_parameters(
                    handle,
                    USB_TRANSFER_SIZE,
                    USB_TRANSFER_SIZE,
                )
            })
            .and_then(|_| {
                self.api.set_event_notification(
                    handle,
                    FT_EVENT_RXCHAR,
                    rx_event.as_raw(),
                )
            });
        if let Err(e) = configured {
            let _ = self.api.close(handle);
            return Err(e);
        }
        Ok(DeviceHandle {
            device: dev.clone(),
            handle,
            rx_event: Some(rx_event),
            event_char: 0,
            event_char_enabled: 0,
            error_char: 0,
            error_char_enabled: 0,
        })
    }

    fn close_device(&self, handle: &mut DeviceHandle) -> Result<()> {
        log::debug!("close_device");
        self.api.close(handle.handle)?;
        handle.rx_event = None;
        Ok(())
    }

    fn set_configuration(
        &self,
        _handle: &mut DeviceHandle,
        config: u8,
    ) -> Result<()> {
        // The synthesized device has exactly one configuration
        log::debug!("set_configuration: config={config}");
        Ok(())
    }

    fn get_configuration(&self, _handle: &DeviceHandle) -> Result<u8> {
        log::debug!("get_configuration");
        Ok(1)
    }

    fn claim_interface(
        &self,
        _handle: &mut DeviceHandle,
        intf: u8,
    ) -> Result<()> {
        // The vendor driver has no per-interface claim
        log::debug!("claim_interface: intf={intf}");
        Ok(())
    }

    fn release_interface(
        &self,
        _handle: &mut DeviceHandle,
        intf: u8,
    ) -> Result<()> {
        log::debug!("release_interface: intf={intf}");
        Ok(())
    }

    fn bulk_write(
        &self,
        handle: &DeviceHandle,
        endpoint: u8,
        intf: u8,
        data: &[u8],
        _timeout_ms: u32,
    ) -> Result<usize> {
        log::debug!(
            "bulk_write: ep=0x{endpoint:02X}, intf={intf}, len={}",
            data.len()
        );
        // The caller's timeout is not forwarded; the write timeout
        // fixed at open applies
        Ok(self.api.write(handle.handle, data)? as usize)
    }

    fn bulk_read(
        &self,
        handle: &DeviceHandle,
        endpoint: u8,
        intf: u8,
        buffer: &mut [u8],
        _timeout_ms: u32,
    ) -> Result<usize> {
        log::debug!(
            "bulk_read: ep=0x{endpoint:02X}, intf={intf}, len={}",
            buffer.len()
        );
        // Two bytes go to the synthesized status prefix
        if buffer.len() < 2 {
            return Ok(0);
        }
        let Some(rx_event) = handle.rx_event.as_ref() else {
            return Ok(0);
        };
        if !rx_event.wait(RX_POLL_MS) {
            return Ok(0);
        }
        let queued = self.api.get_queue_status(handle.handle)?;
        if queued == 0 {
            return Ok(0);
        }
        // Real chips prepend modem status and line status to every
        // bulk-IN packet; the vendor driver strips them, so put a
        // benign pair back for the upper layer to strip again
        buffer[0] = 0;
        buffer[1] = 0;
        let take = (queued as usize).min(buffer.len() - 2);
        let read = self.api.read(handle.handle, &mut buffer[2..2 + take])?;
        Ok(read as usize + 2)
    }

    fn ctrl_transfer(
        &self,
        handle: &mut DeviceHandle,
        setup: SetupPacket,
        data: DataPhase<'_>,
        _timeout_ms: u32,
    ) -> Result<usize> {
        log::debug!(
            "ctrl_transfer: bmRequestType=0x{:02X}, bRequest=0x{:02X}, \
             wValue=0x{:04X}, wIndex=0x{:04X}",
            setup.bmRequestType,
            setup.bRequest,
            setup.wValue,
            setup.wIndex,
        );
        match setup.bmRequestType & 0x7F {
            STANDARD_REQUEST => {
                self.ctrl_transfer_standard(handle, &setup, data)
            }
            VENDOR_REQUEST => {
                self.ctrl_transfer_vendor(handle, &setup, data)
            }
            _ => Err(Error::NotImplemented),
        }
    }
}

static DRIVER: OnceCell<Option<Driver>> = OnceCell::new();

/// Returns the D2XX backend, or `None` when the vendor library cannot
/// be loaded or lists no devices.
///
/// The library is loaded at most once per process; a failed load is
/// latched, and later calls return `None` without retrying.
pub fn get_backend() -> Option<D2xx<Driver>> {
    let driver = DRIVER.get_or_init(|| Driver::load().ok()).as_ref()?.clone();
    match driver.create_device_info_list() {
        Ok(0) => None,
        Ok(_) => Some(D2xx::new(driver)),
        Err(_) => None,
    }
}

#[cfg(test)]
#[path = "tests/d2xx.rs"]
mod tests;
