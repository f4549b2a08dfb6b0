//! The typed face of the vendor ABI.
//!
//! Every entry point is reached through one [`Driver`] method with a
//! uniform contract: IN parameters are passed as given, OUT parameters
//! are allocated here and become the return value, the status code is
//! checked, and the call is traced at debug level. A non-zero status
//! becomes [`Error::VendorCall`] carrying the function name, a
//! parameter echo and the decoded status.
//!
//! [`D2xxApi`] is the trait the backend consumes; the tests mock it.

use super::event::RxEvent;
#[cfg(windows)]
use super::event::Kernel32;
#[cfg(unix)]
use super::event::PosixRxEvent;
use super::ffi::{
    D2xxLibrary, FtHandle, FtStatus, DESCRIPTION_LEN, DWORD, FT_HANDLE,
    FT_OPEN_BY_SERIAL_NUMBER, FT_STATUS, SERIAL_NUMBER_LEN,
};
use crate::{Error, Result};
use std::fmt;
use std::os::raw::{c_char, c_void};
use std::sync::Arc;

/// One row of the driver's device list, as raw as the ABI reports it.
///
/// Serial number and description are undecoded bytes (the driver
/// writes Windows code page 1252); the enumerator owns the decoding.
#[derive(Debug, Clone)]
pub struct InfoNode {
    pub flags: u32,
    pub chip_type: u32,
    pub id: u32,
    pub loc_id: u32,
    pub handle: FtHandle,
    pub serial_number: Vec<u8>,
    pub description: Vec<u8>,
}

/// The vendor calls the backend consumes.
///
/// [`Driver`] is the real implementation; the unit tests substitute a
/// mock so every translation path can run without hardware or the
/// vendor library.
#[cfg_attr(test, mockall::automock)]
pub trait D2xxApi {
    fn create_device_info_list(&self) -> Result<u32>;
    fn get_device_info_detail(&self, index: u32) -> Result<InfoNode>;
    fn open_by_serial(&self, serial: &str) -> Result<FtHandle>;
    fn close(&self, handle: FtHandle) -> Result<()>;
    fn reset_device(&self, handle: FtHandle) -> Result<()>;
    fn purge(&self, handle: FtHandle, mask: u32) -> Result<()>;
    fn set_dtr(&self, handle: FtHandle) -> Result<()>;
    fn clr_dtr(&self, handle: FtHandle) -> Result<()>;
    fn set_rts(&self, handle: FtHandle) -> Result<()>;
    fn clr_rts(&self, handle: FtHandle) -> Result<()>;
    fn set_flow_control(
        &self,
        handle: FtHandle,
        flow_control: u16,
        xon: u8,
        xoff: u8,
    ) -> Result<()>;
    fn set_baud_rate(&self, handle: FtHandle, baud_rate: u32) -> Result<()>;
    fn set_data_characteristics(
        &self,
        handle: FtHandle,
        word_length: u8,
        stop_bits: u8,
        parity: u8,
    ) -> Result<()>;
    fn set_break_on(&self, handle: FtHandle) -> Result<()>;
    fn set_break_off(&self, handle: FtHandle) -> Result<()>;
    fn get_modem_status(&self, handle: FtHandle) -> Result<u32>;
    fn set_chars(
        &self,
        handle: FtHandle,
        event_char: u8,
        event_char_enabled: u8,
        error_char: u8,
        error_char_enabled: u8,
    ) -> Result<()>;
    fn set_latency_timer(&self, handle: FtHandle, timer: u8) -> Result<()>;
    fn get_latency_timer(&self, handle: FtHandle) -> Result<u8>;
    fn set_bit_mode(
        &self,
        handle: FtHandle,
        mask: u8,
        mode: u8,
    ) -> Result<()>;
    fn get_bit_mode(&self, handle: FtHandle) -> Result<u8>;
    fn set_timeouts(
        &self,
        handle: FtHandle,
        read_timeout_ms: u32,
        write_timeout_ms: u32,
    ) -> Result<()>;
    fn set_usb_parameters(
        &self,
        handle: FtHandle,
        in_transfer_size: u32,
        out_transfer_size: u32,
    ) -> Result<()>;
    fn set_event_notification(
        &self,
        handle: FtHandle,
        mask: u32,
        arg: *mut c_void,
    ) -> Result<()>;
    /// RX-queue depth, TX-queue depth, event status.
    fn get_status(&self, handle: FtHandle) -> Result<(u32, u32, u32)>;
    fn get_queue_status(&self, handle: FtHandle) -> Result<u32>;
    fn read(&self, handle: FtHandle, buf: &mut [u8]) -> Result<u32>;
    fn write(&self, handle: FtHandle, data: &[u8]) -> Result<u32>;
    fn read_ee(&self, handle: FtHandle, word_offset: u32) -> Result<u16>;
    fn write_ee(
        &self,
        handle: FtHandle,
        word_offset: u32,
        value: u16,
    ) -> Result<()>;
    fn erase_ee(&self, handle: FtHandle) -> Result<()>;
    fn create_rx_event(&self) -> Box<dyn RxEvent>;
}

/// The loaded vendor library plus, on Windows, the event primitives.
///
/// Cheap to clone; all clones share the process-wide library.
#[derive(Clone)]
pub struct Driver {
    lib: Arc<D2xxLibrary>,
    #[cfg(windows)]
    kernel32: Arc<Kernel32>,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver").finish_non_exhaustive()
    }
}

impl Driver {
    /// Loads the vendor library and the host event primitives.
    pub fn load() -> Result<Self> {
        let lib = D2xxLibrary::load().map_err(|e| {
            log::error!("failed to load {}: {e}", D2xxLibrary::NAME);
            Error::DriverNotAvailable
        })?;
        log::info!("loaded {}", D2xxLibrary::NAME);
        #[cfg(windows)]
        let kernel32 = Kernel32::load().map_err(|e| {
            log::error!("failed to load kernel32.dll: {e}");
            Error::DriverNotAvailable
        })?;
        Ok(Self {
            lib: Arc::new(lib),
            #[cfg(windows)]
            kernel32: Arc::new(kernel32),
        })
    }

    fn check(
        &self,
        function: &'static str,
        params: fmt::Arguments<'_>,
        status: FT_STATUS,
    ) -> Result<()> {
        let status = FtStatus::from(status as u32);
        log::debug!("{function}({params}) = {status}");
        if status == FtStatus::Ok {
            Ok(())
        } else {
            log::error!("{function}({params}) failed: {status}");
            Err(Error::VendorCall {
                function,
                params: params.to_string(),
                status,
            })
        }
    }
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(n) => &bytes[..n],
        None => bytes,
    }
}

impl D2xxApi for Driver {
    fn create_device_info_list(&self) -> Result<u32> {
        let mut num_devs: DWORD = 0;
        // SAFETY: out-pointer is a live local
        let status =
            unsafe { (self.lib.create_device_info_list)(&mut num_devs) };
        self.check("FT_CreateDeviceInfoList", format_args!(""), status)?;
        Ok(num_devs)
    }

    fn get_device_info_detail(&self, index: u32) -> Result<InfoNode> {
        let mut flags: DWORD = 0;
        let mut chip_type: DWORD = 0;
        let mut id: DWORD = 0;
        let mut loc_id: DWORD = 0;
        let mut serial = [0u8; SERIAL_NUMBER_LEN];
        let mut description = [0u8; DESCRIPTION_LEN];
        let mut handle: FT_HANDLE = std::ptr::null_mut();
        // SAFETY: buffers are at least as large as the ABI's fixed
        // FT_DEVICE_LIST_INFO_NODE fields
        let status = unsafe {
            (self.lib.get_device_info_detail)(
                index,
                &mut flags,
                &mut chip_type,
                &mut id,
                &mut loc_id,
                serial.as_mut_ptr() as *mut c_char,
                description.as_mut_ptr() as *mut c_char,
                &mut handle,
            )
        };
        self.check(
            "FT_GetDeviceInfoDetail",
            format_args!("index={index}"),
            status,
        )?;
        Ok(InfoNode {
            flags,
            chip_type,
            id,
            loc_id,
            handle: FtHandle::new(handle),
            serial_number: until_nul(&serial).to_vec(),
            description: until_nul(&description).to_vec(),
        })
    }

    fn open_by_serial(&self, serial: &str) -> Result<FtHandle> {
        let mut bytes = serial.as_bytes().to_vec();
        bytes.push(0);
        let mut handle: FT_HANDLE = std::ptr::null_mut();
        // SAFETY: `bytes` is NUL-terminated and outlives the call
        let status = unsafe {
            (self.lib.open_ex)(
                bytes.as_ptr() as *const c_char,
                FT_OPEN_BY_SERIAL_NUMBER,
                &mut handle,
            )
        };
        self.check("FT_OpenEx", format_args!("serial={serial:?}"), status)?;
        Ok(FtHandle::new(handle))
    }

    fn close(&self, handle: FtHandle) -> Result<()> {
        // SAFETY: handle validity is the caller's contract with the driver
        let status = unsafe { (self.lib.close)(handle.raw()) };
        self.check("FT_Close", format_args!("{handle:?}"), status)
    }

    fn reset_device(&self, handle: FtHandle) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe { (self.lib.reset_device)(handle.raw()) };
        self.check("FT_ResetDevice", format_args!("{handle:?}"), status)
    }

    fn purge(&self, handle: FtHandle, mask: u32) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe { (self.lib.purge)(handle.raw(), mask) };
        self.check(
            "FT_Purge",
            format_args!("{handle:?}, mask={mask}"),
            status,
        )
    }

    fn set_dtr(&self, handle: FtHandle) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe { (self.lib.set_dtr)(handle.raw()) };
        self.check("FT_SetDtr", format_args!("{handle:?}"), status)
    }

    fn clr_dtr(&self, handle: FtHandle) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe { (self.lib.clr_dtr)(handle.raw()) };
        self.check("FT_ClrDtr", format_args!("{handle:?}"), status)
    }

    fn set_rts(&self, handle: FtHandle) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe { (self.lib.set_rts)(handle.raw()) };
        self.check("FT_SetRts", format_args!("{handle:?}"), status)
    }

    fn clr_rts(&self, handle: FtHandle) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe { (self.lib.clr_rts)(handle.raw()) };
        self.check("FT_ClrRts", format_args!("{handle:?}"), status)
    }

    fn set_flow_control(
        &self,
        handle: FtHandle,
        flow_control: u16,
        xon: u8,
        xoff: u8,
    ) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe {
            (self.lib.set_flow_control)(handle.raw(), flow_control, xon, xoff)
        };
        self.check(
            "FT_SetFlowControl",
            format_args!(
                "{handle:?}, flow=0x{flow_control:04X}, \
                 xon=0x{xon:02X}, xoff=0x{xoff:02X}"
            ),
            status,
        )
    }

    fn set_baud_rate(&self, handle: FtHandle, baud_rate: u32) -> Result<()> {
        // SAFETY: as for close
        let status =
            unsafe { (self.lib.set_baud_rate)(handle.raw(), baud_rate) };
        self.check(
            "FT_SetBaudRate",
            format_args!("{handle:?}, baud={baud_rate}"),
            status,
        )
    }

    fn set_data_characteristics(
        &self,
        handle: FtHandle,
        word_length: u8,
        stop_bits: u8,
        parity: u8,
    ) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe {
            (self.lib.set_data_characteristics)(
                handle.raw(),
                word_length,
                stop_bits,
                parity,
            )
        };
        self.check(
            "FT_SetDataCharacteristics",
            format_args!(
                "{handle:?}, bits={word_length}, stop={stop_bits}, \
                 parity={parity}"
            ),
            status,
        )
    }

    fn set_break_on(&self, handle: FtHandle) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe { (self.lib.set_break_on)(handle.raw()) };
        self.check("FT_SetBreakOn", format_args!("{handle:?}"), status)
    }

    fn set_break_off(&self, handle: FtHandle) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe { (self.lib.set_break_off)(handle.raw()) };
        self.check("FT_SetBreakOff", format_args!("{handle:?}"), status)
    }

    fn get_modem_status(&self, handle: FtHandle) -> Result<u32> {
        let mut modem_status: DWORD = 0;
        // SAFETY: out-pointer is a live local
        let status = unsafe {
            (self.lib.get_modem_status)(handle.raw(), &mut modem_status)
        };
        self.check("FT_GetModemStatus", format_args!("{handle:?}"), status)?;
        Ok(modem_status)
    }

    fn set_chars(
        &self,
        handle: FtHandle,
        event_char: u8,
        event_char_enabled: u8,
        error_char: u8,
        error_char_enabled: u8,
    ) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe {
            (self.lib.set_chars)(
                handle.raw(),
                event_char,
                event_char_enabled,
                error_char,
                error_char_enabled,
            )
        };
        self.check(
            "FT_SetChars",
            format_args!(
                "{handle:?}, event=0x{event_char:02X}/{event_char_enabled}, \
                 error=0x{error_char:02X}/{error_char_enabled}"
            ),
            status,
        )
    }

    fn set_latency_timer(&self, handle: FtHandle, timer: u8) -> Result<()> {
        // SAFETY: as for close
        let status =
            unsafe { (self.lib.set_latency_timer)(handle.raw(), timer) };
        self.check(
            "FT_SetLatencyTimer",
            format_args!("{handle:?}, timer={timer}"),
            status,
        )
    }

    fn get_latency_timer(&self, handle: FtHandle) -> Result<u8> {
        let mut timer: u8 = 0;
        // SAFETY: out-pointer is a live local
        let status =
            unsafe { (self.lib.get_latency_timer)(handle.raw(), &mut timer) };
        self.check("FT_GetLatencyTimer", format_args!("{handle:?}"), status)?;
        Ok(timer)
    }

    fn set_bit_mode(
        &self,
        handle: FtHandle,
        mask: u8,
        mode: u8,
    ) -> Result<()> {
        // SAFETY: as for close
        let status =
            unsafe { (self.lib.set_bit_mode)(handle.raw(), mask, mode) };
        self.check(
            "FT_SetBitMode",
            format_args!("{handle:?}, mask=0x{mask:02X}, mode={mode}"),
            status,
        )
    }

    fn get_bit_mode(&self, handle: FtHandle) -> Result<u8> {
        let mut mode: u8 = 0;
        // SAFETY: out-pointer is a live local
        let status =
            unsafe { (self.lib.get_bit_mode)(handle.raw(), &mut mode) };
        self.check("FT_GetBitMode", format_args!("{handle:?}"), status)?;
        Ok(mode)
    }

    fn set_timeouts(
        &self,
        handle: FtHandle,
        read_timeout_ms: u32,
        write_timeout_ms: u32,
    ) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe {
            (self.lib.set_timeouts)(
                handle.raw(),
                read_timeout_ms,
                write_timeout_ms,
            )
        };
        self.check(
            "FT_SetTimeouts",
            format_args!(
                "{handle:?}, read={read_timeout_ms}, write={write_timeout_ms}"
            ),
            status,
        )
    }

    fn set_usb_parameters(
        &self,
        handle: FtHandle,
        in_transfer_size: u32,
        out_transfer_size: u32,
    ) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe {
            (self.lib.set_usb_parameters)(
                handle.raw(),
                in_transfer_size,
                out_transfer_size,
            )
        };
        self.check(
            "FT_SetUSBParameters",
            format_args!(
                "{handle:?}, in={in_transfer_size}, out={out_transfer_size}"
            ),
            status,
        )
    }

    fn set_event_notification(
        &self,
        handle: FtHandle,
        mask: u32,
        arg: *mut c_void,
    ) -> Result<()> {
        // SAFETY: `arg` stays valid until the handle is closed (the
        // RX event lives in the same OpenHandle as `handle`)
        let status = unsafe {
            (self.lib.set_event_notification)(handle.raw(), mask, arg)
        };
        self.check(
            "FT_SetEventNotification",
            format_args!("{handle:?}, mask={mask}, arg={arg:p}"),
            status,
        )
    }

    fn get_status(&self, handle: FtHandle) -> Result<(u32, u32, u32)> {
        let mut rx_bytes: DWORD = 0;
        let mut tx_bytes: DWORD = 0;
        let mut event_status: DWORD = 0;
        // SAFETY: out-pointers are live locals
        let status = unsafe {
            (self.lib.get_status)(
                handle.raw(),
                &mut rx_bytes,
                &mut tx_bytes,
                &mut event_status,
            )
        };
        self.check("FT_GetStatus", format_args!("{handle:?}"), status)?;
        Ok((rx_bytes, tx_bytes, event_status))
    }

    fn get_queue_status(&self, handle: FtHandle) -> Result<u32> {
        let mut rx_bytes: DWORD = 0;
        // SAFETY: out-pointer is a live local
        let status =
            unsafe { (self.lib.get_queue_status)(handle.raw(), &mut rx_bytes) };
        self.check("FT_GetQueueStatus", format_args!("{handle:?}"), status)?;
        Ok(rx_bytes)
    }

    fn read(&self, handle: FtHandle, buf: &mut [u8]) -> Result<u32> {
        let mut returned: DWORD = 0;
        // SAFETY: the driver writes at most `buf.len()` bytes
        let status = unsafe {
            (self.lib.read)(
                handle.raw(),
                buf.as_mut_ptr() as *mut c_void,
                buf.len() as DWORD,
                &mut returned,
            )
        };
        self.check(
            "FT_Read",
            format_args!("{handle:?}, len={}", buf.len()),
            status,
        )?;
        Ok(returned)
    }

    fn write(&self, handle: FtHandle, data: &[u8]) -> Result<u32> {
        let mut written: DWORD = 0;
        // SAFETY: the driver reads at most `data.len()` bytes
        let status = unsafe {
            (self.lib.write)(
                handle.raw(),
                data.as_ptr() as *const c_void,
                data.len() as DWORD,
                &mut written,
            )
        };
        self.check(
            "FT_Write",
            format_args!("{handle:?}, len={}", data.len()),
            status,
        )?;
        Ok(written)
    }

    fn read_ee(&self, handle: FtHandle, word_offset: u32) -> Result<u16> {
        let mut value: u16 = 0;
        // SAFETY: out-pointer is a live local
        let status =
            unsafe { (self.lib.read_ee)(handle.raw(), word_offset, &mut value) };
        self.check(
            "FT_ReadEE",
            format_args!("{handle:?}, offset={word_offset}"),
            status,
        )?;
        Ok(value)
    }

    fn write_ee(
        &self,
        handle: FtHandle,
        word_offset: u32,
        value: u16,
    ) -> Result<()> {
        // SAFETY: as for close
        let status =
            unsafe { (self.lib.write_ee)(handle.raw(), word_offset, value) };
        self.check(
            "FT_WriteEE",
            format_args!("{handle:?}, offset={word_offset}, value={value}"),
            status,
        )
    }

    fn erase_ee(&self, handle: FtHandle) -> Result<()> {
        // SAFETY: as for close
        let status = unsafe { (self.lib.erase_ee)(handle.raw()) };
        self.check("FT_EraseEE", format_args!("{handle:?}"), status)
    }

    fn create_rx_event(&self) -> Box<dyn RxEvent> {
        #[cfg(windows)]
        let event: Box<dyn RxEvent> =
            Box::new(self.kernel32.create_rx_event());
        #[cfg(unix)]
        let event: Box<dyn RxEvent> = Box::new(PosixRxEvent::new());
        event
    }
}
