//! Raw D2XX ABI: C types, status codes, and the entry-point table.
//!
//! Everything here is exactly what `ftd2xx.dll` / `ftd2xx.so` exports,
//! with the signatures from FTDI's D2XX Programmer's Guide. The safe
//! face of these calls is [`Driver`](super::driver::Driver).

use bitflags::bitflags;
use num_enum::FromPrimitive;
use std::fmt;
use std::os::raw::{c_char, c_uchar, c_uint, c_ulong, c_ushort, c_void};

#[allow(non_camel_case_types)]
pub type FT_STATUS = c_ulong;
#[allow(non_camel_case_types)]
pub type FT_HANDLE = *mut c_void;
pub type DWORD = c_uint;
pub type WORD = c_ushort;
pub type UCHAR = c_uchar;

/// An open D2XX device handle, opaque to everyone but the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FtHandle(FT_HANDLE);

impl FtHandle {
    pub(crate) fn new(raw: FT_HANDLE) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> FT_HANDLE {
        self.0
    }
}

// SAFETY: an opaque token, never dereferenced here; the vendor driver
// documents its calls as thread-safe per handle
unsafe impl Send for FtHandle {}
// SAFETY: shared references only ever copy the token out
unsafe impl Sync for FtHandle {}

/// Status code returned by every D2XX entry point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
pub enum FtStatus {
    Ok = 0,
    InvalidHandle = 1,
    DeviceNotFound = 2,
    DeviceNotOpened = 3,
    IoError = 4,
    InsufficientResources = 5,
    InvalidParameter = 6,
    InvalidBaudRate = 7,
    DeviceNotOpenedForErase = 8,
    DeviceNotOpenedForWrite = 9,
    FailedToWriteDevice = 10,
    EepromReadFailed = 11,
    EepromWriteFailed = 12,
    EepromEraseFailed = 13,
    EepromNotPresent = 14,
    EepromNotProgrammed = 15,
    InvalidArgs = 16,
    NotSupported = 17,
    OtherError = 18,
    DeviceListNotReady = 19,
    #[num_enum(catch_all)]
    Unknown(u32),
}

impl FtStatus {
    /// The name from the vendor header, or `"unknown"` for codes the
    /// header does not define.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ok => "FT_OK",
            Self::InvalidHandle => "FT_INVALID_HANDLE",
            Self::DeviceNotFound => "FT_DEVICE_NOT_FOUND",
            Self::DeviceNotOpened => "FT_DEVICE_NOT_OPENED",
            Self::IoError => "FT_IO_ERROR",
            Self::InsufficientResources => "FT_INSUFFICIENT_RESOURCES",
            Self::InvalidParameter => "FT_INVALID_PARAMETER",
            Self::InvalidBaudRate => "FT_INVALID_BAUD_RATE",
            Self::DeviceNotOpenedForErase => {
                "FT_DEVICE_NOT_OPENED_FOR_ERASE"
            }
            Self::DeviceNotOpenedForWrite => {
                "FT_DEVICE_NOT_OPENED_FOR_WRITE"
            }
            Self::FailedToWriteDevice => "FT_FAILED_TO_WRITE_DEVICE",
            Self::EepromReadFailed => "FT_EEPROM_READ_FAILED",
            Self::EepromWriteFailed => "FT_EEPROM_WRITE_FAILED",
            Self::EepromEraseFailed => "FT_EEPROM_ERASE_FAILED",
            Self::EepromNotPresent => "FT_EEPROM_NOT_PRESENT",
            Self::EepromNotProgrammed => "FT_EEPROM_NOT_PROGRAMMED",
            Self::InvalidArgs => "FT_INVALID_ARGS",
            Self::NotSupported => "FT_NOT_SUPPORTED",
            Self::OtherError => "FT_OTHER_ERROR",
            Self::DeviceListNotReady => "FT_DEVICE_LIST_NOT_READY",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for FtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown status {code}"),
            _ => f.write_str(self.name()),
        }
    }
}

bitflags! {
    /// The `Flags` word of a device list entry.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct DeviceFlags: u32 {
        /// Already opened (by this process or any other).
        const OPENED = 1;
        /// Enumerated at hi-speed.
        const HISPEED = 2;
    }
}

// FT_OpenEx flags
pub const FT_OPEN_BY_SERIAL_NUMBER: DWORD = 1;

// FT_SetEventNotification masks
pub const FT_EVENT_RXCHAR: DWORD = 1;

// FT_Purge masks
pub const FT_PURGE_RX: DWORD = 1;
pub const FT_PURGE_TX: DWORD = 2;

// Buffer sizes from FT_DEVICE_LIST_INFO_NODE
pub const SERIAL_NUMBER_LEN: usize = 16;
pub const DESCRIPTION_LEN: usize = 64;

/// The resolved entry points of the vendor library.
///
/// Resolution happens once, at load; the function pointers stay valid
/// for as long as `_lib` is held, which (via the process-wide driver
/// singleton) is the rest of the process.
pub struct D2xxLibrary {
    pub create_device_info_list:
        unsafe extern "system" fn(*mut DWORD) -> FT_STATUS,
    pub get_device_info_detail: unsafe extern "system" fn(
        DWORD,
        *mut DWORD,
        *mut DWORD,
        *mut DWORD,
        *mut DWORD,
        *mut c_char,
        *mut c_char,
        *mut FT_HANDLE,
    ) -> FT_STATUS,
    pub open_ex: unsafe extern "system" fn(
        *const c_char,
        DWORD,
        *mut FT_HANDLE,
    ) -> FT_STATUS,
    pub close: unsafe extern "system" fn(FT_HANDLE) -> FT_STATUS,
    pub reset_device: unsafe extern "system" fn(FT_HANDLE) -> FT_STATUS,
    pub purge: unsafe extern "system" fn(FT_HANDLE, DWORD) -> FT_STATUS,
    pub set_dtr: unsafe extern "system" fn(FT_HANDLE) -> FT_STATUS,
    pub clr_dtr: unsafe extern "system" fn(FT_HANDLE) -> FT_STATUS,
    pub set_rts: unsafe extern "system" fn(FT_HANDLE) -> FT_STATUS,
    pub clr_rts: unsafe extern "system" fn(FT_HANDLE) -> FT_STATUS,
    pub set_flow_control: unsafe extern "system" fn(
        FT_HANDLE,
        WORD,
        UCHAR,
        UCHAR,
    ) -> FT_STATUS,
    pub set_baud_rate:
        unsafe extern "system" fn(FT_HANDLE, DWORD) -> FT_STATUS,
    pub set_data_characteristics: unsafe extern "system" fn(
        FT_HANDLE,
        UCHAR,
        UCHAR,
        UCHAR,
    ) -> FT_STATUS,
    pub set_break_on: unsafe extern "system" fn(FT_HANDLE) -> FT_STATUS,
    pub set_break_off: unsafe extern "system" fn(FT_HANDLE) -> FT_STATUS,
    pub get_modem_status:
        unsafe extern "system" fn(FT_HANDLE, *mut DWORD) -> FT_STATUS,
    pub set_chars: unsafe extern "system" fn(
        FT_HANDLE,
        UCHAR,
        UCHAR,
        UCHAR,
        UCHAR,
    ) -> FT_STATUS,
    pub set_latency_timer:
        unsafe extern "system" fn(FT_HANDLE, UCHAR) -> FT_STATUS,
    pub get_latency_timer:
        unsafe extern "system" fn(FT_HANDLE, *mut UCHAR) -> FT_STATUS,
    pub set_bit_mode:
        unsafe extern "system" fn(FT_HANDLE, UCHAR, UCHAR) -> FT_STATUS,
    pub get_bit_mode:
        unsafe extern "system" fn(FT_HANDLE, *mut UCHAR) -> FT_STATUS,
    pub set_timeouts:
        unsafe extern "system" fn(FT_HANDLE, DWORD, DWORD) -> FT_STATUS,
    pub set_usb_parameters:
        unsafe extern "system" fn(FT_HANDLE, DWORD, DWORD) -> FT_STATUS,
    pub set_event_notification: unsafe extern "system" fn(
        FT_HANDLE,
        DWORD,
        *mut c_void,
    ) -> FT_STATUS,
    pub get_status: unsafe extern "system" fn(
        FT_HANDLE,
        *mut DWORD,
        *mut DWORD,
        *mut DWORD,
    ) -> FT_STATUS,
    pub get_queue_status:
        unsafe extern "system" fn(FT_HANDLE, *mut DWORD) -> FT_STATUS,
    pub read: unsafe extern "system" fn(
        FT_HANDLE,
        *mut c_void,
        DWORD,
        *mut DWORD,
    ) -> FT_STATUS,
    pub write: unsafe extern "system" fn(
        FT_HANDLE,
        *const c_void,
        DWORD,
        *mut DWORD,
    ) -> FT_STATUS,
    pub read_ee:
        unsafe extern "system" fn(FT_HANDLE, DWORD, *mut WORD) -> FT_STATUS,
    pub write_ee:
        unsafe extern "system" fn(FT_HANDLE, DWORD, WORD) -> FT_STATUS,
    pub erase_ee: unsafe extern "system" fn(FT_HANDLE) -> FT_STATUS,
    _lib: libloading::Library,
}

impl fmt::Debug for D2xxLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("D2xxLibrary").finish_non_exhaustive()
    }
}

impl D2xxLibrary {
    /// The vendor library's file name on this platform.
    pub const NAME: &'static str = if cfg!(windows) {
        "ftd2xx.dll"
    } else {
        "ftd2xx.so"
    };

    /// Loads the vendor library and resolves every entry point.
    pub fn load() -> Result<Self, libloading::Error> {
        // SAFETY: loading and resolving runs no untrusted code; the
        // signatures follow the D2XX Programmer's Guide
        unsafe {
            let lib = libloading::Library::new(Self::NAME)?;
            let create_device_info_list =
                *lib.get(b"FT_CreateDeviceInfoList\0")?;
            let get_device_info_detail =
                *lib.get(b"FT_GetDeviceInfoDetail\0")?;
            let open_ex = *lib.get(b"FT_OpenEx\0")?;
            let close = *lib.get(b"FT_Close\0")?;
            let reset_device = *lib.get(b"FT_ResetDevice\0")?;
            let purge = *lib.get(b"FT_Purge\0")?;
            let set_dtr = *lib.get(b"FT_SetDtr\0")?;
            let clr_dtr = *lib.get(b"FT_ClrDtr\0")?;
            let set_rts = *lib.get(b"FT_SetRts\0")?;
            let clr_rts = *lib.get(b"FT_ClrRts\0")?;
            let set_flow_control = *lib.get(b"FT_SetFlowControl\0")?;
            let set_baud_rate = *lib.get(b"FT_SetBaudRate\0")?;
            let set_data_characteristics =
                *lib.get(b"FT_SetDataCharacteristics\0")?;
            let set_break_on = *lib.get(b"FT_SetBreakOn\0")?;
            let set_break_off = *lib.get(b"FT_SetBreakOff\0")?;
            let get_modem_status = *lib.get(b"FT_GetModemStatus\0")?;
            let set_chars = *lib.get(b"FT_SetChars\0")?;
            let set_latency_timer = *lib.get(b"FT_SetLatencyTimer\0")?;
            let get_latency_timer = *lib.get(b"FT_GetLatencyTimer\0")?;
            let set_bit_mode = *lib.get(b"FT_SetBitMode\0")?;
            let get_bit_mode = *lib.get(b"FT_GetBitMode\0")?;
            let set_timeouts = *lib.get(b"FT_SetTimeouts\0")?;
            let set_usb_parameters = *lib.get(b"FT_SetUSBParameters\0")?;
            let set_event_notification =
                *lib.get(b"FT_SetEventNotification\0")?;
            let get_status = *lib.get(b"FT_GetStatus\0")?;
            let get_queue_status = *lib.get(b"FT_GetQueueStatus\0")?;
            let read = *lib.get(b"FT_Read\0")?;
            let write = *lib.get(b"FT_Write\0")?;
            let read_ee = *lib.get(b"FT_ReadEE\0")?;
            let write_ee = *lib.get(b"FT_WriteEE\0")?;
            let erase_ee = *lib.get(b"FT_EraseEE\0")?;
            Ok(Self {
                create_device_info_list,
                get_device_info_detail,
                open_ex,
                close,
                reset_device,
                purge,
                set_dtr,
                clr_dtr,
                set_rts,
                clr_rts,
                set_flow_control,
                set_baud_rate,
                set_data_characteristics,
                set_break_on,
                set_break_off,
                get_modem_status,
                set_chars,
                set_latency_timer,
                get_latency_timer,
                set_bit_mode,
                get_bit_mode,
                set_timeouts,
                set_usb_parameters,
                set_event_notification,
                get_status,
                get_queue_status,
                read,
                write,
                read_ee,
                write_ee,
                erase_ee,
                _lib: lib,
            })
        }
    }
}
