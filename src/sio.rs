//! The FTDI vendor-specific ("SIO") control-request protocol.
//!
//! These are the requests an FTDI chip answers on endpoint 0, the chip
//! family classification that changes how some of them are laid out,
//! and decoders for the packed request parameters.

use num_enum::FromPrimitive;

// Vendor request codes
pub const SIO_RESET: u8 = 0x00;
pub const SIO_SET_MODEM_CTRL: u8 = 0x01;
pub const SIO_SET_FLOW_CTRL: u8 = 0x02;
pub const SIO_SET_BAUDRATE: u8 = 0x03;
pub const SIO_SET_DATA: u8 = 0x04;
pub const SIO_POLL_MODEM_STATUS: u8 = 0x05;
pub const SIO_SET_EVENT_CHAR: u8 = 0x06;
pub const SIO_SET_ERROR_CHAR: u8 = 0x07;
pub const SIO_SET_LATENCY_TIMER: u8 = 0x09;
pub const SIO_GET_LATENCY_TIMER: u8 = 0x0A;
pub const SIO_SET_BITMODE: u8 = 0x0B;
pub const SIO_READ_PINS: u8 = 0x0C;
pub const SIO_READ_EEPROM: u8 = 0x90;
pub const SIO_WRITE_EEPROM: u8 = 0x91;
pub const SIO_ERASE_EEPROM: u8 = 0x92;

// wValue for SIO_RESET
pub const SIO_RESET_SIO: u16 = 0;
pub const SIO_RESET_PURGE_RX: u16 = 1;
pub const SIO_RESET_PURGE_TX: u16 = 2;

// wValue bits for SIO_SET_MODEM_CTRL: the high byte enables writing
// the corresponding low-byte line state
pub const SIO_SET_DTR_MASK: u16 = 0x0100;
pub const SIO_DTR_HIGH: u16 = 0x0001;
pub const SIO_SET_RTS_MASK: u16 = 0x0200;
pub const SIO_RTS_HIGH: u16 = 0x0002;

// Flow-control handshake characters
pub const XON_CHAR: u8 = 0x11;
pub const XOFF_CHAR: u8 = 0x13;

/// Chip model, as reported in the `Type` field of a D2XX device list
/// entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
pub enum ChipType {
    Bm = 0,
    Am = 1,
    Ft100Ax = 2,
    Unknown = 3,
    Ft2232C = 4,
    Ft232R = 5,
    Ft2232H = 6,
    Ft4232H = 7,
    Ft232H = 8,
    FtXSeries = 9,
    Ft4222H0 = 10,
    Ft4222H12 = 11,
    Ft4222H3 = 12,
    Ft4222Prog = 13,
    Ft900 = 14,
    Ft930 = 15,
    FtUmftpd3A = 16,
    Ft2233HP = 17,
    Ft4233HP = 18,
    Ft2232HP = 19,
    Ft4232HP = 20,
    Ft233HP = 21,
    Ft232HP = 22,
    Ft2232HA = 23,
    Ft4232HA = 24,
    Ft232RN = 25,
    #[num_enum(catch_all)]
    Other(u32),
}

impl ChipType {
    /// The original full-speed family: baud-rate sub-divisor bit 2
    /// arrives in `wIndex` bit 0.
    pub fn is_r_type(self) -> bool {
        matches!(
            self,
            Self::Bm | Self::Ft232R | Self::Ft232RN | Self::Ft2232C
        )
    }

    /// The hi-speed family: baud-rate sub-divisor bit 2 arrives in
    /// `wIndex` bit 8.
    pub fn is_h_type(self) -> bool {
        matches!(
            self,
            Self::Ft232H
                | Self::Ft232HP
                | Self::Ft233HP
                | Self::Ft2232H
                | Self::Ft2232HA
                | Self::Ft2232HP
                | Self::Ft2233HP
                | Self::Ft4232H
                | Self::Ft4232HA
                | Self::Ft4232HP
                | Self::Ft4233HP
        )
    }

    /// How many UART/MPSSE interfaces this model exposes. A property
    /// of the model alone, not of how the driver lists it.
    pub fn num_interfaces(self) -> u8 {
        match self {
            Self::Ft4232H | Self::Ft4232HA | Self::Ft4232HP
            | Self::Ft4233HP => 4,
            Self::Ft2232C | Self::Ft2232H | Self::Ft2232HA
            | Self::Ft2232HP | Self::Ft2233HP => 2,
            _ => 1,
        }
    }

    /// Multi-interface chips are listed once per interface by the
    /// driver, with an `A`..`D` suffix on the serial number.
    pub fn is_multi_interface(self) -> bool {
        self.num_interfaces() > 1
    }
}

/// A decoded SIO_SET_BAUDRATE divisor.
///
/// The transfer packs a 14-bit integer divisor and a 3-bit
/// sub-divisor (eighths) into `wValue` and `wIndex`; where the third
/// sub-divisor bit lives depends on the chip family, and hi-speed
/// parts can switch the divisor's base clock from 3 MHz to 12 MHz.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BaudDivisor {
    pub divisor: u16,
    pub subdivisor: u8,
    pub base_clock: u32,
}

impl BaudDivisor {
    pub fn decode(value: u16, index: u16, chip: ChipType) -> Self {
        let divisor = value & 0x3FFF;
        let mut subdivisor = ((value >> 14) & 0x3) as u8;
        if chip.is_h_type() {
            subdivisor |= ((index & 0x100) >> 6) as u8;
        } else if chip.is_r_type() {
            subdivisor |= ((index & 0x1) << 2) as u8;
        }
        let base_clock = if (index >> 9) & 1 != 0 {
            12_000_000
        } else {
            3_000_000
        };
        Self {
            divisor,
            subdivisor,
            base_clock,
        }
    }

    /// The transmission rate this divisor selects.
    ///
    /// The sub-divisor encodes a fraction of the integer divisor in
    /// eighths, in the chip's idiosyncratic bit order.
    pub fn rate(&self) -> u32 {
        // sub-divisor code -> eighths
        const EIGHTHS: [u32; 8] = [0, 4, 2, 1, 3, 5, 6, 7];
        let eighths = 8 * u32::from(self.divisor)
            + EIGHTHS[usize::from(self.subdivisor & 0x7)];
        if eighths == 0 {
            return self.base_clock;
        }
        self.base_clock.saturating_mul(8) / eighths
    }
}

/// Decoded SIO_SET_DATA line parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineParams {
    pub word_length: u8,
    pub parity: u8,
    pub stop_bits: u8,
    pub line_break: bool,
}

impl LineParams {
    pub fn decode(value: u16) -> Self {
        Self {
            word_length: (value & 0xF) as u8,
            parity: ((value >> 8) & 0x7) as u8,
            stop_bits: ((value >> 11) & 0x3) as u8,
            line_break: (value >> 14) & 0x1 != 0,
        }
    }
}

#[cfg(test)]
#[path = "tests/sio.rs"]
mod tests;
