use super::*;

#[test]
fn chip_families() {
    assert!(ChipType::Bm.is_r_type());
    assert!(ChipType::Ft232R.is_r_type());
    assert!(ChipType::Ft232RN.is_r_type());
    assert!(ChipType::Ft2232C.is_r_type());
    assert!(!ChipType::Ft2232H.is_r_type());

    assert!(ChipType::Ft232H.is_h_type());
    assert!(ChipType::Ft2232HA.is_h_type());
    assert!(ChipType::Ft4233HP.is_h_type());
    assert!(!ChipType::Ft232R.is_h_type());
    assert!(!ChipType::FtXSeries.is_h_type());
}

#[test]
fn interface_counts() {
    assert_eq!(ChipType::Ft232R.num_interfaces(), 1);
    assert_eq!(ChipType::Ft232H.num_interfaces(), 1);
    assert_eq!(ChipType::Ft2232C.num_interfaces(), 2);
    assert_eq!(ChipType::Ft2232H.num_interfaces(), 2);
    assert_eq!(ChipType::Ft2233HP.num_interfaces(), 2);
    assert_eq!(ChipType::Ft4232H.num_interfaces(), 4);
    assert_eq!(ChipType::Ft4232HA.num_interfaces(), 4);

    assert!(!ChipType::Ft232H.is_multi_interface());
    assert!(ChipType::Ft2232H.is_multi_interface());
}

#[test]
fn chip_from_raw() {
    assert_eq!(ChipType::from(5u32), ChipType::Ft232R);
    assert_eq!(ChipType::from(6u32), ChipType::Ft2232H);
    assert_eq!(ChipType::from(25u32), ChipType::Ft232RN);
    assert_eq!(ChipType::from(57u32), ChipType::Other(57));
}

#[test]
fn baud_divisor_9600() {
    // The classic 9600-baud divisor: 312.5 on the 3 MHz clock
    let d = BaudDivisor::decode(0x4138, 0, ChipType::Ft232R);
    assert_eq!(d.divisor, 0x0138);
    assert_eq!(d.subdivisor, 1);
    assert_eq!(d.base_clock, 3_000_000);
    assert_eq!(d.rate(), 9600);
}

#[test]
fn baud_divisor_r_type_third_bit() {
    let d = BaudDivisor::decode(0x0001, 0x0001, ChipType::Ft232R);
    assert_eq!(d.subdivisor, 0b100);
}

#[test]
fn baud_divisor_h_type() {
    // wIndex bit 8 supplies sub-divisor bit 2, bit 9 the 12 MHz clock
    let d = BaudDivisor::decode(0x0001, 0x0300, ChipType::Ft2232H);
    assert_eq!(d.subdivisor, 0b100);
    assert_eq!(d.base_clock, 12_000_000);

    let d = BaudDivisor::decode(0x0001, 0x0100, ChipType::Ft2232H);
    assert_eq!(d.base_clock, 3_000_000);
}

#[test]
fn baud_divisor_ignores_family_bits_it_does_not_have() {
    // An H-type index pattern on an R-type chip contributes nothing
    let d = BaudDivisor::decode(0x0001, 0x0100, ChipType::Ft232R);
    assert_eq!(d.subdivisor, 0);
}

#[test]
fn baud_divisor_zero_is_base_clock() {
    let d = BaudDivisor::decode(0, 0, ChipType::Ft232R);
    assert_eq!(d.rate(), 3_000_000);
}

#[test]
fn line_params() {
    let p = LineParams::decode(0x4108);
    assert_eq!(p.word_length, 8);
    assert_eq!(p.parity, 1);
    assert_eq!(p.stop_bits, 0);
    assert!(p.line_break);

    let p = LineParams::decode(0x1007);
    assert_eq!(p.word_length, 7);
    assert_eq!(p.parity, 0);
    assert_eq!(p.stop_bits, 2);
    assert!(!p.line_break);
}
