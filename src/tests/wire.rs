use super::*;

#[test]
fn device_descriptor_fields() {
    let d = DeviceDescriptor::new(0x0403_6010, 0x21);
    assert_eq!(d.bLength, 0x12);
    assert_eq!(d.bDescriptorType, DEVICE_DESCRIPTOR);
    assert_eq!(d.bcdUSB, 0x0200);
    assert_eq!(d.bMaxPacketSize0, 0x40);
    assert_eq!(d.idVendor, 0x0403);
    assert_eq!(d.idProduct, 0x6010);
    assert_eq!(d.bcdDevice, 0x0900);
    assert_eq!(d.iManufacturer, 1);
    assert_eq!(d.iProduct, 2);
    assert_eq!(d.iSerialNumber, 3);
    assert_eq!(d.bNumConfigurations, 1);
    assert_eq!(d.address, 1);
    assert_eq!(d.bus, 2);
}

#[test]
fn device_descriptor_layout() {
    let d = DeviceDescriptor::new(0x0403_6010, 0x21);
    assert_eq!(
        bytemuck::bytes_of(&d),
        &[
            0x12, 1, 0x00, 0x02, 0, 0, 0, 0x40, 0x03, 0x04, 0x10, 0x60,
            0x00, 0x09, 1, 2, 3, 1, 1, 2,
        ]
    );
}

#[test]
fn configuration_descriptor_layout() {
    let c = ConfigurationDescriptor::new(2);
    assert_eq!(
        bytemuck::bytes_of(&c),
        &[9, 2, 0x20, 0, 2, 1, 0, 0xA0, 0x2D]
    );
}

#[test]
fn interface_descriptor_layout() {
    let i = InterfaceDescriptor::new(1);
    assert_eq!(
        bytemuck::bytes_of(&i),
        &[9, 4, 1, 0, 2, 0xFF, 0xFF, 0xFF, 2]
    );
}

#[test]
fn endpoint_descriptors() {
    let e = EndpointDescriptor::bulk_in();
    assert_eq!(bytemuck::bytes_of(&e), &[7, 5, 0x81, 2, 0x40, 0, 0]);
    assert_eq!(EndpointDescriptor::bulk_out().bEndpointAddress, 0x02);
}

#[test]
fn setup_packet_layout() {
    assert_eq!(core::mem::size_of::<SetupPacket>(), 8);
}

#[test]
fn string_descriptor() {
    let mut buf = [0xAAu8; 16];
    let n = encode_string_descriptor(&mut buf, "FTDI").unwrap();
    assert_eq!(n, 10);
    assert_eq!(buf[0], 10);
    assert_eq!(buf[1], STRING_DESCRIPTOR);
    assert_eq!(&buf[2..10], b"F\0T\0D\0I\0");
    // bytes past the descriptor are untouched
    assert_eq!(buf[10], 0xAA);
}

#[test]
fn string_descriptor_empty() {
    let mut buf = [0u8; 4];
    let n = encode_string_descriptor(&mut buf, "").unwrap();
    assert_eq!(n, 2);
    assert_eq!(buf[0], 2);
}

#[test]
fn string_descriptor_short_buffer() {
    let mut buf = [0u8; 9];
    assert!(matches!(
        encode_string_descriptor(&mut buf, "FTDI"),
        Err(crate::Error::InvalidBuffer)
    ));
}

#[test]
fn langid_table() {
    assert_eq!(LANGID_EN_US, [0x04, 0x03, 0x09, 0x04]);
}
