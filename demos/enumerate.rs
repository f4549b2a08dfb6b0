//! Lists every FTDI device the D2XX driver can see.
//!
//! Run with `RUST_LOG=debug` to watch the vendor calls go by.

use usb_d2xx::{get_backend, UsbBackend};

fn main() -> Result<(), usb_d2xx::Error> {
    env_logger::init();

    let Some(backend) = get_backend() else {
        eprintln!("no D2XX backend (driver missing, or no devices attached)");
        std::process::exit(1);
    };

    for dev in backend.enumerate_devices()? {
        let dd = backend.get_device_descriptor(&dev)?;
        println!(
            "{:04x}:{:04x} bus={} addr={} type={:?} intfs={} \
             serial={:?} description={:?}",
            dd.idVendor,
            dd.idProduct,
            dd.bus,
            dd.address,
            dev.chip_type,
            dev.num_interfaces(),
            dev.serial_number,
            dev.description,
        );
    }
    Ok(())
}
