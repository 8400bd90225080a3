//! Stand-alone LBX / LCX lasers under both protocol profiles.

use oxxius_laser::hardware::{
    ConstantCurrentControl, EmissionControl, LbxLaser, LcxLaser, ModulationControl, OxxiusDevice,
};
use oxxius_laser::state::{DeviceState, Switch};
use oxxius_laser::transport::MockTransport;
use oxxius_laser::{Connection, LaserError, Profile};
use std::time::Duration;

#[test]
fn lbx_status_reads() {
    let mock = MockTransport::new()
        .with_reply("?C", "10.0")
        .with_reply("?HID", "?HID LBX-638-180-CSB-12345")
        .with_reply("INF?", "LBX-638")
        .with_reply("?HH", "1234.5")
        .with_reply("?BT", "25.3")
        .with_reply("?F", "0")
        .with_reply("?MAXLC", "1100")
        .with_reply("?T", "1");
    let laser = LbxLaser::new(mock, Profile::Current).unwrap();

    assert_eq!(laser.serial_number().unwrap(), "LBX-638-180-CSB-12345");
    assert_eq!(laser.identification().unwrap(), "LBX-638");
    assert_eq!(laser.operating_hours().unwrap(), "1234.5");
    assert_eq!(laser.temperature().unwrap(), "25.3");
    assert_eq!(laser.state().unwrap(), DeviceState::Warmup);
    assert!(laser.faults().unwrap().is_empty());
    assert_eq!(laser.current().unwrap(), 10.0);
    assert_eq!(laser.max_current().unwrap(), 1100.0);
    assert_eq!(laser.temperature_regulation().unwrap(), Switch::On);
}

#[test]
fn unassigned_state_code_is_a_decode_error() {
    let mock = MockTransport::new().with_reply("?F", "1");
    let laser = LcxLaser::from_connection(Connection::without_handshake(mock, Profile::Current));

    assert!(matches!(laser.state(), Err(LaserError::Decode { .. })));
}

#[test]
fn lbx_settings_commands() {
    let mock = MockTransport::new();
    let handle = mock.handle();
    let laser = LbxLaser::from_connection(Connection::without_handshake(mock, Profile::Current));

    laser.disable_cdrh().unwrap();
    laser.set_temperature_regulation(Switch::On).unwrap();
    laser.reset_faults().unwrap();
    laser.set_external_control_mode(Switch::Off).unwrap();

    assert_eq!(handle.written(), vec!["CDRH 0", "T 1", "RST 0", "AM 0"]);
}

#[test]
fn legacy_profile_uses_its_own_mnemonics() {
    let mock = MockTransport::new()
        .with_reply("?C", "10.0")
        .with_reply("?L", "1")
        .with_reply("?MAXLP", "60");
    let handle = mock.handle();
    let laser = LcxLaser::new(mock, Profile::Legacy).unwrap();
    handle.clear_written();

    laser.enable().unwrap();
    assert!(laser.is_emitting().unwrap());
    assert!(laser.set_power_setpoint(30.0).unwrap().is_sent());
    assert_eq!(handle.written(), vec!["L 1", "?L", "?MAXLP", "PM 30"]);
}

#[test]
fn legacy_profile_reports_unsupported_items_without_traffic() {
    let mock = MockTransport::new();
    let handle = mock.handle();
    let laser = LbxLaser::from_connection(Connection::without_handshake(mock, Profile::Legacy));

    assert!(matches!(
        laser.serial_number(),
        Err(LaserError::Unsupported {
            profile: Profile::Legacy,
            ..
        })
    ));
    assert!(matches!(
        laser.digital_modulation(),
        Err(LaserError::Unsupported { .. })
    ));
    assert!(handle.written().is_empty());
}

#[test]
fn handshake_clears_stale_bytes_first() {
    let mock = MockTransport::new()
        .with_stale_input(b"?SP 0\r\n")
        .with_reply("?C", "10.0")
        .with_reply("?SP", "12.5");
    let laser = LbxLaser::new(mock, Profile::Current).unwrap();

    assert_eq!(laser.power_setpoint().unwrap(), 12.5);
}

#[test]
fn silent_laser_is_not_constructed() {
    let mock = MockTransport::new()
        .with_timeout(Duration::from_millis(10))
        .unresponsive();
    assert!(matches!(
        LbxLaser::new(mock, Profile::Current),
        Err(LaserError::TransportTimeout { .. })
    ));
}
