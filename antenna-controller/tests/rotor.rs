use antenna_controller::{
    CommType, Limits, MemorySettings, ParkPosition, Rotor, RotorError, RotorType, SettingsStore,
    backends::{
        SlewRates,
        jrk::JrkAxis,
        stepper::{Axis, PinAssignment},
    },
    mock::MockConnector,
    transport::SerialParams,
};
use std::time::Duration;

fn mock_rotor() -> (Rotor, MockConnector) {
    let connector = MockConnector::new();
    let mut rotor = Rotor::with_connector(Box::new(connector.clone()));
    rotor.stepper_mut().set_pulse_width(Duration::ZERO);
    (rotor, connector)
}

#[test]
fn settings_survive_a_restart() {
    let (mut rotor, _connector) = mock_rotor();

    rotor.set_rotor_type(RotorType::AlphaSpid);
    rotor.enable(true);
    rotor.set_parking_enabled(true);
    rotor.set_limits(Limits::new(-10.0, 370.0), Limits::new(2.0, 88.0));
    rotor.set_park_position(ParkPosition {
        azimuth: 180.0,
        elevation: 5.0,
    });
    rotor.stepper_mut().set_pin_assignment(
        Axis::Elevation,
        PinAssignment {
            step_pin: 6,
            dir_pin: 7,
            ccw: true,
        },
    );
    rotor
        .gs232b_mut()
        .set_serial_params(SerialParams::new("/dev/ttyS4", 4800));
    rotor.spid_mut().set_resolution(4);
    rotor.spid_mut().set_slew_rates(SlewRates {
        azimuth: 3.0,
        elevation: 1.5,
    });
    rotor.jrk_mut().set_azimuth_axis(JrkAxis {
        device: 30,
        min_angle: -180.0,
        max_angle: 180.0,
        min_count: 200,
        max_count: 3800,
    });
    rotor
        .monstrum_mut()
        .set_travel(Limits::new(10.0, 170.0), Limits::new(5.0, 175.0));

    let mut store = MemorySettings::new();
    rotor.write_settings(&mut store);
    assert!(store.iter().all(|(key, _)| key.starts_with("Rotor/")));

    let (mut restored, _connector) = mock_rotor();
    restored.read_settings(&mut store);

    assert_eq!(restored.config(), rotor.config());
    assert_eq!(restored.rotor_type(), RotorType::AlphaSpid);
    assert!(restored.is_enabled());
    assert!(restored.parking_enabled());
    assert_eq!(
        restored.stepper().pin_assignment(Axis::Elevation),
        rotor.stepper().pin_assignment(Axis::Elevation)
    );
    assert_eq!(restored.gs232b().serial_params().port_name, "/dev/ttyS4");
    assert_eq!(restored.gs232b().serial_params().baud_rate, 4800);
    assert_eq!(restored.spid().resolution(), 4);
    assert_eq!(restored.spid().slew_rates(), rotor.spid().slew_rates());
    assert_eq!(restored.jrk().azimuth_axis(), rotor.jrk().azimuth_axis());

    // Monstrum travel shows up in how X/Y targets are clamped.
    let connector = MockConnector::new();
    let mut xy = Rotor::with_connector(Box::new(connector.clone()));
    xy.read_settings(&mut store);
    xy.set_rotor_type(RotorType::MonstrumXy);
    xy.open_port().unwrap();
    connector.wire.queue_reply(b"OK\r");
    xy.move_to_xy(0.0, 180.0).unwrap();
    assert_eq!(connector.wire.take_written(), b"MXY 10.00 175.00\r");
}

#[test]
fn settings_round_trip_through_file() {
    let (mut rotor, _connector) = mock_rotor();
    rotor.set_rotor_type(RotorType::Jrk);
    rotor.set_limits(Limits::new(0.0, 450.0), Limits::new(0.0, 180.0));

    let mut store = MemorySettings::new();
    rotor.write_settings(&mut store);

    let path = std::env::temp_dir().join(format!("rotor-settings-{}.json", std::process::id()));
    store.save(&path).unwrap();
    let mut loaded = MemorySettings::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let (mut restored, _connector) = mock_rotor();
    restored.read_settings(&mut loaded);
    assert_eq!(restored.config(), rotor.config());
}

#[test]
fn empty_settings_give_defaults() {
    let (mut rotor, _connector) = mock_rotor();
    let mut store = MemorySettings::new();
    rotor.read_settings(&mut store);

    let config = rotor.config();
    assert_eq!(config.rotor_type, RotorType::Stepper);
    assert_eq!(config.comm_type, CommType::Serial);
    assert_eq!(config.az_limits, Limits::new(0.0, 360.0));
    assert_eq!(config.el_limits, Limits::new(0.0, 90.0));
    assert!(!rotor.is_enabled());
    assert!(!rotor.parking_enabled());
}

#[test]
fn unknown_type_code_falls_back_to_stepper() {
    let (mut rotor, _connector) = mock_rotor();
    let mut store = MemorySettings::new();
    store.begin_group("Rotor");
    store.set_value("Type", 17i64.into());
    store.end_group();

    rotor.read_settings(&mut store);
    assert_eq!(rotor.rotor_type(), RotorType::Stepper);
}

#[test]
fn every_backend_refuses_motion_while_closed() {
    let (mut rotor, connector) = mock_rotor();

    for rotor_type in RotorType::ALL {
        rotor.set_rotor_type(rotor_type);
        let before = rotor.position();

        let attempts = [
            ("move_to", rotor.move_to(100.0, 40.0)),
            ("move_to_az", rotor.move_to_az(100.0)),
            ("move_to_el", rotor.move_to_el(40.0)),
        ];
        for (name, result) in attempts {
            assert!(
                matches!(result, Err(RotorError::NotOpen)),
                "{:?} {}: {:?}",
                rotor_type,
                name,
                result
            );
        }
        if rotor.is_xy() {
            let result = rotor.move_to_xy(30.0, 60.0);
            assert!(matches!(result, Err(RotorError::NotOpen)), "{:?}", result);
            assert_eq!(rotor.xy(), Some((90.0, 90.0)));
        }

        assert_eq!(rotor.position(), before, "{:?}", rotor_type);
        assert!(!rotor.error_string().is_empty(), "{:?}", rotor_type);
    }

    assert_eq!(connector.wire.writes(), 0);
    assert!(connector.parallel.latched().is_empty());
}

#[test]
fn nan_travel_in_settings_does_not_stop_motion() {
    let mut store = MemorySettings::new();
    store.begin_group("Rotor");
    store.set_value("Type", RotorType::MonstrumXy.code().into());
    store.begin_group("Monstrum");
    store.set_value("XMin", "nan".into());
    store.set_value("XMax", "nan".into());
    store.end_group();
    store.end_group();

    let (mut rotor, connector) = mock_rotor();
    rotor.read_settings(&mut store);
    rotor.open_port().unwrap();

    connector.wire.queue_reply(b"OK\r");
    rotor.move_to(90.0, 45.0).unwrap();
    assert_eq!(connector.wire.take_written(), b"MXY 90.00 45.00\r");

    // Limits set directly are sanitised too.
    rotor.set_limits(Limits::new(f64::NAN, 300.0), Limits::new(0.0, f64::NAN));
    connector.wire.queue_reply(b"OK\r");
    rotor.move_to(90.0, 45.0).unwrap();
    assert_eq!(connector.wire.take_written(), b"MXY 90.00 45.00\r");
}

#[test]
fn park_sends_exactly_one_move() {
    let (mut rotor, connector) = mock_rotor();
    rotor.set_rotor_type(RotorType::AlphaSpid);
    rotor.open_port().unwrap();

    rotor.park().unwrap();
    assert_eq!(connector.wire.writes(), 0);

    rotor.set_parking_enabled(true);
    rotor.park().unwrap();
    assert_eq!(connector.wire.writes(), 1);
    assert_eq!(connector.wire.take_written(), b"W0720\x020900\x02\x2f\x20");
}

#[test]
fn targets_never_leave_limits() {
    let (mut rotor, connector) = mock_rotor();
    rotor.set_rotor_type(RotorType::Gs232b);
    rotor.set_limits(Limits::new(20.0, 300.0), Limits::new(10.0, 60.0));
    rotor.open_port().unwrap();

    for (az, el) in [(-50.0, -5.0), (0.0, 0.0), (150.0, 30.0), (359.0, 89.0), (1e6, 1e6)] {
        rotor.move_to(az, el).unwrap();
        let written = String::from_utf8(connector.wire.take_written()).unwrap();
        let (sent_az, sent_el) = written
            .trim_start_matches('W')
            .trim_end()
            .split_once(' ')
            .unwrap();
        let (sent_az, sent_el): (f64, f64) = (sent_az.parse().unwrap(), sent_el.parse().unwrap());

        assert!((20.0..=300.0).contains(&sent_az), "az {} -> {}", az, sent_az);
        assert!((10.0..=60.0).contains(&sent_el), "el {} -> {}", el, sent_el);
    }
}

#[test]
fn xy_mount_converts_both_ways() {
    let (mut rotor, connector) = mock_rotor();
    rotor.set_rotor_type(RotorType::MonstrumXy);
    rotor.set_limits(Limits::new(0.0, 360.0), Limits::new(0.0, 90.0));
    rotor.open_port().unwrap();

    // Zenith is the middle of both booms.
    connector.wire.queue_reply(b"OK\r");
    rotor.move_to(123.0, 90.0).unwrap();
    assert_eq!(connector.wire.take_written(), b"MXY 0.00 90.00\r");

    connector.wire.queue_reply(b"POS 30.0 60.0 moving\r");
    rotor.read_position().unwrap();
    let (x, y) = antenna_controller::az_el_to_xy(rotor.azimuth(), rotor.elevation());
    assert!((x - 30.0).abs() < 1e-6);
    assert!((y - 60.0).abs() < 1e-6);
    assert_eq!(rotor.status_string(), "moving");
}

#[test]
fn switching_type_keeps_other_connections() {
    let (mut rotor, connector) = mock_rotor();
    rotor.set_rotor_type(RotorType::Gs232b);
    rotor.open_port().unwrap();

    rotor.set_rotor_type(RotorType::Jrk);
    rotor.open_port().unwrap();
    rotor.set_rotor_type(RotorType::Gs232b);
    assert!(rotor.is_port_open());

    drop(rotor);
    assert_eq!(
        connector.opened(),
        vec!["serial:/dev/ttyUSB0", "serial:/dev/ttyACM0"]
    );
}
