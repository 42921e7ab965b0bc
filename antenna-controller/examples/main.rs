use antenna_controller::{Rotor, RotorType, backends::Gs232b, transport::SerialParams};
use std::io::{BufRead, BufReader, Write};
use std::thread;
use std::time::Duration;

/*
 * Before running this example, use the command in the terminal:
 *
 * socat -d -d pty,raw,echo=0 pty,raw,echo=0
 *
 * to create two virtual ports. The rotor talks GS-232B on the first one,
 * a fake controller answers on the second.
 */

fn main() {
    let rotor_port = "/dev/pts/2".to_string();
    let controller_port = "/dev/pts/3".to_string();
    let baud_rate = 9600;

    // Fake controller thread
    let controller = thread::spawn(move || {
        let port = serialport::new(&controller_port, baud_rate)
            .timeout(Duration::from_secs(5))
            .open()
            .expect("Failed to open serial port (controller)");
        let mut writer = port.try_clone().expect("Failed to clone serial port");
        let mut reader = BufReader::new(port);

        for _ in 0..2 {
            let mut command = Vec::new();
            match reader.read_until(b'\r', &mut command) {
                Ok(n) if n > 0 => {
                    let command = String::from_utf8_lossy(&command);
                    println!("Controller: Received {:?}", command.trim_end());
                    if command.starts_with("C2") {
                        writer
                            .write_all(b"AZ=120  EL=030\r\n")
                            .expect("Failed to answer");
                    }
                }
                Ok(_) => println!("Controller: No data received"),
                Err(e) => println!("Controller: Failed to read command: {}", e),
            }
        }
    });

    thread::sleep(Duration::from_millis(200));

    let mut rotor = Rotor::new();
    rotor.set_rotor_type(RotorType::Gs232b);
    let gs232b: &mut Gs232b = rotor.gs232b_mut();
    gs232b.set_serial_params(SerialParams::new(&rotor_port, baud_rate));

    rotor.open_port().expect("Failed to open serial port (rotor)");
    rotor.move_to(120.0, 30.0).expect("Failed to send move");
    match rotor.read_position() {
        Ok(()) => println!(
            "Rotor: at az {:.1} el {:.1}",
            rotor.azimuth(),
            rotor.elevation()
        ),
        Err(e) => println!("Rotor: {}", e),
    }

    controller.join().unwrap();
}
