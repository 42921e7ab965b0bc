use antenna_controller::{Degrees, Rotor};
use log::{debug, warn};
use std::fmt;

/// Hamlib return codes used in `RPRT` replies.
const RIG_OK: i32 = 0;
const RIG_EINVAL: i32 = -1;
const RIG_ENAVAIL: i32 = -4;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPos { az: Degrees, el: Degrees },
    GetPos,
    Stop,
    Park,
    GetInfo,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Unknown(String),
    BadArgument(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Unknown(cmd) => write!(f, "Unknown command {:?}", cmd),
            ParseError::BadArgument(arg) => write!(f, "Bad argument {:?}", arg),
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    fn code(&self) -> i32 {
        match self {
            ParseError::Unknown(_) => RIG_ENAVAIL,
            ParseError::BadArgument(_) => RIG_EINVAL,
        }
    }
}

/// What the server should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Close,
}

fn report(code: i32) -> Reply {
    Reply::Text(format!("RPRT {}\n", code))
}

fn parse_degrees(arg: Option<&str>) -> Result<Degrees, ParseError> {
    let arg = arg.ok_or_else(|| ParseError::BadArgument(String::new()))?;
    arg.replace(',', ".")
        .parse::<Degrees>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::BadArgument(arg.to_owned()))
}

/// Parses one line of the rotctl protocol.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let name = words.next().unwrap_or_default();

    let command = match name {
        "P" | "\\set_pos" => Command::SetPos {
            az: parse_degrees(words.next())?,
            el: parse_degrees(words.next())?,
        },
        "p" | "\\get_pos" => Command::GetPos,
        "S" | "\\stop" => Command::Stop,
        "K" | "\\park" => Command::Park,
        "_" | "\\get_info" => Command::GetInfo,
        "q" | "Q" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_owned())),
    };

    Ok(command)
}

/// Runs `command` against the rotor and builds the reply.
pub fn execute(rotor: &mut Rotor, command: Command) -> Reply {
    debug!("{:?}", command);

    match command {
        Command::SetPos { az, el } => {
            if !rotor.is_port_open() {
                if let Err(err) = rotor.open_port() {
                    warn!("Cannot open rotor port: {}", err);
                    return report(RIG_EINVAL);
                }
            }
            status(rotor.move_to(az, el))
        }
        Command::GetPos => match rotor.read_position() {
            Ok(()) => Reply::Text(format!("{:.6}\n{:.6}\n", rotor.azimuth(), rotor.elevation())),
            Err(_) => report(RIG_EINVAL),
        },
        Command::Stop => status(rotor.stop_motor()),
        Command::Park => status(rotor.park()),
        Command::GetInfo => Reply::Text(format!("{}\n", rotor.rotor_name())),
        Command::Quit => Reply::Close,
    }
}

fn status<E>(result: Result<(), E>) -> Reply {
    match result {
        Ok(()) => report(RIG_OK),
        Err(_) => report(RIG_EINVAL),
    }
}

/// Parses and executes one line.
pub fn handle_line(rotor: &mut Rotor, line: &str) -> Reply {
    match parse(line) {
        Ok(command) => execute(rotor, command),
        Err(err) => {
            warn!("{}", err);
            report(err.code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antenna_controller::{RotorType, mock::MockConnector};

    fn rotor(rotor_type: RotorType) -> (Rotor, MockConnector) {
        let connector = MockConnector::new();
        let mut rotor = Rotor::with_connector(Box::new(connector.clone()));
        rotor.set_rotor_type(rotor_type);
        (rotor, connector)
    }

    fn text(reply: Reply) -> String {
        match reply {
            Reply::Text(text) => text,
            Reply::Close => panic!("unexpected close"),
        }
    }

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!(
            parse("P 180.5 45").unwrap(),
            Command::SetPos { az: 180.5, el: 45.0 }
        );
        assert_eq!(
            parse("\\set_pos 10 20").unwrap(),
            Command::SetPos { az: 10.0, el: 20.0 }
        );
        assert_eq!(parse("p").unwrap(), Command::GetPos);
        assert_eq!(parse("\\get_pos").unwrap(), Command::GetPos);
        assert_eq!(parse("S").unwrap(), Command::Stop);
        assert_eq!(parse("\\park").unwrap(), Command::Park);
        assert_eq!(parse("_").unwrap(), Command::GetInfo);
        assert_eq!(parse("q").unwrap(), Command::Quit);
    }

    #[test]
    fn accepts_decimal_commas() {
        assert_eq!(
            parse("P 12,5 7,25").unwrap(),
            Command::SetPos { az: 12.5, el: 7.25 }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse("P 10"), Err(ParseError::BadArgument(_))));
        assert!(matches!(parse("P ten 10"), Err(ParseError::BadArgument(_))));
        assert!(matches!(parse("P nan 10"), Err(ParseError::BadArgument(_))));
        assert!(matches!(parse("X"), Err(ParseError::Unknown(_))));
        assert!(matches!(parse(""), Err(ParseError::Unknown(_))));
    }

    #[test]
    fn unknown_command_reports_not_available() {
        let (mut rotor, _connector) = rotor(RotorType::Gs232b);
        assert_eq!(text(handle_line(&mut rotor, "\\dump_caps")), "RPRT -4\n");
        assert_eq!(text(handle_line(&mut rotor, "P x y")), "RPRT -1\n");
    }

    #[test]
    fn set_pos_opens_port_on_demand() {
        let (mut rotor, connector) = rotor(RotorType::Gs232b);

        assert_eq!(text(handle_line(&mut rotor, "P 90 45")), "RPRT 0\n");
        assert_eq!(connector.opened(), vec!["serial:/dev/ttyUSB0"]);
        assert_eq!(connector.wire.take_written(), b"W090 045\r");
    }

    #[test]
    fn set_pos_fails_when_port_cannot_open() {
        let (mut rotor, connector) = rotor(RotorType::Gs232b);
        connector.refuse_open(true);

        assert_eq!(text(handle_line(&mut rotor, "P 90 45")), "RPRT -1\n");
    }

    #[test]
    fn get_pos_prints_both_axes() {
        let (mut rotor, connector) = rotor(RotorType::Gs232b);
        rotor.open_port().unwrap();

        connector.wire.queue_reply(b"AZ=123  EL=045\r");
        assert_eq!(
            text(handle_line(&mut rotor, "p")),
            "123.000000\n45.000000\n"
        );

        assert_eq!(text(handle_line(&mut rotor, "p")), "RPRT -1\n");
    }

    #[test]
    fn info_and_quit() {
        let (mut rotor, _connector) = rotor(RotorType::Jrk);
        assert_eq!(
            text(handle_line(&mut rotor, "_")),
            "Pololu Jrk Motor Control\n"
        );
        assert_eq!(handle_line(&mut rotor, "Q"), Reply::Close);
    }

    #[test]
    fn park_and_stop() {
        let (mut rotor, connector) = rotor(RotorType::Gs232b);
        rotor.open_port().unwrap();

        assert_eq!(text(handle_line(&mut rotor, "K")), "RPRT 0\n");
        assert_eq!(connector.wire.writes(), 0);

        assert_eq!(text(handle_line(&mut rotor, "S")), "RPRT 0\n");
        assert_eq!(connector.wire.take_written(), b"S\r");
    }
}
