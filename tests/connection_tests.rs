//! Dispatch loop tests
//!
//! Drive a `Connection` over in-memory streams: commands are pre-encoded
//! into a cursor, replies are collected in a `Vec<u8>`.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read};

use ioservice::network::{Connection, ConnectionState, ShutdownHandle};
use ioservice::protocol::{encode_command, read_reply, Command, Opcode, Reply};
use ioservice::ServiceError;

// =============================================================================
// Helper Functions
// =============================================================================

type Loopback = Connection<Cursor<Vec<u8>>, Vec<u8>>;

fn loopback(commands: &[Command]) -> Loopback {
    let mut input = Vec::new();
    for cmd in commands {
        input.extend_from_slice(&encode_command(cmd));
    }
    Connection::from_parts(Cursor::new(input), Vec::new(), "loopback")
}

fn replies<R: Read>(connection: &Connection<R, Vec<u8>>) -> Vec<Reply> {
    let mut cursor = Cursor::new(connection.writer().clone());
    let mut replies = Vec::new();
    while (cursor.position() as usize) < cursor.get_ref().len() {
        replies.push(read_reply(&mut cursor).unwrap());
    }
    replies
}

/// One scripted result for each `read` call on the inbound stream
enum Step {
    Data(Vec<u8>),
    /// What a socket read timeout looks like on Unix
    Timeout,
}

/// Inbound stream that replays a script, then reports EOF
struct Scripted {
    steps: VecDeque<Step>,
}

impl Scripted {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl Read for Scripted {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            None => Ok(0),
            Some(Step::Timeout) => Err(io::Error::new(io::ErrorKind::WouldBlock, "read timed out")),
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.steps.push_front(Step::Data(data.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

// =============================================================================
// Session Lifecycle
// =============================================================================

#[test]
fn test_start_echo_stop_scenario() {
    let mut conn = loopback(&[
        Command::start(20),
        Command::echo(3, "ab"),
        Command::stop(),
    ]);

    conn.handle().unwrap();

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.commands_served(), 3);
    assert_eq!(
        replies(&conn),
        vec![
            Reply::ack(Opcode::Start),
            Reply::text(Opcode::Echo, "ababab"),
            Reply::ack(Opcode::Stop),
        ]
    );
}

#[test]
fn test_nothing_processed_after_stop() {
    let mut conn = loopback(&[
        Command::start(1),
        Command::stop(),
        Command::reverse("never"),
        Command::count("never"),
    ]);

    conn.handle().unwrap();

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.commands_served(), 2);
    assert_eq!(replies(&conn).len(), 2);
    assert!(conn.session().is_stopped());
}

#[test]
fn test_serve_one_after_close_fails() {
    let mut conn = loopback(&[Command::stop()]);
    conn.serve_one().unwrap();
    assert_eq!(conn.state(), ConnectionState::Closed);

    match conn.serve_one() {
        Err(ServiceError::Connection(_)) => {}
        other => panic!("Expected Connection error, got {:?}", other),
    }
}

#[test]
fn test_serve_one_returns_to_awaiting() {
    let mut conn = loopback(&[Command::start(20), Command::reverse("Hello")]);

    conn.serve_one().unwrap();
    assert_eq!(conn.state(), ConnectionState::AwaitingCommand);
    assert_eq!(conn.session().lag(), Some(20));

    conn.serve_one().unwrap();
    assert_eq!(conn.state(), ConnectionState::AwaitingCommand);
    assert_eq!(replies(&conn)[1], Reply::text(Opcode::Reverse, "olleH"));
}

// =============================================================================
// Transport Loss
// =============================================================================

#[test]
fn test_eof_closes_quietly() {
    let mut conn = loopback(&[Command::count("")]);

    conn.handle().unwrap();

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(replies(&conn), vec![Reply::count(0)]);
}

#[test]
fn test_empty_stream_closes_without_replies() {
    let mut conn = loopback(&[]);
    conn.handle().unwrap();
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.commands_served(), 0);
    assert!(conn.writer().is_empty());
}

// =============================================================================
// Malformed Frames
// =============================================================================

#[test]
fn test_malformed_frame_poisons_connection() {
    let mut input = encode_command(&Command::reverse("ok"));
    // Unknown opcode, then a frame that would be valid on its own
    input.extend_from_slice(&[0x7F, 0x00, 0x00, 0x00, 0x00]);
    input.extend_from_slice(&encode_command(&Command::count("never")));

    let mut conn = Connection::from_parts(Cursor::new(input), Vec::new(), "loopback");

    match conn.handle() {
        Err(ServiceError::MalformedFrame(_)) => {}
        other => panic!("Expected MalformedFrame, got {:?}", other),
    }
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.commands_served(), 1);
    assert_eq!(replies(&conn), vec![Reply::text(Opcode::Reverse, "ko")]);
}

#[test]
fn test_invalid_utf8_poisons_connection() {
    let input = vec![0x06, 0x00, 0x00, 0x00, 0x01, 0xFF];
    let mut conn = Connection::from_parts(Cursor::new(input), Vec::new(), "loopback");

    assert!(conn.handle().is_err());
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(conn.writer().is_empty());
}

#[test]
fn test_truncated_frame_closes_without_reply() {
    let mut input = encode_command(&Command::echo(2, "abc"));
    input.truncate(input.len() - 1);

    let mut conn = Connection::from_parts(Cursor::new(input), Vec::new(), "loopback");
    conn.handle().unwrap();

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(conn.writer().is_empty());
}

// =============================================================================
// Simulated Lag
// =============================================================================

#[test]
fn test_simulated_lag_delays_replies() {
    let mut conn = loopback(&[Command::start(30), Command::reverse("ab")])
        .with_simulated_lag(true);

    let started = std::time::Instant::now();
    conn.handle().unwrap();

    // START and REVERSE replies are both sent after the lag is set
    assert!(started.elapsed() >= std::time::Duration::from_millis(60));
    assert_eq!(replies(&conn).len(), 2);
}

// =============================================================================
// Read Timeouts
// =============================================================================

#[test]
fn test_idle_timeout_keeps_session_open() {
    let steps = vec![
        Step::Data(encode_command(&Command::start(20))),
        Step::Timeout,
        Step::Timeout,
        Step::Data(encode_command(&Command::reverse("Hello"))),
    ];
    let mut conn = Connection::from_parts(Scripted::new(steps), Vec::new(), "scripted");

    conn.serve_one().unwrap();
    // Idle: no byte of the next frame yet
    conn.serve_one().unwrap();
    assert_eq!(conn.state(), ConnectionState::AwaitingCommand);
    assert_eq!(conn.session().lag(), Some(20));

    conn.handle().unwrap();

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.commands_served(), 2);
    assert_eq!(
        replies(&conn),
        vec![Reply::ack(Opcode::Start), Reply::text(Opcode::Reverse, "olleH")]
    );
}

#[test]
fn test_timeout_mid_frame_closes_connection() {
    let frame = encode_command(&Command::reverse("Hello"));
    let steps = vec![
        Step::Data(frame[..3].to_vec()),
        Step::Timeout,
        Step::Data(frame[3..].to_vec()),
    ];
    let mut conn = Connection::from_parts(Scripted::new(steps), Vec::new(), "scripted");

    conn.handle().unwrap();

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.commands_served(), 0);
    assert!(conn.writer().is_empty());
}

#[test]
fn test_idle_connection_closes_on_shutdown() {
    let shutdown = ShutdownHandle::new();
    let steps = vec![
        Step::Data(encode_command(&Command::start(1))),
        Step::Timeout,
        Step::Data(encode_command(&Command::reverse("never"))),
    ];
    let mut conn = Connection::from_parts(Scripted::new(steps), Vec::new(), "scripted")
        .with_shutdown(shutdown.clone());

    conn.serve_one().unwrap();
    shutdown.shutdown();
    conn.handle().unwrap();

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(replies(&conn), vec![Reply::ack(Opcode::Start)]);
}
