//! Tests for the handler table
//!
//! These tests verify:
//! - Each catalog command computes the right reply
//! - Edge cases (empty content, times = 0, multi-byte characters)
//! - Algebraic properties (double reverse, idempotent casing)
//! - START/STOP session effects

use ioservice::handler::{execute, handler_for};
use ioservice::protocol::{Command, Opcode, Reply, MAX_PAYLOAD_SIZE};
use ioservice::{ServiceError, Session};

// =============================================================================
// Helper Functions
// =============================================================================

fn run(command: Command) -> Reply {
    let mut session = Session::new();
    let reply = execute(&command, &mut session).unwrap();
    assert_eq!(reply.opcode(), command.opcode());
    reply
}

fn text(command: Command) -> String {
    run(command).content().unwrap().to_string()
}

const SAMPLES: &[&str] = &[
    "",
    "a",
    "Hello",
    "hello world 123",
    "Tab\tand\nnewline",
    "héllo wörld",
    "ÀÉÎ ñ",
    "日本語テキスト",
    "crab 🦀 emoji",
    "straße",
    "ǅ titlecase",
];

// =============================================================================
// ECHO
// =============================================================================

#[test]
fn test_echo_repeats_content() {
    assert_eq!(text(Command::echo(3, "ab")), "ababab");
    assert_eq!(text(Command::echo(1, "x y")), "x y");
}

#[test]
fn test_echo_zero_times_is_empty() {
    assert_eq!(text(Command::echo(0, "anything")), "");
}

#[test]
fn test_echo_length_property() {
    for content in SAMPLES {
        for times in 0..=5u32 {
            let reply = text(Command::echo(times, content));
            assert_eq!(reply.chars().count(), times as usize * content.chars().count());
            assert_eq!(reply, content.repeat(times as usize));
        }
    }
}

#[test]
fn test_echo_reply_too_large() {
    let content = "0123456789abcdef";
    let times = MAX_PAYLOAD_SIZE / content.len() as u32 + 1;
    let mut session = Session::new();

    match execute(&Command::echo(times, content), &mut session) {
        Err(ServiceError::Protocol(msg)) => assert!(msg.contains("exceeds")),
        other => panic!("Expected Protocol error, got {:?}", other),
    }
}

// =============================================================================
// REVERSE
// =============================================================================

#[test]
fn test_reverse() {
    assert_eq!(text(Command::reverse("Hello")), "olleH");
    assert_eq!(text(Command::reverse("")), "");
}

#[test]
fn test_reverse_keeps_multibyte_characters_intact() {
    assert_eq!(text(Command::reverse("aé日🦀")), "🦀日éa");
}

#[test]
fn test_reverse_twice_is_identity() {
    for content in SAMPLES {
        let once = text(Command::reverse(content));
        assert_eq!(text(Command::reverse(&once)), *content);
    }
}

// =============================================================================
// COUNT
// =============================================================================

#[test]
fn test_count_characters() {
    assert_eq!(run(Command::count("")).count_value(), Some(0));
    assert_eq!(run(Command::count("Hello")).count_value(), Some(5));
    // 4 characters, 10 bytes
    assert_eq!(run(Command::count("aé日🦀")).count_value(), Some(4));
}

#[test]
fn test_count_matches_char_count() {
    for content in SAMPLES {
        let count = run(Command::count(content)).count_value().unwrap();
        assert_eq!(count as usize, content.chars().count());
    }
}

// =============================================================================
// UPPER_CAST / LOWER_CAST
// =============================================================================

#[test]
fn test_upper_cast() {
    assert_eq!(text(Command::upper_cast("Hello World 42")), "HELLO WORLD 42");
    assert_eq!(text(Command::upper_cast("héllo")), "HÉLLO");
    assert_eq!(text(Command::upper_cast("")), "");
}

#[test]
fn test_lower_cast() {
    assert_eq!(text(Command::lower_cast("Hello World 42")), "hello world 42");
    assert_eq!(text(Command::lower_cast("ÀÉÎ")), "àéî");
    assert_eq!(text(Command::lower_cast("")), "");
}

#[test]
fn test_casing_is_idempotent() {
    for content in SAMPLES {
        let upper = text(Command::upper_cast(content));
        assert_eq!(text(Command::upper_cast(&upper)), upper);

        let lower = text(Command::lower_cast(content));
        assert_eq!(text(Command::lower_cast(&lower)), lower);
    }
}

#[test]
fn test_upper_cast_growth_past_max_payload() {
    // 'ΐ' is 2 bytes and upper-cases to 6 bytes
    let content = "ΐ".repeat(MAX_PAYLOAD_SIZE as usize / 4);
    let mut session = Session::new();

    match execute(&Command::upper_cast(&content), &mut session) {
        Err(ServiceError::Protocol(msg)) => assert!(msg.contains("exceeds")),
        other => panic!("Expected Protocol error, got {:?}", other.map(|r| r.payload().len())),
    }
}

#[test]
fn test_lower_cast_growth_past_max_payload() {
    // 'İ' is 2 bytes and lower-cases to 3 bytes
    let content = "İ".repeat(MAX_PAYLOAD_SIZE as usize / 2);
    let mut session = Session::new();

    match execute(&Command::lower_cast(&content), &mut session) {
        Err(ServiceError::Protocol(msg)) => assert!(msg.contains("exceeds")),
        other => panic!("Expected Protocol error, got {:?}", other.map(|r| r.payload().len())),
    }
}

#[test]
fn test_upper_cast_of_uppercase_is_unchanged() {
    for content in ["ABC", "HELLO WORLD 123", "ÀÉÎ", ""] {
        assert_eq!(text(Command::upper_cast(content)), content);
    }
}

// =============================================================================
// Session Handlers
// =============================================================================

#[test]
fn test_start_sets_lag() {
    let mut session = Session::new();
    assert!(!session.is_started());

    let reply = execute(&Command::start(20), &mut session).unwrap();
    assert_eq!(reply, Reply::ack(Opcode::Start));
    assert_eq!(session.lag(), Some(20));
    assert!(session.is_started());
}

#[test]
fn test_stop_tears_down_session() {
    let mut session = Session::new();
    execute(&Command::start(20), &mut session).unwrap();

    let reply = execute(&Command::stop(), &mut session).unwrap();
    assert_eq!(reply, Reply::ack(Opcode::Stop));
    assert_eq!(session.lag(), None);
    assert!(session.is_stopped());
}

#[test]
fn test_content_commands_leave_session_alone() {
    let mut session = Session::new();
    execute(&Command::start(7), &mut session).unwrap();
    execute(&Command::reverse("abc"), &mut session).unwrap();
    execute(&Command::echo(2, "x"), &mut session).unwrap();
    assert_eq!(session.lag(), Some(7));
}

#[test]
fn test_every_opcode_has_a_handler() {
    let mut session = Session::new();
    let commands = [
        Command::start(1),
        Command::stop(),
        Command::echo(1, "a"),
        Command::reverse("a"),
        Command::count("a"),
        Command::upper_cast("a"),
        Command::lower_cast("a"),
    ];

    for (opcode, command) in Opcode::ALL.iter().zip(commands.iter()) {
        assert_eq!(command.opcode(), *opcode);
        let reply = handler_for(*opcode)(command, &mut session).unwrap();
        assert_eq!(reply.opcode(), *opcode);
    }
}
