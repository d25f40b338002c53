use super::*;

#[test]
fn slash_prefix_searches() {
    assert_eq!(parse_command("/foo bar ", 10), Command::Search("foo bar".into()));
    assert_eq!(parse_command("/", 10), Command::Search(String::new()));
}

#[test]
fn row_numbers_are_one_based() {
    assert_eq!(parse_command("x 1", 10), Command::Toggle(0));
    assert_eq!(parse_command("m 1 3", 10), Command::Move { from: 0, to: 2 });
    assert!(matches!(parse_command("x 0", 10), Command::Invalid(_)));
    assert!(matches!(parse_command("m 2", 10), Command::Invalid(_)));
}

#[test]
fn scrolling_moves_by_page_height() {
    assert_eq!(parse_command("j", 15), Command::Scroll(15));
    assert_eq!(parse_command("k", 15), Command::Scroll(-15));
}

#[test]
fn blank_line_redraws_and_unknown_is_reported() {
    assert_eq!(parse_command("   ", 10), Command::Render);
    assert_eq!(parse_command("q", 10), Command::Quit);
    match parse_command("zap", 10) {
        Command::Invalid(message) => assert!(message.contains("zap")),
        other => panic!("unexpected command: {other:?}"),
    }
}
