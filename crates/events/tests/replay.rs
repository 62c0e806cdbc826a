use std::io::IsTerminal;

use events::{EventParser, LogRecord, normalise_path};
use eyre::WrapErr;
use state::{ActivityStatus, SharedState};
use tracing_subscriber::EnvFilter;

// test suite "constructor"
#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    // error traces
    let _ = color_eyre::install();
}

/// Feed log lines through the parser the same way the tailer does, skipping undecodable ones
fn replay(parser: &EventParser, lines: &[&str]) -> eyre::Result<()> {
    for line in lines {
        match LogRecord::parse(line) {
            Ok(record) => parser
                .handle(&record)
                .wrap_err_with(|| format!("handling {}", record.kind))?,
            Err(e) => tracing::debug!(error = %e, "skipping line"),
        }
    }
    Ok(())
}

#[test]
fn breakpoint_session_end_to_end() -> eyre::Result<()> {
    let parser = EventParser::new(SharedState::default());
    replay(
        &parser,
        &[
            r#"{"message":"session:created","sessionId":"s1"}"#,
            r#"{"message":"tool:call","tool":"set_breakpoint","request":{"file":"a.py","line":10}}"#,
            r#"{"message":"tool:response","tool":"set_breakpoint","success":true,"response":{"line":10,"verified":true}}"#,
        ],
    )?;

    let state = parser.state().snapshot()?;
    let file = normalise_path("a.py");
    assert!(file.is_absolute());

    assert_eq!(state.session_id.as_deref(), Some("s1"));
    assert_eq!(
        state.breakpoints_for_file(&file).into_iter().collect::<Vec<_>>(),
        vec![10]
    );
    assert_eq!(state.breakpoints().len(), 1);

    let location = state.current_location.clone().expect("location set");
    assert_eq!(location.file_path, file);
    assert_eq!(location.line, 10);

    let activity: Vec<_> = state.activity().collect();
    assert_eq!(activity.len(), 3);
    assert_eq!(activity[1].status, ActivityStatus::Calling);
    assert_eq!(activity[1].details, "a.py:10");
    let last = activity.last().unwrap();
    assert_eq!(last.status, ActivityStatus::Success);
    assert!(last.details.contains("Line 10 (verified)"));
    Ok(())
}

#[test]
fn malformed_lines_do_not_interrupt_replay() -> eyre::Result<()> {
    let parser = EventParser::new(SharedState::default());
    replay(
        &parser,
        &[
            r#"{"message":"tool:call","tool":"step_over"}"#,
            "this is not json",
            r#"{"message":"server:started","port":3000}"#,
            "",
            r#"{"message":"tool:response","tool":"step_over"}"#,
        ],
    )?;

    let state = parser.state().snapshot()?;
    let details: Vec<_> = state.activity().map(|e| e.details.as_str()).collect();
    assert_eq!(details, vec!["Stepping...", "Step complete"]);
    Ok(())
}

#[test]
fn activity_order_follows_log_order() -> eyre::Result<()> {
    let parser = EventParser::new(SharedState::default());
    let lines: Vec<String> = (0..30)
        .map(|i| format!(r#"{{"message":"debug:stack_trace","frameCount":{i}}}"#))
        .collect();
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    replay(&parser, &lines)?;

    let state = parser.state().snapshot()?;
    let details: Vec<_> = state.activity().map(|e| e.details.clone()).collect();
    let expected: Vec<_> = (10..30).map(|i| format!("Got {i} frames")).collect();
    assert_eq!(details, expected);
    Ok(())
}

#[test]
fn pending_request_fills_missing_breakpoint_file() -> eyre::Result<()> {
    let parser = EventParser::new(SharedState::default());
    let dir = tempfile::tempdir()?;
    let script = dir.path().join("script.py");
    std::fs::write(&script, "x = 1\ny = 2\n")?;

    let call = serde_json::json!({
        "message": "tool:call",
        "tool": "set_breakpoint",
        "request": {"file": script, "line": 2},
    })
    .to_string();
    replay(
        &parser,
        &[
            &call,
            r#"{"message":"tool:response","tool":"set_breakpoint","response":{"verified":false}}"#,
        ],
    )?;

    let state = parser.state().snapshot()?;
    assert!(state.has_breakpoint(script.canonicalize()?, 2));
    assert_eq!(
        state.activity().last().map(|e| e.details.clone()),
        Some("Line ? (pending)".to_string())
    );
    Ok(())
}
