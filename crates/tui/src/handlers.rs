use events::{EventKind, EventParser};
use eyre::WrapErr;
use tailer::LogTailer;

/// Route every record kind the parser understands from the tailer into the parser
pub fn register_handlers(tailer: &LogTailer, parser: &EventParser) -> eyre::Result<()> {
    for kind in EventKind::ALL {
        let parser = parser.clone();
        tailer
            .on_event(kind, move |record| {
                if let Err(e) = parser.handle(record) {
                    tracing::warn!(error = %e, kind = %record.kind, "error handling log record");
                }
            })
            .wrap_err_with(|| format!("registering handler for {kind}"))?;
    }
    tracing::debug!(count = EventKind::ALL.len(), "registered event handlers");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::LogRecord;
    use state::SharedState;
    use tailer::TailerOptions;

    #[test]
    fn every_kind_reaches_the_parser() {
        let dir = tempfile::tempdir().unwrap();
        let tailer = LogTailer::new(
            dir.path().join("server.log"),
            TailerOptions {
                cursor_path: dir.path().join("position"),
                ..TailerOptions::default()
            },
        );
        let state = SharedState::default();
        register_handlers(&tailer, &EventParser::new(state.clone())).unwrap();

        for line in [
            r#"{"message":"session:created","sessionId":"abc"}"#,
            r#"{"message":"debug:scopes","scopes":[{}]}"#,
            r#"{"message":"debug:output","output":"hi\n"}"#,
        ] {
            let record = LogRecord::parse(line).unwrap();
            assert!(tailer.inject(&record).unwrap());
        }

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.session_id.as_deref(), Some("abc"));
        let details: Vec<_> = snapshot.activity().map(|e| e.details.clone()).collect();
        assert_eq!(details, vec!["Created: abc", "Got 1 scopes", "output: hi"]);
    }
}
