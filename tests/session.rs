//! Session manager integration tests
//!
//! Drives full turns against mock collaborators and checks the durable log

use std::sync::Arc;

use john::history::read_entries;
use john::session::{TRIM_RETAIN, TRIM_THRESHOLD};
use john::{Error, LogRole, Message, Role, SessionManager};

mod common;
use common::{MockChat, MockSpeech, collaborators, loader, test_config, test_manager, write_config};

#[tokio::test]
async fn test_single_turn_is_logged() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::replying(&["Hi there."]));

    let mut session = manager.start_session("Be brief.").unwrap();
    let reply = manager.submit_text(&mut session, "Hello").await.unwrap();

    assert_eq!(reply, "Hi there.");
    assert_eq!(
        session.messages(),
        &[
            Message::system("Be brief."),
            Message::user("Hello"),
            Message::assistant("Hi there."),
        ]
    );

    let entries = read_entries(manager.history_path()).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].role, LogRole::System);
    assert_eq!(entries[0].content.as_deref(), Some("Be brief."));
    assert_eq!(entries[0].model.as_deref(), Some("gpt-5-nano"));
    assert_eq!(entries[1].role, LogRole::User);
    assert_eq!(entries[1].content.as_deref(), Some("Hello"));
    assert!(entries[1].model.is_none());
    assert_eq!(entries[2].role, LogRole::Assistant);
    assert_eq!(entries[2].content.as_deref(), Some("Hi there."));
    assert!(entries.iter().all(|e| e.session == session.id()));
}

#[tokio::test]
async fn test_chat_receives_full_history() {
    let tmp = tempfile::tempdir().unwrap();
    let chat = MockChat::replying(&["one", "two"]);
    let requests = chat.requests();
    let mut manager = test_manager(tmp.path(), chat);

    let mut session = manager.start_default_session().unwrap();
    manager.submit_text(&mut session, "first").await.unwrap();
    manager.submit_text(&mut session, "second").await.unwrap();

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].len(), 4);
    assert_eq!(requests[1][0], Message::system("Be brief."));
    assert_eq!(requests[1][3], Message::user("second"));
}

#[tokio::test]
async fn test_long_conversation_is_trimmed() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::default());
    let mut session = manager.start_session("P").unwrap();

    for i in 0..20 {
        manager.append_user_turn(&mut session, &format!("u{i}")).unwrap();
        manager.append_assistant_turn(&mut session, &format!("a{i}")).unwrap();
    }
    assert_eq!(session.len(), 41);

    let removed = manager.trim(&mut session);
    assert_eq!(removed, 26);
    assert_eq!(session.len(), TRIM_RETAIN + 1);
    assert_eq!(session.messages()[0], Message::system("P"));
    assert_eq!(session.messages()[1], Message::user("u13"));
    assert_eq!(session.messages()[14], Message::assistant("a19"));

    // Trimming never touches the durable log
    let entries = read_entries(manager.history_path()).unwrap();
    assert_eq!(entries.len(), 41);
}

#[tokio::test]
async fn test_trim_after_each_user_turn() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::default());
    let mut session = manager.start_session("P").unwrap();

    for i in 0..20 {
        manager.append_user_turn(&mut session, &format!("u{i}")).unwrap();
        manager.trim(&mut session);
        assert!(session.len() <= TRIM_THRESHOLD);
        assert_eq!(session.messages()[0], Message::system("P"));
    }

    let expected: Vec<Message> = std::iter::once(Message::system("P"))
        .chain((6..20).map(|i| Message::user(format!("u{i}"))))
        .collect();
    assert_eq!(session.messages(), expected.as_slice());
    assert_eq!(read_entries(manager.history_path()).unwrap().len(), 21);
}

#[tokio::test]
async fn test_history_stays_bounded_across_turns() {
    let tmp = tempfile::tempdir().unwrap();
    let chat = MockChat::default();
    let requests = chat.requests();
    let mut manager = test_manager(tmp.path(), chat);
    let mut session = manager.start_default_session().unwrap();

    for i in 0..12 {
        manager.submit_text(&mut session, &format!("turn {i}")).await.unwrap();
        assert!(session.len() <= TRIM_THRESHOLD + 1);
        assert_eq!(session.messages()[0].role, Role::System);
    }

    let requests = requests.lock().unwrap();
    assert!(requests.iter().all(|r| r.len() <= TRIM_THRESHOLD));
    assert!(requests.iter().all(|r| r[0] == Message::system("Be brief.")));
}

#[tokio::test]
async fn test_blank_input_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::default());
    let mut session = manager.start_default_session().unwrap();

    for text in ["", "   ", "\t\n"] {
        let err = manager.submit_text(&mut session, text).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{text:?} gave {err}");
    }

    assert_eq!(session.len(), 1);
    assert_eq!(read_entries(manager.history_path()).unwrap().len(), 1);
}

#[tokio::test]
async fn test_user_text_stored_verbatim() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::default());
    let mut session = manager.start_default_session().unwrap();

    manager.append_user_turn(&mut session, "  spaced  ").unwrap();
    assert_eq!(session.messages()[1].content, "  spaced  ");
}

#[tokio::test]
async fn test_timestamps_non_decreasing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::default());
    let mut session = manager.start_default_session().unwrap();

    for i in 0..5 {
        manager.submit_text(&mut session, &format!("m{i}")).await.unwrap();
    }
    manager.end_session(&mut session).unwrap();

    let stamps: Vec<chrono::DateTime<chrono::Utc>> = read_entries(manager.history_path())
        .unwrap()
        .iter()
        .map(|e| chrono::DateTime::parse_from_rfc3339(&e.ts).unwrap().into())
        .collect();
    assert_eq!(stamps.len(), 12);
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_ended_session_rejects_mutation() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::default());
    let mut session = manager.start_default_session().unwrap();

    tokio_test::assert_ok!(manager.end_session(&mut session));
    assert!(session.is_ended());

    assert!(matches!(
        manager.append_user_turn(&mut session, "hi"),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        manager.append_assistant_turn(&mut session, "hi"),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(manager.clear(&mut session), Err(Error::InvalidState(_))));
    assert!(matches!(manager.end_session(&mut session), Err(Error::InvalidState(_))));

    let entries = read_entries(manager.history_path()).unwrap();
    let last = entries.last().unwrap();
    assert_eq!(last.role, LogRole::Meta);
    assert_eq!(last.event.as_deref(), Some("end"));
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_chat_failure_keeps_session_usable() {
    let tmp = tempfile::tempdir().unwrap();
    let chat = MockChat::failing("401 unauthorized").then("recovered");
    let mut manager = test_manager(tmp.path(), chat);
    let mut session = manager.start_default_session().unwrap();

    let err = manager.submit_text(&mut session, "first").await.unwrap_err();
    assert!(matches!(err, Error::Chat(_)));
    assert_eq!(session.len(), 2, "user message stays in history");

    let reply = manager.submit_text(&mut session, "second").await.unwrap();
    assert_eq!(reply, "recovered");
    assert_eq!(session.len(), 4);
    assert_eq!(session.messages()[3], Message::assistant("recovered"));
}

#[tokio::test]
async fn test_blank_reply_is_chat_error() {
    let tmp = tempfile::tempdir().unwrap();
    let chat = MockChat::replying(&["", "  "]).then("Hi there.");
    let mut manager = test_manager(tmp.path(), chat);
    let mut session = manager.start_default_session().unwrap();

    for text in ["one", "two"] {
        let err = manager.submit_text(&mut session, text).await.unwrap_err();
        assert!(matches!(err, Error::Chat(_)));
    }
    assert!(session.messages().iter().all(|m| m.role != Role::Assistant));

    let reply = manager.submit_text(&mut session, "three").await.unwrap();
    assert_eq!(reply, "Hi there.");

    let entries = read_entries(manager.history_path()).unwrap();
    let assistant: Vec<&str> = entries
        .iter()
        .filter(|e| e.role == LogRole::Assistant)
        .filter_map(|e| e.content.as_deref())
        .collect();
    assert_eq!(assistant, ["Hi there."]);
}

#[tokio::test]
async fn test_speech_failure_is_swallowed() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), "P");
    let speech = MockSpeech::failing();
    let spoken = Arc::clone(&speech.spoken);

    let mut collabs = collaborators(tmp.path(), MockChat::replying(&["Hi there."]));
    collabs.speech = Some(Arc::new(speech));
    let mut manager = SessionManager::new(config, collabs);
    manager.set_speak(true);

    let mut session = manager.start_default_session().unwrap();
    let reply = manager.submit_text(&mut session, "Hello").await.unwrap();

    assert_eq!(reply, "Hi there.");
    assert_eq!(spoken.lock().unwrap().as_slice(), ["Hi there."]);
    assert_eq!(session.len(), 3);
}

#[tokio::test]
async fn test_speech_off_skips_synthesis() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), "P");
    let speech = MockSpeech::default();
    let spoken = Arc::clone(&speech.spoken);

    let mut collabs = collaborators(tmp.path(), MockChat::default());
    collabs.speech = Some(Arc::new(speech));
    let mut manager = SessionManager::new(config, collabs);
    assert!(!manager.speak());

    let mut session = manager.start_default_session().unwrap();
    manager.submit_text(&mut session, "Hello").await.unwrap();
    assert!(spoken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_voice_turn() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::replying(&["Noon."]));
    let mut session = manager.start_default_session().unwrap();

    let turn = manager.submit_voice(&mut session).await.unwrap();
    assert_eq!(turn.user, "What time is it?");
    assert_eq!(turn.reply, "Noon.");
    assert_eq!(session.messages()[1], Message::user("What time is it?"));
}

#[tokio::test]
async fn test_blank_transcript_is_validation_error() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), "P");
    let mut collabs = collaborators(tmp.path(), MockChat::default());
    collabs.transcriber = Arc::new(common::MockTranscriber::new("  "));
    let mut manager = SessionManager::new(config, collabs);

    let mut session = manager.start_default_session().unwrap();
    let err = manager.submit_voice(&mut session).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(session.len(), 1);
}

#[tokio::test]
async fn test_clear_resets_to_persona() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::default());
    let mut session = manager.start_default_session().unwrap();
    manager.submit_text(&mut session, "Hello").await.unwrap();

    manager.clear(&mut session).unwrap();
    assert_eq!(session.messages(), &[Message::system("Be brief.")]);

    let entries = read_entries(manager.history_path()).unwrap();
    assert_eq!(entries.last().unwrap().event.as_deref(), Some("clear"));
}

#[tokio::test]
async fn test_reload_applies_new_settings() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::default());
    let mut session = manager.start_default_session().unwrap();
    manager.submit_text(&mut session, "Hello").await.unwrap();

    write_config(
        tmp.path(),
        r#"{"OPENAI_API_KEY": "sk-test", "ELEVEN_API_KEY": "el-test", "MODEL": "gpt-4o-mini", "SPEAK": true}"#,
        "Be verbose.",
    );
    let settings = manager.reload(&session).unwrap();

    assert_eq!(settings.model, "gpt-4o-mini");
    assert!(settings.speak);
    assert_eq!(manager.model(), "gpt-4o-mini");
    assert!(manager.speak());
    assert!(manager.config().speech_available());

    // The running conversation keeps its persona; only a clear picks up the new one
    assert_eq!(session.persona(), "Be brief.");
    assert_eq!(session.len(), 3);
    manager.clear(&mut session).unwrap();
    assert_eq!(session.persona(), "Be verbose.");

    let entries = read_entries(manager.history_path()).unwrap();
    let reload = entries
        .iter()
        .find(|e| e.event.as_deref() == Some("reload"))
        .unwrap();
    assert_eq!(reload.role, LogRole::Meta);
    assert_eq!(reload.model.as_deref(), Some("gpt-4o-mini"));
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_config() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = test_manager(tmp.path(), MockChat::replying(&["still here"]));
    let session = manager.start_default_session().unwrap();

    write_config(tmp.path(), "{ not json", "Be brief.");
    let err = manager.reload(&session).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(manager.model(), "gpt-5-nano");

    write_config(tmp.path(), r#"{"MODEL": "gpt-4o-mini"}"#, "Be brief.");
    assert!(matches!(manager.reload(&session), Err(Error::Config(_))));
    assert_eq!(manager.model(), "gpt-5-nano");

    // Old collaborators are still wired up
    let mut session = session;
    let reply = manager.submit_text(&mut session, "ping").await.unwrap();
    assert_eq!(reply, "still here");
}

#[tokio::test]
async fn test_reload_without_source_is_config_error() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), "P");
    let mut manager = SessionManager::new(config, collaborators(tmp.path(), MockChat::default()));
    let session = manager.start_default_session().unwrap();

    let err = tokio_test::assert_err!(manager.reload(&session));
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_from_loader_requires_api_key() {
    let tmp = tempfile::tempdir().unwrap();
    write_config(tmp.path(), "{}", "P");

    let err = SessionManager::from_loader(loader(tmp.path())).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
