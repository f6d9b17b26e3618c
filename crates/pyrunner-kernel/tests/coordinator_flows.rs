//! End-to-end coordinator tests against the scripted backend.
//!
//! Gates hold individual backend calls open so the tests can choose the
//! order in which concurrent requests complete.

use std::sync::Arc;
use std::time::Duration;

use pyrunner_kernel::{
    Coordinator, FlowError, FlowInvoker, InvokerSettings, Level, LlmError, LlmRole, Resolution,
    ScriptedProvider, SlotState, StalePolicy,
};
use pyrunner_types::{ChatRole, Credential, FlowKind};

fn setup(policy: StalePolicy) -> (Arc<ScriptedProvider>, Coordinator) {
    let provider = Arc::new(ScriptedProvider::new());
    let invoker = FlowInvoker::new(provider.clone(), InvokerSettings::default());
    (provider, Coordinator::new(invoker, policy))
}

fn key(value: &str) -> Option<Credential> {
    Some(Credential::new(value))
}

fn question(text: &str) -> String {
    format!("latest question:\n{text}")
}

#[tokio::test]
async fn test_annotate_scenario() {
    let (provider, coord) = setup(StalePolicy::Apply);
    let mut coord = coord.with_document("print('hi')");
    let mut notes = coord.notifications().subscribe("notify.>");

    provider.on(
        "Project Requirements: add docstrings",
        ScriptedProvider::json("annotatedCode", "# greets\nprint('hi')"),
    );
    coord.annotate("add docstrings").unwrap();
    coord.settle().await;

    assert_eq!(coord.document().text(), "# greets\nprint('hi')");
    let note = notes.recv().await.unwrap();
    assert_eq!(note.level, Level::Success);
    assert_eq!(note.kind, FlowKind::Annotate);
    assert!(notes.try_recv().is_none());
}

#[tokio::test]
async fn test_every_kind_terminates() {
    let (provider, coord) = setup(StalePolicy::Apply);
    let mut coord = coord.with_document("def f():\n    return 1");

    provider
        .on("comments", ScriptedProvider::json("annotatedCode", "# f\ndef f():\n    return 1"))
        .on("test case generator", "no json here")
        .on("latest question", ScriptedProvider::json("response", "It returns 1."));
    provider.on_error("continuation", LlmError::RateLimited("slow down".into()));

    let ids = [
        coord.annotate("explain f").unwrap(),
        coord.generate_tests(None).unwrap(),
        coord.send_chat("what does f do?", key("k")).unwrap(),
        coord.request_suggestion(key("k")).unwrap(),
    ];
    assert_eq!(coord.pending().len(), 4);

    let resolutions = coord.settle().await;
    assert_eq!(resolutions.len(), 4);
    for id in ids {
        assert_eq!(resolutions.iter().filter(|r| r.request() == id).count(), 1);
        assert!(!coord.is_pending(id));
    }

    let failed: Vec<_> = resolutions
        .iter()
        .filter_map(|r| match r {
            Resolution::Failed { kind, error, .. } => Some((*kind, error.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().any(|(k, e)| *k == FlowKind::GenerateTests && matches!(e, FlowError::Protocol(_))));
    assert!(failed.iter().any(|(k, e)| *k == FlowKind::Suggest && matches!(e, FlowError::Transport(_))));

    assert!(coord.test_listing().is_none());
    assert_eq!(coord.suggestion().state(), &SlotState::Idle);
}

#[tokio::test]
async fn test_accept_and_reject() {
    let (provider, coord) = setup(StalePolicy::Apply);
    let mut coord = coord.with_document("def add(a, b):");

    provider.on("continuation", ScriptedProvider::json("suggestion", "\n    return a + b"));
    coord.request_suggestion(key("k")).unwrap();
    coord.settle().await;
    coord.accept_suggestion().unwrap();
    assert_eq!(coord.document().text(), "def add(a, b):\n    return a + b");

    provider.on("continuation", ScriptedProvider::json("suggestion", "\n\nprint(add(1, 2))"));
    coord.request_suggestion(key("k")).unwrap();
    coord.settle().await;
    let before = coord.document().text().to_string();

    assert!(coord.reject_suggestion().is_some());
    assert!(coord.reject_suggestion().is_none());
    assert_eq!(coord.document().text(), before);
    assert!(coord.suggestion().current().is_none());
}

#[tokio::test]
async fn test_chat_order_survives_out_of_order_replies() {
    let (provider, coord) = setup(StalePolicy::Apply);
    let mut coord = coord.with_document("x = 1");

    let gate_a = provider.gate(question("a?"));
    let gate_b = provider.gate(question("b?"));

    let a = coord.send_chat("a?", key("k")).unwrap();
    let b = coord.send_chat("b?", key("k")).unwrap();

    gate_b.release(ScriptedProvider::json("response", "answer b"));
    assert_eq!(coord.next_completion().await.unwrap().request(), b);
    gate_a.release(ScriptedProvider::json("response", "answer a"));
    assert_eq!(coord.next_completion().await.unwrap().request(), a);

    let messages = coord.chat().messages();
    let users: Vec<_> = messages
        .iter()
        .filter(|m| m.role == ChatRole::User)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(users, ["a?", "b?"]);
    assert!(messages.windows(2).all(|w| w[0].ordinal < w[1].ordinal));
    assert_eq!(messages.len(), 4);

    // The second turn's history held only the first user message.
    let calls = provider.calls();
    let second = calls.iter().find(|c| c.prompt.contains(&question("b?"))).unwrap();
    assert_eq!(second.messages.len(), 2);
    assert_eq!(second.messages[0].role, LlmRole::User);
    assert_eq!(second.messages[0].content, "a?");
    assert!(second.prompt.starts_with("user: a?\nuser: "));
    assert!(second.system.as_deref().unwrap().contains("\"response\""));
}

#[tokio::test]
async fn test_last_completed_suggestion_wins() {
    for newer_first in [true, false] {
        let (provider, coord) = setup(StalePolicy::Apply);
        let mut coord = coord.with_document("alpha = 1");

        let older_gate = provider.gate("alpha = 1");
        let older = coord.request_suggestion(key("k")).unwrap();
        coord.edit_document("beta = 2");
        let newer_gate = provider.gate("beta = 2");
        let newer = coord.request_suggestion(key("k")).unwrap();

        let expected = if newer_first {
            newer_gate.release(ScriptedProvider::json("suggestion", "from newer"));
            assert_eq!(coord.next_completion().await.unwrap().request(), newer);
            older_gate.release(ScriptedProvider::json("suggestion", "from older"));
            assert_eq!(coord.next_completion().await.unwrap().request(), older);
            "from older"
        } else {
            older_gate.release(ScriptedProvider::json("suggestion", "from older"));
            assert_eq!(coord.next_completion().await.unwrap().request(), older);
            newer_gate.release(ScriptedProvider::json("suggestion", "from newer"));
            assert_eq!(coord.next_completion().await.unwrap().request(), newer);
            "from newer"
        };

        assert_eq!(coord.suggestion().current().unwrap().text, expected);
        assert!(!coord.has_pending());
    }
}

#[tokio::test]
async fn test_discard_superseded_annotation() {
    let (provider, coord) = setup(StalePolicy::DiscardSuperseded);
    let mut coord = coord.with_document("y = 2");
    let mut notes = coord.notifications().subscribe("notify.annotate.>");

    let first_gate = provider.gate("Project Requirements: first");
    let first = coord.annotate("first").unwrap();
    provider.on(
        "Project Requirements: second",
        ScriptedProvider::json("annotatedCode", "# second\ny = 2"),
    );
    let second = coord.annotate("second").unwrap();

    assert_eq!(coord.next_completion().await.unwrap().request(), second);
    first_gate.release(ScriptedProvider::json("annotatedCode", "# first\ny = 2"));
    assert_eq!(
        coord.next_completion().await.unwrap(),
        Resolution::Discarded { request: first, kind: FlowKind::Annotate }
    );

    assert_eq!(coord.document().text(), "# second\ny = 2");
    assert_eq!(notes.try_recv().unwrap().request, Some(second));
    assert!(notes.try_recv().is_none());
}

#[tokio::test]
async fn test_chat_replies_never_discarded() {
    let (provider, coord) = setup(StalePolicy::DiscardSuperseded);
    let mut coord = coord.with_document("z = 3");

    let gate = provider.gate(question("one"));
    provider.on(question("two"), ScriptedProvider::json("response", "reply two"));
    coord.send_chat("one", key("k")).unwrap();
    coord.send_chat("two", key("k")).unwrap();

    coord.next_completion().await.unwrap();
    gate.release(ScriptedProvider::json("response", "reply one"));
    let last = coord.next_completion().await.unwrap();
    assert!(matches!(last, Resolution::Applied { kind: FlowKind::Chat, .. }));
    assert_eq!(coord.chat().messages().len(), 4);
}

#[tokio::test]
async fn test_missing_credential_blocks_dispatch() {
    let (provider, coord) = setup(StalePolicy::Apply);
    let mut coord = coord.with_document("x = 1");
    let mut notes = coord.notifications().subscribe("notify.*.failure");

    let err = coord.request_suggestion(None).unwrap_err();
    assert!(matches!(err, FlowError::Precondition(_)));
    let err = coord.request_suggestion(key("   ")).unwrap_err();
    assert!(matches!(err, FlowError::Precondition(_)));

    assert_eq!(provider.call_count(), 0);
    assert!(!coord.has_pending());
    assert_eq!(coord.suggestion().state(), &SlotState::Idle);
    assert_eq!(notes.try_recv().unwrap().title, "API Key Required");
}

#[tokio::test]
async fn test_malformed_reply_reports_operation_failed() {
    let (provider, coord) = setup(StalePolicy::Apply);
    let mut coord = coord.with_document("x = 1");
    let mut notes = coord.notifications().subscribe("notify.generate_tests.failure");

    provider.on("test case generator", r#"{"tests": "wrong field"}"#);
    coord.generate_tests(Some("x is one".into())).unwrap();
    coord.settle().await;

    let note = notes.try_recv().unwrap();
    assert_eq!(note.title, "Error Generating Test Cases");
    assert!(note.message.starts_with("operation failed: "));
    assert!(coord.test_listing().is_none());
}

#[tokio::test]
async fn test_credentials_are_per_request() {
    let (provider, coord) = setup(StalePolicy::Apply);
    let mut coord = coord.with_document("x = 1");

    provider
        .on(question("from alice"), ScriptedProvider::json("response", "hi alice"))
        .on(question("from bob"), ScriptedProvider::json("response", "hi bob"));
    coord.send_chat("from alice", key("alice-key")).unwrap();
    coord.send_chat("from bob", key("bob-key")).unwrap();
    coord.settle().await;

    for call in provider.calls() {
        let expected = if call.prompt.contains(&question("from alice")) {
            "alice-key"
        } else {
            "bob-key"
        };
        assert_eq!(call.credential.unwrap().expose(), expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_backend_times_out() {
    let provider = Arc::new(ScriptedProvider::new());
    let settings = InvokerSettings {
        timeout: Duration::from_secs(30),
        ..InvokerSettings::default()
    };
    let mut coord = Coordinator::new(FlowInvoker::new(provider.clone(), settings), StalePolicy::Apply)
        .with_document("x = 1");

    let _gate = provider.gate("continuation");
    let id = coord.request_suggestion(key("k")).unwrap();

    match coord.next_completion().await.unwrap() {
        Resolution::Failed { request, error, .. } => {
            assert_eq!(request, id);
            assert_eq!(error, FlowError::Transport("timed out after 30s".into()));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(coord.suggestion().state(), &SlotState::Idle);
}
