use assert_matches::assert_matches;
use futures_util::FutureExt;
use gateway_api::{
    GatewayError, LineParseError, StatusCode, StreamEvent, ThoughtEncoding, UsageSummary,
};
use pretty_assertions::assert_eq;
use stream_chat::{
    Message, Progress, Role, SessionId, StreamController, StreamOutcome, StreamPhase,
};

fn content(text: &str) -> StreamEvent {
    StreamEvent::Content {
        text: text.to_owned(),
    }
}

fn thought(text: &str) -> StreamEvent {
    StreamEvent::Thought {
        text: text.to_owned(),
        encoding: ThoughtEncoding::Flag,
    }
}

fn assistant_contents(controller: &StreamController) -> Vec<&str> {
    controller
        .messages()
        .iter()
        .filter(|message| message.role == Role::Assistant)
        .map(|message| message.content.as_str())
        .collect()
}

fn loading_count(controller: &StreamController) -> usize {
    controller
        .messages()
        .iter()
        .filter(|message| message.is_loading)
        .count()
}

#[test]
fn streamed_content_fills_placeholder_until_stream_end() {
    let session = SessionId::new("S");
    let mut controller = StreamController::new();
    controller.push_message(Message::user("hi"));

    let (handle, completion) = controller.begin_stream(session.clone());
    assert_eq!(controller.phase(), StreamPhase::Sending);
    assert_eq!(controller.focus(), Some(&session));
    assert!(controller.is_streaming_for(&session));
    assert_eq!(loading_count(&controller), 1);

    assert!(controller.mark_response_started(handle.stream_id));
    assert_eq!(controller.phase(), StreamPhase::Streaming);

    let records = vec![Ok(content("Hel")), Ok(content("lo"))];
    assert_eq!(
        controller.apply_records(handle.stream_id, records),
        Progress::Continue
    );
    assert_eq!(assistant_contents(&controller), vec!["Hello"]);
    assert!(completion.now_or_never().is_none());

    let finished = controller.apply_event(handle.stream_id, StreamEvent::StreamEnd);
    assert_eq!(finished, Progress::Finished(StreamOutcome::Completed));
    assert_eq!(controller.phase(), StreamPhase::Idle);
    assert_eq!(controller.streaming_session(), None);
    assert_eq!(loading_count(&controller), 0);
    assert!(handle.is_cancelled());
    assert_eq!(controller.messages().len(), 2);
}

#[test]
fn completion_resolves_with_terminal_outcome() {
    let mut controller = StreamController::new();
    let (handle, completion) = controller.begin_stream(SessionId::new("S"));

    controller.apply_event(
        handle.stream_id,
        StreamEvent::UsageSummary {
            usage: UsageSummary::default(),
        },
    );
    assert_eq!(completion.now_or_never(), Some(StreamOutcome::Completed));
}

#[test]
fn thoughts_are_wrapped_and_sealed_by_content() {
    let mut controller = StreamController::new();
    let (handle, _completion) = controller.begin_stream(SessionId::new("S"));

    controller.apply_records(
        handle.stream_id,
        vec![
            Ok(thought("Let me think")),
            Ok(thought(" more")),
            Ok(content("Answer: 42")),
        ],
    );

    assert_eq!(
        assistant_contents(&controller),
        vec!["<think>Let me think more</think>Answer: 42"]
    );
}

#[test]
fn parse_error_is_annotated_and_stream_continues() {
    let mut controller = StreamController::new();
    let (handle, _completion) = controller.begin_stream(SessionId::new("S"));

    let records = vec![
        Ok(content("partial")),
        Err(LineParseError {
            payload: "{not json".to_owned(),
            message: "expected value".to_owned(),
        }),
        Ok(content(" rest")),
    ];
    assert_eq!(
        controller.apply_records(handle.stream_id, records),
        Progress::Continue
    );

    assert_eq!(
        assistant_contents(&controller),
        vec!["partial\n[Error parsing stream data] rest"]
    );
    assert_eq!(controller.last_error(), Some("Error parsing stream data"));
    assert!(controller.is_live(handle.stream_id));
}

#[test]
fn backend_error_event_fails_the_stream() {
    let mut controller = StreamController::new();
    let (handle, completion) = controller.begin_stream(SessionId::new("S"));

    let progress = controller.apply_records(
        handle.stream_id,
        vec![
            Ok(content("so far")),
            Ok(StreamEvent::Error {
                message: "quota exceeded".to_owned(),
            }),
            Ok(content("never applied")),
        ],
    );

    assert_eq!(
        progress,
        Progress::Finished(StreamOutcome::Failed("quota exceeded".to_owned()))
    );
    assert_eq!(
        assistant_contents(&controller),
        vec!["so far\n[Error: quota exceeded]"]
    );
    assert_eq!(controller.last_error(), Some("quota exceeded"));
    assert_eq!(loading_count(&controller), 0);
    assert_matches!(completion.now_or_never(), Some(StreamOutcome::Failed(_)));
}

#[test]
fn http_error_is_annotated_with_status_and_body() {
    let mut controller = StreamController::new();
    let (handle, _completion) = controller.begin_stream(SessionId::new("S"));

    let error = GatewayError::Status(StatusCode::INTERNAL_SERVER_ERROR, "Internal".to_owned());
    let progress = controller.fail_stream(handle.stream_id, &error);

    assert_matches!(progress, Progress::Finished(StreamOutcome::Failed(message)) => {
        assert_eq!(message, "API Error 500: Internal");
    });
    assert_eq!(
        assistant_contents(&controller),
        vec!["[API Error 500: Internal]"]
    );
    assert_eq!(controller.phase(), StreamPhase::Idle);
}

#[test]
fn transport_error_keeps_partial_content() {
    let mut controller = StreamController::new();
    let (handle, _completion) = controller.begin_stream(SessionId::new("S"));
    controller.apply_event(handle.stream_id, content("Half an ans"));

    let error = GatewayError::Unknown("connection reset".to_owned());
    controller.fail_stream(handle.stream_id, &error);

    assert_eq!(
        assistant_contents(&controller),
        vec!["Half an ans\n[Error: connection reset]"]
    );
    assert_eq!(controller.last_error(), Some("connection reset"));
}

#[test]
fn cancelled_error_is_an_abort_not_a_failure() {
    let mut controller = StreamController::new();
    let (handle, completion) = controller.begin_stream(SessionId::new("S"));

    let progress = controller.fail_stream(handle.stream_id, &GatewayError::Cancelled);

    assert_eq!(progress, Progress::Stale);
    assert_eq!(controller.last_error(), None);
    assert_eq!(
        completion.now_or_never(),
        Some(StreamOutcome::Aborted("cancelled".to_owned()))
    );
}

#[test]
fn new_stream_supersedes_the_previous_one() {
    let mut controller = StreamController::new();
    let (first, first_completion) = controller.begin_stream(SessionId::new("S"));
    controller.push_message(Message::user("again"));
    let (second, _second_completion) = controller.begin_stream(SessionId::new("S"));

    assert!(first.is_cancelled());
    assert_ne!(first.stream_id, second.stream_id);
    assert_eq!(
        first_completion.now_or_never(),
        Some(StreamOutcome::Aborted(
            "superseded by a new message".to_owned()
        ))
    );

    assert_eq!(
        controller.apply_event(first.stream_id, content("late")),
        Progress::Stale
    );
    assert_eq!(
        controller.fail_stream(first.stream_id, &GatewayError::Unknown("late".to_owned())),
        Progress::Stale
    );
    controller.apply_event(second.stream_id, content("fresh"));

    assert_eq!(
        assistant_contents(&controller),
        vec!["[Stream aborted: superseded by a new message]", "fresh"]
    );
    assert_eq!(loading_count(&controller), 1);
    assert_eq!(
        controller.active_handle().map(|handle| handle.stream_id),
        Some(second.stream_id)
    );
}

#[test]
fn abort_is_idempotent_and_keeps_partial_content() {
    let mut controller = StreamController::new();
    let (handle, completion) = controller.begin_stream(SessionId::new("S"));
    controller.apply_event(handle.stream_id, content("partial"));

    assert!(controller.abort_stream("user stopped"));
    let after_first = controller.messages().to_vec();
    let revision = controller.revision();

    assert!(!controller.abort_stream("user stopped"));
    assert_eq!(controller.messages(), after_first.as_slice());
    assert_eq!(controller.revision(), revision);

    assert_eq!(assistant_contents(&controller), vec!["partial"]);
    assert_eq!(loading_count(&controller), 0);
    assert_eq!(controller.phase(), StreamPhase::Idle);
    assert_eq!(
        completion.now_or_never(),
        Some(StreamOutcome::Aborted("user stopped".to_owned()))
    );
    assert_eq!(
        controller.complete_stream(handle.stream_id),
        Progress::Stale
    );
}

#[test]
fn aborting_empty_response_leaves_a_marker() {
    let mut controller = StreamController::new();
    controller.begin_stream(SessionId::new("S"));
    controller.abort_stream("user stopped");

    assert_eq!(
        assistant_contents(&controller),
        vec!["[Stream aborted: user stopped]"]
    );
}

#[test]
fn moving_focus_aborts_the_stream() {
    let mut controller = StreamController::new();
    let (handle, completion) = controller.begin_stream(SessionId::new("A"));
    controller.apply_event(handle.stream_id, content("for A"));

    let other = vec![Message::user("old"), Message::assistant("history of B")];
    controller.set_messages_for_context(other.clone(), Some(SessionId::new("B")));

    assert_eq!(controller.messages(), other.as_slice());
    assert_eq!(controller.focus(), Some(&SessionId::new("B")));
    assert_eq!(controller.streaming_session(), None);
    assert!(handle.is_cancelled());
    assert_eq!(
        controller.apply_event(handle.stream_id, content("late")),
        Progress::Stale
    );
    assert_eq!(controller.messages(), other.as_slice());
    assert_eq!(
        completion.now_or_never(),
        Some(StreamOutcome::Aborted(
            "focus moved to another chat".to_owned()
        ))
    );
}

#[test]
fn same_focus_carries_the_live_message_over() {
    let session = SessionId::new("S");
    let mut controller = StreamController::new();
    let (handle, _completion) = controller.begin_stream(session.clone());
    controller.apply_event(handle.stream_id, content("live"));

    let user = Message::user("hi");
    controller.set_messages_for_context(vec![user.clone()], Some(session.clone()));

    assert_eq!(controller.messages().len(), 2);
    assert_eq!(controller.messages()[0], user);
    assert_eq!(controller.messages()[1].id, handle.assistant_message_id);
    assert!(controller.messages()[1].is_live());
    assert!(controller.is_live(handle.stream_id));

    controller.apply_event(handle.stream_id, content(" and growing"));
    assert_eq!(assistant_contents(&controller), vec!["live and growing"]);
}

#[test]
fn clear_stream_state_resets_everything() {
    let mut controller = StreamController::new();
    let (handle, _completion) = controller.begin_stream(SessionId::new("S"));
    controller.fail_stream(
        handle.stream_id,
        &GatewayError::Unknown("broken".to_owned()),
    );
    controller.begin_stream(SessionId::new("S"));

    controller.clear_stream_state();

    assert!(controller.messages().is_empty());
    assert_eq!(controller.focus(), None);
    assert_eq!(controller.last_error(), None);
    assert_eq!(controller.phase(), StreamPhase::Idle);
}

#[test]
fn mismatched_session_echo_is_ignored() {
    let mut controller = StreamController::new();
    let (handle, _completion) = controller.begin_stream(SessionId::new("client-id"));

    let progress = controller.apply_records(
        handle.stream_id,
        vec![
            Ok(StreamEvent::SessionInfo {
                session_id: "server-id".to_owned(),
            }),
            Ok(content("ok")),
        ],
    );

    assert_eq!(progress, Progress::Continue);
    assert_eq!(controller.focus(), Some(&SessionId::new("client-id")));
    assert_eq!(assistant_contents(&controller), vec!["ok"]);
}

#[test]
fn dismiss_error_only_bumps_revision_when_set() {
    let mut controller = StreamController::new();
    let revision = controller.revision();
    controller.dismiss_error();
    assert_eq!(controller.revision(), revision);

    let (handle, _completion) = controller.begin_stream(SessionId::new("S"));
    controller.fail_stream(handle.stream_id, &GatewayError::Unknown("x".to_owned()));
    assert!(controller.last_error().is_some());

    let before = controller.revision();
    controller.dismiss_error();
    assert_eq!(controller.last_error(), None);
    assert!(controller.revision() > before);
}
