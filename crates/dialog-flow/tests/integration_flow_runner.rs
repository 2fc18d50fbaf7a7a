//! Integration tests for full traversals through FlowRunner
//!
//! These tests drive complete conversations over a MemoryChannel:
//! - Branch selection and trace recording
//! - Starting from a candidate list
//! - Deadline, rejection, and exit behavior of collection phases
//! - Error propagation to the caller

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dialog_flow::{
    render_mermaid_with_trace, CollectError, FlowConfig, FlowError, FlowNode, FlowRunner,
    MemoryChannel, Message, Rejection, ReplyHandle, Step,
};
use tokio::time::Instant;

#[derive(Debug, Clone, Default, PartialEq)]
struct Profile {
    name: Option<String>,
    age: Option<u32>,
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

fn parse_age(msg: &Message, mut profile: Profile) -> Result<Profile, CollectError> {
    let age = msg
        .content
        .trim()
        .parse::<u32>()
        .map_err(|_| Rejection::new("Please reply with a number"))?;
    profile.age = Some(age);
    Ok(profile)
}

fn setup() -> (Arc<MemoryChannel>, ReplyHandle) {
    let (channel, replies) = MemoryChannel::new("george");
    (Arc::new(channel), replies)
}

// =============================================================================
// Branching
// =============================================================================

/// Name, then age, then the branch matching the age
#[tokio::test]
async fn test_age_branching_conversation() {
    let (channel, replies) = setup();

    let minor_checks = counter();
    let adult_checks = counter();
    let minor_collects = counter();

    let minor = {
        let checks = minor_checks.clone();
        let collects = minor_collects.clone();
        FlowNode::new(
            Step::text("Ask a parent to join.").collect_fn(move |_, p: Profile| {
                collects.fetch_add(1, Ordering::SeqCst);
                Ok(p)
            }),
        )
        .named("minor")
        .when(move |p: &Profile| {
            checks.fetch_add(1, Ordering::SeqCst);
            p.age.is_some_and(|age| age < 20)
        })
    };

    let adult = {
        let checks = adult_checks.clone();
        FlowNode::new(Step::new(|p: &Profile| {
            format!("Welcome, {}!", p.name.as_deref().unwrap_or("friend"))
        }))
        .named("adult")
        .when(move |p: &Profile| {
            checks.fetch_add(1, Ordering::SeqCst);
            p.age.is_some_and(|age| age >= 20)
        })
    };

    let age_step = FlowNode::new(Step::text("How old are you?").collect_fn(parse_age))
        .named("age")
        .with_children(vec![minor, adult]);

    let root = FlowNode::new(Step::text("What is your name?").collect_fn(|msg, mut p: Profile| {
        p.name = Some(msg.content.clone());
        Ok(p)
    }))
    .named("name")
    .with_child(age_step);

    replies.reply("george", "George");
    replies.reply("george", "30");

    let mut runner = FlowRunner::new(Profile::default(), channel.clone());
    assert!(runner.is_valid(&root));
    let result = runner.run(&root, channel.as_ref()).await.expect("Flow failed");

    assert_eq!(
        result.data,
        Profile {
            name: Some("George".into()),
            age: Some(30),
        }
    );

    let age_step = &root.children()[0];
    let minor = &age_step.children()[0];
    let adult = &age_step.children()[1];
    assert_eq!(
        runner.indexes_of(&[&root, age_step, adult, minor]),
        vec![Some(0), Some(1), Some(2), None]
    );

    assert_eq!(count(&minor_checks), 1);
    assert_eq!(count(&adult_checks), 1);
    assert_eq!(count(&minor_collects), 0);

    assert_eq!(
        channel.sent_contents().await,
        vec!["What is your name?", "How old are you?", "Welcome, George!"]
    );
}

/// Traversal starts from the first eligible candidate
#[tokio::test]
async fn test_run_array_picks_first_eligible_path() {
    let (channel, _replies) = setup();

    let n4 = FlowNode::new(Step::<u32>::text("N4")).named("N4").when(|_| false);
    let n5 = FlowNode::new(Step::<u32>::text("N5")).named("N5").when(|_| true);
    let n3 = FlowNode::new(Step::<u32>::text("N3"))
        .named("N3")
        .when(|_| true)
        .with_children(vec![n4, n5]);
    let n2 = FlowNode::new(Step::<u32>::text("N2"))
        .named("N2")
        .when(|_| true)
        .with_child(n3);
    let n1 = FlowNode::new(Step::<u32>::text("N1")).named("N1").when(|_| false);
    let nodes = vec![n1, n2];

    let mut runner = FlowRunner::new(0u32, channel.clone());
    runner
        .run_array(&nodes, channel.as_ref())
        .await
        .expect("Flow failed");

    let names: Vec<_> = runner
        .trace()
        .iter()
        .map(|entry| entry.name.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["N2", "N3", "N5"]);

    let n3 = &nodes[1].children()[0];
    assert_eq!(runner.index_of(&nodes[0]), None);
    assert_eq!(runner.index_of(&n3.children()[0]), None);
    assert_eq!(channel.sent_contents().await, vec!["N2", "N3", "N5"]);
}

/// Display-only steps send once and never collect, even with children
#[tokio::test]
async fn test_display_only_step_passes_through() {
    let (channel, _replies) = setup();

    let root = FlowNode::new(Step::<u32>::text("Hello!"))
        .named("hello")
        .with_child(FlowNode::new(Step::text("Bye!")).named("bye"));

    let mut runner = FlowRunner::new(0u32, channel.clone());
    runner.run(&root, channel.as_ref()).await.expect("Flow failed");

    assert_eq!(runner.index_of(&root), Some(0));
    assert_eq!(runner.trace().len(), 2);
    assert_eq!(root.step().messages().await.len(), 1);
    assert_eq!(channel.collectors_created(), 0);
}

// =============================================================================
// Collection phases
// =============================================================================

fn timed_age_step() -> FlowNode<Profile> {
    FlowNode::new(
        Step::text("How old are you?")
            .collect_fn(parse_age)
            .duration(Duration::from_millis(10_000)),
    )
    .named("age")
}

fn reply_at(replies: &ReplyHandle, after_ms: u64, content: &'static str) {
    let replies = replies.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(after_ms)).await;
        replies.reply("george", content);
    });
}

/// An acceptance just before the deadline still wins
#[tokio::test(start_paused = true)]
async fn test_accept_after_rejection_within_deadline() {
    let (channel, replies) = setup();
    let root = timed_age_step();

    reply_at(&replies, 9_000, "old");
    reply_at(&replies, 9_500, "31");

    let mut runner = FlowRunner::new(Profile::default(), channel.clone());
    let result = runner.run(&root, channel.as_ref()).await.expect("Flow failed");

    assert_eq!(result.data.age, Some(31));
    assert_eq!(
        channel.sent_contents().await,
        vec!["How old are you?", "Please reply with a number"]
    );
}

/// A rejection does not push the deadline back
#[tokio::test(start_paused = true)]
async fn test_rejection_does_not_reset_deadline() {
    let (channel, replies) = setup();
    let root = timed_age_step();
    let config = FlowConfig::default().with_inactivity_message("Timed out.");

    reply_at(&replies, 9_000, "old");
    reply_at(&replies, 9_500, "older");

    let start = Instant::now();
    let mut runner = FlowRunner::with_config(Profile::default(), channel.clone(), config);
    let err = runner.run(&root, channel.as_ref()).await.unwrap_err();
    let elapsed = start.elapsed();

    match err {
        FlowError::Inactivity { node, after } => {
            assert_eq!(&node, root.id());
            assert_eq!(after, Duration::from_millis(10_000));
        }
        other => panic!("Expected inactivity, got {:?}", other),
    }
    assert!(elapsed >= Duration::from_millis(10_000));
    assert!(elapsed < Duration::from_millis(10_100));
    assert_eq!(channel.sent_contents().await.last().unwrap(), "Timed out.");
}

/// The exit token ends the run without reaching the collection function
#[tokio::test]
async fn test_exit_token_ends_run() {
    let (channel, replies) = setup();
    let collects = counter();
    let calls = collects.clone();

    let root = FlowNode::new(Step::text("Anything to add?").collect_fn(move |_, p: Profile| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(p)
    }))
    .with_child(FlowNode::new(Step::text("Thanks!")));

    replies.reply("george", "exit");

    let mut runner = FlowRunner::new(Profile::default(), channel.clone());
    let err = runner.run(&root, channel.as_ref()).await.unwrap_err();

    assert!(matches!(err, FlowError::VoluntaryExit { .. }));
    assert!(err.is_terminal_signal());
    assert_eq!(count(&collects), 0);
    assert_eq!(runner.trace().len(), 1);
    assert_eq!(
        channel.sent_contents().await,
        vec!["Anything to add?", "You left the conversation."]
    );
}

/// Replies from other participants never reach the collection function
#[tokio::test]
async fn test_ignores_other_participants() {
    let (channel, replies) = setup();
    let root = timed_age_step();

    replies.reply("mallory", "12");
    replies.reply("george", "44");

    let mut runner = FlowRunner::new(Profile::default(), channel.clone());
    let result = runner.run(&root, channel.as_ref()).await.expect("Flow failed");
    assert_eq!(result.data.age, Some(44));
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_invalid_tree_sends_nothing() {
    let (channel, _replies) = setup();

    let root = FlowNode::new(Step::<u32>::text("root")).with_children(vec![
        FlowNode::new(Step::<u32>::text("a")).when(|n| *n > 0),
        FlowNode::new(Step::<u32>::text("b")),
    ]);

    let mut runner = FlowRunner::new(0u32, channel.clone());
    assert!(!runner.is_valid(&root));

    let err = runner.run(&root, channel.as_ref()).await.unwrap_err();
    match err {
        FlowError::InvalidTree { node, children } => {
            assert_eq!(&node, root.id());
            assert_eq!(children, 2);
        }
        other => panic!("Expected invalid tree, got {:?}", other),
    }
    assert!(channel.sent().await.is_empty());
}

#[tokio::test]
async fn test_condition_failure_aborts_without_termination_message() {
    let (channel, _replies) = setup();

    let root = FlowNode::new(Step::<u32>::text("root")).with_child(
        FlowNode::new(Step::text("never"))
            .with_condition(dialog_flow::try_condition_fn(|_: &u32| Err("lookup failed".into()))),
    );

    let mut runner = FlowRunner::new(0u32, channel.clone());
    let err = runner.run(&root, channel.as_ref()).await.unwrap_err();

    assert!(matches!(err, FlowError::Condition { .. }));
    assert_eq!(channel.sent_contents().await, vec!["root"]);
}

#[tokio::test]
async fn test_closed_event_source_fails_run() {
    let (channel, replies) = setup();
    let root = timed_age_step();
    replies.hang_up();

    let mut runner = FlowRunner::new(Profile::default(), channel.clone());
    let err = runner.run(&root, channel.as_ref()).await.unwrap_err();
    assert!(matches!(err, FlowError::Channel(_)));
}

// =============================================================================
// Trace queries
// =============================================================================

#[tokio::test]
async fn test_trace_queries_are_idempotent() {
    let (channel, replies) = setup();

    let root = timed_age_step().with_child(FlowNode::new(Step::text("Done.")).named("done"));
    replies.reply("george", "25");

    let mut runner = FlowRunner::new(Profile::default(), channel.clone());
    runner.run(&root, channel.as_ref()).await.expect("Flow failed");

    let nodes = [&root, &root.children()[0]];
    let first = runner.indexes_of(&nodes);
    let second = runner.indexes_of(&nodes);
    assert_eq!(first, vec![Some(0), Some(1)]);
    assert_eq!(first, second);
    assert_eq!(runner.index_of(&root), runner.index_of(&root));

    let diagram = render_mermaid_with_trace(&root, &runner);
    assert_eq!(diagram.matches(":::visited").count(), 2);
    assert!(diagram.contains("classDef visited"));
}

#[test]
fn test_run_blocks_on_current_thread_runtime() {
    let (channel, replies) = setup();
    let root = FlowNode::new(Step::<u32>::text("Pick a number").collect_fn(|msg, _| {
        msg.content
            .parse::<u32>()
            .map_err(|_| CollectError::from(Rejection::silent()))
    }));
    replies.reply("george", "7");

    let mut runner = FlowRunner::new(0u32, channel.clone());
    let result = tokio_test::block_on(runner.run(&root, channel.as_ref())).expect("Flow failed");
    assert_eq!(result.data, 7);
}
