//! # Questionnaire
//!
//! The demo flow run by the binary:
//!
//! ```text
//! name ─▶ age ─┬─ age < 18 ─▶ minor
//!              └─ age ≥ 18 ─▶ coffee ─┬─ yes ─▶ coffee_yes
//!                                     └─ no ──▶ coffee_no
//! ```

use dialog_flow::{CollectError, FlowNode, Message, Rejection, Step};
use serde::Serialize;

/// Oldest age accepted as a plausible answer
const MAX_AGE: u32 = 150;

/// Answers gathered by the questionnaire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub coffee: Option<bool>,
}

impl Profile {
    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("friend")
    }
}

fn collect_name(msg: &Message, mut profile: Profile) -> Result<Profile, CollectError> {
    let name = msg.content.trim();
    if name.is_empty() {
        return Err(Rejection::new("Please tell me your name.").into());
    }
    profile.name = Some(name.to_string());
    Ok(profile)
}

fn collect_age(msg: &Message, mut profile: Profile) -> Result<Profile, CollectError> {
    let age: u32 = msg
        .content
        .trim()
        .parse()
        .map_err(|_| Rejection::new("Please answer with a whole number."))?;
    if age > MAX_AGE {
        return Err(Rejection::new(format!("{} seems a bit high. How old are you really?", age)).into());
    }
    profile.age = Some(age);
    Ok(profile)
}

fn collect_coffee(msg: &Message, mut profile: Profile) -> Result<Profile, CollectError> {
    let answer = match msg.content.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        // Falls back to the configured rejection message
        _ => return Err(Rejection::silent().into()),
    };
    profile.coffee = Some(answer);
    Ok(profile)
}

/// Build the questionnaire tree
pub fn build() -> FlowNode<Profile> {
    let minor = FlowNode::new(Step::new(|p: &Profile| {
        format!("Thanks, {}! That's all we need for now.", p.display_name())
    }))
    .named("minor")
    .when(|p: &Profile| p.age.is_some_and(|age| age < 18));

    let coffee = FlowNode::new(Step::text("Do you drink coffee? (yes/no)").collect_fn(collect_coffee))
        .named("coffee")
        .when(|p: &Profile| p.age.is_some_and(|age| age >= 18))
        .with_children(vec![
            FlowNode::new(Step::text("Great, we'll save you a cup."))
                .named("coffee_yes")
                .when(|p: &Profile| p.coffee == Some(true)),
            FlowNode::new(Step::text("Tea it is, then."))
                .named("coffee_no")
                .when(|p: &Profile| p.coffee == Some(false)),
        ]);

    let age = FlowNode::new(
        Step::new(|p: &Profile| format!("Nice to meet you, {}. How old are you?", p.display_name()))
            .collect_fn(collect_age),
    )
    .named("age")
    .with_children(vec![minor, coffee]);

    FlowNode::new(Step::text("Hi! What's your name?").collect_fn(collect_name))
        .named("name")
        .with_child(age)
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use dialog_flow::{FlowError, FlowRunner, MemoryChannel};
    use std::sync::Arc;

    async fn run_with(replies: &[&str]) -> (Result<Profile, FlowError>, Vec<String>) {
        let (channel, handle) = MemoryChannel::new("guest");
        let channel = Arc::new(channel);
        for reply in replies {
            handle.reply("guest", *reply);
        }

        let root = build();
        let mut runner = FlowRunner::new(Profile::default(), channel.clone());
        let result = runner.run(&root, channel.as_ref()).await.map(|run| run.data);
        (result, channel.sent_contents().await)
    }

    #[test]
    fn test_tree_is_valid() {
        let (channel, _handle) = MemoryChannel::new("guest");
        let runner = FlowRunner::new(Profile::default(), Arc::new(channel));
        assert!(runner.is_valid(&build()));
    }

    #[tokio::test]
    async fn test_adult_coffee_path() {
        let (result, sent) = run_with(&["Ada", "36", "Yes"]).await;

        assert_eq!(
            result.unwrap(),
            Profile {
                name: Some("Ada".into()),
                age: Some(36),
                coffee: Some(true),
            }
        );
        assert_eq!(sent.last().unwrap(), "Great, we'll save you a cup.");
    }

    #[tokio::test]
    async fn test_minor_path_skips_coffee() {
        let (result, sent) = run_with(&["Tom", "12"]).await;

        assert_eq!(result.unwrap().coffee, None);
        assert_eq!(
            sent,
            vec![
                "Hi! What's your name?",
                "Nice to meet you, Tom. How old are you?",
                "Thanks, Tom! That's all we need for now.",
            ]
        );
    }

    #[tokio::test]
    async fn test_age_rejections_then_accept() {
        let (result, sent) = run_with(&["Ada", "old", "200", "40", "no"]).await;

        assert_eq!(result.unwrap().age, Some(40));
        assert!(sent.contains(&"Please answer with a whole number.".to_string()));
        assert!(sent.contains(&"200 seems a bit high. How old are you really?".to_string()));
        assert_eq!(sent.last().unwrap(), "Tea it is, then.");
    }

    #[tokio::test]
    async fn test_exit_mid_questionnaire() {
        let (result, sent) = run_with(&["Ada", "exit"]).await;

        assert!(matches!(result, Err(FlowError::VoluntaryExit { .. })));
        assert_eq!(sent.last().unwrap(), "You left the conversation.");
    }
}
