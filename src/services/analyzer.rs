use std::time::{Duration, Instant};

use super::assistant::{AssistantThreads, ContentPart, ImageUrl, MessageContent, NewMessage, Run, RunStatus};
use super::ImageAnalyzer;
use crate::config::AssistantConfig;
use crate::error::{RecipeError, Result};
use crate::models::{AnalysisPayload, AnalysisResult};

/// Runs a food picture through a pre-configured assistant and parses its
/// JSON answer into recipe drafts.
pub struct AssistantAnalyzer<T> {
    threads: T,
    assistant_id: String,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

pub fn build_prompt(language: &str, diet: &[String]) -> String {
    format!(
        "Analyze this image json and answer in {}. The recipe must follow these dietary restrictions: {}",
        language,
        diet.join(", ")
    )
}

impl<T: AssistantThreads> AssistantAnalyzer<T> {
    pub fn new(threads: T, config: &AssistantConfig) -> Self {
        Self {
            threads,
            assistant_id: config.assistant_id.clone(),
            poll_interval: config.poll_interval,
            timeout: config.timeout,
        }
    }

    /// Poll the run until it reaches a terminal status.
    async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let mut polls = 1u32;
        let mut run = self.threads.retrieve_run(thread_id, run_id).await?;

        loop {
            match run.status {
                RunStatus::Completed => {
                    log::debug!("✅ Run {} completed after {} polls", run_id, polls);
                    return Ok(run);
                }
                RunStatus::Failed => {
                    let detail = run.last_error.unwrap_or_default();
                    log::error!("❌ Run {} failed: {}", run_id, detail);
                    return Err(RecipeError::Analysis(format!("Run failed: {}", detail)));
                }
                RunStatus::Cancelled | RunStatus::Expired | RunStatus::Incomplete => {
                    log::error!("❌ Run {} ended with status {}", run_id, run.status.as_str());
                    return Err(RecipeError::Analysis(format!(
                        "Run ended with status {}",
                        run.status.as_str()
                    )));
                }
                _ => {}
            }

            tokio::time::sleep(self.poll_interval).await;
            run = self.threads.retrieve_run(thread_id, run_id).await?;
            polls += 1;
        }
    }

    async fn run_analysis(&self, image_path: &str, language: &str, diet: &[String]) -> Result<AnalysisResult> {
        log::info!("📸 Starting image analysis for: {}", image_path);

        let thread = self.threads.create_thread().await?;

        let message = NewMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text {
                    text: build_prompt(language, diet),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_path.to_string(),
                    },
                },
            ],
        };
        self.threads.add_message(&thread.id, &message).await?;

        let run = self.threads.create_run(&thread.id, &self.assistant_id).await?;
        log::info!("🤖 Run {} started on thread {}", run.id, thread.id);

        let finished = self.wait_for_run(&thread.id, &run.id).await?;
        let token_usage = finished.usage.map(|u| u.total_tokens).unwrap_or(0);

        let messages = self.threads.list_messages(&thread.id).await?;
        let reply = messages
            .into_iter()
            .find(|m| m.role == "assistant")
            .ok_or_else(|| RecipeError::Analysis("assistant did not reply".to_string()))?;

        let text = match reply.content.into_iter().next() {
            Some(MessageContent::Text { text }) => text.value,
            _ => {
                return Err(RecipeError::Analysis(
                    "assistant reply has no text content".to_string(),
                ))
            }
        };
        log::debug!("💬 Assistant reply: {}", text);

        let payload: AnalysisPayload = serde_json::from_str(&text)?;
        log::info!(
            "✅ Analysis done: {} recipes, {} foods, {} tokens",
            payload.recipes.len(),
            payload.foods.len(),
            token_usage
        );

        Ok(AnalysisResult {
            recipes: payload.recipes,
            foods: payload.foods,
            token_usage,
        })
    }
}

#[async_trait::async_trait]
impl<T: AssistantThreads> ImageAnalyzer for AssistantAnalyzer<T> {
    /// The deadline covers every assistant call, including a poll that never answers.
    async fn analyze(&self, image_path: &str, language: &str, diet: &[String]) -> Result<AnalysisResult> {
        let limit = match self.timeout {
            Some(limit) => limit,
            None => return self.run_analysis(image_path, language, diet).await,
        };

        let started = Instant::now();
        match tokio::time::timeout(limit, self.run_analysis(image_path, language, diet)).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("⏱️ Image analysis for {} still running after {:?}", image_path, limit);
                Err(RecipeError::AnalysisTimeout { waited: started.elapsed() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::assistant::{RunError, RunUsage, TextValue, Thread, ThreadMessage};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted assistant: hands out run statuses in order, repeating the
    /// last one forever.
    struct ScriptedThreads {
        statuses: Mutex<VecDeque<Run>>,
        reply: Option<String>,
        posted: Mutex<Vec<NewMessage>>,
        polls: Mutex<u32>,
    }

    impl ScriptedThreads {
        fn new(statuses: Vec<Run>, reply: Option<&str>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                reply: reply.map(str::to_string),
                posted: Mutex::new(Vec::new()),
                polls: Mutex::new(0),
            }
        }
    }

    fn run(status: RunStatus) -> Run {
        Run {
            id: "run_1".to_string(),
            status,
            last_error: None,
            usage: None,
        }
    }

    #[async_trait::async_trait]
    impl AssistantThreads for ScriptedThreads {
        async fn create_thread(&self) -> Result<Thread> {
            Ok(Thread { id: "thread_1".to_string() })
        }

        async fn add_message(&self, _thread_id: &str, message: &NewMessage) -> Result<()> {
            self.posted.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn create_run(&self, _thread_id: &str, assistant_id: &str) -> Result<Run> {
            assert_eq!(assistant_id, "asst_test");
            Ok(run(RunStatus::Queued))
        }

        async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run> {
            *self.polls.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                Ok(statuses.pop_front().unwrap())
            } else {
                Ok(statuses.front().cloned().unwrap())
            }
        }

        async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>> {
            let mut messages = vec![ThreadMessage {
                role: "user".to_string(),
                content: vec![MessageContent::Text {
                    text: TextValue { value: "not me".to_string() },
                }],
            }];
            if let Some(reply) = &self.reply {
                messages.insert(
                    0,
                    ThreadMessage {
                        role: "assistant".to_string(),
                        content: vec![MessageContent::Text {
                            text: TextValue { value: reply.clone() },
                        }],
                    },
                );
            }
            Ok(messages)
        }
    }

    fn analyzer(threads: ScriptedThreads, timeout: Option<Duration>) -> AssistantAnalyzer<ScriptedThreads> {
        AssistantAnalyzer::new(
            threads,
            &AssistantConfig {
                api_key: "sk".to_string(),
                assistant_id: "asst_test".to_string(),
                base_url: "http://unused".to_string(),
                poll_interval: Duration::from_millis(5),
                timeout,
            },
        )
    }

    const REPLY: &str = r#"{
        "recipes": [{ "name": "Salad", "stat": { "difficulty": "easy", "people": 2, "time": "10" } }],
        "foods": [{ "name": "tomato" }]
    }"#;

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("French", &["vegan".to_string(), "gluten-free".to_string()]);
        assert_eq!(
            prompt,
            "Analyze this image json and answer in French. The recipe must follow these dietary restrictions: vegan, gluten-free"
        );
    }

    #[tokio::test]
    async fn test_polls_until_completed() {
        let mut done = run(RunStatus::Completed);
        done.usage = Some(RunUsage { total_tokens: 812 });
        let threads = ScriptedThreads::new(
            vec![run(RunStatus::Queued), run(RunStatus::InProgress), done],
            Some(REPLY),
        );
        let analyzer = analyzer(threads, None);

        let result = analyzer
            .analyze("https://img/1.jpg", "English", &["vegetarian".to_string()])
            .await
            .unwrap();

        assert_eq!(result.recipes.len(), 1);
        assert_eq!(result.recipes[0].name, json!("Salad"));
        assert_eq!(result.foods, vec![json!({ "name": "tomato" })]);
        assert_eq!(result.token_usage, 812);
        assert_eq!(*analyzer.threads.polls.lock().unwrap(), 3);

        let posted = analyzer.threads.posted.lock().unwrap();
        assert_eq!(posted[0].role, "user");
        assert_eq!(
            posted[0].content[1],
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: "https://img/1.jpg".to_string() }
            }
        );
    }

    #[tokio::test]
    async fn test_missing_usage_counts_zero_tokens() {
        let threads = ScriptedThreads::new(vec![run(RunStatus::Completed)], Some(REPLY));
        let result = analyzer(threads, None).analyze("img", "English", &[]).await.unwrap();
        assert_eq!(result.token_usage, 0);
    }

    #[tokio::test]
    async fn test_failed_run_carries_provider_detail() {
        let mut failed = run(RunStatus::Failed);
        failed.last_error = Some(RunError {
            code: Some("rate_limit_exceeded".to_string()),
            message: Some("slow down".to_string()),
        });
        let threads = ScriptedThreads::new(vec![run(RunStatus::InProgress), failed], Some(REPLY));

        let err = analyzer(threads, None).analyze("img", "English", &[]).await.unwrap_err();
        match err {
            RecipeError::Analysis(message) => {
                assert!(message.contains("rate_limit_exceeded: slow down"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_run_is_terminal() {
        let threads = ScriptedThreads::new(vec![run(RunStatus::Expired)], Some(REPLY));
        let err = analyzer(threads, None).analyze("img", "English", &[]).await.unwrap_err();
        assert!(matches!(err, RecipeError::Analysis(_)));
    }

    #[tokio::test]
    async fn test_stuck_run_hits_deadline() {
        let threads = ScriptedThreads::new(vec![run(RunStatus::InProgress)], Some(REPLY));
        let analyzer = analyzer(threads, Some(Duration::from_millis(30)));

        let err = analyzer.analyze("img", "English", &[]).await.unwrap_err();

        assert!(matches!(err, RecipeError::AnalysisTimeout { .. }));
        assert!(*analyzer.threads.polls.lock().unwrap() > 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_parse_error() {
        let threads = ScriptedThreads::new(vec![run(RunStatus::Completed)], Some("Here is your recipe!"));
        let err = analyzer(threads, None).analyze("img", "English", &[]).await.unwrap_err();
        assert!(matches!(err, RecipeError::Parse(_)));
    }

    #[tokio::test]
    async fn test_no_assistant_reply() {
        let threads = ScriptedThreads::new(vec![run(RunStatus::Completed)], None);
        let err = analyzer(threads, None).analyze("img", "English", &[]).await.unwrap_err();
        assert!(matches!(err, RecipeError::Analysis(_)));
    }

    /// Assistant whose run status endpoint accepts the request and never answers.
    struct HangingThreads;

    #[async_trait::async_trait]
    impl AssistantThreads for HangingThreads {
        async fn create_thread(&self) -> Result<Thread> {
            Ok(Thread { id: "thread_1".to_string() })
        }

        async fn add_message(&self, _thread_id: &str, _message: &NewMessage) -> Result<()> {
            Ok(())
        }

        async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<Run> {
            Ok(run(RunStatus::Queued))
        }

        async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run> {
            std::future::pending().await
        }

        async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_unanswered_poll_hits_deadline() {
        let analyzer = AssistantAnalyzer::new(
            HangingThreads,
            &AssistantConfig {
                api_key: "sk".to_string(),
                assistant_id: "asst_test".to_string(),
                base_url: "http://unused".to_string(),
                poll_interval: Duration::from_millis(5),
                timeout: Some(Duration::from_millis(30)),
            },
        );

        let outcome = tokio::time::timeout(
            Duration::from_millis(500),
            analyzer.analyze("img", "English", &[]),
        )
        .await
        .expect("analysis must give up on its own deadline");

        match outcome {
            Err(RecipeError::AnalysisTimeout { waited }) => {
                assert!(waited >= Duration::from_millis(30))
            }
            other => panic!("unexpected outcome: {:?}", other.map(|r| r.recipes.len())),
        }
    }
}
