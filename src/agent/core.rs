//! Agent core implementation with the bounded tool-calling loop
//!
//! Each iteration sends the flattened conversation plus a format-specific
//! system prompt to the model, parses the reply and then either:
//! - returns the final answer,
//! - dispatches every requested tool call in order and loops, or
//! - appends a corrective instruction and loops.
//!
//! The iteration cap bounds model calls, not wall-clock time.

use crate::agent::conversation::Conversation;
use crate::agent::detect::{Detection, FormatDetector};
use crate::agent::format::{FormatChoice, FormatSetting, ParsedIntent, ResponseParser};
use crate::config::{AgentConfig, Config};
use crate::error::{LabAgentError, Result};
use crate::prompts;
use crate::providers::{create_provider, GenerateRequest, Provider};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Answer returned when the iteration cap is hit
pub const MAX_ITERATIONS_MESSAGE: &str =
    "I've reached the maximum number of steps without finding a complete answer.";

/// Per-run settings, defaulting to the agent configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Model to run
    pub model: String,
    /// Output format, detected or forced
    pub format: FormatSetting,
    /// Hard cap on model calls
    pub max_iterations: usize,
    /// Log raw responses and tool results at info level
    pub verbose: bool,
}

impl From<&AgentConfig> for RunOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            format: config.format,
            max_iterations: config.max_iterations,
            verbose: config.verbose,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model produced a final answer
    Answered,
    /// The iteration cap was reached first
    IterationLimit,
}

/// Result of one agent run
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Final answer, or [`MAX_ITERATIONS_MESSAGE`]
    pub answer: String,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Number of model calls made
    pub iterations: usize,
    /// Format used for the whole run
    pub detection: Detection,
    /// Full history of the run
    pub conversation: Conversation,
}

impl AgentRun {
    /// Format used for the run
    pub fn format(&self) -> FormatChoice {
        self.detection.format
    }
}

/// The tool-using agent
///
/// The tool registry is shared read-only, so independent runs may proceed
/// concurrently as long as the tools themselves allow it.
///
/// # Examples
///
/// ```no_run
/// use labagent::agent::Agent;
/// use labagent::config::Config;
/// use labagent::providers::OllamaProvider;
/// use labagent::tools::ToolRegistry;
/// use std::sync::Arc;
///
/// # async fn example() -> labagent::error::Result<()> {
/// let config = Config::default();
/// let provider = Arc::new(OllamaProvider::new(config.server.clone())?);
/// let mut tools = ToolRegistry::new();
/// tools.register_fn("echo", "Repeat the input", |input| Ok(input.as_text()));
///
/// let agent = Agent::new(provider, Arc::new(tools), config.agent)?;
/// let run = agent.run("Echo 'hi' back to me").await?;
/// println!("{}", run.answer);
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    parser: ResponseParser,
    detector: FormatDetector,
    config: AgentConfig,
}

impl Agent {
    /// Creates a new agent instance
    ///
    /// # Arguments
    ///
    /// * `provider` - Model server used for completions and metadata
    /// * `tools` - Registered tools
    /// * `config` - Agent configuration (model, format, limits)
    ///
    /// # Errors
    ///
    /// Returns `LabAgentError::Config` if `max_iterations` is zero
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Result<Self> {
        if config.max_iterations == 0 {
            return Err(
                LabAgentError::Config("max_iterations must be greater than 0".to_string()).into(),
            );
        }

        Ok(Self {
            provider,
            tools,
            parser: ResponseParser::new(),
            detector: FormatDetector::from_config(&config),
            config,
        })
    }

    /// Replace the response parser (e.g. to add repair strategies)
    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    /// Registered tools
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Resolve the format a run would use for a model
    pub async fn detect_format(&self, model: &str, setting: FormatSetting) -> Detection {
        self.detector
            .resolve(self.provider.as_ref(), model, setting)
            .await
    }

    /// Run the agent with the configured defaults
    ///
    /// # Errors
    ///
    /// See [`Agent::run_with`]
    pub async fn run(&self, prompt: impl Into<String>) -> Result<AgentRun> {
        let options = RunOptions::from(&self.config);
        self.run_with(prompt, &options).await
    }

    /// Run the agent on one prompt
    ///
    /// Unparseable responses and tool failures are fed back to the model
    /// and never end the run early.
    ///
    /// # Arguments
    ///
    /// * `prompt` - User prompt
    /// * `options` - Model, format and limits for this run
    ///
    /// # Errors
    ///
    /// - `LabAgentError::Config` if `options.max_iterations` is zero
    /// - `LabAgentError::Transport` if the model server stays unreachable
    /// - `LabAgentError::ToolDefect` if a tool reports a defect
    pub async fn run_with(
        &self,
        prompt: impl Into<String>,
        options: &RunOptions,
    ) -> Result<AgentRun> {
        if options.max_iterations == 0 {
            return Err(
                LabAgentError::Config("max_iterations must be greater than 0".to_string()).into(),
            );
        }

        let detection = self.detect_format(&options.model, options.format).await;
        let format = detection.format;
        let system = prompts::build_system_prompt(format, &self.tools.list());
        let mut conversation = Conversation::new(prompt);

        info!(
            "Starting agent run: model={}, format={}, max_iterations={}",
            options.model, format, options.max_iterations
        );

        for iteration in 1..=options.max_iterations {
            debug!("Iteration {}/{}", iteration, options.max_iterations);

            let request = GenerateRequest::new(&options.model, conversation.render(), &system);
            let response = self.provider.generate(&request).await?;

            if options.verbose {
                info!("LLM response (iteration {}):\n{}", iteration, response);
            }

            let intent = self.parser.parse(&response, format);
            conversation.add_assistant(response);

            match intent {
                ParsedIntent::FinalAnswer { answer, .. } => {
                    info!("Agent answered after {} iteration(s)", iteration);
                    return Ok(AgentRun {
                        answer,
                        outcome: RunOutcome::Answered,
                        iterations: iteration,
                        detection,
                        conversation,
                    });
                }
                ParsedIntent::ToolCalls(calls) => {
                    debug!("Executing {} tool call(s)", calls.len());
                    for call in calls {
                        let observation = self.tools.dispatch(&call.tool, call.input).await?;
                        if options.verbose {
                            info!("Tool result for {}:\n{}", call.tool, observation);
                        }
                        conversation.add_observation(&call.tool, &observation);
                    }
                }
                ParsedIntent::ParseFailure { reason, .. } => {
                    warn!("Could not parse model response: {}", reason);
                    conversation.add_parse_failure(&reason, format);
                }
            }
        }

        warn!(
            "Maximum iterations ({}) reached without an answer",
            options.max_iterations
        );
        Ok(AgentRun {
            answer: MAX_ITERATIONS_MESSAGE.to_string(),
            outcome: RunOutcome::IterationLimit,
            iterations: options.max_iterations,
            detection,
            conversation,
        })
    }
}

/// Render a run result as user-facing text
///
/// Errors become `Error: <message>`.
pub fn answer_or_error(result: Result<AgentRun>) -> String {
    match result {
        Ok(run) => run.answer,
        Err(e) => {
            error!("Agent run failed: {:#}", e);
            format!("Error: {}", e)
        }
    }
}

/// Run the agent once against the configured server
///
/// Never fails: transport errors and tool defects are returned as
/// `Error: <message>` text.
///
/// # Arguments
///
/// * `prompt` - User prompt
/// * `config` - Server and agent settings
/// * `tools` - Registered tools
pub async fn run_agent(prompt: &str, config: &Config, tools: Arc<ToolRegistry>) -> String {
    let result = async {
        let provider: Arc<dyn Provider> = Arc::from(create_provider(&config.server)?);
        let agent = Agent::new(provider, tools, config.agent.clone())?;
        agent.run(prompt).await
    }
    .await;

    answer_or_error(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::TurnKind;
    use crate::agent::detect::DetectionReason;
    use crate::providers::ModelMetadata;
    use crate::tools::ToolError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mock provider for testing
    #[derive(Clone)]
    struct MockProvider {
        responses: Vec<String>,
        metadata: Option<ModelMetadata>,
        requests: Arc<Mutex<Vec<GenerateRequest>>>,
    }

    impl MockProvider {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: responses.into_iter().map(String::from).collect(),
                metadata: None,
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
            self.metadata = Some(metadata);
            self
        }

        fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> GenerateRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        async fn generate(&self, request: &GenerateRequest) -> Result<String> {
            let mut requests = self.requests.lock().unwrap();
            let index = requests.len();
            requests.push(request.clone());
            Ok(self
                .responses
                .get(index)
                .cloned()
                .unwrap_or_else(|| r#"{"answer": "Done"}"#.to_string()))
        }

        async fn show_model(&self, name: &str) -> Result<ModelMetadata> {
            self.metadata
                .clone()
                .ok_or_else(|| LabAgentError::Provider(format!("Model not found: {}", name)).into())
        }
    }

    /// Provider whose server is always down
    struct DownProvider;

    #[async_trait]
    impl Provider for DownProvider {
        async fn generate(&self, _request: &GenerateRequest) -> Result<String> {
            Err(LabAgentError::Transport {
                attempts: 2,
                message: "connection refused".to_string(),
            }
            .into())
        }

        async fn show_model(&self, _name: &str) -> Result<ModelMetadata> {
            Err(LabAgentError::Provider("unreachable".to_string()).into())
        }
    }

    fn echo_tools() -> Arc<ToolRegistry> {
        let mut tools = ToolRegistry::new();
        tools.register_fn("echo", "Return the input unchanged", |input| {
            Ok(input.as_text())
        });
        Arc::new(tools)
    }

    fn json_config() -> AgentConfig {
        AgentConfig {
            model: "tiny:latest".to_string(),
            format: FormatSetting::Forced(FormatChoice::Json),
            ..Default::default()
        }
    }

    fn agent(provider: &MockProvider, config: AgentConfig) -> Agent {
        Agent::new(Arc::new(provider.clone()), echo_tools(), config).unwrap()
    }

    #[test]
    fn test_agent_creation_with_zero_max_iterations_fails() {
        let config = AgentConfig {
            max_iterations: 0,
            ..Default::default()
        };
        let result = Agent::new(Arc::new(MockProvider::new(vec![])), echo_tools(), config);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_immediate_final_answer() {
        let provider = MockProvider::new(vec![
            "```json\n{\"thought\": \"simple\", \"answer\": \"Paris\"}\n```",
        ]);
        let run = agent(&provider, json_config())
            .run("Capital of France?")
            .await
            .unwrap();

        assert_eq!(run.answer, "Paris");
        assert_eq!(run.outcome, RunOutcome::Answered);
        assert_eq!(run.iterations, 1);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(run.conversation.observation_count(), 0);
    }

    #[tokio::test]
    async fn test_echo_tool_end_to_end() {
        let provider = MockProvider::new(vec![
            r#"```json
{"thought": "I should echo it", "tool": "echo", "input": "hello-42"}
```"#,
            r#"```json
{"thought": "The tool answered", "answer": "The echo returned hello-42"}
```"#,
        ]);
        let run = agent(&provider, json_config())
            .run("Please echo hello-42")
            .await
            .unwrap();

        assert!(run.answer.contains("hello-42"));
        assert_eq!(run.conversation.observation_count(), 1);
        assert_eq!(provider.call_count(), 2);

        let second = provider.request(1);
        assert!(second.prompt.starts_with("Please echo hello-42\n"));
        assert!(second.prompt.ends_with("Tool result for echo:\nhello-42"));
        assert!(second.system.contains("- echo: Return the input unchanged"));
    }

    #[tokio::test]
    async fn test_max_iterations_one_with_tool_call() {
        let provider = MockProvider::new(vec![
            r#"{"tool": "echo", "input": "again"}"#,
            r#"{"answer": "never reached"}"#,
        ]);
        let options = RunOptions {
            max_iterations: 1,
            ..RunOptions::from(&json_config())
        };
        let run = agent(&provider, json_config())
            .run_with("loop", &options)
            .await
            .unwrap();

        assert_eq!(run.answer, MAX_ITERATIONS_MESSAGE);
        assert_eq!(run.outcome, RunOutcome::IterationLimit);
        assert_eq!(run.iterations, 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_triggers_corrective_retry() {
        let provider = MockProvider::new(vec![
            "I think the answer is probably 4",
            r#"{"answer": "4"}"#,
        ]);
        let run = agent(&provider, json_config())
            .run("2 + 2?")
            .await
            .unwrap();

        assert_eq!(run.answer, "4");
        assert_eq!(run.iterations, 2);
        let instruction = run
            .conversation
            .turns()
            .iter()
            .find(|t| t.kind == TurnKind::Instruction)
            .unwrap();
        assert!(instruction.content.starts_with("Error parsing response: "));
        assert!(provider
            .request(1)
            .prompt
            .contains("Please provide a valid JSON response"));
    }

    #[tokio::test]
    async fn test_thought_only_response_is_retried() {
        let provider = MockProvider::new(vec![
            r#"{"thought": "let me think about this"}"#,
            r#"{"answer": "done thinking"}"#,
        ]);
        let run = agent(&provider, json_config()).run("q").await.unwrap();
        assert_eq!(run.answer, "done thinking");
        assert_eq!(run.iterations, 2);
    }

    #[tokio::test]
    async fn test_react_multiple_tool_calls_in_order() {
        let provider = MockProvider::new(vec![
            "```tool\n{\"tool\": \"echo\", \"input\": \"first\"}\n```\n```tool\n{\"tool\": \"echo\", \"input\": \"second\"}\n```",
            "Both echoes came back.",
        ]);
        let config = AgentConfig {
            format: FormatSetting::Forced(FormatChoice::React),
            ..json_config()
        };
        let run = agent(&provider, config).run("echo twice").await.unwrap();

        assert_eq!(run.answer, "Both echoes came back.");
        assert_eq!(run.format(), FormatChoice::React);
        let observations: Vec<&str> = run
            .conversation
            .turns()
            .iter()
            .filter(|t| t.kind == TurnKind::Observation)
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(
            observations,
            vec!["Tool result for echo:\nfirst", "Tool result for echo:\nsecond"]
        );
        assert!(provider.request(0).system.contains("```tool"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let provider = MockProvider::new(vec![
            r#"{"tool": "teleport", "input": "Mars"}"#,
            r#"{"answer": "I cannot teleport"}"#,
        ]);
        let run = agent(&provider, json_config()).run("go").await.unwrap();

        assert_eq!(run.answer, "I cannot teleport");
        assert!(provider
            .request(1)
            .prompt
            .contains("Error: Tool 'teleport' not found. Available tools: echo"));
    }

    #[tokio::test]
    async fn test_failed_tool_becomes_observation() {
        let mut tools = ToolRegistry::new();
        tools.register_fn("flaky", "fails", |_| {
            Err(ToolError::Failed("timeout".to_string()))
        });
        let provider = MockProvider::new(vec![
            r#"{"tool": "flaky", "input": "x"}"#,
            r#"{"answer": "gave up"}"#,
        ]);
        let agent = Agent::new(Arc::new(provider.clone()), Arc::new(tools), json_config()).unwrap();
        let run = agent.run("try").await.unwrap();

        assert_eq!(run.answer, "gave up");
        assert!(provider
            .request(1)
            .prompt
            .contains("Error executing tool 'flaky': timeout"));
    }

    #[tokio::test]
    async fn test_tool_defect_aborts_run() {
        let mut tools = ToolRegistry::new();
        tools.register_fn("buggy", "broken", |_| {
            Err(ToolError::Defect("invariant violated".to_string()))
        });
        let provider = MockProvider::new(vec![r#"{"tool": "buggy", "input": "x"}"#]);
        let agent = Agent::new(Arc::new(provider.clone()), Arc::new(tools), json_config()).unwrap();

        let result = agent.run("go").await;
        assert!(result.is_err());
        assert_eq!(provider.call_count(), 1);

        let text = answer_or_error(result);
        assert!(text.starts_with("Error: "));
        assert!(text.contains("invariant violated"));
    }

    #[tokio::test]
    async fn test_transport_error_is_rendered_as_text() {
        let agent = Agent::new(Arc::new(DownProvider), echo_tools(), json_config()).unwrap();
        let result = agent.run("hello").await;
        assert!(matches!(
            result.as_ref().unwrap_err().downcast_ref::<LabAgentError>(),
            Some(LabAgentError::Transport { .. })
        ));
        assert_eq!(
            answer_or_error(result),
            "Error: Transport error after 2 attempt(s): connection refused"
        );
    }

    #[tokio::test]
    async fn test_auto_format_uses_metadata() {
        let metadata: ModelMetadata =
            serde_json::from_value(serde_json::json!({"details": {"parameter_size": "70B"}}))
                .unwrap();
        let provider = MockProvider::new(vec!["Plain text answer."]).with_metadata(metadata);
        let config = AgentConfig {
            model: "mystery:latest".to_string(),
            format: FormatSetting::Auto,
            ..Default::default()
        };
        let run = agent(&provider, config).run("hi").await.unwrap();

        assert_eq!(run.format(), FormatChoice::React);
        assert!(matches!(
            run.detection.reason,
            DetectionReason::ParameterCount(_)
        ));
        assert_eq!(run.answer, "Plain text answer.");
    }

    #[tokio::test]
    async fn test_auto_format_small_unknown_model_uses_json() {
        let provider = MockProvider::new(vec![r#"{"answer": "ok"}"#]);
        let config = AgentConfig {
            model: "tinyllama".to_string(),
            format: FormatSetting::Auto,
            ..Default::default()
        };
        let run = agent(&provider, config).run("hi").await.unwrap();
        assert_eq!(run.format(), FormatChoice::Json);
        assert!(provider.request(0).system.contains("```json"));
    }

    #[tokio::test]
    async fn test_run_with_zero_iterations_is_config_error() {
        let provider = MockProvider::new(vec![]);
        let options = RunOptions {
            max_iterations: 0,
            ..RunOptions::from(&json_config())
        };
        let result = agent(&provider, json_config()).run_with("x", &options).await;
        assert!(result.is_err());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_agent_unreachable_server_returns_error_text() {
        let mut config = Config::default();
        config.server.url = "http://127.0.0.1:9".to_string();
        config.server.retries = 1;
        config.agent.format = FormatSetting::Forced(FormatChoice::Json);

        let text = run_agent("hello", &config, echo_tools()).await;
        assert!(text.starts_with("Error: Transport error after 1 attempt(s)"));
    }
}
