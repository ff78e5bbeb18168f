use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::{
    domain::site::{SiteProfile, SiteRegistry},
    services::{
        droid::WebDriverProvider, intent_parser::CompletionProvider,
        ollama_client::OllamaClient, openai_client::OpenaiClient,
        query_runner::RunnerSettings, workflow_executor::ExecutorSettings,
    },
};

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub browser: BrowserSettings,
    pub pipeline: PipelineSettings,
    pub llm: LlmSettings,
    pub api_keys: ApiKeys,
    #[serde(default)]
    pub sites: Vec<SiteProfile>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub reports_dir: String,
}

/// All durations are in seconds.
#[derive(Deserialize, Clone, Debug)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub command_timeout: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_wait: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub close_timeout: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub results_wait: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PipelineSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub pipeline_timeout: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub barrier_grace: u64,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Openai,
    Groq,
    Ollama,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub parse_attempts: u32,
    pub ollama_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApiKeys {
    #[serde(default)]
    pub openai: String,
    #[serde(default)]
    pub groq: String,
}

impl Settings {
    pub fn registry(&self) -> SiteRegistry {
        SiteRegistry::builtin().with_extra(self.sites.clone())
    }

    pub fn executor(&self) -> ExecutorSettings {
        ExecutorSettings {
            step_timeout: Duration::from_secs(self.browser.command_timeout),
            max_wait: Duration::from_secs(self.browser.max_wait),
            results_wait: Duration::from_secs(self.browser.results_wait),
            ..Default::default()
        }
    }

    pub fn runner(&self) -> RunnerSettings {
        RunnerSettings {
            pipeline_timeout: Duration::from_secs(self.pipeline.pipeline_timeout),
            close_timeout: Duration::from_secs(self.browser.close_timeout),
            barrier_grace: Duration::from_secs(self.pipeline.barrier_grace),
        }
    }

    pub fn session_provider(&self) -> WebDriverProvider {
        WebDriverProvider::new(self.browser.webdriver_url.clone(), self.browser.headless)
    }

    pub fn completion_provider(&self) -> Box<dyn CompletionProvider> {
        match self.llm.provider {
            LlmProvider::Openai => Box::new(OpenaiClient::new(
                self.api_keys.openai.clone(),
                self.llm.model.clone(),
            )),
            LlmProvider::Groq => Box::new(OpenaiClient::groq(
                self.api_keys.groq.clone(),
                self.llm.model.clone(),
            )),
            LlmProvider::Ollama => {
                Box::new(OllamaClient::new(&self.llm.ollama_url, self.llm.model.clone()))
            }
        }
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename)).required(false),
        )
        // APP_BROWSER__WEBDRIVER_URL=http://chrome:4444 sets browser.webdriver_url
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::domain::site::SiteId;

    use super::{LlmProvider, Settings};

    const BASE: &str = r#"
application:
  host: 127.0.0.1
  port: "8000"
  reports_dir: reports
browser:
  webdriver_url: http://localhost:9515
  headless: true
  command_timeout: 30
  max_wait: 30
  close_timeout: 10
  results_wait: 10
pipeline:
  pipeline_timeout: 120
  barrier_grace: 2
llm:
  provider: ollama
  model: gemma3:1b
  parse_attempts: 3
  ollama_url: http://localhost:11434
api_keys:
  openai: ""
sites:
  - id: Croma
    display_name: Croma
    base_url: https://www.croma.com
    search_url: https://www.croma.com/searchB?q={query}
    selectors:
      container: li.product-item
      title: h3.product-title
      price: span.amount
    currency: INR
"#;

    fn settings() -> Settings {
        settings_with(&[])
    }

    fn settings_with(overrides: &[(&str, &str)]) -> Settings {
        overrides
            .iter()
            .fold(
                config::Config::builder()
                    .add_source(config::File::from_str(BASE, config::FileFormat::Yaml)),
                |builder, (key, value)| builder.set_override(*key, *value).unwrap(),
            )
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn reads_yaml_settings() {
        let settings = settings();

        assert_eq!(settings.application.port, 8000);
        assert_eq!(settings.llm.provider, LlmProvider::Ollama);
        assert_eq!(settings.runner().pipeline_timeout, Duration::from_secs(120));
        assert_eq!(settings.executor().max_wait, Duration::from_secs(30));
    }

    #[test]
    fn groq_is_a_provider_option() {
        let settings = settings_with(&[("llm.provider", "groq"), ("api_keys.groq", "gsk-test")]);

        assert_eq!(settings.llm.provider, LlmProvider::Groq);
        assert_eq!(settings.api_keys.groq, "gsk-test");
        assert_eq!(settings.api_keys.openai, "");
    }

    #[test]
    fn configured_sites_join_the_builtin_ones() {
        let registry = settings().registry();

        let croma = registry.get(&SiteId::new("croma")).unwrap();
        assert_eq!(croma.max_results, 5);
        assert!(registry.contains(&SiteId::new("amazon")));
    }
}
