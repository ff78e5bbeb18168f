pub mod aggregator;
pub mod browser_session;
pub mod droid;
pub mod events;
pub mod extractor;
pub mod intent_parser;
pub mod ollama_client;
pub mod openai_client;
pub mod query_runner;
pub mod report;
pub mod workflow_executor;
pub mod workflow_generator;

pub use aggregator::*;
pub use browser_session::{BrowserSession, SessionError, SessionProvider};
pub use droid::*;
pub use events::*;
pub use extractor::*;
pub use intent_parser::{CompletionProvider, IntentParseError, IntentParser, LlmIntentParser};
pub use ollama_client::*;
pub use openai_client::*;
pub use query_runner::*;
pub use report::*;
pub use workflow_executor::*;
pub use workflow_generator::*;
