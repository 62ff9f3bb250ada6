pub mod api;
pub mod config;
pub mod conversations;
pub mod credentials;
pub mod decode;
pub mod error;
pub mod forms;
pub mod session;
pub mod speech;
pub mod state;
pub mod stream;

// Re-export main types for convenience
pub use api::{ApiClient, ChatRequest};
pub use config::Config;
pub use conversations::Conversation;
pub use credentials::{Credential, CredentialStore};
pub use decode::Utf8StreamDecoder;
pub use error::{AuthError, ChatError, FormError};
pub use forms::{LoginForm, RegisterForm};
pub use session::{ChatSession, Completion, StreamState};
pub use speech::AudioPlayer;
pub use state::{ChatMessage, ChatRole, Transcript};
pub use stream::{StreamEvent, StreamSummary};
