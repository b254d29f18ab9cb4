use crate::backend::{Backend, GenerateOptions};
use crate::identity::{ExternalIdentity, UserResolver};
use std::sync::Arc;
use tracing::{debug, error};

/// Sent verbatim whenever response generation fails. Users never see raw
/// error text.
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't get a response right now. Please try again.";

/// Turns an incoming message into reply text.
///
/// This is the one place where generation failures are absorbed: `respond`
/// always produces something sendable, so callers never need an error path
/// between receiving a message and replying to it.
pub struct Responder {
    backend: Arc<dyn Backend>,
    resolver: UserResolver,
    opts: GenerateOptions,
}

impl Responder {
    pub fn new(backend: Arc<dyn Backend>, resolver: UserResolver, opts: GenerateOptions) -> Self {
        Self {
            backend,
            resolver,
            opts,
        }
    }

    /// Resolve the sender to a virtual username and generate a reply.
    /// An empty reply counts as a failure.
    pub async fn respond(&self, identity: &ExternalIdentity, text: &str) -> String {
        let username = self.resolver.resolve(identity).await;
        debug!(username = %username, chars = text.chars().count(), "generating response");

        match self.backend.generate(text, &username, &self.opts).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => {
                error!(username = %username, "backend returned an empty reply");
                FALLBACK_REPLY.to_string()
            }
            Err(err) => {
                error!(username = %username, error = %err, "response generation failed");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
