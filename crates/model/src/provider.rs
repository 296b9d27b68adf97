use crate::error::ProviderError;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// Something that can generate tutor replies, typically a client of a
/// hosted model.
///
/// A provider is shared by every conversation the endpoint serves, so it
/// must not keep per-conversation state: each request carries the whole
/// transcript.
pub trait ModelProvider: Send + Sync {
    /// The reply type, yielding the text as the model writes it.
    type Response: ModelResponse;

    /// Starts generating a reply to `req`.
    ///
    /// The future resolves once the model has accepted the request, and
    /// doesn't borrow the provider, so it can be moved into another task.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, ProviderError>> + Send + 'static;
}
